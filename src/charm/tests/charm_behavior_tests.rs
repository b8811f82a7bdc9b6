//! charm 行为测试
//!
//! 用假的 hook 工具与远端会话驱动事件处理器，
//! 覆盖生命周期事件与全部动作原语的状态/结果语义。

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sshproxy::{CommandOutput, KeyStore, ProxyConfig};
use sshproxy_charm::charm::{Charm, Remote, RemoteFactory};
use sshproxy_charm::config::{LoggingSettings, Settings, SshSettings};
use sshproxy_charm::error::CharmError;
use sshproxy_charm::event::{Action, Event};
use sshproxy_charm::model::{Hooks, Status};
use tempfile::TempDir;

#[derive(Clone, Default)]
struct FakeHooks {
    config: HashMap<String, String>,
    params: HashMap<String, String>,
    statuses: Arc<Mutex<Vec<Status>>>,
    results: Arc<Mutex<Vec<(String, String)>>>,
    failures: Arc<Mutex<Vec<String>>>,
    logs: Arc<Mutex<Vec<String>>>,
}

impl FakeHooks {
    fn with_unit_config(hostname: &str) -> Self {
        let mut hooks = Self::default();
        hooks.config.insert("ssh-hostname".to_string(), hostname.to_string());
        hooks.config.insert("ssh-username".to_string(), "ubuntu".to_string());
        hooks.config.insert("ssh-password".to_string(), "secret".to_string());
        hooks
    }

    fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        self
    }

    fn statuses(&self) -> Vec<Status> {
        self.statuses.lock().unwrap().clone()
    }

    fn results(&self) -> Vec<(String, String)> {
        self.results.lock().unwrap().clone()
    }

    fn failures(&self) -> Vec<String> {
        self.failures.lock().unwrap().clone()
    }

    fn logs(&self) -> Vec<String> {
        self.logs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Hooks for FakeHooks {
    async fn config_get(&self, key: &str) -> sshproxy_charm::Result<Option<String>> {
        Ok(self.config.get(key).cloned())
    }

    async fn status_set(&self, status: &Status) -> sshproxy_charm::Result<()> {
        self.statuses.lock().unwrap().push(status.clone());
        Ok(())
    }

    async fn action_get(&self, key: &str) -> sshproxy_charm::Result<Option<String>> {
        Ok(self.params.get(key).cloned())
    }

    async fn action_set(&self, results: &[(&str, String)]) -> sshproxy_charm::Result<()> {
        let mut stored = self.results.lock().unwrap();
        for (key, value) in results {
            stored.push((key.to_string(), value.clone()));
        }
        Ok(())
    }

    async fn action_fail(&self, message: &str) -> sshproxy_charm::Result<()> {
        self.failures.lock().unwrap().push(message.to_string());
        Ok(())
    }

    async fn juju_log(&self, message: &str) -> sshproxy_charm::Result<()> {
        self.logs.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

#[derive(Clone)]
struct FakeRemote {
    verified: bool,
    output: CommandOutput,
    commands: Arc<Mutex<Vec<String>>>,
}

impl FakeRemote {
    fn verified(verified: bool) -> Self {
        Self {
            verified,
            output: CommandOutput::success(String::new(), 0.0),
            commands: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn with_output(output: CommandOutput) -> Self {
        Self {
            verified: true,
            output,
            commands: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl Remote for FakeRemote {
    async fn run(&self, command: &str) -> sshproxy::Result<CommandOutput> {
        self.commands.lock().unwrap().push(command.to_string());
        Ok(self.output.clone())
    }

    async fn verify_credentials(&self) -> sshproxy::Result<bool> {
        Ok(self.verified)
    }
}

fn factory(remote: FakeRemote, seen: Arc<Mutex<Vec<ProxyConfig>>>) -> RemoteFactory {
    Box::new(move |config| {
        seen.lock().unwrap().push(config);
        Box::new(remote.clone())
    })
}

fn test_settings(key_dir: &Path) -> Settings {
    Settings {
        logging: LoggingSettings {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
        ssh: SshSettings {
            key_dir: Some(key_dir.to_path_buf()),
            key_name: "id_sshproxy".to_string(),
            port: 22,
            connect_timeout_secs: 1,
            command_timeout_secs: 5,
            max_connect_attempts: 1,
            initial_backoff_ms: 10,
            host_key_policy: "accept".to_string(),
        },
    }
}

fn charm_with(
    hooks: FakeHooks,
    key_dir: &Path,
    remote: FakeRemote,
    seen: Arc<Mutex<Vec<ProxyConfig>>>,
) -> Charm<FakeHooks> {
    Charm::new(hooks, test_settings(key_dir)).with_remote_factory(factory(remote, seen))
}

fn pregenerate_key(key_dir: &Path) -> String {
    KeyStore::new(key_dir, "id_sshproxy").generate(false).unwrap()
}

// 生命周期事件

#[tokio::test]
async fn install_generates_keypair_and_goes_active() {
    let dir = TempDir::new().unwrap();
    let hooks = FakeHooks::default();
    let charm = Charm::new(hooks.clone(), test_settings(dir.path()));

    charm.dispatch(Event::Install).await.unwrap();

    assert_eq!(
        hooks.statuses(),
        vec![
            Status::Maintenance("Generating SSH keys...".to_string()),
            Status::Active,
        ]
    );
    assert!(KeyStore::new(dir.path(), "id_sshproxy").has_key());
}

#[tokio::test]
async fn install_skips_generation_when_key_exists() {
    let dir = TempDir::new().unwrap();
    pregenerate_key(dir.path());
    let hooks = FakeHooks::default();
    let charm = Charm::new(hooks.clone(), test_settings(dir.path()));

    charm.dispatch(Event::Install).await.unwrap();

    assert_eq!(hooks.statuses(), vec![Status::Active]);
}

#[tokio::test]
async fn config_changed_with_valid_credentials_goes_active() {
    let dir = TempDir::new().unwrap();
    let hooks = FakeHooks::with_unit_config("10.0.0.5");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let charm = charm_with(hooks.clone(), dir.path(), FakeRemote::verified(true), seen);

    charm.dispatch(Event::ConfigChanged).await.unwrap();

    assert_eq!(
        hooks.statuses(),
        vec![
            Status::Waiting("Waiting for SSH credentials".to_string()),
            Status::Active,
        ]
    );
}

#[tokio::test]
async fn config_changed_with_invalid_credentials_blocks() {
    let dir = TempDir::new().unwrap();
    let hooks = FakeHooks::with_unit_config("10.0.0.5");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let charm = charm_with(hooks.clone(), dir.path(), FakeRemote::verified(false), seen);

    charm.dispatch(Event::ConfigChanged).await.unwrap();

    assert_eq!(
        hooks.statuses().last(),
        Some(&Status::Blocked("Invalid SSH credentials.".to_string()))
    );
}

#[tokio::test]
async fn config_changed_without_hostname_blocks_without_connecting() {
    let dir = TempDir::new().unwrap();
    let hooks = FakeHooks::default();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let charm = charm_with(
        hooks.clone(),
        dir.path(),
        FakeRemote::verified(true),
        seen.clone(),
    );

    charm.dispatch(Event::ConfigChanged).await.unwrap();

    assert_eq!(
        hooks.statuses().last(),
        Some(&Status::Blocked("Invalid SSH credentials.".to_string()))
    );
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn upgrade_charm_reruns_install() {
    let dir = TempDir::new().unwrap();
    pregenerate_key(dir.path());
    let hooks = FakeHooks::default();
    let charm = Charm::new(hooks.clone(), test_settings(dir.path()));

    charm.dispatch(Event::UpgradeCharm).await.unwrap();

    assert_eq!(
        hooks.statuses(),
        vec![
            Status::Maintenance("Upgrading charm".to_string()),
            Status::Active,
        ]
    );
}

// 动作原语

#[tokio::test]
async fn touch_reports_success() {
    let dir = TempDir::new().unwrap();
    let hooks = FakeHooks::with_unit_config("10.0.0.5").with_param("filename", "demo.txt");
    let remote = FakeRemote::with_output(CommandOutput::success(String::new(), 0.1));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let charm = charm_with(hooks.clone(), dir.path(), remote.clone(), seen);

    charm.dispatch(Event::Action(Action::Touch)).await.unwrap();

    assert_eq!(remote.commands(), vec!["touch demo.txt".to_string()]);
    assert_eq!(hooks.results(), vec![("success".to_string(), "true".to_string())]);
    assert!(hooks.failures().is_empty());
}

#[tokio::test]
async fn touch_quotes_hostile_filenames() {
    let dir = TempDir::new().unwrap();
    let hooks = FakeHooks::with_unit_config("10.0.0.5").with_param("filename", "a file; rm -rf /");
    let remote = FakeRemote::with_output(CommandOutput::success(String::new(), 0.1));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let charm = charm_with(hooks.clone(), dir.path(), remote.clone(), seen);

    charm.dispatch(Event::Action(Action::Touch)).await.unwrap();

    assert_eq!(remote.commands(), vec!["touch 'a file; rm -rf /'".to_string()]);
}

#[tokio::test]
async fn touch_with_stderr_fails_the_action() {
    let dir = TempDir::new().unwrap();
    let hooks = FakeHooks::with_unit_config("10.0.0.5").with_param("filename", "demo.txt");
    let remote = FakeRemote::with_output(CommandOutput::failure(
        1,
        String::new(),
        "touch: permission denied".to_string(),
        0.1,
    ));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let charm = charm_with(hooks.clone(), dir.path(), remote, seen);

    charm.dispatch(Event::Action(Action::Touch)).await.unwrap();

    assert_eq!(hooks.results(), vec![("success".to_string(), "false".to_string())]);
    assert_eq!(hooks.failures(), vec!["touch: permission denied".to_string()]);
}

#[tokio::test]
async fn touch_without_hostname_reports_failure_without_connecting() {
    let dir = TempDir::new().unwrap();
    let hooks = FakeHooks::default().with_param("filename", "demo.txt");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let charm = charm_with(
        hooks.clone(),
        dir.path(),
        FakeRemote::verified(true),
        seen.clone(),
    );

    charm.dispatch(Event::Action(Action::Touch)).await.unwrap();

    assert_eq!(hooks.results(), vec![("success".to_string(), "false".to_string())]);
    assert!(hooks.failures().is_empty());
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn touch_without_filename_parameter_fails() {
    let dir = TempDir::new().unwrap();
    let hooks = FakeHooks::with_unit_config("10.0.0.5");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let charm = charm_with(hooks.clone(), dir.path(), FakeRemote::verified(true), seen);

    let err = charm.dispatch(Event::Action(Action::Touch)).await.unwrap_err();

    assert!(matches!(err, CharmError::MissingParam(_)));
    assert_eq!(hooks.failures(), vec!["Missing action parameter: filename".to_string()]);
}

#[tokio::test]
async fn run_sets_stdout_as_output() {
    let dir = TempDir::new().unwrap();
    let hooks = FakeHooks::with_unit_config("10.0.0.5").with_param("command", "uptime");
    let remote = FakeRemote::with_output(CommandOutput::success("up 3 days\n".to_string(), 0.2));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let charm = charm_with(hooks.clone(), dir.path(), remote.clone(), seen);

    charm.dispatch(Event::Action(Action::Run)).await.unwrap();

    assert_eq!(remote.commands(), vec!["uptime".to_string()]);
    assert_eq!(
        hooks.results(),
        vec![("output".to_string(), "up 3 days\n".to_string())]
    );
    assert!(hooks.failures().is_empty());
}

#[tokio::test]
async fn run_with_stderr_still_sets_output_then_fails() {
    let dir = TempDir::new().unwrap();
    let hooks = FakeHooks::with_unit_config("10.0.0.5").with_param("command", "ls /missing");
    let remote = FakeRemote::with_output(CommandOutput::failure(
        2,
        String::new(),
        "No such file or directory".to_string(),
        0.2,
    ));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let charm = charm_with(hooks.clone(), dir.path(), remote, seen);

    charm.dispatch(Event::Action(Action::Run)).await.unwrap();

    assert_eq!(hooks.results(), vec![("output".to_string(), String::new())]);
    assert_eq!(hooks.failures(), vec!["No such file or directory".to_string()]);
}

#[tokio::test]
async fn run_without_hostname_fails_the_action() {
    let dir = TempDir::new().unwrap();
    let hooks = FakeHooks::default().with_param("command", "uptime");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let charm = charm_with(hooks.clone(), dir.path(), FakeRemote::verified(true), seen);

    let err = charm.dispatch(Event::Action(Action::Run)).await.unwrap_err();

    assert!(matches!(err, CharmError::Config(_)));
    assert_eq!(hooks.failures().len(), 1);
}

#[tokio::test]
async fn reboot_runs_sudo_reboot() {
    let dir = TempDir::new().unwrap();
    let hooks = FakeHooks::with_unit_config("10.0.0.5");
    let remote = FakeRemote::with_output(CommandOutput::success(String::new(), 0.1));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let charm = charm_with(hooks.clone(), dir.path(), remote.clone(), seen);

    charm.dispatch(Event::Action(Action::Reboot)).await.unwrap();

    assert_eq!(remote.commands(), vec!["sudo reboot".to_string()]);
    assert!(hooks.failures().is_empty());
}

#[tokio::test]
async fn reboot_with_stderr_fails_the_action() {
    let dir = TempDir::new().unwrap();
    let hooks = FakeHooks::with_unit_config("10.0.0.5");
    let remote = FakeRemote::with_output(CommandOutput::failure(
        1,
        String::new(),
        "sudo: a password is required".to_string(),
        0.1,
    ));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let charm = charm_with(hooks.clone(), dir.path(), remote, seen);

    charm.dispatch(Event::Action(Action::Reboot)).await.unwrap();

    assert_eq!(hooks.failures(), vec!["sudo: a password is required".to_string()]);
}

#[tokio::test]
async fn generate_ssh_key_action_replaces_existing_key() {
    let dir = TempDir::new().unwrap();
    let first = pregenerate_key(dir.path());
    let hooks = FakeHooks::default();
    let charm = Charm::new(hooks.clone(), test_settings(dir.path()));

    charm
        .dispatch(Event::Action(Action::GenerateSshKey))
        .await
        .unwrap();

    let second = KeyStore::new(dir.path(), "id_sshproxy").public_key().unwrap();
    assert_ne!(first, second);
    assert!(hooks.failures().is_empty());
}

#[tokio::test]
async fn get_ssh_public_key_returns_public_line() {
    let dir = TempDir::new().unwrap();
    let public_line = pregenerate_key(dir.path());
    let hooks = FakeHooks::default();
    let charm = Charm::new(hooks.clone(), test_settings(dir.path()));

    charm
        .dispatch(Event::Action(Action::GetSshPublicKey))
        .await
        .unwrap();

    assert_eq!(hooks.results(), vec![("pubkey".to_string(), public_line)]);
}

#[tokio::test]
async fn get_ssh_public_key_without_key_fails() {
    let dir = TempDir::new().unwrap();
    let hooks = FakeHooks::default();
    let charm = Charm::new(hooks.clone(), test_settings(dir.path()));

    let err = charm
        .dispatch(Event::Action(Action::GetSshPublicKey))
        .await
        .unwrap_err();

    assert!(matches!(err, CharmError::Proxy(_)));
    assert_eq!(hooks.failures().len(), 1);
}

#[tokio::test]
async fn verify_ssh_credentials_action_reports_verified() {
    let dir = TempDir::new().unwrap();
    let hooks = FakeHooks::with_unit_config("10.0.0.5");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let charm = charm_with(hooks.clone(), dir.path(), FakeRemote::verified(true), seen);

    charm
        .dispatch(Event::Action(Action::VerifySshCredentials))
        .await
        .unwrap();

    assert_eq!(hooks.results(), vec![("verified".to_string(), "true".to_string())]);
    assert_eq!(hooks.logs(), vec!["Verified!".to_string()]);
}

#[tokio::test]
async fn verify_ssh_credentials_action_reports_rejection() {
    let dir = TempDir::new().unwrap();
    let hooks = FakeHooks::with_unit_config("10.0.0.5");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let charm = charm_with(hooks.clone(), dir.path(), FakeRemote::verified(false), seen);

    charm
        .dispatch(Event::Action(Action::VerifySshCredentials))
        .await
        .unwrap();

    assert_eq!(hooks.results(), vec![("verified".to_string(), "false".to_string())]);
    assert_eq!(hooks.logs(), vec!["Verification failed!".to_string()]);
}

#[tokio::test]
async fn vnf_service_primitives_are_noops() {
    let dir = TempDir::new().unwrap();
    let hooks = FakeHooks::with_unit_config("10.0.0.5");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let charm = charm_with(
        hooks.clone(),
        dir.path(),
        FakeRemote::verified(true),
        seen.clone(),
    );

    for action in [Action::Start, Action::Stop, Action::Restart, Action::Upgrade] {
        charm.dispatch(Event::Action(action)).await.unwrap();
    }

    assert!(hooks.results().is_empty());
    assert!(hooks.failures().is_empty());
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn proxy_config_is_built_from_unit_config() {
    let dir = TempDir::new().unwrap();
    pregenerate_key(dir.path());
    let hooks = FakeHooks::with_unit_config("10.0.0.5");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let charm = charm_with(
        hooks.clone(),
        dir.path(),
        FakeRemote::verified(true),
        seen.clone(),
    );

    charm
        .dispatch(Event::Action(Action::VerifySshCredentials))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].host, "10.0.0.5");
    assert_eq!(seen[0].port, 22);
    assert_eq!(seen[0].username, "ubuntu");
    assert!(seen[0].password.is_some());
    assert_eq!(
        seen[0].key_path.as_deref(),
        Some(dir.path().join("id_sshproxy").as_path())
    );
}
