//! 事件处理器
//!
//! 将框架派发的事件与动作映射为代理调用与状态上报。
//! 远端会话通过 `Remote` 抽象注入，处理逻辑可在无网络环境下测试。

use crate::config::Settings;
use crate::error::{CharmError, Result};
use crate::event::{Action, Event};
use crate::model::{Hooks, Status, UnitConfig};
use async_trait::async_trait;
use sshproxy::{shell_quote, CommandOutput, KeyStore, ProxyConfig, SshProxy};
use tracing::{debug, info, warn};

/// 远端会话抽象
#[async_trait]
pub trait Remote: Send + Sync {
    /// 在远端执行命令
    async fn run(&self, command: &str) -> sshproxy::Result<CommandOutput>;

    /// 验证 SSH 凭据
    async fn verify_credentials(&self) -> sshproxy::Result<bool>;
}

#[async_trait]
impl Remote for SshProxy {
    async fn run(&self, command: &str) -> sshproxy::Result<CommandOutput> {
        SshProxy::run(self, command).await
    }

    async fn verify_credentials(&self) -> sshproxy::Result<bool> {
        SshProxy::verify_credentials(self).await
    }
}

/// 由代理配置构造远端会话的工厂
pub type RemoteFactory = Box<dyn Fn(ProxyConfig) -> Box<dyn Remote> + Send + Sync>;

/// charm 事件处理器
pub struct Charm<H: Hooks> {
    hooks: H,
    settings: Settings,
    remotes: RemoteFactory,
}

impl<H: Hooks> Charm<H> {
    /// 创建处理器，默认工厂构造真实的 SSH 代理
    pub fn new(hooks: H, settings: Settings) -> Self {
        Self {
            hooks,
            settings,
            remotes: Box::new(|config| Box::new(SshProxy::new(config))),
        }
    }

    /// 替换远端会话工厂（用于测试）
    pub fn with_remote_factory(mut self, remotes: RemoteFactory) -> Self {
        self.remotes = remotes;
        self
    }

    /// 派发一个事件
    pub async fn dispatch(&self, event: Event) -> Result<()> {
        info!(event = event.name(), "Dispatching event");
        match event {
            Event::Install => self.on_install().await,
            Event::ConfigChanged => self.on_config_changed().await,
            Event::UpgradeCharm => self.on_upgrade_charm().await,
            Event::Action(action) => {
                if let Err(e) = self.on_action(action).await {
                    warn!(action = action.name(), error = %e, "Action failed");
                    self.hooks.action_fail(&e.to_string()).await?;
                    return Err(e);
                }
                Ok(())
            }
        }
    }

    async fn on_action(&self, action: Action) -> Result<()> {
        match action {
            Action::Touch => self.on_touch().await,
            Action::Reboot => self.on_reboot().await,
            Action::Run => self.on_run().await,
            Action::GenerateSshKey => self.on_generate_ssh_key().await,
            Action::GetSshPublicKey => self.on_get_ssh_public_key().await,
            Action::VerifySshCredentials => self.on_verify_ssh_credentials().await,
            Action::Start | Action::Stop | Action::Restart | Action::Upgrade => {
                // VNF 服务原语：由具体 VNF charm 实现
                debug!(action = action.name(), "No-op VNF primitive");
                Ok(())
            }
        }
    }

    fn key_store(&self) -> Result<KeyStore> {
        Ok(self.settings.key_store()?)
    }

    /// 根据单元配置构造代理配置；主机未配置时返回 None
    async fn unit_proxy_config(&self) -> Result<Option<ProxyConfig>> {
        let unit = UnitConfig::load(&self.hooks).await?;
        if !unit.has_hostname() {
            return Ok(None);
        }

        let keys = self.key_store()?;
        let mut config = ProxyConfig::new(unit.ssh_hostname, unit.ssh_username)
            .with_password(unit.ssh_password)
            .with_port(self.settings.ssh.port)
            .with_connect_timeout(self.settings.ssh.connect_timeout_secs)
            .with_command_timeout(self.settings.ssh.command_timeout_secs)
            .with_retry(self.settings.retry_policy())
            .with_host_key_policy(self.settings.host_key_policy());

        if keys.has_key() {
            config = config.with_key_path(keys.private_key_path());
        }

        Ok(Some(config))
    }

    async fn remote(&self) -> Result<Option<Box<dyn Remote>>> {
        Ok(self
            .unit_proxy_config()
            .await?
            .map(|config| (self.remotes)(config)))
    }

    async fn require_remote(&self) -> Result<Box<dyn Remote>> {
        self.remote()
            .await?
            .ok_or_else(|| CharmError::Config("ssh-hostname is not set".to_string()))
    }

    async fn action_param(&self, key: &str) -> Result<String> {
        self.hooks
            .action_get(key)
            .await?
            .filter(|value| !value.is_empty())
            .ok_or_else(|| CharmError::MissingParam(key.to_string()))
    }

    async fn verify(&self) -> Result<bool> {
        match self.remote().await? {
            Some(remote) => Ok(remote.verify_credentials().await.unwrap_or_else(|e| {
                warn!(error = %e, "Credential verification failed");
                false
            })),
            None => Ok(false),
        }
    }

    // 生命周期事件

    /// install：确保单元密钥对存在
    async fn on_install(&self) -> Result<()> {
        let keys = self.key_store()?;
        if !keys.has_key() {
            self.hooks
                .status_set(&Status::Maintenance("Generating SSH keys...".to_string()))
                .await?;
            info!("Generating unit SSH keypair");
            keys.generate(false)?;
        }
        self.hooks.status_set(&Status::Active).await
    }

    /// config-changed：校验 SSH 凭据并上报状态
    async fn on_config_changed(&self) -> Result<()> {
        self.hooks
            .status_set(&Status::Waiting("Waiting for SSH credentials".to_string()))
            .await?;

        if self.verify().await? {
            self.hooks.status_set(&Status::Active).await
        } else {
            self.hooks
                .status_set(&Status::Blocked("Invalid SSH credentials.".to_string()))
                .await
        }
    }

    /// upgrade-charm：维护态下重跑 install 逻辑
    async fn on_upgrade_charm(&self) -> Result<()> {
        self.hooks
            .status_set(&Status::Maintenance("Upgrading charm".to_string()))
            .await?;
        self.on_install().await
    }

    // 动作

    async fn on_touch(&self) -> Result<()> {
        let filename = self.action_param("filename").await?;

        let Some(remote) = self.remote().await? else {
            return self
                .hooks
                .action_set(&[("success", "false".to_string())])
                .await;
        };

        let output = remote
            .run(&format!("touch {}", shell_quote(&filename)))
            .await?;
        if output.stderr.is_empty() {
            self.hooks
                .action_set(&[("success", "true".to_string())])
                .await
        } else {
            self.hooks
                .action_set(&[("success", "false".to_string())])
                .await?;
            self.hooks.action_fail(&output.stderr).await
        }
    }

    async fn on_reboot(&self) -> Result<()> {
        let remote = self.require_remote().await?;
        let output = remote.run("sudo reboot").await?;
        if !output.stderr.is_empty() {
            self.hooks.action_fail(&output.stderr).await?;
        }
        Ok(())
    }

    async fn on_run(&self) -> Result<()> {
        let command = self.action_param("command").await?;
        let remote = self.require_remote().await?;

        let output = remote.run(&command).await?;
        self.hooks
            .action_set(&[("output", output.stdout.clone())])
            .await?;
        if !output.stderr.is_empty() {
            self.hooks.action_fail(&output.stderr).await?;
        }
        Ok(())
    }

    async fn on_generate_ssh_key(&self) -> Result<()> {
        let keys = self.key_store()?;
        if let Err(e) = keys.generate(true) {
            warn!(error = %e, "Key generation failed");
            self.hooks.action_fail("Unable to generate ssh key").await?;
        }
        Ok(())
    }

    async fn on_get_ssh_public_key(&self) -> Result<()> {
        let pubkey = self.key_store()?.public_key()?;
        self.hooks.action_set(&[("pubkey", pubkey)]).await
    }

    async fn on_verify_ssh_credentials(&self) -> Result<()> {
        let verified = self.verify().await?;
        info!(verified, "SSH credential verification finished");
        self.hooks
            .juju_log(if verified {
                "Verified!"
            } else {
                "Verification failed!"
            })
            .await?;
        self.hooks
            .action_set(&[("verified", verified.to_string())])
            .await
    }
}
