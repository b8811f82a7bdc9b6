//! SSH 代理会话
//!
//! 使用 russh 库实现真实的 SSH 连接与命令执行：
//! 连接带重试退避，认证优先使用单元私钥、失败时回退到密码，
//! 主机密钥按配置的验证策略检查。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client;
use russh::ChannelMsg;
use russh_keys::key::PublicKey;
use russh_keys::PublicKeyBase64;
use secrecy::ExposeSecret;
use sha2::Digest;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::{HostKeyPolicy, ProxyConfig};
use crate::error::{ProxyError, Result};
use crate::exec::{CommandOutput, TIMEOUT_EXIT_CODE};

/// SSH 代理
pub struct SshProxy {
    config: ProxyConfig,
}

impl SshProxy {
    /// 从代理配置创建
    pub fn new(config: ProxyConfig) -> Self {
        Self { config }
    }

    /// 获取配置的引用
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    fn checker(&self) -> HostKeyChecker {
        HostKeyChecker {
            policy: self.config.host_key_policy.clone(),
            known_hosts: self.config.known_hosts.clone(),
            host: self.config.host.clone(),
            port: self.config.port,
        }
    }

    /// 验证凭据：仅建立连接并认证
    ///
    /// 认证被拒绝返回 `Ok(false)`，传输层失败返回 `Err`
    pub async fn verify_credentials(&self) -> Result<bool> {
        match self.connect().await {
            Ok(handle) => {
                let _ = handle
                    .disconnect(russh::Disconnect::ByApplication, "", "")
                    .await;
                Ok(true)
            }
            Err(e) if e.is_auth_failure() => {
                info!(target_host = %self.config.target(), "SSH credentials rejected");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// 在远端执行命令
    pub async fn run(&self, command: &str) -> Result<CommandOutput> {
        let start = std::time::Instant::now();

        debug!(
            host = %self.config.host,
            port = %self.config.port,
            user = %self.config.username,
            command = %command,
            "Executing SSH command"
        );

        let handle = self.connect().await?;

        let mut channel = handle.channel_open_session().await.map_err(|e| {
            error!(error = %e, "Failed to open SSH channel");
            ProxyError::Connect(format!("failed to open channel: {}", e))
        })?;

        channel.exec(true, command).await.map_err(|e| {
            error!(error = %e, "Failed to start remote command");
            ProxyError::Exec(format!("failed to start command: {}", e))
        })?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = 0;

        let command_timeout = Duration::from_secs(self.config.command_timeout_secs);

        loop {
            let msg = timeout(command_timeout, channel.wait()).await;

            match msg {
                Ok(Some(ChannelMsg::Data { ref data })) => {
                    stdout.extend_from_slice(data);
                }
                Ok(Some(ChannelMsg::ExtendedData { ref data, ext })) => {
                    if ext == 1 {
                        // SSH_EXTENDED_DATA_STDERR
                        stderr.extend_from_slice(data);
                    }
                }
                Ok(Some(ChannelMsg::ExitStatus { exit_status })) => {
                    exit_code = exit_status as i32;
                    break;
                }
                Ok(Some(ChannelMsg::Eof)) => {
                    break;
                }
                Ok(None) => {
                    break;
                }
                Err(_) => {
                    warn!(command_timeout_secs = self.config.command_timeout_secs, "Remote command timed out");
                    exit_code = TIMEOUT_EXIT_CODE;
                    break;
                }
                _ => {}
            }
        }

        let _ = channel.close().await;
        let _ = handle
            .disconnect(russh::Disconnect::ByApplication, "", "")
            .await;

        let duration_secs = start.elapsed().as_secs_f64();
        let timed_out = exit_code == TIMEOUT_EXIT_CODE;

        metrics::histogram!("sshproxy_command_duration_seconds").record(duration_secs);

        info!(
            host = %self.config.host,
            exit_code = exit_code,
            duration_secs = duration_secs,
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            "Command executed"
        );

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            duration_secs,
            timed_out,
        })
    }

    /// 建立连接并完成认证，带重试退避
    async fn connect(&self) -> Result<client::Handle<HostKeyChecker>> {
        if self.config.host.is_empty() {
            return Err(ProxyError::Connect("no hostname configured".to_string()));
        }

        let client_config = Arc::new(client::Config::default());
        let connect_timeout = Duration::from_secs(self.config.connect_timeout_secs);
        let max_attempts = self.config.retry.max_attempts.max(1);

        let mut handle = None;
        let mut last_err: Option<ProxyError> = None;

        for attempt in 1..=max_attempts {
            metrics::counter!("sshproxy_connect_attempts_total").increment(1);

            let connecting = client::connect(
                client_config.clone(),
                (self.config.host.clone(), self.config.port),
                self.checker(),
            );

            match timeout(connect_timeout, connecting).await {
                Ok(Ok(h)) => {
                    handle = Some(h);
                    break;
                }
                Ok(Err(e)) => {
                    last_err = Some(ProxyError::Connect(format!(
                        "{}: {}",
                        self.config.target(),
                        e
                    )));
                }
                Err(_) => {
                    last_err = Some(ProxyError::ConnectTimeout(self.config.target()));
                }
            }

            if attempt < max_attempts {
                let backoff = self.config.retry.backoff_after(attempt);
                warn!(
                    target_host = %self.config.target(),
                    attempt = attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "SSH connect failed, retrying"
                );
                tokio::time::sleep(backoff).await;
            }
        }

        let Some(mut handle) = handle else {
            metrics::counter!("sshproxy_connect_failures_total").increment(1);
            error!(target_host = %self.config.target(), "SSH connection failed after retries");
            return Err(
                last_err.unwrap_or_else(|| ProxyError::Connect(self.config.target()))
            );
        };

        if !self.authenticate(&mut handle).await? {
            let _ = handle
                .disconnect(russh::Disconnect::ByApplication, "", "")
                .await;
            return Err(ProxyError::Auth(self.config.target()));
        }

        debug!(target_host = %self.config.target(), "SSH session established");
        Ok(handle)
    }

    /// 认证：单元私钥优先，失败回退到密码
    async fn authenticate(&self, handle: &mut client::Handle<HostKeyChecker>) -> Result<bool> {
        if let Some(path) = &self.config.key_path {
            if path.is_file() {
                match russh_keys::load_secret_key(path, None) {
                    Ok(key) => {
                        match handle
                            .authenticate_publickey(self.config.username.clone(), Arc::new(key))
                            .await
                        {
                            Ok(true) => {
                                debug!("Public key authentication succeeded");
                                return Ok(true);
                            }
                            Ok(false) => {
                                debug!("Public key rejected, falling back to password");
                            }
                            Err(e) => {
                                warn!(error = %e, "Public key authentication errored, falling back to password");
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, path = %path.display(), "Failed to load unit key, falling back to password");
                    }
                }
            }
        }

        if let Some(password) = &self.config.password {
            if password.expose_secret().is_empty() {
                return Ok(false);
            }
            return handle
                .authenticate_password(self.config.username.clone(), password.expose_secret())
                .await
                .map_err(|e| {
                    ProxyError::Connect(format!("password authentication error: {}", e))
                });
        }

        Ok(false)
    }
}

/// SSH 客户端会话处理器：按策略验证主机密钥
struct HostKeyChecker {
    policy: HostKeyPolicy,
    known_hosts: Option<std::collections::HashMap<String, String>>,
    host: String,
    port: u16,
}

impl HostKeyChecker {
    fn fingerprint(key: &PublicKey) -> String {
        let mut hasher = sha2::Sha256::new();
        hasher.update(key.public_key_base64().as_bytes());
        hex::encode(hasher.finalize())
    }

    fn host_key(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[async_trait]
impl client::Handler for HostKeyChecker {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        if self.policy == HostKeyPolicy::Off {
            warn!(
                host = %self.host,
                port = self.port,
                "Host key verification disabled - accepting all keys"
            );
            return Ok(true);
        }

        let fingerprint = Self::fingerprint(server_public_key);
        let host_key = self.host_key();

        if let Some(known_hosts) = &self.known_hosts {
            if let Some(stored) = known_hosts.get(&host_key) {
                if stored == &fingerprint {
                    debug!(host = %host_key, "Host key verified");
                    return Ok(true);
                }
                error!(
                    host = %host_key,
                    expected = %stored,
                    actual = %fingerprint,
                    "Host key mismatch - rejecting connection"
                );
                return Ok(false);
            }
        }

        match self.policy {
            HostKeyPolicy::AcceptNew => {
                info!(
                    host = %host_key,
                    fingerprint = %fingerprint,
                    "First time connecting - accepting host key"
                );
                Ok(true)
            }
            HostKeyPolicy::Strict => {
                error!(host = %host_key, "Unknown host in strict mode - rejecting connection");
                Ok(false)
            }
            HostKeyPolicy::Off => unreachable!(),
        }
    }
}
