//! charm 代理端配置
//!
//! 从环境变量加载代理端设置（日志、密钥位置、SSH 超时与重试）。
//! 注意与单元配置（ssh-hostname 等）区分：后者存放在框架配置存储中，
//! 只能通过 hook 工具读取，见 `crate::model::UnitConfig`。

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use sshproxy::{HostKeyPolicy, KeyStore, RetryPolicy};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SshSettings {
    /// 单元密钥目录（默认 $HOME/.ssh）
    pub key_dir: Option<PathBuf>,
    /// 单元密钥文件名
    pub key_name: String,
    /// 远端 SSH 端口
    pub port: u16,
    /// 连接超时（秒）
    pub connect_timeout_secs: u64,
    /// 命令执行默认超时（秒）
    pub command_timeout_secs: u64,
    /// 最大连接尝试次数（含首次）
    pub max_connect_attempts: u32,
    /// 首次重试前的退避（毫秒）
    pub initial_backoff_ms: u64,
    /// 主机密钥验证策略（strict/accept/off）
    pub host_key_policy: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub ssh: SshSettings,
}

impl Settings {
    /// 从环境变量加载配置（前缀为 SSHPROXY_）
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("ssh.key_name", sshproxy::keys::DEFAULT_KEY_NAME)?
            .set_default("ssh.port", 22)?
            .set_default("ssh.connect_timeout_secs", 10)?
            .set_default("ssh.command_timeout_secs", 300)?
            .set_default("ssh.max_connect_attempts", 3)?
            .set_default("ssh.initial_backoff_ms", 500)?
            .set_default("ssh.host_key_policy", "accept")?
            .add_source(
                Environment::with_prefix("SSHPROXY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// 验证配置合法性
    fn validate(&self) -> Result<(), ConfigError> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        if self.ssh.host_key_policy.parse::<HostKeyPolicy>().is_err() {
            return Err(ConfigError::Message(format!(
                "Invalid host key policy: {}. Must be one of: strict, accept, off",
                self.ssh.host_key_policy
            )));
        }

        if self.ssh.max_connect_attempts == 0 {
            return Err(ConfigError::Message(
                "ssh.max_connect_attempts must be >= 1".to_string(),
            ));
        }

        if self.ssh.key_name.is_empty() || self.ssh.key_name.contains('/') {
            return Err(ConfigError::Message(format!(
                "Invalid ssh.key_name: {:?}",
                self.ssh.key_name
            )));
        }

        Ok(())
    }

    /// 代理连接的重试策略
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.ssh.max_connect_attempts,
            initial_backoff_ms: self.ssh.initial_backoff_ms,
        }
    }

    /// 主机密钥验证策略（validate 已保证可解析）
    pub fn host_key_policy(&self) -> HostKeyPolicy {
        self.ssh.host_key_policy.parse().unwrap_or_default()
    }

    /// 单元密钥存储
    pub fn key_store(&self) -> sshproxy::Result<KeyStore> {
        let dir = match &self.ssh.key_dir {
            Some(dir) => dir.clone(),
            None => KeyStore::default_dir()?,
        };
        Ok(KeyStore::new(dir, &self.ssh.key_name))
    }
}
