//! SSH 代理连接配置
//!
//! 统一的代理配置定义，由 charm 根据单元配置与本地设置构造

use secrecy::Secret;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// 主机密钥验证策略
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyPolicy {
    /// 严格模式：只接受已知的主机密钥
    Strict,
    /// 接受模式：首次连接时接受新密钥，之后验证
    #[default]
    AcceptNew,
    /// 禁用验证（不安全，仅用于开发/测试）
    Off,
}

impl std::str::FromStr for HostKeyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "accept" | "accept_new" | "accept-new" => Ok(Self::AcceptNew),
            "off" | "disabled" | "none" | "false" => Ok(Self::Off),
            _ => Err(format!("Unknown host key policy: {}", s)),
        }
    }
}

/// 连接重试策略（指数退避）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// 最大尝试次数（含首次）
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// 首次失败后的退避（毫秒），之后每次翻倍
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

impl RetryPolicy {
    /// 第 attempt 次失败后的退避时长（attempt 从 1 开始计）
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        // 指数上限防止移位溢出
        let exp = attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(1u64 << exp))
    }
}

/// SSH 代理配置
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// 主机地址
    pub host: String,

    /// 端口
    pub port: u16,

    /// 用户名
    pub username: String,

    /// 密码认证（可选，使用 Secret 包装，防止日志泄露）
    pub password: Option<Secret<String>>,

    /// 单元私钥路径（可选；存在时优先于密码）
    pub key_path: Option<PathBuf>,

    /// 连接超时（秒）
    pub connect_timeout_secs: u64,

    /// 命令执行默认超时（秒）
    pub command_timeout_secs: u64,

    /// 连接重试策略
    pub retry: RetryPolicy,

    /// 主机密钥验证策略
    pub host_key_policy: HostKeyPolicy,

    /// 已知主机密钥指纹（"host:port" -> SHA-256 hex）
    pub known_hosts: Option<HashMap<String, String>>,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_command_timeout() -> u64 {
    300
}

impl ProxyConfig {
    /// 创建新的代理配置
    pub fn new(host: String, username: String) -> Self {
        Self {
            host,
            port: default_ssh_port(),
            username,
            password: None,
            key_path: None,
            connect_timeout_secs: default_connect_timeout(),
            command_timeout_secs: default_command_timeout(),
            retry: RetryPolicy::default(),
            host_key_policy: HostKeyPolicy::default(),
            known_hosts: None,
        }
    }

    /// 设置密码认证
    pub fn with_password(mut self, password: Secret<String>) -> Self {
        self.password = Some(password);
        self
    }

    /// 设置单元私钥路径
    pub fn with_key_path(mut self, path: PathBuf) -> Self {
        self.key_path = Some(path);
        self
    }

    /// 设置端口
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// 设置连接超时
    pub fn with_connect_timeout(mut self, timeout_secs: u64) -> Self {
        self.connect_timeout_secs = timeout_secs;
        self
    }

    /// 设置命令超时
    pub fn with_command_timeout(mut self, timeout_secs: u64) -> Self {
        self.command_timeout_secs = timeout_secs;
        self
    }

    /// 设置重试策略
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// 设置主机密钥验证策略
    pub fn with_host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    /// 设置已知主机密钥指纹
    pub fn with_known_hosts(mut self, known_hosts: HashMap<String, String>) -> Self {
        self.known_hosts = Some(known_hosts);
        self
    }

    /// 获取目标地址字符串
    pub fn target(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }
}
