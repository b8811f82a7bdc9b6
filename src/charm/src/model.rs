//! 框架模型桥接
//!
//! 通过框架提供的 hook 工具读取单元配置、上报单元状态、
//! 读写动作参数与结果。事件/动作协议本身归框架所有，
//! charm 不自行实现，只以子进程方式调用这些工具。

use crate::error::{CharmError, Result};
use async_trait::async_trait;
use secrecy::Secret;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// 单元状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// 正常服务
    Active,
    /// 等待前置条件（如 SSH 凭据）
    Waiting(String),
    /// 被阻塞，需要操作员干预
    Blocked(String),
    /// 维护中
    Maintenance(String),
}

impl Status {
    /// 框架侧的状态名
    pub fn name(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Waiting(_) => "waiting",
            Status::Blocked(_) => "blocked",
            Status::Maintenance(_) => "maintenance",
        }
    }

    /// 状态消息（Active 无消息）
    pub fn message(&self) -> &str {
        match self {
            Status::Active => "",
            Status::Waiting(msg) | Status::Blocked(msg) | Status::Maintenance(msg) => msg,
        }
    }
}

/// 单元配置（来自框架配置存储）
#[derive(Debug, Clone)]
pub struct UnitConfig {
    /// 被管理主机地址
    pub ssh_hostname: String,
    /// SSH 用户名
    pub ssh_username: String,
    /// SSH 密码（使用 Secret 包装，防止日志泄露）
    pub ssh_password: Secret<String>,
}

impl UnitConfig {
    /// 通过 config-get 读取单元配置
    pub async fn load<H: Hooks + ?Sized>(hooks: &H) -> Result<Self> {
        Ok(Self {
            ssh_hostname: hooks.config_get("ssh-hostname").await?.unwrap_or_default(),
            ssh_username: hooks.config_get("ssh-username").await?.unwrap_or_default(),
            ssh_password: Secret::new(
                hooks.config_get("ssh-password").await?.unwrap_or_default(),
            ),
        })
    }

    /// 是否已配置被管理主机
    pub fn has_hostname(&self) -> bool {
        !self.ssh_hostname.is_empty()
    }
}

/// 框架 hook 工具的抽象（便于测试替换）
#[async_trait]
pub trait Hooks: Send + Sync {
    /// 读取单元配置项
    async fn config_get(&self, key: &str) -> Result<Option<String>>;

    /// 上报单元状态
    async fn status_set(&self, status: &Status) -> Result<()>;

    /// 读取动作参数
    async fn action_get(&self, key: &str) -> Result<Option<String>>;

    /// 写入动作结果
    async fn action_set(&self, results: &[(&str, String)]) -> Result<()>;

    /// 标记动作失败
    async fn action_fail(&self, message: &str) -> Result<()>;

    /// 写入框架日志
    async fn juju_log(&self, message: &str) -> Result<()>;
}

/// 调用框架 hook 工具的生产实现
pub struct JujuHooks;

impl JujuHooks {
    async fn run_tool(&self, tool: &str, args: &[String]) -> Result<String> {
        debug!(tool = tool, "Invoking hook tool");
        let output = Command::new(tool)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| CharmError::HookTool(format!("{}: {}", tool, e)))?;

        if !output.status.success() {
            return Err(CharmError::HookTool(format!(
                "{} exited with {}: {}",
                tool,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// 解析 hook 工具 --format=json 的标量输出
    fn parse_json_scalar(raw: &str) -> Result<Option<String>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        let value: serde_json::Value = serde_json::from_str(raw)?;
        Ok(match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }
}

#[async_trait]
impl Hooks for JujuHooks {
    async fn config_get(&self, key: &str) -> Result<Option<String>> {
        let raw = self
            .run_tool("config-get", &[key.to_string(), "--format=json".to_string()])
            .await?;
        Self::parse_json_scalar(&raw)
    }

    async fn status_set(&self, status: &Status) -> Result<()> {
        let mut args = vec![status.name().to_string()];
        if !status.message().is_empty() {
            args.push(status.message().to_string());
        }
        self.run_tool("status-set", &args).await.map(|_| ())
    }

    async fn action_get(&self, key: &str) -> Result<Option<String>> {
        let raw = self
            .run_tool("action-get", &[key.to_string(), "--format=json".to_string()])
            .await?;
        Self::parse_json_scalar(&raw)
    }

    async fn action_set(&self, results: &[(&str, String)]) -> Result<()> {
        let args: Vec<String> = results
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        self.run_tool("action-set", &args).await.map(|_| ())
    }

    async fn action_fail(&self, message: &str) -> Result<()> {
        self.run_tool("action-fail", &[message.to_string()])
            .await
            .map(|_| ())
    }

    async fn juju_log(&self, message: &str) -> Result<()> {
        self.run_tool("juju-log", &[message.to_string()])
            .await
            .map(|_| ())
    }
}
