//! 代理错误模型
//!
//! 此模块提供的错误类型可被 sshproxy 和 charm 共享使用

/// SSH 代理错误类型
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("SSH connection error: {0}")]
    Connect(String),

    #[error("SSH connection timed out: {0}")]
    ConnectTimeout(String),

    #[error("SSH authentication failed: {0}")]
    Auth(String),

    #[error("SSH execution error: {0}")]
    Exec(String),

    #[error("SSH key error: {0}")]
    Key(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProxyError {
    /// 获取用户友好的错误消息（不包含敏感信息）
    pub fn user_message(&self) -> String {
        match self {
            ProxyError::Connect(_) | ProxyError::ConnectTimeout(_) => {
                "SSH connection failed".to_string()
            }
            ProxyError::Auth(_) => "SSH authentication failed".to_string(),
            ProxyError::Exec(_) => "SSH command execution failed".to_string(),
            ProxyError::Key(_) => "SSH key error".to_string(),
            ProxyError::Io(_) => "IO error".to_string(),
        }
    }

    /// 是否为认证失败（verify-credentials 据此区分「凭据无效」与「不可达」）
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ProxyError::Auth(_))
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ProxyError>;
