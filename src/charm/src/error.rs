//! charm 错误模型

use sshproxy::ProxyError;

/// charm 错误类型
#[derive(Debug, thiserror::Error)]
pub enum CharmError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Hook tool error: {0}")]
    HookTool(String),

    #[error("Missing action parameter: {0}")]
    MissingParam(String),

    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, CharmError>;
