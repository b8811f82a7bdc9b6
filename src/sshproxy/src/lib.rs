//! SSH 代理库
//!
//! 为生命周期管理 charm 提供对远端主机的 SSH 能力：
//! 连接管理（带重试退避）、命令执行、凭据验证与单元密钥对管理。

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub mod config;
pub mod error;
pub mod exec;
pub mod keys;
pub mod proxy;

pub use config::{HostKeyPolicy, ProxyConfig, RetryPolicy};
pub use error::{ProxyError, Result};
pub use exec::{shell_quote, CommandOutput};
pub use keys::KeyStore;
pub use proxy::SshProxy;
