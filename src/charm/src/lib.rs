//! SSH 代理 charm 库
//!
//! 面向编排平台的 VNF 生命周期管理单元：
//! 响应生命周期事件（install / config-changed / upgrade-charm），
//! 并将远端命令动作经 SSH 代理转发到被管理主机。

pub mod charm;
pub mod config;
pub mod error;
pub mod event;
pub mod model;
pub mod telemetry;

pub use charm::Charm;
pub use error::{CharmError, Result};
pub use event::{Action, Event};
pub use model::{Hooks, JujuHooks, Status, UnitConfig};
