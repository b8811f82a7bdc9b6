//! 事件与动作的解析
//!
//! 事件的注册与派发归编排框架所有，charm 只解析框架传入的派发路径。
//! 观察的事件列表是固定的：三个生命周期 hook 加上十个动作原语。

use std::fmt;
use std::str::FromStr;

/// charm 暴露的动作（原语）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// 在远端创建文件
    Touch,
    /// 启动 VNF 服务（留给具体 VNF 实现）
    Start,
    /// 停止 VNF 服务（留给具体 VNF 实现）
    Stop,
    /// 重启 VNF 服务（留给具体 VNF 实现）
    Restart,
    /// 重启远端虚拟机
    Reboot,
    /// 升级 VNF 服务（留给具体 VNF 实现）
    Upgrade,
    /// 为本单元生成新的 SSH 密钥对
    GenerateSshKey,
    /// 获取本单元的 SSH 公钥
    GetSshPublicKey,
    /// 在远端执行任意命令
    Run,
    /// 验证 SSH 凭据
    VerifySshCredentials,
}

impl Action {
    pub const ALL: [Action; 10] = [
        Action::Touch,
        Action::Start,
        Action::Stop,
        Action::Restart,
        Action::Reboot,
        Action::Upgrade,
        Action::GenerateSshKey,
        Action::GetSshPublicKey,
        Action::Run,
        Action::VerifySshCredentials,
    ];

    /// 框架侧的动作名
    pub fn name(&self) -> &'static str {
        match self {
            Action::Touch => "touch",
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Restart => "restart",
            Action::Reboot => "reboot",
            Action::Upgrade => "upgrade",
            Action::GenerateSshKey => "generate-ssh-key",
            Action::GetSshPublicKey => "get-ssh-public-key",
            Action::Run => "run",
            Action::VerifySshCredentials => "verify-ssh-credentials",
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .iter()
            .find(|action| action.name() == s)
            .copied()
            .ok_or_else(|| format!("Unknown action: {}", s))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// charm 观察的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// charm 安装
    Install,
    /// 配置变更
    ConfigChanged,
    /// charm 升级
    UpgradeCharm,
    /// 动作调用
    Action(Action),
}

impl Event {
    /// 框架侧的事件名
    pub fn name(&self) -> &'static str {
        match self {
            Event::Install => "install",
            Event::ConfigChanged => "config-changed",
            Event::UpgradeCharm => "upgrade-charm",
            Event::Action(action) => action.name(),
        }
    }

    /// 从派发路径解析（"hooks/<name>" 或 "actions/<name>"）
    pub fn from_dispatch_path(path: &str) -> Option<Event> {
        let path = path.trim().trim_matches('/');
        if let Some(hook) = path.strip_prefix("hooks/") {
            Event::from_hook_name(hook)
        } else if let Some(action) = path.strip_prefix("actions/") {
            action.parse().ok().map(Event::Action)
        } else {
            None
        }
    }

    /// 从裸事件名解析（hook 名或动作名）
    pub fn from_hook_name(name: &str) -> Option<Event> {
        match name {
            "install" => Some(Event::Install),
            "config-changed" => Some(Event::ConfigChanged),
            "upgrade-charm" => Some(Event::UpgradeCharm),
            other => other.parse().ok().map(Event::Action),
        }
    }

    /// 从框架环境变量解析当前派发的事件
    pub fn from_env() -> Option<Event> {
        if let Ok(path) = std::env::var("JUJU_DISPATCH_PATH") {
            if let Some(event) = Event::from_dispatch_path(&path) {
                return Some(event);
            }
        }
        if let Ok(action) = std::env::var("JUJU_ACTION_NAME") {
            if let Ok(action) = action.parse() {
                return Some(Event::Action(action));
            }
        }
        if let Ok(hook) = std::env::var("JUJU_HOOK_NAME") {
            return Event::from_hook_name(&hook);
        }
        None
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
