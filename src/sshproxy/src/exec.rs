//! 命令执行结果模型
//!
//! 定义远端命令执行的通用结果类型，以及远端命令行的参数引用工具

use serde::{Deserialize, Serialize};

/// 超时命令的退出码（与 coreutils timeout 一致）
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// 命令执行结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutput {
    /// 退出码
    pub exit_code: i32,

    /// 标准输出
    pub stdout: String,

    /// 标准错误
    pub stderr: String,

    /// 执行时长（秒）
    pub duration_secs: f64,

    /// 是否超时
    pub timed_out: bool,
}

impl CommandOutput {
    /// 创建成功结果
    pub fn success(stdout: String, duration_secs: f64) -> Self {
        Self {
            exit_code: 0,
            stdout,
            stderr: String::new(),
            duration_secs,
            timed_out: false,
        }
    }

    /// 创建失败结果
    pub fn failure(exit_code: i32, stdout: String, stderr: String, duration_secs: f64) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            duration_secs,
            timed_out: false,
        }
    }

    /// 创建超时结果
    pub fn timeout(duration_secs: f64) -> Self {
        Self {
            exit_code: TIMEOUT_EXIT_CODE,
            stdout: String::new(),
            stderr: "Execution timed out".to_string(),
            duration_secs,
            timed_out: true,
        }
    }

    /// 判断是否成功
    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// 获取完整输出（stdout + stderr）
    pub fn full_output(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
            .trim()
            .to_string()
    }

    /// 获取输出摘要（限制长度，截断点落在字符边界上）
    pub fn output_summary(&self, max_len: usize) -> String {
        let full = self.full_output();
        if full.len() <= max_len {
            return full;
        }
        let mut cut = max_len;
        while !full.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &full[..cut])
    }
}

/// POSIX 单引号转义，用于把动作参数安全地拼入远端命令行
pub fn shell_quote(arg: &str) -> String {
    if !arg.is_empty() && arg.chars().all(|c| c.is_ascii_alphanumeric() || "_-./".contains(c)) {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}
