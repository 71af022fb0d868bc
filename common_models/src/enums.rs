//! 通用枚举模块。
//!
//! 本模块定义了网关客户端与其展示层之间共享的状态枚举：连接状态、请求历史状态以及活动块的严重级别。
//! 所有枚举都以小写字符串形式序列化，与网关协议及前端展示保持一致。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 网关连接的生命周期状态。
///
/// 状态只沿 `Connecting -> Connected -> Disconnected` 推进，`Disconnected` 可从任一前置状态到达。
/// 重新连接需要一次新的 `open` 调用，不会从 `Disconnected` 直接回到 `Connecting`。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// 传输层正在建立连接。
    Connecting,
    /// 传输层已打开，可以发送请求。
    Connected,
    /// 尚未连接，或连接已关闭。
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        };
        f.write_str(text)
    }
}

/// 一次调用尝试在请求历史中的状态。
///
/// `Sent` 只能转换为 `Ok` 或 `Error`；`Debounced` 与 `Skipped` 在创建时即为终态 (没有发生发送)。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Sent,
    Ok,
    Error,
    Debounced,
    Skipped,
}

impl HistoryStatus {
    /// 是否为终态。
    pub fn is_terminal(&self) -> bool {
        !matches!(self, HistoryStatus::Sent)
    }
}

impl fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            HistoryStatus::Sent => "sent",
            HistoryStatus::Ok => "ok",
            HistoryStatus::Error => "error",
            HistoryStatus::Debounced => "debounced",
            HistoryStatus::Skipped => "skipped",
        };
        f.write_str(text)
    }
}

/// 活动块的严重级别。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        };
        f.write_str(text)
    }
}
