// gateway_client/src/error.rs

//! 网关客户端的错误类型定义模块。
//!
//! `GatewayError` 覆盖一次调用可能遇到的全部失败场景。其中 `NotConnected`、`RateLimited`、
//! `RemoteRejected`、`AbandonedRequest` 在 `GatewayClient::call` 中会被记录为历史与活动块数据，
//! 不会以 panic 或错误的形式离开消息处理路径。

use rust_websocket_utils::error::WsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    /// 调用时没有处于已连接状态的连接 (记录为 `skipped`)。
    #[error("未连接到网关，调用 '{method}' 已跳过")]
    NotConnected { method: String },

    /// 同一方法的最小调用间隔尚未过去 (记录为 `debounced`)。
    #[error("调用 '{method}' 被限流: 距离下次允许还有 {remaining_ms} 毫秒")]
    RateLimited { method: String, remaining_ms: i64 },

    /// 网关返回了 `ok: false` 的响应 (记录为 `error`)。
    #[error("网关拒绝了调用 '{method}' ({code}): {message}")]
    RemoteRejected {
        method: String,
        code: String,
        message: String,
    },

    /// 入站文本无法解析为响应或事件。只在内部使用，调用方永远不会看到。
    #[error("无法解析的入站消息: {0}")]
    MalformedMessage(String),

    /// 连接在响应到达之前被关闭，等待中的完成句柄已被丢弃。
    #[error("连接在请求 '{id}' ({method}) 完成前关闭")]
    AbandonedRequest { id: String, method: String },

    /// 请求 ID 已在等待表中。
    #[error("请求 ID '{0}' 已在等待中")]
    DuplicateRequestId(String),

    #[error("传输层错误: {0}")]
    Transport(#[from] WsError),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("配置错误: {0}")]
    InvalidConfig(String),

    #[error("I/O错误: {0}")]
    Io(#[from] std::io::Error),
}
