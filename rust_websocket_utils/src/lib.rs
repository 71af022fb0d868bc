//! `rust_websocket_utils` 提供网关客户端所用的 WebSocket 传输层。
//!
//! 主要模块包括：
//! - `message`: 文本帧与 JSON 之间的编解码，以及从任意 WebSocket 流中读取下一条文本帧。
//! - `error`: 传输层统一错误类型 `WsError`。
//! - `client`: 客户端连接的建立、文本帧收发与出站队列泵。
//! - `server`: 轻量服务端监听，用于本地网关模拟与集成测试。

pub mod client;
pub mod error;
pub mod message;
pub mod server;

pub use error::WsError;
