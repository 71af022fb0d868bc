// rust_websocket_utils/src/client/mod.rs

//! WebSocket 客户端模块。
//!
//! 负责连接到远程网关、收发文本帧，并提供出站队列泵，使上层可以在不持有发送端的情况下排队发送。

pub mod transport;
