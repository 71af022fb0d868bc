// rust_websocket_utils/src/message.rs

//! 文本帧的编解码与读取。
//!
//! 网关协议的每一条消息都是一个 JSON 文本帧。本模块负责：
//! - 把任意实现了 `Serialize` 的帧结构编码为文本 (`encode_json`)；
//! - 把收到的文本解码为目标类型 (`decode_json`)；
//! - 从 WebSocket 流中读取下一条文本帧，跳过 Ping/Pong 等控制帧 (`next_text`)。
//!
//! 客户端和服务端的流类型不同 (前者可能经过 TLS)，`next_text` 对二者通用。

use crate::error::WsError;
use futures_util::{Stream, StreamExt};
use log::{debug, error};
use serde::{Serialize, de::DeserializeOwned};
use tokio_tungstenite::tungstenite::{Error as TungsteniteError, protocol::Message};

/// 将帧结构编码为 JSON 文本。
pub fn encode_json<T: Serialize>(frame: &T) -> Result<String, WsError> {
    serde_json::to_string(frame)
        .map_err(|e| WsError::SerializationError(format!("帧序列化为JSON失败: {}", e)))
}

/// 将 JSON 文本解码为目标类型。
///
/// 错误信息中附带原始文本的前 120 个字符，便于排查格式问题。
pub fn decode_json<T: DeserializeOwned>(text: &str) -> Result<T, WsError> {
    serde_json::from_str(text).map_err(|e| {
        WsError::DeserializationError(format!(
            "文本帧反序列化失败: {}, 原始文本: '{}'",
            e,
            preview(text, 120)
        ))
    })
}

/// 从 WebSocket 流中读取下一条文本帧。
///
/// # Returns
/// * `Some(Ok(text))`: 收到一条文本帧。
/// * `Some(Err(e))`: 收到二进制帧或发生了非关闭类的底层错误。
/// * `None`: 连接已关闭 (收到 Close 帧、流结束或底层报告连接已关闭)。
pub async fn next_text<S>(stream: &mut S) -> Option<Result<String, WsError>>
where
    S: Stream<Item = Result<Message, TungsteniteError>> + Unpin,
{
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                debug!("收到文本帧: '{}'", preview(&text, 200));
                break Some(Ok(text));
            }
            Some(Ok(Message::Binary(bin))) => {
                debug!("收到二进制帧，长度: {} 字节", bin.len());
                break Some(Err(WsError::Message(
                    "收到了非预期的 WebSocket 二进制消息".to_string(),
                )));
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {
                // 控制帧由 tokio-tungstenite 自动应答
                continue;
            }
            Some(Ok(Message::Close(close_frame))) => {
                debug!("收到 Close 控制帧: {:?}", close_frame);
                break None;
            }
            Some(Err(TungsteniteError::ConnectionClosed)) | Some(Err(TungsteniteError::AlreadyClosed)) => {
                debug!("连接已关闭 (ConnectionClosed/AlreadyClosed)。");
                break None;
            }
            Some(Err(e)) => {
                error!("从 WebSocket 流接收消息时发生底层错误: {}", e);
                break Some(Err(WsError::WebSocketProtocolError(e)));
            }
            None => {
                debug!("WebSocket 接收流已结束。");
                break None;
            }
        }
    }
}

/// 截断字符串用于日志摘要。按字符截断，避免切在 UTF-8 边界中间。
pub fn preview(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let head: String = s.chars().take(max_chars).collect();
        format!("{}... (truncated)", head)
    } else {
        s.to_string()
    }
}
