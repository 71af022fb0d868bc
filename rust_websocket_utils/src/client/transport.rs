// rust_websocket_utils/src/client/transport.rs

//! 客户端 WebSocket 传输层核心逻辑。
//!
//! 本模块负责建立到网关的连接，并提供两种发送方式：
//! - 直接通过 `ClientConnection::send_text` 写入 (适合握手前或测试中的一次性写入)；
//! - 通过 `pump_outbound` 启动的写任务，从无界队列中取出文本帧依次写入，调用方只需向队列推送，
//!   从而保证发送永不阻塞调用方。
//!
//! 接收端通过 `receive_text` 逐条读取文本帧。

use crate::error::WsError;
use crate::message::next_text;
use futures_util::{
    SinkExt,
    StreamExt,
    stream::{SplitSink, SplitStream},
};
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio_tungstenite::{WebSocketStream, connect_async, tungstenite::protocol::Message};
use url::Url;

/// 可能经过 TLS 加密的客户端 WebSocket 流。
pub type ClientWsStream = WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// 客户端发送端类型。
pub type ClientSink = SplitSink<ClientWsStream, Message>;

/// 客户端接收端类型。
pub type ClientStream = SplitStream<ClientWsStream>;

/// 一个已建立的客户端 WebSocket 连接，封装了发送端与接收端。
pub struct ClientConnection {
    /// 发送端。
    pub ws_sender: ClientSink,
    /// 接收端。字段公开，便于调用方把两端交给不同的任务。
    pub ws_receiver: ClientStream,
}

impl ClientConnection {
    /// 发送一条文本帧。
    pub async fn send_text(&mut self, text: String) -> Result<(), WsError> {
        debug!("客户端：准备发送文本帧 ({} 字节)", text.len());
        self.ws_sender.send(Message::Text(text)).await?;
        Ok(())
    }

    /// 优雅关闭连接的发送端 (会向对端发送 Close 帧)。
    pub async fn close(&mut self) -> Result<(), WsError> {
        self.ws_sender.close().await?;
        Ok(())
    }
}

/// 连接到指定的 WebSocket 服务器。
///
/// 先校验 URL (必须能被解析且协议为 `ws` 或 `wss`)，再通过 `connect_async` 完成握手，
/// 成功后把流拆分为发送端与接收端。
pub async fn connect_client(url_str: &str) -> Result<ClientConnection, WsError> {
    info!("客户端：开始尝试连接到 WebSocket 服务器，URL: {}", url_str);
    let parsed_url = Url::parse(url_str)
        .map_err(|e| WsError::InvalidUrl(format!("无效的 WebSocket URL '{}': {}", url_str, e)))?;
    if parsed_url.scheme() != "ws" && parsed_url.scheme() != "wss" {
        return Err(WsError::InvalidUrl(format!(
            "不支持的 URL 协议 '{}' (仅支持 ws/wss): {}",
            parsed_url.scheme(),
            url_str
        )));
    }

    match connect_async(parsed_url.as_str()).await {
        Ok((ws_stream, response)) => {
            info!("客户端：已成功连接到 {} (HTTP 状态码: {})", url_str, response.status());
            let (ws_sender, ws_receiver) = ws_stream.split();
            Ok(ClientConnection { ws_sender, ws_receiver })
        }
        Err(e) => {
            error!("客户端：连接到 {} 失败，错误: {}", url_str, e);
            Err(WsError::WebSocketProtocolError(e))
        }
    }
}

/// 从客户端接收端读取下一条文本帧。语义见 [`crate::message::next_text`]。
pub async fn receive_text(ws_receiver: &mut ClientStream) -> Option<Result<String, WsError>> {
    next_text(ws_receiver).await
}

/// 出站队列泵：把队列中的文本帧依次写入发送端。
///
/// 队列的所有发送者都被丢弃后 (或写入失败时)，关闭发送端并返回。
/// 返回值为成功写入的帧数量。
pub async fn pump_outbound(mut ws_sender: ClientSink, mut outbound_rx: mpsc::UnboundedReceiver<String>) -> usize {
    let mut written = 0usize;
    while let Some(text) = outbound_rx.recv().await {
        if let Err(e) = ws_sender.send(Message::Text(text)).await {
            warn!("客户端(写任务)：写入文本帧失败，写任务结束: {}", e);
            break;
        }
        written += 1;
    }
    if let Err(e) = ws_sender.close().await {
        debug!("客户端(写任务)：关闭发送端时发生错误 (通常是连接已断开): {}", e);
    }
    debug!("客户端(写任务)：已结束，共写入 {} 条文本帧。", written);
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::transport::{ServerTransport, WsStream};
    use std::net::SocketAddr;
    use tokio::time::{Duration, timeout};

    #[tokio::test]
    /// 测试无效 URL 与不支持的协议被拒绝且不会发起连接。
    async fn test_connect_rejects_invalid_urls() {
        assert!(matches!(connect_client("not a url").await, Err(WsError::InvalidUrl(_))));
        assert!(matches!(connect_client("http://127.0.0.1:1/").await, Err(WsError::InvalidUrl(_))));
    }

    #[tokio::test]
    /// 集成测试：客户端连接本地回显服务器，经由出站队列发送并收到回显。
    async fn test_client_pump_and_receive_echo() {
        let _ = env_logger::builder().is_test(true).try_init();

        let server = ServerTransport::bind("127.0.0.1:0").await.expect("绑定测试服务器失败");
        let addr = server.local_addr().expect("获取本地地址失败");
        let server_handle = tokio::spawn(server.run(|mut ws: WsStream, _peer: SocketAddr| async move {
            while let Some(Ok(text)) = crate::message::next_text(&mut ws).await {
                if ws.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }));

        let conn = connect_client(&format!("ws://{}", addr)).await.expect("连接回显服务器失败");
        let ClientConnection { ws_sender, mut ws_receiver } = conn;
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let writer = tokio::spawn(pump_outbound(ws_sender, rx));

        tx.send("{\"hello\":1}".to_string()).expect("推送出站帧失败");
        match timeout(Duration::from_secs(5), receive_text(&mut ws_receiver)).await {
            Ok(Some(Ok(text))) => assert_eq!(text, "{\"hello\":1}"),
            other => panic!("未收到预期的回显: {:?}", other),
        }

        drop(tx);
        let written = timeout(Duration::from_secs(5), writer)
            .await
            .expect("写任务未按时结束")
            .expect("写任务异常退出");
        assert_eq!(written, 1);

        server_handle.abort();
    }
}
