// rust_websocket_utils/tests/server_transport_integration_test.rs

use common_models::ws_payloads::{ClientFrame, EventFrame, RequestFrame, ResponseFrame, ServerFrame};
use futures_util::SinkExt;
use log::{LevelFilter, info};
use rust_websocket_utils::client::transport::{connect_client, receive_text};
use rust_websocket_utils::message::{decode_json, encode_json, next_text};
use rust_websocket_utils::server::transport::{ServerTransport, WsStream};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message as TungsteniteMessage;

// 辅助函数：初始化日志，仅用于测试，避免多次初始化
fn init_test_logger() {
    let _ = env_logger::builder().filter_level(LevelFilter::Info).is_test(true).try_init();
}

// 测试用网关：对每个请求先推送一个事件，再回复一个回显 method 的响应
async fn echo_gateway(mut ws_stream: WsStream, peer_addr: SocketAddr, seen_tx: mpsc::UnboundedSender<String>) {
    info!("[Test Server] 新的 WebSocket 连接来自 {}", peer_addr);
    while let Some(Ok(text)) = next_text(&mut ws_stream).await {
        let ClientFrame::Request(req) = match decode_json::<ClientFrame>(&text) {
            Ok(frame) => frame,
            Err(_) => continue,
        };
        let _ = seen_tx.send(req.method.clone());

        let event = ServerFrame::Event(EventFrame {
            event: "test.ack".to_string(),
            payload: Some(json!({"method": req.method})),
        });
        let response = ServerFrame::Response(ResponseFrame::success(req.id, json!({"echo": req.method})));
        for frame in [event, response] {
            let text = encode_json(&frame).expect("编码服务端帧失败");
            if ws_stream.send(TungsteniteMessage::Text(text)).await.is_err() {
                return;
            }
        }
    }
    info!("[Test Server] {} 的连接处理结束", peer_addr);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_accepts_connection_and_exchanges_frames() {
    init_test_logger();

    let server = ServerTransport::bind("127.0.0.1:0").await.expect("无法绑定到随机端口");
    let addr = server.local_addr().expect("无法获取本地监听地址");
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<String>();

    let server_handle = tokio::spawn(server.run(move |ws_stream: WsStream, peer_addr: SocketAddr| {
        echo_gateway(ws_stream, peer_addr, seen_tx.clone())
    }));

    let mut conn = connect_client(&format!("ws://{}", addr)).await.expect("客户端连接失败");
    let request = ClientFrame::Request(RequestFrame {
        id: "1".to_string(),
        method: "feeds.list".to_string(),
        params: json!({}),
    });
    conn.send_text(encode_json(&request).unwrap()).await.expect("客户端发送失败");

    let seen = tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
        .await
        .expect("等待服务端收到请求超时");
    assert_eq!(seen.as_deref(), Some("feeds.list"));

    // 事件先于响应到达
    let first = tokio::time::timeout(Duration::from_secs(5), receive_text(&mut conn.ws_receiver))
        .await
        .expect("等待事件超时")
        .expect("连接提前关闭")
        .expect("接收事件失败");
    assert!(matches!(decode_json::<ServerFrame>(&first), Ok(ServerFrame::Event(_))));

    let second = tokio::time::timeout(Duration::from_secs(5), receive_text(&mut conn.ws_receiver))
        .await
        .expect("等待响应超时")
        .expect("连接提前关闭")
        .expect("接收响应失败");
    match decode_json::<ServerFrame>(&second) {
        Ok(ServerFrame::Response(res)) => {
            assert_eq!(res.id, "1");
            assert!(res.ok);
            assert_eq!(res.payload, Some(json!({"echo": "feeds.list"})));
        }
        other => panic!("预期响应帧，实际为 {:?}", other),
    }

    conn.close().await.expect("关闭客户端连接失败");
    server_handle.abort();
    let _ = server_handle.await;
}
