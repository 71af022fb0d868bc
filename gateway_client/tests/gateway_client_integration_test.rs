// gateway_client/tests/gateway_client_integration_test.rs

use common_models::enums::{ConnectionStatus, HistoryStatus, Severity};
use common_models::ws_payloads::{
    ClientFrame, EventFrame, ResponseFrame, ServerFrame, CONNECT_METHOD, FEED_LIFECYCLE_EVENT,
};
use futures_util::SinkExt;
use gateway_client::ws_client::ConnectionSnapshot;
use gateway_client::{ClientConfig, GatewayClient};
use log::{info, LevelFilter};
use rust_websocket_utils::message::{decode_json, encode_json, next_text};
use rust_websocket_utils::server::transport::{ServerTransport, WsStream};
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message as TungsteniteMessage;

// 辅助函数：初始化日志，仅用于测试，避免多次初始化
fn init_test_logger() {
    let _ = env_logger::builder().filter_level(LevelFilter::Debug).is_test(true).try_init();
}

async fn send_frame(ws_stream: &mut WsStream, frame: &ServerFrame) -> bool {
    let text = encode_json(frame).expect("编码服务端帧失败");
    ws_stream.send(TungsteniteMessage::Text(text)).await.is_ok()
}

// 模拟网关：
// - gateway.connect: 返回协议版本 1 与会话 s1
// - feeds.subscribe: 先推送订阅生命周期事件，再返回订阅结果
// - accounts.connect: 返回错误 E1 "bad"
// - gateway.hangup: 不回复，直接关闭连接
// - 其他方法: 回显方法名
async fn mock_gateway(mut ws_stream: WsStream, peer_addr: SocketAddr) {
    info!("[Mock Gateway] 新连接: {}", peer_addr);
    while let Some(Ok(text)) = next_text(&mut ws_stream).await {
        let ClientFrame::Request(req) = match decode_json::<ClientFrame>(&text) {
            Ok(frame) => frame,
            Err(_) => continue,
        };
        let response = match req.method.as_str() {
            CONNECT_METHOD => ResponseFrame::success(
                req.id,
                json!({"protocol": {"selected": 1}, "session": {"sessionId": "s1"}}),
            ),
            "feeds.subscribe" => {
                let event = ServerFrame::Event(EventFrame {
                    event: FEED_LIFECYCLE_EVENT.to_string(),
                    payload: Some(json!({"action": "subscribed", "subscriptionId": "sub1"})),
                });
                if !send_frame(&mut ws_stream, &event).await {
                    return;
                }
                ResponseFrame::success(
                    req.id,
                    json!({"subscriptionCount": 2, "subscription": {"subscriptionId": "sub1"}}),
                )
            }
            "accounts.connect" => ResponseFrame::failure(req.id, "E1", "bad"),
            "gateway.hangup" => {
                let _ = ws_stream.close(None).await;
                return;
            }
            other => ResponseFrame::success(req.id, json!({"echo": other})),
        };
        if !send_frame(&mut ws_stream, &ServerFrame::Response(response)).await {
            return;
        }
    }
    info!("[Mock Gateway] {} 的连接处理结束", peer_addr);
}

async fn start_mock_gateway() -> (String, JoinHandle<()>) {
    let server = ServerTransport::bind("127.0.0.1:0").await.expect("无法绑定到随机端口");
    let addr = server.local_addr().expect("无法获取本地监听地址");
    let handle = tokio::spawn(async move {
        let _ = server.run(mock_gateway).await;
    });
    (format!("ws://{}", addr), handle)
}

fn test_client(min_gap_ms: i64) -> GatewayClient {
    GatewayClient::new(ClientConfig {
        min_gap_ms,
        ..ClientConfig::default()
    })
}

async fn wait_for_connection<F>(client: &GatewayClient, predicate: F) -> ConnectionSnapshot
where
    F: FnMut(&ConnectionSnapshot) -> bool,
{
    let mut rx = client.watch_connection();
    let snapshot = timeout(Duration::from_secs(5), rx.wait_for(predicate))
        .await
        .expect("等待连接状态超时")
        .expect("连接状态通道已关闭")
        .clone();
    snapshot
}

async fn wait_until_ready(client: &GatewayClient) -> ConnectionSnapshot {
    wait_for_connection(client, |s| s.status == ConnectionStatus::Connected && s.session_id.is_some()).await
}

async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("条件在超时前未满足");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_handshake_calls_and_events_over_real_connection() {
    init_test_logger();
    let (url, server_handle) = start_mock_gateway().await;
    let client = test_client(0);

    client.open(&url).await;
    let snapshot = wait_until_ready(&client).await;
    assert_eq!(snapshot.negotiated_protocol_version, Some(1));
    assert_eq!(snapshot.session_id.as_deref(), Some("s1"));
    assert_eq!(snapshot.url.as_deref(), Some(url.as_str()));

    let payload = client
        .call("feeds.subscribe", json!({"feed": "btc"}))
        .await
        .expect("feeds.subscribe 应成功");
    assert_eq!(
        payload,
        json!({"subscriptionCount": 2, "subscription": {"subscriptionId": "sub1"}})
    );
    let lifecycle = client.feed_lifecycle().await;
    assert_eq!(lifecycle.len(), 1);
    assert_eq!(lifecycle[0].action, "subscribed");
    assert_eq!(lifecycle[0].subscription_id.as_deref(), Some("sub1"));

    assert!(client.call("accounts.connect", json!({"account": "a"})).await.is_none());
    let block = client.activity().await.remove(0);
    assert_eq!(block.severity, Severity::Error);
    assert!(block.content.contains("bad"));

    let history = client.history().await;
    let statuses: Vec<(String, HistoryStatus)> = history.iter().map(|e| (e.method.clone(), e.status)).collect();
    assert_eq!(
        statuses,
        vec![
            ("accounts.connect".to_string(), HistoryStatus::Error),
            ("feeds.subscribe".to_string(), HistoryStatus::Ok),
            (CONNECT_METHOD.to_string(), HistoryStatus::Ok),
        ]
    );
    assert_eq!(history[2].id, "1", "握手应占用第一个请求 ID");

    client.close().await;
    assert_eq!(client.connection().status, ConnectionStatus::Disconnected);
    assert!(client.connection().session_id.is_none());
    server_handle.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_close_with_pending_request() {
    init_test_logger();
    let (url, server_handle) = start_mock_gateway().await;
    let client = test_client(0);
    client.open(&url).await;
    wait_until_ready(&client).await;

    let result = timeout(Duration::from_secs(5), client.call("gateway.hangup", json!({})))
        .await
        .expect("连接关闭后调用应被唤醒");
    assert!(result.is_none());

    let snapshot = wait_for_connection(&client, |s| s.status == ConnectionStatus::Disconnected).await;
    assert!(snapshot.session_id.is_none());
    assert!(client.pending_requests().await.is_empty());

    assert!(client.call("feeds.list", json!({})).await.is_none());
    assert_eq!(client.history().await[0].status, HistoryStatus::Skipped);
    assert!(client.activity().await.iter().any(|b| b.title == "connection closed"));
    server_handle.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_debounce_over_real_connection() {
    init_test_logger();
    let (url, server_handle) = start_mock_gateway().await;
    let client = test_client(60_000);
    client.open(&url).await;
    wait_until_ready(&client).await;

    assert_eq!(client.call("feeds.list", json!({})).await, Some(json!({"echo": "feeds.list"})));
    assert!(client.call("feeds.list", json!({})).await.is_none());
    let history = client.history().await;
    assert_eq!(history[0].status, HistoryStatus::Debounced);
    assert_eq!(history[0].duration_ms, Some(0));
    assert_eq!(history[1].status, HistoryStatus::Ok);

    client.close().await;
    server_handle.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_connect_records_error_block() {
    init_test_logger();
    // 先绑定再释放，得到一个当前无人监听的端口
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = test_client(0);
    client.open(&format!("ws://{}", addr)).await;
    wait_for_connection(&client, |s| s.status == ConnectionStatus::Disconnected).await;
    eventually(|| {
        let client = client.clone();
        async move {
            let activity = client.activity().await;
            activity
                .first()
                .is_some_and(|b| b.title == "connection failed" && b.severity == Severity::Error)
        }
    })
    .await;
    client.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
/// 测试 close 之后可以重新 open，新一代连接重新握手。
async fn test_reopen_after_close() {
    init_test_logger();
    let (url, server_handle) = start_mock_gateway().await;
    let client = test_client(0);

    client.open(&url).await;
    let first = wait_until_ready(&client).await;
    client.close().await;
    assert_eq!(client.connection().status, ConnectionStatus::Disconnected);

    client.open(&url).await;
    let second = wait_until_ready(&client).await;
    assert!(second.generation > first.generation);
    assert_eq!(
        client.call("feeds.status", json!({})).await,
        Some(json!({"echo": "feeds.status"}))
    );

    let handshakes = client
        .history()
        .await
        .iter()
        .filter(|e| e.method == CONNECT_METHOD && e.status == HistoryStatus::Ok)
        .count();
    assert_eq!(handshakes, 2);

    client.close().await;
    server_handle.abort();
}
