// gateway_client/src/ws_client/service.rs

//! 网关客户端服务。
//!
//! `GatewayClient` 把网关 WebSocket 上"发出即忘"的文本帧变成可等待的请求/响应调用：
//! 每个请求带一个客户端生成的 ID，响应按 ID 回到等待它的调用方；
//! 网关主动推送的事件被记录为活动块并转发给观察者。
//!
//! 连接的整个生命周期 (建立、握手、接收循环、关闭) 在一个后台连接任务中运行，
//! 出站帧经由无界队列交给独立的写任务，调用方的发送永远不会阻塞。
//! 一次调用的所有结果 (跳过、限流、成功、失败) 都会以数据的形式写入历史与活动块，
//! 而不是以 panic 的形式离开消息处理路径。

use crate::config::ClientConfig;
use crate::error::GatewayError;
use crate::event::{ObservedEvent, EVENT_CHANNEL_CAPACITY};
use crate::ws_client::auto_refresh::{self, RefreshCall};
use crate::ws_client::connection::{parse_inbound, ConnectionManager, ConnectionSnapshot};
use crate::ws_client::correlator::RequestCorrelator;
use crate::ws_client::dispatcher::EventDispatcher;
use crate::ws_client::history::{ActivityBlock, FeedLifecycleRecord, HistoryEntry, HistoryRecorder, MethodHealth};
use crate::ws_client::rate_guard::RateGuard;
use chrono::Utc;
use common_models::enums::{ConnectionStatus, HistoryStatus, Severity};
use common_models::ws_payloads::{ClientFrame, ConnectParams, HelloPayload, RequestFrame, ServerFrame, CONNECT_METHOD};
use log::{debug, error, info, warn};
use rust_websocket_utils::client::transport::{self, ClientConnection};
use rust_websocket_utils::error::WsError;
use rust_websocket_utils::message::encode_json;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::Mutex as TokioMutex;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

/// 网关客户端。克隆得到的是同一个客户端实例的另一个句柄。
#[derive(Debug, Clone)]
pub struct GatewayClient {
    inner: Arc<ClientInner>,
}

/// 不延长客户端生命周期的句柄，供后台任务使用。
#[derive(Debug, Clone)]
pub struct WeakGatewayClient {
    inner: Weak<ClientInner>,
}

impl WeakGatewayClient {
    pub fn upgrade(&self) -> Option<GatewayClient> {
        self.inner.upgrade().map(|inner| GatewayClient { inner })
    }
}

#[derive(Debug)]
struct ClientInner {
    config: ClientConfig,
    connection: ConnectionManager,
    correlator: TokioMutex<RequestCorrelator>,
    rate_guard: TokioMutex<RateGuard>,
    recorder: TokioMutex<HistoryRecorder>,
    dispatcher: EventDispatcher,
    /// 请求 ID 计数器，ID 为 "1", "2", ... 的十进制字符串。
    next_request_id: AtomicU64,
    min_gap_ms: AtomicI64,
    auto_refresh: TokioMutex<Option<JoinHandle<()>>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(task) = self.auto_refresh.get_mut().take() {
            task.abort();
        }
    }
}

impl GatewayClient {
    /// 创建客户端。此时不会发起连接，需要调用 [`GatewayClient::open`]。
    pub fn new(config: ClientConfig) -> Self {
        info!("[GatewayClient] 正在初始化，网关地址: {}", config.gateway_url);
        let min_gap_ms = config.min_gap_ms.max(0);
        Self {
            inner: Arc::new(ClientInner {
                config,
                connection: ConnectionManager::new(),
                correlator: TokioMutex::new(RequestCorrelator::new()),
                rate_guard: TokioMutex::new(RateGuard::new()),
                recorder: TokioMutex::new(HistoryRecorder::new()),
                dispatcher: EventDispatcher::new(EVENT_CHANNEL_CAPACITY),
                next_request_id: AtomicU64::new(0),
                min_gap_ms: AtomicI64::new(min_gap_ms),
                auto_refresh: TokioMutex::new(None),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakGatewayClient {
        WeakGatewayClient {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    // --- 连接生命周期 ---

    /// 打开到 `url` 的连接。
    ///
    /// 已有连接时先将其完全拆除。连接在后台任务中建立，状态变化通过
    /// [`GatewayClient::watch_connection`] 观察；连接失败会被记录为错误活动块。
    pub async fn open(&self, url: &str) {
        info!("[GatewayClient] open 调用，目标 URL: {}", url);
        self.teardown_connection().await;
        let generation = self.inner.connection.begin(url).await;
        let task = tokio::spawn(run_connection(self.downgrade(), generation, url.to_string()));
        self.inner.connection.set_task(task).await;
    }

    /// 关闭连接并停止定时刷新。
    ///
    /// 所有等待中的调用以 [`GatewayError::AbandonedRequest`] 结束。可在任何时候重复调用。
    pub async fn close(&self) {
        info!("[GatewayClient] close 调用。");
        self.stop_auto_refresh().await;
        self.teardown_connection().await;
    }

    async fn teardown_connection(&self) {
        if let Some(task) = self.inner.connection.take_task().await {
            task.abort();
            match task.await {
                Ok(()) => debug!("[GatewayClient] 之前的连接任务已结束。"),
                Err(e) if e.is_cancelled() => debug!("[GatewayClient] 之前的连接任务已被取消。"),
                Err(e) => warn!("[GatewayClient] 等待之前的连接任务结束时发生错误: {:?}", e),
            }
        }
        self.inner.connection.retire().await;
        let dropped = self.inner.correlator.lock().await.clear();
        if dropped > 0 {
            info!("[GatewayClient] 拆除连接时丢弃了 {} 个在途请求。", dropped);
        }
    }

    async fn on_connect_failed(&self, generation: u64, err: &WsError) {
        if !self.inner.connection.mark_closed(generation).await {
            return;
        }
        self.inner
            .recorder
            .lock()
            .await
            .push_block("connection failed", err.to_string(), Severity::Error);
    }

    async fn on_transport_closed(&self, generation: u64, reason: &str) {
        if !self.inner.connection.mark_closed(generation).await {
            return;
        }
        self.inner
            .recorder
            .lock()
            .await
            .push_block("connection closed", reason.to_string(), Severity::Warn);
        let dropped = self.inner.correlator.lock().await.clear();
        if dropped > 0 {
            warn!("[GatewayClient] 连接关闭，{} 个在途请求未得到响应。", dropped);
        }
    }

    fn spawn_handshake(&self, generation: u64) {
        let client = self.clone();
        tokio::spawn(async move {
            client.perform_handshake(generation).await;
        });
    }

    /// 发送 `gateway.connect` 握手请求并记录协商结果。
    ///
    /// 握手走普通请求路径 (占用一个请求 ID 并写入历史)，但不经过限流器。
    /// 握手失败或结果格式不符时会话信息保持为空，不影响连接本身。
    async fn perform_handshake(&self, generation: u64) {
        if !self.inner.connection.is_current(generation) {
            debug!("[GatewayClient] 第 {} 代连接已被取代，跳过握手。", generation);
            return;
        }
        let params = ConnectParams {
            client: self.inner.config.client.clone(),
            protocol: self.inner.config.protocol,
        };
        let params = match serde_json::to_value(&params) {
            Ok(v) => v,
            Err(e) => {
                error!("[GatewayClient] 序列化握手参数失败: {}", e);
                return;
            }
        };
        match self.dispatch_request(CONNECT_METHOD, params).await {
            Ok(payload) => match HelloPayload::from_payload(&payload) {
                Some(hello) => {
                    if self.inner.connection.apply_hello(generation, &hello).await {
                        info!(
                            "[GatewayClient] 握手完成：协议版本 {}，会话 {}",
                            hello.protocol.selected, hello.session.session_id
                        );
                    }
                }
                None => warn!("[GatewayClient] 握手响应缺少协议版本或会话 ID，会话信息保持为空。"),
            },
            Err(e) => warn!("[GatewayClient] 握手未成功: {}", e),
        }
    }

    /// 处理一条入站文本：响应交给关联器，事件交给分发器，无法解析的文本被丢弃。
    pub async fn handle_inbound(&self, raw: &str) {
        match parse_inbound(raw) {
            Ok(ServerFrame::Response(response)) => {
                let id = response.id.clone();
                self.inner.correlator.lock().await.resolve(&id, response);
            }
            Ok(ServerFrame::Event(event)) => {
                let mut recorder = self.inner.recorder.lock().await;
                self.inner.dispatcher.handle(&mut recorder, event);
            }
            Err(e) => debug!("[GatewayClient] 丢弃入站消息: {}", e),
        }
    }

    // --- 调用 ---

    /// 发起一次调用，成功时返回负载，其余情况返回 `None`。
    ///
    /// 失败的原因记录在 [`GatewayClient::history`] 与 [`GatewayClient::activity`] 中。
    pub async fn call(&self, method: &str, params: Value) -> Option<Value> {
        self.try_call(method, params).await.ok()
    }

    /// 发起一次调用并以类型化错误返回失败原因。
    ///
    /// 顺序：未连接时记录 `skipped`；限流拒绝时记录 `debounced`；否则分配 ID、登记、发送并等待响应。
    /// 前两种情况不会占用请求 ID。
    pub async fn try_call(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        if self.inner.connection.status() != ConnectionStatus::Connected {
            debug!("[GatewayClient] 未连接，跳过调用 '{}'", method);
            let mut recorder = self.inner.recorder.lock().await;
            recorder.record_attempt(None, method, HistoryStatus::Skipped, None);
            recorder.push_block(method, "未连接到网关，调用已跳过", Severity::Error);
            return Err(GatewayError::NotConnected {
                method: method.to_string(),
            });
        }

        let now_ms = Utc::now().timestamp_millis();
        let min_gap_ms = self.min_gap_ms();
        let rejected_for = {
            let mut guard = self.inner.rate_guard.lock().await;
            if guard.try_accept(method, now_ms, min_gap_ms) {
                None
            } else {
                Some(guard.remaining_ms(method, now_ms, min_gap_ms))
            }
        };
        if let Some(remaining_ms) = rejected_for {
            debug!("[GatewayClient] 调用 '{}' 被限流，剩余 {} 毫秒", method, remaining_ms);
            let mut recorder = self.inner.recorder.lock().await;
            recorder.record_attempt(None, method, HistoryStatus::Debounced, Some(0));
            recorder.push_block(
                method,
                format!("{} 毫秒内只允许调用一次，请在 {} 毫秒后重试", min_gap_ms, remaining_ms),
                Severity::Warn,
            );
            return Err(GatewayError::RateLimited {
                method: method.to_string(),
                remaining_ms,
            });
        }

        self.dispatch_request(method, params).await
    }

    /// 分配 ID、登记、发送并等待结算。
    async fn dispatch_request(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let id = self.next_request_id();
        let completion = self.inner.correlator.lock().await.register(&id, method)?;
        self.inner
            .recorder
            .lock()
            .await
            .record_attempt(Some(&id), method, HistoryStatus::Sent, None);
        let started = Instant::now();

        let frame = ClientFrame::Request(RequestFrame {
            id: id.clone(),
            method: method.to_string(),
            params,
        });
        let sent = match encode_json(&frame) {
            Ok(text) => self.inner.connection.send_text(text).await,
            Err(e) => Err(GatewayError::from(e)),
        };
        if let Err(e) = sent {
            warn!("[GatewayClient] 请求 '{}' ({}) 发送失败: {}", id, method, e);
            self.inner.correlator.lock().await.discard(&id);
            let mut recorder = self.inner.recorder.lock().await;
            recorder.complete(&id, HistoryStatus::Error, elapsed_ms(started));
            recorder.push_block(method, e.to_string(), Severity::Error);
            return Err(e);
        }
        debug!("[GatewayClient] 请求 '{}' ({}) 已发送，等待响应。", id, method);

        let response = match completion.await {
            Ok(response) => response,
            Err(_) => {
                debug!("[GatewayClient] 请求 '{}' ({}) 在响应前被丢弃。", id, method);
                let mut recorder = self.inner.recorder.lock().await;
                recorder.complete(&id, HistoryStatus::Error, elapsed_ms(started));
                recorder.push_block(method, "连接在响应到达前关闭", Severity::Error);
                return Err(GatewayError::AbandonedRequest {
                    id,
                    method: method.to_string(),
                });
            }
        };

        let duration_ms = elapsed_ms(started);
        let mut recorder = self.inner.recorder.lock().await;
        if response.ok {
            recorder.complete(&id, HistoryStatus::Ok, duration_ms);
            recorder.mark_ok(method);
            let payload = response.payload.unwrap_or_else(|| json!({}));
            recorder.push_block(method, payload.to_string(), Severity::Info);
            Ok(payload)
        } else {
            let message = response.error_message().to_string();
            let code = response.error_code();
            recorder.complete(&id, HistoryStatus::Error, duration_ms);
            recorder.mark_error(method, &message);
            recorder.push_block(method, message.clone(), Severity::Error);
            Err(GatewayError::RemoteRejected {
                method: method.to_string(),
                code,
                message,
            })
        }
    }

    fn next_request_id(&self) -> String {
        (self.inner.next_request_id.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    // --- 定时刷新 ---

    /// 启动定时刷新，替换已在运行的定时任务。
    pub async fn start_auto_refresh(&self, interval: Duration, calls: Vec<RefreshCall>) -> Result<(), GatewayError> {
        if interval.is_zero() {
            return Err(GatewayError::InvalidConfig("定时刷新周期必须大于 0".to_string()));
        }
        let task = auto_refresh::spawn_ticker(self.downgrade(), interval, calls);
        if let Some(previous) = self.inner.auto_refresh.lock().await.replace(task) {
            previous.abort();
            debug!("[GatewayClient] 已替换之前的定时刷新任务。");
        }
        Ok(())
    }

    /// 停止定时刷新。返回之前是否有定时任务在运行。
    pub async fn stop_auto_refresh(&self) -> bool {
        match self.inner.auto_refresh.lock().await.take() {
            Some(task) => {
                task.abort();
                info!("[GatewayClient] 定时刷新已停止。");
                true
            }
            None => false,
        }
    }

    pub async fn is_auto_refresh_running(&self) -> bool {
        self.inner
            .auto_refresh
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    // --- 访问器 ---

    pub fn min_gap_ms(&self) -> i64 {
        self.inner.min_gap_ms.load(Ordering::SeqCst)
    }

    /// 修改最小调用间隔，对之后的调用立即生效。负值按 0 处理。
    pub fn set_min_gap_ms(&self, min_gap_ms: i64) {
        self.inner.min_gap_ms.store(min_gap_ms.max(0), Ordering::SeqCst);
    }

    pub fn connection(&self) -> ConnectionSnapshot {
        self.inner.connection.snapshot()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.inner.connection.watch()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ObservedEvent> {
        self.inner.dispatcher.subscribe()
    }

    /// 最新在前。
    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.inner.recorder.lock().await.history()
    }

    pub async fn activity(&self) -> Vec<ActivityBlock> {
        self.inner.recorder.lock().await.activity()
    }

    pub async fn feed_lifecycle(&self) -> Vec<FeedLifecycleRecord> {
        self.inner.recorder.lock().await.feed_lifecycle()
    }

    pub async fn method_health(&self, method: &str) -> Option<MethodHealth> {
        self.inner.recorder.lock().await.method_health(method)
    }

    /// 在途请求的 `(id, method)`。
    pub async fn pending_requests(&self) -> Vec<(String, String)> {
        self.inner.correlator.lock().await.pending_snapshot()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// 一代连接的完整生命周期：建立连接、启动写任务与握手、接收循环、关闭清理。
async fn run_connection(client: WeakGatewayClient, generation: u64, url: String) {
    info!("[连接任务] 第 {} 代：开始连接 {}", generation, url);
    let connection = match transport::connect_client(&url).await {
        Ok(connection) => connection,
        Err(e) => {
            error!("[连接任务] 第 {} 代：连接 {} 失败: {}", generation, url, e);
            if let Some(client) = client.upgrade() {
                client.on_connect_failed(generation, &e).await;
            }
            return;
        }
    };

    let ClientConnection { ws_sender, mut ws_receiver } = connection;
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(transport::pump_outbound(ws_sender, outbound_rx));

    let Some(opened) = client.upgrade() else {
        writer.abort();
        return;
    };
    if !opened.inner.connection.mark_open(generation, outbound_tx).await {
        writer.abort();
        return;
    }
    opened.spawn_handshake(generation);
    drop(opened);

    let reason = loop {
        match transport::receive_text(&mut ws_receiver).await {
            Some(Ok(text)) => {
                let Some(client) = client.upgrade() else {
                    break "客户端已释放".to_string();
                };
                client.handle_inbound(&text).await;
            }
            Some(Err(WsError::Message(m))) => {
                debug!("[连接任务] 忽略非文本消息: {}", m);
            }
            Some(Err(e)) => {
                warn!("[连接任务] 第 {} 代：接收消息失败，按连接关闭处理: {}", generation, e);
                break e.to_string();
            }
            None => break "网关关闭了连接".to_string(),
        }
    };

    info!("[连接任务] 第 {} 代：接收循环结束 ({})", generation, reason);
    if let Some(client) = client.upgrade() {
        client.on_transport_closed(generation, &reason).await;
    }
}
