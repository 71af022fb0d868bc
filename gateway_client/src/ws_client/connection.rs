// gateway_client/src/ws_client/connection.rs

//! 连接状态管理。
//!
//! `ConnectionManager` 持有当前连接的状态快照 (通过 `watch` 通道发布)、出站队列的发送端
//! 以及连接任务的句柄。每次 `begin` 都会开启一个新的"代" (generation)：
//! 所有来自连接任务的回调都带着自己的代号，代号与当前不一致的回调一律忽略，
//! 因此旧连接迟到的关闭通知不会影响新连接。
//!
//! 所有状态修改都在 `outbound` 锁内完成，保证出站发送端与状态快照始终一致。

use crate::error::GatewayError;
use common_models::enums::ConnectionStatus;
use common_models::ws_payloads::{HelloPayload, ServerFrame};
use log::{debug, info};
use rust_websocket_utils::error::WsError;
use rust_websocket_utils::message::{decode_json, preview};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex as TokioMutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// 连接状态快照。
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ConnectionSnapshot {
    /// 最近一次 `open` 使用的地址。
    pub url: Option<String>,
    pub status: ConnectionStatus,
    /// 握手成功后网关选定的协议版本。
    pub negotiated_protocol_version: Option<i64>,
    pub session_id: Option<String>,
    pub generation: u64,
}

impl Default for ConnectionSnapshot {
    fn default() -> Self {
        Self {
            url: None,
            status: ConnectionStatus::Disconnected,
            negotiated_protocol_version: None,
            session_id: None,
            generation: 0,
        }
    }
}

impl ConnectionSnapshot {
    fn clear_session(&mut self) {
        self.negotiated_protocol_version = None;
        self.session_id = None;
    }
}

#[derive(Debug)]
pub struct ConnectionManager {
    state: watch::Sender<ConnectionSnapshot>,
    outbound: TokioMutex<Option<mpsc::UnboundedSender<String>>>,
    task: TokioMutex<Option<JoinHandle<()>>>,
    generation: AtomicU64,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConnectionSnapshot::default());
        Self {
            state,
            outbound: TokioMutex::new(None),
            task: TokioMutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// `generation` 是否仍是当前的一代。
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.current_generation()
    }

    /// 开启新的一代连接，状态置为 `Connecting`。返回新代号。
    pub async fn begin(&self, url: &str) -> u64 {
        let mut outbound = self.outbound.lock().await;
        *outbound = None;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|s| {
            s.url = Some(url.to_string());
            s.status = ConnectionStatus::Connecting;
            s.clear_session();
            s.generation = generation;
        });
        info!("[连接管理] 第 {} 代连接开始，目标: {}", generation, url);
        generation
    }

    /// 传输层已打开：保存出站队列发送端，状态置为 `Connected`。
    ///
    /// 若 `generation` 已被取代则不做任何修改并返回 `false`。
    pub async fn mark_open(&self, generation: u64, outbound_tx: mpsc::UnboundedSender<String>) -> bool {
        let mut outbound = self.outbound.lock().await;
        if generation != self.current_generation() {
            debug!("[连接管理] 忽略已被取代的第 {} 代连接的打开通知。", generation);
            return false;
        }
        *outbound = Some(outbound_tx);
        self.state.send_modify(|s| s.status = ConnectionStatus::Connected);
        info!("[连接管理] 第 {} 代连接已打开。", generation);
        true
    }

    /// 写入握手协商出的协议版本与会话 ID。
    pub async fn apply_hello(&self, generation: u64, hello: &HelloPayload) -> bool {
        let _outbound = self.outbound.lock().await;
        if generation != self.current_generation() {
            return false;
        }
        self.state.send_modify(|s| {
            s.negotiated_protocol_version = Some(hello.protocol.selected);
            s.session_id = Some(hello.session.session_id.clone());
        });
        true
    }

    /// 传输层已关闭 (或连接失败)：丢弃出站发送端，状态置为 `Disconnected`，清除会话信息。
    ///
    /// 若 `generation` 已被取代则返回 `false`，调用方应跳过其余的清理工作。
    pub async fn mark_closed(&self, generation: u64) -> bool {
        let mut outbound = self.outbound.lock().await;
        if generation != self.current_generation() {
            debug!("[连接管理] 忽略已被取代的第 {} 代连接的关闭通知。", generation);
            return false;
        }
        *outbound = None;
        self.state.send_modify(|s| {
            s.status = ConnectionStatus::Disconnected;
            s.clear_session();
        });
        info!("[连接管理] 第 {} 代连接已关闭。", generation);
        true
    }

    /// 主动结束当前一代：推进代号使所有在途回调失效，并置为 `Disconnected`。可重复调用。
    pub async fn retire(&self) {
        let mut outbound = self.outbound.lock().await;
        *outbound = None;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|s| {
            s.status = ConnectionStatus::Disconnected;
            s.clear_session();
            s.generation = generation;
        });
    }

    /// 把一条文本帧推入出站队列。
    pub async fn send_text(&self, text: String) -> Result<(), GatewayError> {
        let outbound = self.outbound.lock().await;
        match outbound.as_ref() {
            Some(tx) => tx.send(text).map_err(|_| GatewayError::Transport(WsError::SendErrorClosed)),
            None => Err(GatewayError::Transport(WsError::NotConnected)),
        }
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.borrow().status
    }

    pub fn watch(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.state.subscribe()
    }

    pub async fn set_task(&self, task: JoinHandle<()>) {
        let mut guard = self.task.lock().await;
        if let Some(previous) = guard.replace(task) {
            previous.abort();
        }
    }

    pub async fn take_task(&self) -> Option<JoinHandle<()>> {
        self.task.lock().await.take()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

/// 入站文本的唯一解析入口。
pub fn parse_inbound(raw: &str) -> Result<ServerFrame, GatewayError> {
    decode_json::<ServerFrame>(raw)
        .map_err(|e| GatewayError::MalformedMessage(format!("{} ('{}')", e, preview(raw, 80))))
}
