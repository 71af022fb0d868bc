// gateway_client/src/ws_client/mod.rs

//! 网关 WebSocket 客户端模块。
//!
//! - `service`: 对外的 `GatewayClient`，负责调用流程与连接任务。
//! - `connection`: 连接状态与出站队列。
//! - `correlator`: 请求 ID 与等待者的关联。
//! - `rate_guard`: 按方法的最小调用间隔。
//! - `dispatcher`: 推送事件的记录与转发。
//! - `history`: 历史、活动块、订阅生命周期与方法健康状态。
//! - `auto_refresh`: 定时刷新。

pub mod auto_refresh;
pub mod connection;
pub mod correlator;
pub mod dispatcher;
pub mod history;
pub mod rate_guard;
pub mod service;

pub use auto_refresh::RefreshCall;
pub use connection::ConnectionSnapshot;
pub use history::{ActivityBlock, FeedLifecycleRecord, HistoryEntry, MethodHealth};
pub use service::{GatewayClient, WeakGatewayClient};
