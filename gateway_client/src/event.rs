// gateway_client/src/event.rs

//! 转发给外部观察者的网关事件。
//!
//! 每个入站事件在记录为活动块之后，都会以 [`ObservedEvent`] 的形式通过广播通道分发，
//! 观察者通过 `GatewayClient::subscribe_events` 订阅。

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// 事件广播通道容量。落后超过此数量的观察者会收到 `Lagged` 并丢失最旧的事件。
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// 一个已被客户端处理过的网关事件。
#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct ObservedEvent {
    /// 事件名，例如 `feeds.subscription`。
    pub event: String,
    /// 事件负载；网关未携带负载时为 `Value::Null`。
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}
