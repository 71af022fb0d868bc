// gateway_client/src/ws_client/dispatcher.rs

//! 网关推送事件的分发。
//!
//! 分发是同步且全覆盖的：任何事件 (包括未知事件) 都会生成一个 info 级别的活动块；
//! 订阅生命周期事件额外生成一条生命周期记录。记录完成后事件被转发给广播观察者。

use crate::event::ObservedEvent;
use crate::ws_client::history::HistoryRecorder;
use chrono::Utc;
use common_models::enums::Severity;
use common_models::ws_payloads::{EventFrame, FEED_LIFECYCLE_EVENT};
use log::{debug, trace};
use serde_json::Value;
use tokio::sync::broadcast;

#[derive(Debug)]
pub struct EventDispatcher {
    observers: broadcast::Sender<ObservedEvent>,
}

impl EventDispatcher {
    pub fn new(capacity: usize) -> Self {
        let (observers, _) = broadcast::channel(capacity.max(1));
        Self { observers }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ObservedEvent> {
        self.observers.subscribe()
    }

    /// 处理一个入站事件。
    pub fn handle(&self, recorder: &mut HistoryRecorder, frame: EventFrame) {
        let EventFrame { event, payload } = frame;
        let payload = payload.unwrap_or(Value::Null);
        debug!("[EventDispatcher] 处理事件 '{}'", event);

        recorder.push_block(event.clone(), payload.to_string(), Severity::Info);

        if event == FEED_LIFECYCLE_EVENT {
            let (action, subscription_id) = lifecycle_fields(&payload);
            debug!(
                "[EventDispatcher] 订阅生命周期: action='{}', subscriptionId={:?}",
                action, subscription_id
            );
            recorder.push_lifecycle(action, subscription_id);
        }

        let observed = ObservedEvent {
            event,
            payload,
            received_at: Utc::now(),
        };
        if self.observers.send(observed).is_err() {
            trace!("[EventDispatcher] 当前没有事件观察者。");
        }
    }
}

/// 从生命周期事件负载中提取 `action` 与 `subscriptionId`。
///
/// `action` 不是非空字符串时取 `"unknown"`；`subscriptionId` 只接受字符串。
fn lifecycle_fields(payload: &Value) -> (String, Option<String>) {
    let action = payload
        .get("action")
        .and_then(Value::as_str)
        .filter(|a| !a.is_empty())
        .unwrap_or("unknown")
        .to_string();
    let subscription_id = payload
        .get("subscriptionId")
        .and_then(Value::as_str)
        .map(str::to_string);
    (action, subscription_id)
}
