// gateway_client/src/ws_client/history.rs

//! 调用历史、活动块、订阅生命周期记录与方法健康状态。
//!
//! 三个日志都是"最新在前"的有界环形日志，超出容量时丢弃最旧的条目。
//! 所有修改只发生在持有客户端内部锁时，读取返回克隆的快照。

use chrono::{DateTime, Utc};
use common_models::enums::{HistoryStatus, Severity};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// 请求历史容量。
pub const HISTORY_CAPACITY: usize = 20;
/// 活动块容量。
pub const ACTIVITY_CAPACITY: usize = 25;
/// 订阅生命周期记录容量。
pub const FEED_LIFECYCLE_CAPACITY: usize = 6;

/// 最新在前的有界日志。
#[derive(Debug, Clone)]
pub struct RingLog<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> RingLog<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// 在头部插入，超出容量时从尾部截断。
    pub fn push(&mut self, item: T) {
        self.items.push_front(item);
        self.items.truncate(self.capacity);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

/// 一次调用尝试的历史条目。
///
/// 对于实际发送的请求，`id` 即请求 ID；对于被限流或跳过的尝试，`id` 为一个不会与请求 ID 冲突的随机值。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: String,
    pub method: String,
    pub status: HistoryStatus,
    /// 仅在终态时设置。
    pub duration_ms: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

/// 展示用的活动块。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ActivityBlock {
    pub id: String,
    pub title: String,
    pub content: String,
    pub severity: Severity,
}

/// 订阅生命周期记录。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FeedLifecycleRecord {
    pub id: String,
    pub action: String,
    pub subscription_id: Option<String>,
}

/// 单个方法最近一次成功与失败的情况。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct MethodHealth {
    pub last_ok_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// 历史与活动记录器。
#[derive(Debug)]
pub struct HistoryRecorder {
    history: RingLog<HistoryEntry>,
    activity: RingLog<ActivityBlock>,
    feed_lifecycle: RingLog<FeedLifecycleRecord>,
    method_health: HashMap<String, MethodHealth>,
}

impl Default for HistoryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryRecorder {
    pub fn new() -> Self {
        Self {
            history: RingLog::with_capacity(HISTORY_CAPACITY),
            activity: RingLog::with_capacity(ACTIVITY_CAPACITY),
            feed_lifecycle: RingLog::with_capacity(FEED_LIFECYCLE_CAPACITY),
            method_health: HashMap::new(),
        }
    }

    /// 记录一次调用尝试。`id` 为 `None` 时生成一个随机 ID。
    ///
    /// 返回条目的 ID。
    pub fn record_attempt(
        &mut self,
        id: Option<&str>,
        method: &str,
        status: HistoryStatus,
        duration_ms: Option<u64>,
    ) -> String {
        let id = id.map(str::to_string).unwrap_or_else(|| Uuid::new_v4().to_string());
        self.history.push(HistoryEntry {
            id: id.clone(),
            method: method.to_string(),
            status,
            duration_ms,
            timestamp: Utc::now(),
        });
        id
    }

    /// 把 `id` 对应且仍为 `Sent` 的条目修改为终态。
    ///
    /// 条目已被挤出日志，或已是终态时不做任何修改，返回 `false`。
    pub fn complete(&mut self, id: &str, status: HistoryStatus, duration_ms: u64) -> bool {
        if !matches!(status, HistoryStatus::Ok | HistoryStatus::Error) {
            return false;
        }
        match self
            .history
            .iter_mut()
            .find(|entry| entry.id == id && !entry.status.is_terminal())
        {
            Some(entry) => {
                entry.status = status;
                entry.duration_ms = Some(duration_ms);
                true
            }
            None => false,
        }
    }

    /// 追加一个活动块，返回块 ID。
    pub fn push_block(&mut self, title: impl Into<String>, content: impl Into<String>, severity: Severity) -> String {
        let id = Uuid::new_v4().to_string();
        self.activity.push(ActivityBlock {
            id: id.clone(),
            title: title.into(),
            content: content.into(),
            severity,
        });
        id
    }

    pub fn push_lifecycle(&mut self, action: impl Into<String>, subscription_id: Option<String>) {
        self.feed_lifecycle.push(FeedLifecycleRecord {
            id: Uuid::new_v4().to_string(),
            action: action.into(),
            subscription_id,
        });
    }

    pub fn mark_ok(&mut self, method: &str) {
        let health = self.method_health.entry(method.to_string()).or_default();
        health.last_ok_at = Some(Utc::now());
    }

    pub fn mark_error(&mut self, method: &str, message: &str) {
        let health = self.method_health.entry(method.to_string()).or_default();
        health.last_error_at = Some(Utc::now());
        health.last_error = Some(message.to_string());
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.to_vec()
    }

    pub fn activity(&self) -> Vec<ActivityBlock> {
        self.activity.to_vec()
    }

    pub fn feed_lifecycle(&self) -> Vec<FeedLifecycleRecord> {
        self.feed_lifecycle.to_vec()
    }

    pub fn method_health(&self, method: &str) -> Option<MethodHealth> {
        self.method_health.get(method).cloned()
    }
}
