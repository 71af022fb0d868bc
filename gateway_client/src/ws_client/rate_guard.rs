// gateway_client/src/ws_client/rate_guard.rs

//! 按方法名的最小间隔限流。
//!
//! 这是纯粹的本地判断：只记录每个方法上一次被接受的时间，不与其他客户端实例协调，
//! 也不构成对服务端的任何保证。

use std::collections::HashMap;

/// 记录每个方法最近一次被接受的发送时间 (毫秒时间戳)。
///
/// 条目在第一次尝试时惰性创建，之后每次被接受时更新，从不删除。
#[derive(Debug, Default)]
pub struct RateGuard {
    last_accepted_at: HashMap<String, i64>,
}

impl RateGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// 判断一次新的发送尝试是否被接受。
    ///
    /// 若 `now_ms - last_accepted_at(method) < min_gap_ms` 则拒绝且不修改状态；
    /// 否则记录 `now_ms` 并接受。`min_gap_ms` 会被钳制到不小于 0。
    pub fn try_accept(&mut self, method: &str, now_ms: i64, min_gap_ms: i64) -> bool {
        let min_gap_ms = min_gap_ms.max(0);
        if let Some(&last) = self.last_accepted_at.get(method) {
            if now_ms.saturating_sub(last) < min_gap_ms {
                return false;
            }
        }
        self.last_accepted_at.insert(method.to_string(), now_ms);
        true
    }

    /// 距离该方法下一次允许发送还剩多少毫秒；没有记录或窗口已过时为 0。
    pub fn remaining_ms(&self, method: &str, now_ms: i64, min_gap_ms: i64) -> i64 {
        let min_gap_ms = min_gap_ms.max(0);
        match self.last_accepted_at.get(method) {
            Some(&last) => (min_gap_ms - now_ms.saturating_sub(last)).clamp(0, min_gap_ms),
            None => 0,
        }
    }

    pub fn last_accepted_at(&self, method: &str) -> Option<i64> {
        self.last_accepted_at.get(method).copied()
    }
}
