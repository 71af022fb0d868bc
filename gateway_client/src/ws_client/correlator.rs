// gateway_client/src/ws_client/correlator.rs

//! 请求关联器：把请求 ID 映射到唯一等待该 ID 结果的调用方。
//!
//! 每个 ID 在发送前通过 `register` 登记一个一次性的完成句柄 (`oneshot`)，
//! 响应到达时由 `resolve` 取出并完成，保证每个 ID 至多被完成一次。
//! 响应的到达顺序与发送顺序无关，正确性只依赖 ID 的唯一性。

use crate::error::GatewayError;
use common_models::ws_payloads::ResponseFrame;
use log::debug;
use std::collections::HashMap;
use tokio::sync::oneshot;

/// 一个在途请求。
#[derive(Debug)]
pub struct PendingRequest {
    pub method: String,
    completion: oneshot::Sender<ResponseFrame>,
}

#[derive(Debug, Default)]
pub struct RequestCorrelator {
    pending: HashMap<String, PendingRequest>,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为 `id` 登记一个完成句柄，返回调用方等待用的接收端。
    ///
    /// 必须在对应的请求帧发送之前调用。ID 来自客户端实例内单调递增的计数器，
    /// 正常使用下不会重复；重复登记会返回 `DuplicateRequestId` 且不影响已有条目。
    pub fn register(&mut self, id: &str, method: &str) -> Result<oneshot::Receiver<ResponseFrame>, GatewayError> {
        if self.pending.contains_key(id) {
            return Err(GatewayError::DuplicateRequestId(id.to_string()));
        }
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            id.to_string(),
            PendingRequest {
                method: method.to_string(),
                completion: tx,
            },
        );
        Ok(rx)
    }

    /// 取出并完成 `id` 对应的等待者。
    ///
    /// 未知 ID (例如重复投递的响应、已被丢弃的请求) 直接忽略，返回 `false`。
    pub fn resolve(&mut self, id: &str, response: ResponseFrame) -> bool {
        match self.pending.remove(id) {
            Some(entry) => {
                if entry.completion.send(response).is_err() {
                    debug!("[RequestCorrelator] 请求 '{}' ({}) 的调用方已不再等待，响应被丢弃。", id, entry.method);
                }
                true
            }
            None => {
                debug!("[RequestCorrelator] 收到未知请求 ID '{}' 的响应，忽略。", id);
                false
            }
        }
    }

    /// 移除单个条目而不完成它。
    pub fn discard(&mut self, id: &str) -> bool {
        self.pending.remove(id).is_some()
    }

    /// 丢弃全部等待中的条目，返回丢弃的数量。
    pub fn clear(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// 当前在途请求的 `(id, method)` 列表，按 ID 排序。
    pub fn pending_snapshot(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .pending
            .iter()
            .map(|(id, entry)| (id.clone(), entry.method.clone()))
            .collect();
        entries.sort();
        entries
    }
}
