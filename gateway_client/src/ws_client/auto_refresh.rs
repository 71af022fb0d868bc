// gateway_client/src/ws_client/auto_refresh.rs

//! 定时刷新：按固定周期重复发起一组调用。
//!
//! 每个周期内的调用各自在独立任务中发起，周期之间不会互相等待，
//! 同一方法的重复调用只由限流器 (`RateGuard`) 约束。

use crate::ws_client::service::WeakGatewayClient;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// 定时刷新中的一个调用。
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RefreshCall {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RefreshCall {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// 启动定时刷新任务。第一次调用发生在一个完整周期之后。
///
/// 任务只持有客户端的弱引用，客户端被释放后任务在下一个周期自行结束。
pub(crate) fn spawn_ticker(client: WeakGatewayClient, interval: Duration, calls: Vec<RefreshCall>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("[定时刷新] 已启动，周期 {:?}，共 {} 个调用。", interval, calls.len());
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(client) = client.upgrade() else {
                debug!("[定时刷新] 客户端已释放，任务结束。");
                break;
            };
            for call in &calls {
                let client = client.clone();
                let RefreshCall { method, params } = call.clone();
                tokio::spawn(async move {
                    if let Err(e) = client.try_call(&method, params).await {
                        debug!("[定时刷新] 调用 '{}' 未成功: {}", method, e);
                    }
                });
            }
        }
    })
}
