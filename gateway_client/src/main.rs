// gateway_client/src/main.rs

//! `gateway-console`：在终端中运行的网关客户端。
//!
//! 用法：`gateway-console [配置文件路径]`。启动后连接网关，按配置执行定时刷新，
//! 把收到的事件与连接状态变化写入日志，按 Ctrl-C 退出。

use anyhow::{Context, Result};
use gateway_client::config::{self, ClientConfig};
use gateway_client::presets::{self, JsonFilePresetStore, PresetStore};
use gateway_client::ws_client::RefreshCall;
use gateway_client::{init_logging, GatewayClient};
use log::{info, warn};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = config::resolve_config_path(std::env::args().nth(1));
    let client_config = config::load_or_create_config(&config_path);
    init_logging(config::parse_log_level(&client_config.log_level).unwrap_or(log::LevelFilter::Info));
    client_config
        .validate()
        .with_context(|| format!("配置文件 '{}' 无效", config_path.display()))?;

    info!("[gateway-console] 正在启动，配置文件: {}", config_path.display());
    let client = GatewayClient::new(client_config.clone());
    spawn_observers(&client);

    if client_config.auto_connect {
        client.open(&client_config.gateway_url).await;
    } else {
        info!("[gateway-console] auto_connect 已关闭，不会主动连接网关。");
    }

    if client_config.auto_refresh.enabled {
        let store = JsonFilePresetStore::new(&client_config.preset_file);
        let calls = resolve_refresh_calls(&client_config, &store);
        client
            .start_auto_refresh(Duration::from_millis(client_config.auto_refresh.interval_ms), calls)
            .await
            .context("启动定时刷新失败")?;
    }

    tokio::signal::ctrl_c().await.context("等待 Ctrl-C 信号失败")?;
    info!("[gateway-console] 收到退出信号，正在关闭连接...");
    client.close().await;
    Ok(())
}

/// 参数为 `null` 的调用使用该方法保存的预设；显式给出的参数会被保存为新的预设。
fn resolve_refresh_calls(config: &ClientConfig, store: &dyn PresetStore) -> Vec<RefreshCall> {
    config
        .auto_refresh
        .calls
        .iter()
        .map(|call| {
            if call.params.is_null() {
                let params = presets::load_params(store, &call.method).unwrap_or_else(|| serde_json::json!({}));
                RefreshCall::new(call.method.clone(), params)
            } else {
                if let Err(e) = presets::save_params(store, &call.method, &call.params) {
                    warn!("[gateway-console] 保存方法 '{}' 的参数预设失败: {}", call.method, e);
                }
                call.clone()
            }
        })
        .collect()
}

fn spawn_observers(client: &GatewayClient) {
    let mut events = client.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!("[gateway-console] 事件 '{}': {}", event.event, event.payload),
                Err(RecvError::Lagged(skipped)) => warn!("[gateway-console] 事件观察者落后，丢失 {} 个事件。", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut connection = client.watch_connection();
    tokio::spawn(async move {
        while connection.changed().await.is_ok() {
            let snapshot = connection.borrow_and_update().clone();
            info!(
                "[gateway-console] 连接状态: {} (协议版本 {:?}，会话 {:?})",
                snapshot.status, snapshot.negotiated_protocol_version, snapshot.session_id
            );
        }
    });
}
