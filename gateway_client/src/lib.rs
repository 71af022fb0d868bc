// gateway_client/src/lib.rs

//! 网关客户端协调器。
//!
//! 通过一条持久 WebSocket 连接与网关通信：管理连接生命周期与握手，
//! 把请求/响应关联为可等待的调用，对同一方法的重复调用限流，
//! 并把所有调用结果与推送事件记录为有界的历史与活动日志。

pub mod config;
pub mod error;
pub mod event;
pub mod presets;
pub mod ws_client;

pub use config::ClientConfig;
pub use error::GatewayError;
pub use ws_client::GatewayClient;

use log::LevelFilter;

/// 初始化 `env_logger`。重复初始化只在标准错误输出上提示，不会失败。
pub fn init_logging(level: LevelFilter) {
    if let Err(e) = env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp_millis()
        .try_init()
    {
        eprintln!("初始化 env_logger 日志服务失败: {}", e);
    }
}
