//! `common_models` 公共模型库 crate。
//!
//! 本 crate 集中定义了网关客户端、传输层以及测试用网关之间共享的数据结构：
//! - **协议帧 (`ws_payloads`)**: 请求/响应/事件三种 JSON 帧，以及 `gateway.connect` 握手的参数与结果。
//! - **通用枚举 (`enums`)**: 连接状态、请求历史状态与活动块严重级别。
//!
//! 所有模型都派生 `Serialize`/`Deserialize`/`Debug`/`Clone`，以便在 JSON 与 Rust 类型之间转换并方便调试。

pub mod enums;
pub mod ws_payloads;

pub use enums::{ConnectionStatus, HistoryStatus, Severity};
