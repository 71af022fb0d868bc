// rust_websocket_utils/src/server/mod.rs

//! WebSocket 服务端模块。
//!
//! 提供一个最小的监听器：绑定地址、接受 TCP 连接、完成 WebSocket 握手后把流交给回调处理。
//! 网关客户端的集成测试与本地调试用的模拟网关都构建在它之上。

pub mod transport;
