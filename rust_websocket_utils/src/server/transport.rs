// rust_websocket_utils/src/server/transport.rs

//! 服务端 WebSocket 监听、接受连接与握手逻辑。

use crate::error::WsError;
use log::{error, info};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{WebSocketStream, accept_async};

/// 经过 WebSocket 握手后的 TCP 流。
pub type WsStream = WebSocketStream<TcpStream>;

/// 已绑定地址的 WebSocket 服务端监听器。
///
/// 绑定与运行分为两步：先 `bind` 拿到实际监听地址 (绑定到端口 0 时由系统分配)，
/// 再 `run` 开始接受连接。
pub struct ServerTransport {
    listener: TcpListener,
}

impl ServerTransport {
    /// 绑定 TCP 监听器到指定地址。
    pub async fn bind(addr: &str) -> Result<Self, WsError> {
        let listener = TcpListener::bind(addr).await?;
        info!("WebSocket 服务器已绑定地址: {}", listener.local_addr()?);
        Ok(Self { listener })
    }

    /// 实际监听的地址。
    pub fn local_addr(&self) -> Result<SocketAddr, WsError> {
        Ok(self.listener.local_addr()?)
    }

    /// 开始接受连接。
    ///
    /// 每个成功完成 WebSocket 握手的连接都会在独立的 Tokio 任务中调用一次 `on_connect`。
    /// 单个连接的握手失败或 `accept` 失败只记录日志，不会终止监听循环；
    /// 此函数只在任务被取消时结束。
    pub async fn run<F, Fut>(self, on_connect: F) -> Result<(), WsError>
    where
        F: Fn(WsStream, SocketAddr) -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        loop {
            match self.listener.accept().await {
                Ok((tcp_stream, peer_addr)) => {
                    info!("从 {} 接受了新的 TCP 连接", peer_addr);
                    let on_connect_callback = on_connect.clone();
                    tokio::spawn(async move {
                        match accept_async(tcp_stream).await {
                            Ok(ws_stream) => {
                                info!("与 {} 的 WebSocket 握手成功", peer_addr);
                                on_connect_callback(ws_stream, peer_addr).await;
                            }
                            Err(e) => {
                                error!("与 {} 的 WebSocket 握手失败: {}", peer_addr, e);
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("接受 TCP 连接失败: {}。服务器将继续运行。", e);
                }
            }
        }
    }
}
