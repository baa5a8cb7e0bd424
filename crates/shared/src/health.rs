//! 健康检查与关闭信号
//!
//! 提供 /health、/ready 探针端点和操作系统关闭信号监听，
//! 供各服务二进制在 main 中复用。探针仅返回固定 JSON，
//! 使用原生 TCP 实现避免为此引入完整 HTTP 框架。

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{error, info, warn};

/// 健康检查 HTTP 服务器
///
/// 提供 /health 和 /ready 端点供 Kubernetes 探测服务状态。
pub async fn start_health_server(port: u16) {
    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, port, "健康检查服务器绑定端口失败");
            return;
        }
    };

    info!(port, "健康检查 HTTP 服务器已启动");

    loop {
        let (mut stream, _) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "接受健康检查连接失败");
                continue;
            }
        };

        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let n = match stream.read(&mut buf).await {
                Ok(n) => n,
                Err(_) => return,
            };

            let request = String::from_utf8_lossy(&buf[..n]);
            let is_health = request.contains("GET /health") || request.contains("GET /ready");

            let response = if is_health {
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{\"status\":\"ok\"}"
            } else {
                "HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\n\r\nNot Found"
            };

            let _ = stream.write_all(response.as_bytes()).await;
        });
    }
}

/// 监听操作系统关闭信号
///
/// 同时监听 SIGINT（Ctrl+C）和 SIGTERM（容器编排发送），
/// 任一信号到达即返回，由调用方触发优雅关闭流程。
pub async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("注册 SIGTERM 信号失败");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
