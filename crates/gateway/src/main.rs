//! 网关入口
//!
//! 下游 gRPC 地址通过环境变量注入（IDENTITY_RPC_URL / CATALOG_RPC_URL /
//! ORDER_RPC_URL），未设置时使用本地默认值。HTTP 服务优雅关闭：
//! 收到信号后停止接收新连接并排空在途请求。

use anyhow::Result;
use std::net::SocketAddr;
use tracing::info;

use gateway::clients::{catalog_client, identity_client, order_client};
use gateway::routes::build_router;
use gateway::state::AppState;
use shop_shared::config::AppConfig;
use shop_shared::health::shutdown_signal;
use shop_shared::telemetry;

fn env_or(name: &str, fallback: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| fallback.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = AppConfig::load("gateway")?;
    let _telemetry = telemetry::init(&config.service_name, &config.observability)?;

    // 网关默认监听 HTTP 端口而非 gRPC 端口段
    if config.server.port == 50051 {
        config.server.port = 3000;
    }

    info!("Starting gateway...");

    let identity_url = env_or("IDENTITY_RPC_URL", "http://localhost:50051");
    let catalog_url = env_or("CATALOG_RPC_URL", "http://localhost:50052");
    let order_url = env_or("ORDER_RPC_URL", "http://localhost:50053");

    let state = AppState::new(
        identity_client(&identity_url)?,
        catalog_client(&catalog_url)?,
        order_client(&order_url)?,
    );

    let router = build_router(state);

    let addr = config.server_addr();
    info!(%addr, "gateway HTTP 服务监听中");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        shutdown_signal().await;
        info!("收到关闭信号，开始优雅关闭...");
    })
    .await?;

    info!("gateway 已关闭");
    Ok(())
}
