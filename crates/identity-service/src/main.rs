//! 身份服务入口
//!
//! 进程内并行运行：gRPC 服务端、健康检查 HTTP 端点、发件箱 relay。
//! SIGINT/SIGTERM 触发优雅关闭：gRPC 停止接收新请求并排空在途请求，
//! relay 在下一个检查点退出，最后关闭数据库连接池。

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;

use identity_service::grpc::IdentityGrpc;
use identity_service::repository::UserRepository;
use identity_service::service::IdentityService;
use identity_service::token::TokenManager;
use shop_proto::identity::identity_service_server::IdentityServiceServer;
use shop_shared::config::AppConfig;
use shop_shared::database::Database;
use shop_shared::health::{shutdown_signal, start_health_server};
use shop_shared::kafka::KafkaProducer;
use shop_shared::outbox::OutboxRelay;
use shop_shared::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load("identity-service")?;
    let _telemetry = telemetry::init(&config.service_name, &config.observability)?;

    info!("Starting identity-service...");

    let db = Database::connect(&config.database).await?;
    let producer = KafkaProducer::new(&config.kafka)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let relay = OutboxRelay::new(db.pool().clone(), producer);
    let relay_handle = tokio::spawn(relay.run(shutdown_rx.clone()));

    let health_handle = tokio::spawn(start_health_server(config.server.health_port));

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("收到关闭信号，开始优雅关闭...");
        let _ = shutdown_tx.send(true);
    });

    let tokens = TokenManager::new(&config.jwt);
    let user_repo = UserRepository::new(db.pool().clone());
    let service = IdentityService::new(db.pool().clone(), user_repo, tokens);

    let addr = config.server_addr().parse()?;
    info!(%addr, "identity gRPC 服务监听中");

    let mut grpc_shutdown = shutdown_rx.clone();
    tonic::transport::Server::builder()
        .add_service(IdentityServiceServer::new(IdentityGrpc::new(service)))
        .serve_with_shutdown(addr, async move {
            let _ = grpc_shutdown.changed().await;
        })
        .await?;

    let _ = relay_handle.await;
    health_handle.abort();
    db.close().await;

    info!("identity-service 已关闭");
    Ok(())
}
