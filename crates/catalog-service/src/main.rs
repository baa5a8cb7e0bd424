//! 商品目录服务入口
//!
//! 进程内并行运行：gRPC 服务端、健康检查端点、Kafka 消费循环、发件箱 relay。

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;

use catalog_service::consumer::CatalogConsumer;
use catalog_service::grpc::CatalogGrpc;
use catalog_service::repository::ProductRepository;
use catalog_service::service::{CachedCatalog, CatalogService, ProductCatalog};
use shop_proto::catalog::catalog_service_server::CatalogServiceServer;
use shop_shared::cache::Cache;
use shop_shared::config::AppConfig;
use shop_shared::database::Database;
use shop_shared::health::{shutdown_signal, start_health_server};
use shop_shared::kafka::KafkaProducer;
use shop_shared::outbox::OutboxRelay;
use shop_shared::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load("catalog-service")?;
    let _telemetry = telemetry::init(&config.service_name, &config.observability)?;

    info!("Starting catalog-service...");

    let db = Database::connect(&config.database).await?;
    let cache = Cache::new(&config.redis)?;
    let producer = KafkaProducer::new(&config.kafka)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let relay = OutboxRelay::new(db.pool().clone(), producer);
    let relay_handle = tokio::spawn(relay.run(shutdown_rx.clone()));

    let health_handle = tokio::spawn(start_health_server(config.server.health_port));

    let product_repo = ProductRepository::new(db.pool().clone());
    let inner = CatalogService::new(db.pool().clone(), product_repo);
    let catalog: Arc<dyn ProductCatalog> = Arc::new(CachedCatalog::new(inner, cache));

    let consumer = CatalogConsumer::new(&config, catalog.clone())?;
    let consumer_handle = tokio::spawn(consumer.run(shutdown_rx.clone()));

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("收到关闭信号，开始优雅关闭...");
        let _ = shutdown_tx.send(true);
    });

    let addr = config.server_addr().parse()?;
    info!(%addr, "catalog gRPC 服务监听中");

    let mut grpc_shutdown = shutdown_rx.clone();
    tonic::transport::Server::builder()
        .add_service(CatalogServiceServer::new(CatalogGrpc::new(catalog)))
        .serve_with_shutdown(addr, async move {
            let _ = grpc_shutdown.changed().await;
        })
        .await?;

    let _ = consumer_handle.await;
    let _ = relay_handle.await;
    health_handle.abort();
    db.close().await;

    info!("catalog-service 已关闭");
    Ok(())
}
