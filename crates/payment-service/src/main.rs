//! 支付服务入口
//!
//! 进程内并行运行：健康检查端点、Kafka 消费循环、发件箱 relay。
//! 支付服务没有对外 RPC 面，进程在消费循环退出后结束。

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;

use payment_service::consumer::PaymentConsumer;
use payment_service::decider::ParityDecider;
use payment_service::repository::PaymentRepository;
use payment_service::service::PaymentService;
use shop_shared::config::AppConfig;
use shop_shared::database::Database;
use shop_shared::health::{shutdown_signal, start_health_server};
use shop_shared::kafka::KafkaProducer;
use shop_shared::outbox::OutboxRelay;
use shop_shared::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load("payment-service")?;
    let _telemetry = telemetry::init(&config.service_name, &config.observability)?;

    info!("Starting payment-service...");

    let db = Database::connect(&config.database).await?;
    let producer = KafkaProducer::new(&config.kafka)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let relay = OutboxRelay::new(db.pool().clone(), producer);
    let relay_handle = tokio::spawn(relay.run(shutdown_rx.clone()));

    let health_handle = tokio::spawn(start_health_server(config.server.health_port));

    let payment_repo = PaymentRepository::new(db.pool().clone());
    let service = Arc::new(PaymentService::new(
        db.pool().clone(),
        payment_repo,
        Arc::new(ParityDecider),
    ));

    let consumer = PaymentConsumer::new(&config, service)?;

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("收到关闭信号，开始优雅关闭...");
        let _ = shutdown_tx.send(true);
    });

    consumer.run(shutdown_rx).await?;

    let _ = relay_handle.await;
    health_handle.abort();
    db.close().await;

    info!("payment-service 已关闭");
    Ok(())
}
