//! 通知工作者入口
//!
//! 进程内并行运行：健康检查端点、Kafka 消费循环。
//! 纯消费者，没有发件箱 relay。

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;

use notification_worker::consumer::NotificationConsumer;
use notification_worker::email::SmtpSender;
use notification_worker::service::NotificationService;
use shop_shared::config::AppConfig;
use shop_shared::database::Database;
use shop_shared::health::{shutdown_signal, start_health_server};
use shop_shared::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load("notification-worker")?;
    let _telemetry = telemetry::init(&config.service_name, &config.observability)?;

    info!("Starting notification-worker...");

    let db = Database::connect(&config.database).await?;

    let sender = Arc::new(SmtpSender::new(config.smtp.clone()));
    let service = Arc::new(NotificationService::new(db.pool().clone(), sender));

    let consumer = NotificationConsumer::new(&config, service)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let health_handle = tokio::spawn(start_health_server(config.server.health_port));

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("收到关闭信号，开始优雅关闭...");
        let _ = shutdown_tx.send(true);
    });

    consumer.run(shutdown_rx).await?;

    health_handle.abort();
    db.close().await;

    info!("notification-worker 已关闭");
    Ok(())
}
