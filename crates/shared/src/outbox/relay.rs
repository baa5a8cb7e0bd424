//! 发件箱 relay 后台任务
//!
//! 每个服务进程运行一个 relay：固定间隔醒来，在单个事务内选取一批
//! 未发布事件（行级锁跳过其他实例），逐条投递到 Kafka 并更新标记，
//! 最后一起提交。只有拿到 broker 确认的事件才会被标记为已发布；
//! 若提交在投递成功之后失败，下个 tick 会重新投递——重复投递由
//! 消费侧幂等机制兜底。

use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::event::OutboxEvent;
use super::repository::OutboxRepository;
use crate::error::ShopError;
use crate::kafka::KafkaProducer;
use crate::telemetry;

/// relay 配置
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// 两次排空之间的间隔
    pub interval: Duration,
    /// 单个 tick 最多处理的事件数
    pub batch_size: i64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            batch_size: 50,
        }
    }
}

/// 发件箱 relay
pub struct OutboxRelay {
    pool: PgPool,
    producer: KafkaProducer,
    config: RelayConfig,
}

impl OutboxRelay {
    pub fn new(pool: PgPool, producer: KafkaProducer) -> Self {
        Self {
            pool,
            producer,
            config: RelayConfig::default(),
        }
    }

    pub fn with_config(pool: PgPool, producer: KafkaProducer, config: RelayConfig) -> Self {
        Self {
            pool,
            producer,
            config,
        }
    }

    /// 运行 relay 循环，直到收到 shutdown 信号
    ///
    /// tick 内的任何意外错误只记录日志，事务随错误路径丢弃时自动回滚，
    /// 下个 tick 重试整批。
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            "发件箱 relay 已启动"
        );

        let mut ticker = tokio::time::interval(self.config.interval);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("收到关闭信号，发件箱 relay 退出");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.process_batch().await {
                        error!(error = %e, "发件箱批次处理失败，下个周期重试");
                    }
                }
            }
        }
    }

    /// 处理一批事件：单事务内选取、投递、标记、提交
    async fn process_batch(&self) -> Result<(), ShopError> {
        let mut tx = self.pool.begin().await?;

        let events = OutboxRepository::get_unpublished(&mut tx, self.config.batch_size).await?;

        if events.is_empty() {
            return Ok(());
        }

        debug!(count = events.len(), "开始处理发件箱事件");

        for event in &events {
            self.publish_one(&mut tx, event).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// 投递单条事件并更新其标记
    ///
    /// 标记更新失败是数据库层故障，直接让整个 tick 回滚；
    /// 投递失败只影响该行（attempts+1），不阻塞批内其他事件。
    async fn publish_one(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        event: &OutboxEvent,
    ) -> Result<(), ShopError> {
        // 解析信封并注入 event_id；失败即 poison，行由 MAX_ATTEMPTS 封顶
        let wire = match event.wire_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    event_id = event.id,
                    event_type = %event.event_type,
                    error = %e,
                    "事件载荷解析失败，标记为投递失败"
                );
                metrics::counter!("outbox_events_failed_total").increment(1);
                OutboxRepository::mark_failed(&mut *tx, event.id, &e.to_string()).await?;
                return Ok(());
            }
        };

        let mut headers = std::collections::HashMap::new();
        telemetry::inject_trace_context(&mut headers);

        match self
            .producer
            .send(&event.topic, &event.aggregate_id, &wire, &headers)
            .await
        {
            Ok(_) => {
                OutboxRepository::mark_published(&mut *tx, event.id).await?;
                metrics::counter!("outbox_events_published_total").increment(1);
                debug!(
                    event_id = event.id,
                    event_type = %event.event_type,
                    topic = %event.topic,
                    "发件箱事件已发布"
                );
            }
            Err(e) => {
                error!(
                    event_id = event.id,
                    event_type = %event.event_type,
                    attempts = event.attempts,
                    error = %e,
                    "发件箱事件投递失败，保留待重试"
                );
                metrics::counter!("outbox_events_failed_total").increment(1);
                OutboxRepository::mark_failed(&mut *tx, event.id, &e.to_string()).await?;
            }
        }

        Ok(())
    }
}
