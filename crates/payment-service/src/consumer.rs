//! Kafka 消费者与事件分发
//!
//! 订阅 `payment_events`。该 topic 上同时流转本服务发出的结果事件
//! （`PaymentSucceeded` / `PaymentFailed`），只处理 `InventoryReserved`，
//! 其余静默忽略。

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info};

use shop_shared::config::AppConfig;
use shop_shared::events::{Envelope, InventoryReserved, event_types};
use shop_shared::kafka::{ConsumerMessage, KafkaConsumer, topics};

use crate::error::{PaymentError, Result};
use crate::service::PaymentService;

/// 支付消费者
pub struct PaymentConsumer {
    consumer: KafkaConsumer,
    service: Arc<PaymentService>,
}

impl PaymentConsumer {
    pub fn new(config: &AppConfig, service: Arc<PaymentService>) -> Result<Self> {
        let consumer = KafkaConsumer::new(&config.kafka).map_err(PaymentError::Shared)?;
        Ok(Self { consumer, service })
    }

    /// 启动消费循环，直到收到 shutdown 信号
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        self.consumer
            .subscribe(&[topics::PAYMENT_EVENTS])
            .map_err(PaymentError::Shared)?;

        info!("支付消费者已启动");

        let service = self.service;

        self.consumer
            .run(shutdown, |msg| {
                let service = service.clone();
                async move {
                    if let Err(e) = handle_message(&service, &msg).await {
                        error!(
                            error = %e,
                            topic = %msg.topic,
                            partition = msg.partition,
                            offset = msg.offset,
                            "处理支付事件失败"
                        );
                    }
                    Ok(())
                }
            })
            .await;

        info!("支付消费者已停止");
        Ok(())
    }
}

/// 处理单条 Kafka 消息
pub async fn handle_message(service: &PaymentService, msg: &ConsumerMessage) -> Result<()> {
    let envelope: Envelope = msg.deserialize_payload().map_err(PaymentError::Shared)?;

    match envelope.event.as_str() {
        event_types::INVENTORY_RESERVED => {
            let event: InventoryReserved = envelope.parse_payload().map_err(PaymentError::Shared)?;
            service.process_payment(&event).await?;
        }
        other => {
            // 本服务自身发出的结果事件也在同一 topic 上
            debug!(event_type = other, "忽略未处理的事件类型");
        }
    }

    Ok(())
}
