//! Kafka 消费者与事件分发
//!
//! 订阅 `user_events`（用户镜像投影）与 `payment_events`（支付结果），
//! 将信封按事件类型路由到订单业务层。`payment_events` 上也会出现
//! 本服务不关心的事件类型（如 `InventoryReserved`），直接忽略。

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info};

use shop_shared::config::AppConfig;
use shop_shared::events::{Envelope, PaymentFailed, PaymentSucceeded, UserRegistered, event_types};
use shop_shared::kafka::{ConsumerMessage, KafkaConsumer, topics};

use crate::error::{OrderError, Result};
use crate::service::OrderService;

/// 订单消费者
pub struct OrderConsumer {
    consumer: KafkaConsumer,
    service: Arc<OrderService>,
}

impl OrderConsumer {
    pub fn new(config: &AppConfig, service: Arc<OrderService>) -> Result<Self> {
        let consumer = KafkaConsumer::new(&config.kafka).map_err(OrderError::Shared)?;
        Ok(Self { consumer, service })
    }

    /// 启动消费循环，直到收到 shutdown 信号
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        self.consumer
            .subscribe(&[topics::USER_EVENTS, topics::PAYMENT_EVENTS])
            .map_err(OrderError::Shared)?;

        info!("订单消费者已启动");

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
                            "处理订单事件失败"
                        );
                    }
                    Ok(())
                }
            })
            .await;

        info!("订单消费者已停止");
        Ok(())
    }
}

/// 处理单条 Kafka 消息
///
/// 拆分为独立函数而非方法，便于在测试中直接调用而无需构造完整的 Consumer。
pub async fn handle_message(service: &OrderService, msg: &ConsumerMessage) -> Result<()> {
    let envelope: Envelope = msg.deserialize_payload().map_err(OrderError::Shared)?;

    match envelope.event.as_str() {
        event_types::USER_REGISTERED => {
            let event: UserRegistered = envelope.parse_payload().map_err(OrderError::Shared)?;
            service.handle_user_registered(&event).await?;
        }
        event_types::PAYMENT_SUCCEEDED => {
            let event: PaymentSucceeded = envelope.parse_payload().map_err(OrderError::Shared)?;
            service.handle_payment_succeeded(&event).await?;
        }
        event_types::PAYMENT_FAILED => {
            let event: PaymentFailed = envelope.parse_payload().map_err(OrderError::Shared)?;
            service.handle_payment_failed(&event).await?;
        }
        other => {
            debug!(event_type = other, "忽略未处理的事件类型");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn make_message(topic: &str, envelope: &Envelope) -> ConsumerMessage {
        ConsumerMessage {
            topic: topic.to_string(),
            partition: 0,
            offset: 1,
            key: None,
            payload: envelope.to_bytes().expect("序列化测试信封失败"),
            timestamp: Some(Utc::now().timestamp_millis()),
            headers: HashMap::new(),
        }
    }

    #[test]
    fn test_payment_failed_envelope_decodes() {
        let event = PaymentFailed {
            order_id: 42,
            payment_id: 7,
            amount: 5350,
            failed_at: Utc::now(),
            event_id: 3,
        };
        let envelope = Envelope::wrap(event_types::PAYMENT_FAILED, &event).unwrap();
        let msg = make_message(topics::PAYMENT_EVENTS, &envelope);

        let parsed: Envelope = msg.deserialize_payload().unwrap();
        assert_eq!(parsed.event, "PaymentFailed");

        let decoded: PaymentFailed = parsed.parse_payload().unwrap();
        assert_eq!(decoded.order_id, 42);
        assert_eq!(decoded.amount, 5350);
    }

    #[test]
    fn test_user_registered_envelope_decodes() {
        let event = UserRegistered {
            user_id: 999,
            email: "test@example.com".to_string(),
            activation_token: "tok".to_string(),
            event_id: 1,
        };
        let envelope = Envelope::wrap(event_types::USER_REGISTERED, &event).unwrap();
        let msg = make_message(topics::USER_EVENTS, &envelope);

        let parsed: Envelope = msg.deserialize_payload().unwrap();
        let decoded: UserRegistered = parsed.parse_payload().unwrap();
        assert_eq!(decoded.user_id, 999);
        assert_eq!(decoded.email, "test@example.com");
    }
}
