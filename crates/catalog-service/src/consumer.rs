//! Kafka 消费者与事件分发
//!
//! 订阅 `order_events` 与 `product_events`，将信封按事件类型路由：
//! - `OrderCreated` -> 库存预留
//! - `OrderCancelled` -> 库存回补（补偿）
//! 其余事件类型记录日志后忽略。
//! 库存不足时 `reserve` 返回错误、事务回滚、不发事件——订单停留在
//! `new` 状态（保留的既有行为，见仓库设计文档）。

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use shop_shared::config::AppConfig;
use shop_shared::events::{Envelope, OrderCancelled, OrderCreated, event_types};
use shop_shared::kafka::{ConsumerMessage, KafkaConsumer, topics};

use crate::error::{CatalogError, Result};
use crate::service::ProductCatalog;

/// 商品目录消费者
pub struct CatalogConsumer {
    consumer: KafkaConsumer,
    catalog: Arc<dyn ProductCatalog>,
}

impl CatalogConsumer {
    pub fn new(config: &AppConfig, catalog: Arc<dyn ProductCatalog>) -> Result<Self> {
        let consumer = KafkaConsumer::new(&config.kafka).map_err(CatalogError::Shared)?;
        Ok(Self { consumer, catalog })
    }

    /// 启动消费循环，直到收到 shutdown 信号
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        self.consumer
            .subscribe(&[topics::ORDER_EVENTS, topics::PRODUCT_EVENTS])
            .map_err(CatalogError::Shared)?;

        info!("商品目录消费者已启动");

        let catalog = self.catalog;

        self.consumer
            .run(shutdown, |msg| {
                let catalog = catalog.clone();
                async move {
                    if let Err(e) = handle_message(catalog.as_ref(), &msg).await {
                        error!(
                            error = %e,
                            topic = %msg.topic,
                            partition = msg.partition,
                            offset = msg.offset,
                            "处理目录事件失败"
                        );
                    }
                    Ok(())
                }
            })
            .await;

        info!("商品目录消费者已停止");
        Ok(())
    }
}

/// 处理单条 Kafka 消息
///
/// 拆分为独立函数而非方法，便于在测试中直接调用而无需构造完整的 Consumer。
pub async fn handle_message(catalog: &dyn ProductCatalog, msg: &ConsumerMessage) -> Result<()> {
    let envelope: Envelope = msg.deserialize_payload().map_err(CatalogError::Shared)?;

    match envelope.event.as_str() {
        event_types::ORDER_CREATED => {
            let event: OrderCreated = envelope
                .parse_payload()
                .map_err(CatalogError::Shared)?;

            info!(
                order_id = event.order_id,
                items = event.items.len(),
                "收到 OrderCreated，开始预留库存"
            );
            catalog.reserve(&event).await?;
        }
        event_types::ORDER_CANCELLED => {
            let event: OrderCancelled = envelope
                .parse_payload()
                .map_err(CatalogError::Shared)?;

            info!(order_id = event.order_id, "收到 OrderCancelled，回补库存");
            catalog.return_stock(&event).await?;
        }
        other => {
            warn!(event_type = other, "忽略未处理的事件类型");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shop_shared::events::OrderCreatedItem;
    use std::collections::HashMap;

    fn make_message(envelope: &Envelope) -> ConsumerMessage {
        ConsumerMessage {
            topic: topics::ORDER_EVENTS.to_string(),
            partition: 0,
            offset: 1,
            key: Some("42".to_string()),
            payload: envelope.to_bytes().expect("序列化测试信封失败"),
            timestamp: None,
            headers: HashMap::new(),
        }
    }

    #[test]
    fn test_order_created_envelope_routing() {
        let event = OrderCreated {
            order_id: 42,
            user_id: 999,
            items: vec![OrderCreatedItem {
                product_id: 1,
                quantity: 1,
            }],
            event_id: 7,
        };
        let envelope = Envelope::wrap(event_types::ORDER_CREATED, &event).unwrap();
        let msg = make_message(&envelope);

        let parsed: Envelope = msg.deserialize_payload().unwrap();
        assert_eq!(parsed.event, "OrderCreated");

        let decoded: OrderCreated = parsed.parse_payload().unwrap();
        assert_eq!(decoded.order_id, 42);
        assert_eq!(decoded.event_id, 7);
    }

    #[test]
    fn test_order_cancelled_envelope_routing() {
        let event = OrderCancelled {
            order_id: 42,
            items: vec![shop_shared::events::OrderCancelledItem {
                product_id: 1,
                name: "测试商品".to_string(),
                price: 5350,
                quantity: 1,
            }],
            event_id: 8,
        };
        let envelope = Envelope::wrap(event_types::ORDER_CANCELLED, &event).unwrap();
        let msg = make_message(&envelope);

        let parsed: Envelope = msg.deserialize_payload().unwrap();
        let decoded: OrderCancelled = parsed.parse_payload().unwrap();
        assert_eq!(decoded.items[0].quantity, 1);
        assert_eq!(decoded.items[0].price, 5350);
    }
}
