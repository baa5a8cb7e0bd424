//! 支付业务层
//!
//! `process_payment` 消费 `InventoryReserved`：先按订单号短路已有支付
//! （重投幂等），再由决策器给出结果，支付记录与结果事件在同一事务
//! 落库。结果事件发往 `payment_events`，由订单服务推进状态机。

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use shop_shared::error::ShopError;
use shop_shared::events::{InventoryReserved, PaymentFailed, PaymentSucceeded, event_types};
use shop_shared::kafka::topics;
use shop_shared::outbox::{NewOutboxEvent, OutboxRepository};

use crate::decider::PaymentDecider;
use crate::domain::PaymentStatus;
use crate::error::{PaymentError, Result};
use crate::repository::PaymentRepository;

/// 支付服务
pub struct PaymentService {
    pool: PgPool,
    payment_repo: PaymentRepository,
    decider: Arc<dyn PaymentDecider>,
}

impl PaymentService {
    pub fn new(
        pool: PgPool,
        payment_repo: PaymentRepository,
        decider: Arc<dyn PaymentDecider>,
    ) -> Self {
        Self {
            pool,
            payment_repo,
            decider,
        }
    }

    /// 处理一笔库存预留：决策、落库、入队结果事件
    #[instrument(skip(self, event), fields(order_id = event.order_id))]
    pub async fn process_payment(&self, event: &InventoryReserved) -> Result<()> {
        info!(
            order_id = event.order_id,
            user_id = event.user_id,
            amount = event.amount,
            "开始处理支付"
        );

        // 订单已有支付记录则直接短路，保证重投不会产生第二笔支付
        if let Some(existing) = self.payment_repo.get_by_order_id(event.order_id).await? {
            warn!(
                order_id = event.order_id,
                payment_id = existing.id,
                status = %existing.status,
                "订单已存在支付记录，跳过"
            );
            return Ok(());
        }

        let status = self.decider.decide(event.order_id, event.amount);
        // 每次尝试生成全新的交易号
        let transaction_id = Uuid::new_v4().to_string();

        let mut tx = self.pool.begin().await.map_err(ShopError::from)?;

        let payment_id = PaymentRepository::create(
            &mut tx,
            event.order_id,
            event.user_id,
            event.amount,
            status.as_str(),
            &transaction_id,
        )
        .await?;

        let outbox_event = match status {
            PaymentStatus::Paid => {
                let payload = PaymentSucceeded {
                    order_id: event.order_id,
                    payment_id,
                    amount: event.amount,
                    paid_at: Utc::now(),
                    event_id: 0,
                };
                NewOutboxEvent::new(
                    "Payment",
                    event.order_id,
                    event_types::PAYMENT_SUCCEEDED,
                    &payload,
                    topics::PAYMENT_EVENTS,
                )
            }
            PaymentStatus::Fail => {
                let payload = PaymentFailed {
                    order_id: event.order_id,
                    payment_id,
                    amount: event.amount,
                    failed_at: Utc::now(),
                    event_id: 0,
                };
                NewOutboxEvent::new(
                    "Payment",
                    event.order_id,
                    event_types::PAYMENT_FAILED,
                    &payload,
                    topics::PAYMENT_EVENTS,
                )
            }
        }
        .map_err(PaymentError::Shared)?;

        OutboxRepository::save(&mut tx, &outbox_event)
            .await
            .map_err(PaymentError::Shared)?;

        tx.commit().await.map_err(ShopError::from)?;

        info!(
            order_id = event.order_id,
            payment_id,
            status = status.as_str(),
            "支付处理完成"
        );
        Ok(())
    }
}
