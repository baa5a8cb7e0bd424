//! 订单业务层
//!
//! saga 的发起与收尾都在这里：
//! - `create_order`：订单、订单行与 `OrderCreated` 发件箱事件同事务落库。
//! - `handle_payment_succeeded`：条件变迁 new -> paid。
//! - `handle_payment_failed`：条件变迁 new -> cancelled，并同事务发出
//!   `OrderCancelled`（携带订单行）驱动库存补偿。
//!
//! 两个支付结果 handler 对重投幂等：变迁是条件更新，重复事件更新
//! 0 行后按当前状态区分"已是终态（静默成功）"与"非法变迁（报错）"。

use sqlx::PgPool;
use tracing::{info, instrument, warn};

use shop_shared::error::ShopError;
use shop_shared::events::{
    OrderCancelled, OrderCancelledItem, OrderCreated, OrderCreatedItem, PaymentFailed,
    PaymentSucceeded, UserRegistered, event_types,
};
use shop_shared::kafka::topics;
use shop_shared::outbox::{NewOutboxEvent, OutboxRepository};

use crate::domain::{NewOrderItem, OrderStatus, calculate_total};
use crate::error::{OrderError, Result};
use crate::repository::OrderRepository;

/// 订单服务
pub struct OrderService {
    pool: PgPool,
    order_repo: OrderRepository,
}

impl OrderService {
    pub fn new(pool: PgPool, order_repo: OrderRepository) -> Self {
        Self { pool, order_repo }
    }

    /// 创建订单（saga 第一步）
    #[instrument(skip(self, items))]
    pub async fn create_order(&self, user_id: i64, items: Vec<NewOrderItem>) -> Result<i64> {
        if items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }
        for item in &items {
            if item.quantity < 1 {
                return Err(ShopError::InvalidArgument {
                    field: "quantity".to_string(),
                    message: format!("商品 {} 的数量必须至少为 1", item.product_id),
                }
                .into());
            }
        }

        let total_sum = calculate_total(&items);

        let mut tx = self.pool.begin().await.map_err(ShopError::from)?;

        let order_id = OrderRepository::create_order(&mut tx, user_id, total_sum, &items).await?;

        let event = OrderCreated {
            order_id,
            user_id,
            items: items
                .iter()
                .map(|item| OrderCreatedItem {
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .collect(),
            event_id: 0,
        };
        let outbox_event = NewOutboxEvent::new(
            "Order",
            order_id,
            event_types::ORDER_CREATED,
            &event,
            topics::ORDER_EVENTS,
        )
        .map_err(OrderError::Shared)?;
        OutboxRepository::save(&mut tx, &outbox_event)
            .await
            .map_err(OrderError::Shared)?;

        tx.commit().await.map_err(ShopError::from)?;

        info!(order_id, user_id, total_sum, "订单创建成功");
        Ok(order_id)
    }

    /// 支付成功：订单 new -> paid
    #[instrument(skip(self, event), fields(order_id = event.order_id))]
    pub async fn handle_payment_succeeded(&self, event: &PaymentSucceeded) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(ShopError::from)?;

        let transitioned =
            OrderRepository::transition_status(&mut tx, event.order_id, OrderStatus::New, OrderStatus::Paid)
                .await?;

        if !transitioned {
            let current = OrderRepository::get_status(&mut tx, event.order_id).await?;
            tx.commit().await.map_err(ShopError::from)?;

            if current == OrderStatus::Paid {
                // 重复投递，幂等成功
                return Ok(());
            }
            return Err(ShopError::InvalidOrderTransition {
                order_id: event.order_id,
                from: current.to_string(),
                to: OrderStatus::Paid.to_string(),
            }
            .into());
        }

        tx.commit().await.map_err(ShopError::from)?;

        info!(order_id = event.order_id, "订单已支付");
        Ok(())
    }

    /// 支付失败补偿：订单 new -> cancelled 并发出 `OrderCancelled`
    ///
    /// 订单已处于 `paid` 时取消被禁止，返回不可重试的非法变迁错误。
    #[instrument(skip(self, event), fields(order_id = event.order_id))]
    pub async fn handle_payment_failed(&self, event: &PaymentFailed) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(ShopError::from)?;

        let transitioned = OrderRepository::transition_status(
            &mut tx,
            event.order_id,
            OrderStatus::New,
            OrderStatus::Cancelled,
        )
        .await?;

        if !transitioned {
            let current = OrderRepository::get_status(&mut tx, event.order_id).await?;
            tx.commit().await.map_err(ShopError::from)?;

            if current == OrderStatus::Cancelled {
                // 重复投递，补偿事件已在首次处理时入队
                return Ok(());
            }
            warn!(
                order_id = event.order_id,
                current = %current,
                "取消被拒绝：订单已离开 new 状态"
            );
            return Err(ShopError::InvalidOrderTransition {
                order_id: event.order_id,
                from: current.to_string(),
                to: OrderStatus::Cancelled.to_string(),
            }
            .into());
        }

        let items = OrderRepository::get_items(&mut tx, event.order_id).await?;

        let cancelled = OrderCancelled {
            order_id: event.order_id,
            items: items
                .iter()
                .map(|item| OrderCancelledItem {
                    product_id: item.product_id,
                    name: item.name.clone(),
                    price: item.price,
                    quantity: item.quantity,
                })
                .collect(),
            event_id: 0,
        };
        let outbox_event = NewOutboxEvent::new(
            "Order",
            event.order_id,
            event_types::ORDER_CANCELLED,
            &cancelled,
            topics::ORDER_EVENTS,
        )
        .map_err(OrderError::Shared)?;
        OutboxRepository::save(&mut tx, &outbox_event)
            .await
            .map_err(OrderError::Shared)?;

        tx.commit().await.map_err(ShopError::from)?;

        info!(order_id = event.order_id, "订单已取消，补偿事件已入队");
        Ok(())
    }

    /// 维护用户镜像投影
    #[instrument(skip(self, event), fields(user_id = event.user_id))]
    pub async fn handle_user_registered(&self, event: &UserRegistered) -> Result<()> {
        self.order_repo
            .save_user_mirror(event.user_id, &event.email)
            .await?;

        info!(user_id = event.user_id, "用户镜像已更新");
        Ok(())
    }
}
