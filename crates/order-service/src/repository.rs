//! 订单仓储
//!
//! 状态变迁以条件更新表达（`WHERE id = $1 AND status = $2`），
//! 这是 saga handler 在重投下保持幂等的基础：变迁只会从期望的
//! 前置状态发生一次，重复投递更新 0 行。

use sqlx::{PgConnection, PgPool};
use tracing::warn;

use shop_shared::error::ShopError;

use crate::domain::{NewOrderItem, OrderItem, OrderStatus};
use crate::error::Result;

/// 订单仓储
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 创建订单与订单行（在调用方事务中），返回订单 ID
    pub async fn create_order(
        conn: &mut PgConnection,
        user_id: i64,
        total_sum: i64,
        items: &[NewOrderItem],
    ) -> Result<i64> {
        let order_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (user_id, status, total_sum)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(OrderStatus::New.as_str())
        .bind(total_sum)
        .fetch_one(&mut *conn)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, name, price, quantity)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order_id)
            .bind(item.product_id)
            .bind(&item.name)
            .bind(item.price)
            .bind(item.quantity)
            .execute(&mut *conn)
            .await?;
        }

        Ok(order_id)
    }

    /// 条件状态变迁（在调用方事务中）
    ///
    /// 仅当前状态等于 `from` 时才更新，返回是否真的发生了变迁。
    /// 0 行受影响的含义（已是目标状态/处于其他状态/订单不存在）
    /// 由业务层结合 `get_status` 区分。
    pub async fn transition_status(
        conn: &mut PgConnection,
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $1, updated_at = NOW()
            WHERE id = $2 AND status = $3
            "#,
        )
        .bind(to.as_str())
        .bind(order_id)
        .bind(from.as_str())
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 读取订单当前状态（在调用方事务中）
    pub async fn get_status(conn: &mut PgConnection, order_id: i64) -> Result<OrderStatus> {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(conn)
            .await?;

        let Some(status) = status else {
            warn!(order_id, "订单不存在");
            return Err(ShopError::NotFound {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            }
            .into());
        };

        OrderStatus::parse(&status).ok_or_else(|| {
            ShopError::Internal(format!("订单 {order_id} 存在未知状态: {status}")).into()
        })
    }

    /// 读取订单的全部订单行（在调用方事务中）
    pub async fn get_items(conn: &mut PgConnection, order_id: i64) -> Result<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, product_id, name, price, quantity
            FROM order_items
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_all(conn)
        .await?;

        Ok(items)
    }

    /// 写入用户镜像投影
    ///
    /// 消费 `UserRegistered` 时调用；重复投递触发唯一约束冲突，
    /// 直接跳过即可（投影天然幂等）。
    pub async fn save_user_mirror(&self, user_id: i64, email: &str) -> Result<()> {
        let result = sqlx::query("INSERT INTO users (id, email) VALUES ($1, $2)")
            .bind(user_id)
            .bind(email)
            .execute(&self.pool)
            .await;

        if let Err(e) = result {
            let err = ShopError::from(e);
            if err.is_unique_violation() {
                warn!(user_id, "用户镜像已存在，跳过");
                return Ok(());
            }
            return Err(err.into());
        }

        Ok(())
    }
}
