//! 支付仓储

use sqlx::{PgConnection, PgPool};

use crate::domain::Payment;
use crate::error::Result;

/// 支付仓储
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 按订单 ID 查找已有支付记录
    ///
    /// 重投的 `InventoryReserved` 依赖此查询短路，返回 None 表示
    /// 该订单尚未有任何支付尝试。
    pub async fn get_by_order_id(&self, order_id: i64) -> Result<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, order_id, user_id, amount, status, transaction_id, created_at, updated_at
            FROM payments
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// 创建支付记录（在调用方事务中），返回支付 ID
    pub async fn create(
        conn: &mut PgConnection,
        order_id: i64,
        user_id: i64,
        amount: i64,
        status: &str,
        transaction_id: &str,
    ) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO payments (order_id, user_id, amount, status, transaction_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(order_id)
        .bind(user_id)
        .bind(amount)
        .bind(status)
        .bind(transaction_id)
        .fetch_one(conn)
        .await?;

        Ok(id)
    }
}
