//! 发件箱仓储
//!
//! 所有操作都接收 `&mut PgConnection`，由调用方决定事务边界——
//! 业务写入与 `save` 必须共享同一个事务，relay 的一个 tick 也在
//! 单个事务内完成选取与标记。

use sqlx::PgConnection;

use super::event::{MAX_ATTEMPTS, NewOutboxEvent, OutboxEvent};
use crate::error::Result;

/// 发件箱仓储
///
/// 无状态，仅封装 SQL；多个 relay 实例通过行级锁协作。
pub struct OutboxRepository;

impl OutboxRepository {
    /// 在调用方事务中入队一条事件
    ///
    /// 与聚合变更同事务提交，事务失败则事件一并消失。
    pub async fn save(conn: &mut PgConnection, event: &NewOutboxEvent) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO outbox (aggregate_type, aggregate_id, event_type, payload, headers, topic)
            VALUES ($1, $2, $3, $4, '{}'::jsonb, $5)
            RETURNING id
            "#,
        )
        .bind(&event.aggregate_type)
        .bind(&event.aggregate_id)
        .bind(&event.event_type)
        .bind(&event.payload)
        .bind(&event.topic)
        .fetch_one(conn)
        .await?;

        Ok(id)
    }

    /// 选取一批未发布事件，按创建时间升序
    ///
    /// `FOR UPDATE SKIP LOCKED` 跳过其他 relay 实例已锁定的行，
    /// 把 relay 变成一个工作窃取池：N 个实例各取各的切片，
    /// 正常运行下同一事件不会被重复投递。
    /// `attempts < MAX_ATTEMPTS` 过滤掉死信行。
    pub async fn get_unpublished(
        conn: &mut PgConnection,
        batch_size: i64,
    ) -> Result<Vec<OutboxEvent>> {
        let events = sqlx::query_as::<_, OutboxEvent>(
            r#"
            SELECT id, aggregate_type, aggregate_id, event_type, payload, headers,
                   created_at, published_at, attempts, last_error, topic
            FROM outbox
            WHERE published_at IS NULL AND attempts < $1
            ORDER BY created_at ASC
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(MAX_ATTEMPTS)
        .bind(batch_size)
        .fetch_all(conn)
        .await?;

        Ok(events)
    }

    /// 标记事件已发布（仅在 broker 确认后调用）
    pub async fn mark_published(conn: &mut PgConnection, event_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE outbox
            SET published_at = NOW(), last_error = NULL
            WHERE id = $1
            "#,
        )
        .bind(event_id)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// 标记事件投递失败：attempts 加一、记录错误、保持未发布
    pub async fn mark_failed(
        conn: &mut PgConnection,
        event_id: i64,
        error_message: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE outbox
            SET published_at = NULL,
                last_error = $1,
                attempts = attempts + 1
            WHERE id = $2
            "#,
        )
        .bind(error_message)
        .bind(event_id)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// 显式重新入队：清除发布标记与错误，用于运维干预。
    /// 已发布行回到未发布状态只允许走这一条路径。
    pub async fn mark_unpublished(conn: &mut PgConnection, event_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE outbox
            SET published_at = NULL, last_error = NULL
            WHERE id = $1
            "#,
        )
        .bind(event_id)
        .execute(conn)
        .await?;

        Ok(())
    }
}
