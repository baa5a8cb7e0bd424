//! 收件箱去重（inbox deduplication）
//!
//! 带外部副作用的消费者（如发邮件）在一个本地事务内：
//! 1. 向 `processed_events` 插入 event_id；
//! 2. 唯一约束冲突说明该事件已处理过——提交空事务并直接返回成功；
//! 3. 否则在有界重试下执行副作用（3 次尝试、固定 500 毫秒间隔）；
//! 4. 副作用最终失败则整个事务回滚（去重标记不落库），错误上抛给
//!    消费循环触发重投；成功则提交，标记永久生效。
//!
//! 这样在 broker 任意重投下得到"有效一次"的副作用。副作用执行成功到
//! 标记提交之间存在一个崩溃窗口，可能导致副作用重复执行——对这里的
//! 副作用类别（重复一封欢迎邮件）可以接受。

use std::future::Future;
use std::time::Duration;

use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};

use crate::error::{Result, ShopError};
use crate::retry::{RetryPolicy, retry_with_policy};

/// 副作用重试次数（不含首次执行）
const SIDE_EFFECT_RETRIES: u32 = 2;
/// 副作用重试间隔
const SIDE_EFFECT_DELAY: Duration = Duration::from_millis(500);

/// 以 event_id 为幂等键执行一次副作用
///
/// 返回 `Ok(())` 表示副作用已经生效（本次执行或之前某次执行）。
#[instrument(skip(pool, side_effect))]
pub async fn process_once<F, Fut>(pool: &PgPool, event_id: i64, side_effect: F) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query("INSERT INTO processed_events (event_id) VALUES ($1)")
        .bind(event_id)
        .execute(&mut *tx)
        .await;

    if let Err(e) = inserted {
        let err = ShopError::from(e);
        if err.is_unique_violation() {
            info!(event_id, "事件已处理过，跳过");
            tx.commit().await?;
            return Ok(());
        }
        return Err(err);
    }

    // 事务在此处跨越外部调用是刻意为之：标记只有在副作用成功后才可提交
    let policy = RetryPolicy::fixed(SIDE_EFFECT_RETRIES, SIDE_EFFECT_DELAY);
    retry_with_policy(&policy, "inbox_side_effect", |_| true, || side_effect()).await?;

    tx.commit().await?;
    Ok(())
}

/// 在调用方事务中写入去重标记，返回 false 表示该事件已处理过
///
/// 副作用本身就是数据库变更的消费者（如库存回补）使用此变体：
/// 标记与变更共享同一事务，整个 handler 因而对重投严格幂等，
/// 不存在 `process_once` 的崩溃窗口。
pub async fn try_mark_processed(conn: &mut PgConnection, event_id: i64) -> Result<bool> {
    let inserted = sqlx::query("INSERT INTO processed_events (event_id) VALUES ($1)")
        .bind(event_id)
        .execute(conn)
        .await;

    match inserted {
        Ok(_) => Ok(true),
        Err(e) => {
            let err = ShopError::from(e);
            if err.is_unique_violation() {
                info!(event_id, "事件已处理过，跳过");
                return Ok(false);
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_budget_matches_contract() {
        // 首次执行 + 2 次重试 = 共 3 次尝试，间隔固定 500ms
        let policy = RetryPolicy::fixed(SIDE_EFFECT_RETRIES, SIDE_EFFECT_DELAY);
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
    }

    /// 完整的去重流程，需要已初始化 processed_events 表的数据库
    #[tokio::test]
    #[ignore] // 需要数据库连接（DATABASE_URL）
    async fn test_process_once_deduplicates() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicU32, Ordering};

        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPool::connect(&url).await.unwrap();

        // 用时间戳避免与历史测试数据冲突
        let event_id = chrono::Utc::now().timestamp_micros();

        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            process_once(&pool, event_id, move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await
            .unwrap();
        }

        // 三次投递只执行一次副作用
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        sqlx::query("DELETE FROM processed_events WHERE event_id = $1")
            .bind(event_id)
            .execute(&pool)
            .await
            .unwrap();
    }
}
