//! 用户与会话仓储

use sqlx::{PgConnection, PgPool};
use tracing::warn;

use shop_shared::error::ShopError;

use crate::domain::{RefreshSession, User};
use crate::error::Result;

/// 用户仓储
///
/// 事务内写操作接收 `&mut PgConnection` 由调用方控制事务边界，
/// 纯读操作直接走连接池。
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==================== 查询操作 ====================

    /// 按邮箱查找用户
    pub async fn get_by_email(&self, email: &str) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, activation_token, forgot_password_token,
                   is_activated, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        user.ok_or_else(|| {
            ShopError::NotFound {
                entity: "User".to_string(),
                id: email.to_string(),
            }
            .into()
        })
    }

    /// 按 ID 查找用户
    pub async fn get_by_id(&self, id: i64) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, activation_token, forgot_password_token,
                   is_activated, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        user.ok_or_else(|| {
            ShopError::NotFound {
                entity: "User".to_string(),
                id: id.to_string(),
            }
            .into()
        })
    }

    // ==================== 写入操作 ====================

    /// 创建用户（在调用方事务中）
    ///
    /// 邮箱唯一约束冲突映射为 AlreadyExists。
    pub async fn create(
        conn: &mut PgConnection,
        email: &str,
        password_hash: &str,
        activation_token: &str,
    ) -> Result<i64> {
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (email, password_hash, activation_token, forgot_password_token, is_activated)
            VALUES ($1, $2, $3, '', false)
            RETURNING id
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(activation_token)
        .fetch_one(conn)
        .await;

        match result {
            Ok(id) => Ok(id),
            Err(e) => {
                let err = ShopError::from(e);
                if err.is_unique_violation() {
                    warn!(email, "注册邮箱已存在");
                    return Err(ShopError::AlreadyExists {
                        entity: "User".to_string(),
                        field: "email".to_string(),
                        value: email.to_string(),
                    }
                    .into());
                }
                Err(err.into())
            }
        }
    }

    /// 消费激活令牌
    ///
    /// 一次性语义：命中即把令牌置空；`<> ''` 守卫防止空令牌匹配
    /// 已消费的行。0 行受影响说明令牌无效或已被使用。
    pub async fn verify_user(&self, token: &str) -> Result<i64> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET is_activated = true, activation_token = '', updated_at = NOW()
            WHERE activation_token = $1 AND activation_token <> ''
            RETURNING id
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        id.ok_or_else(|| ShopError::InvalidToken.into())
    }

    /// 写入忘记密码令牌（在调用方事务中）
    pub async fn set_forgot_password_token(
        conn: &mut PgConnection,
        email: &str,
        token: &str,
    ) -> Result<i64> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET forgot_password_token = $1, updated_at = NOW()
            WHERE email = $2
            RETURNING id
            "#,
        )
        .bind(token)
        .bind(email)
        .fetch_optional(conn)
        .await?;

        id.ok_or_else(|| {
            ShopError::NotFound {
                entity: "User".to_string(),
                id: email.to_string(),
            }
            .into()
        })
    }

    /// 消费忘记密码令牌并更新密码（在调用方事务中），返回用户邮箱
    ///
    /// 与激活令牌相同的一次性语义。
    pub async fn reset_password(
        conn: &mut PgConnection,
        token: &str,
        new_password_hash: &str,
    ) -> Result<String> {
        let email: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET password_hash = $1, forgot_password_token = '', updated_at = NOW()
            WHERE forgot_password_token = $2 AND forgot_password_token <> ''
            RETURNING email
            "#,
        )
        .bind(new_password_hash)
        .bind(token)
        .fetch_optional(conn)
        .await?;

        email.ok_or_else(|| ShopError::InvalidToken.into())
    }

    // ==================== 会话操作 ====================

    /// 保存刷新会话
    pub async fn save_session(
        &self,
        user_id: i64,
        token: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO refresh_sessions (user_id, token, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// 按令牌查找会话
    pub async fn find_session_by_token(&self, token: &str) -> Result<RefreshSession> {
        let session = sqlx::query_as::<_, RefreshSession>(
            r#"
            SELECT id, user_id, token, expires_at, created_at
            FROM refresh_sessions
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        session.ok_or_else(|| {
            ShopError::NotFound {
                entity: "RefreshSession".to_string(),
                id: "<token>".to_string(),
            }
            .into()
        })
    }

    /// 按 ID 删除会话
    pub async fn delete_session_by_id(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM refresh_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// 按令牌删除会话（登出）
    pub async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM refresh_sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
