//! 身份域模型

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// 用户账户
///
/// `activation_token` 与 `forgot_password_token` 都是一次性令牌，
/// 消费后置空字符串。
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub activation_token: String,
    pub forgot_password_token: String,
    pub is_activated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 刷新会话
///
/// token 对存储层不透明；过期会话在 refresh 时删除。
#[derive(Debug, Clone, FromRow)]
pub struct RefreshSession {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
