//! 身份服务业务层
//!
//! 注册、忘记密码、重置密码会在同一个本地事务里写业务表和发件箱
//! （事务失败则事件一并消失），对应事件由 relay 投递到 `user_events`。
//! 登录/刷新/登出只操作会话表，不产生领域事件。

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use rand::RngCore;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use shop_shared::error::ShopError;
use shop_shared::events::{UserForgotPassword, UserRegistered, UserResetPassword, event_types};
use shop_shared::kafka::topics;
use shop_shared::outbox::{NewOutboxEvent, OutboxRepository};

use crate::error::{IdentityError, Result};
use crate::repository::UserRepository;
use crate::token::{Claims, TokenManager};
use crate::validate;

/// 刷新会话有效期
const SESSION_TTL_DAYS: i64 = 30;

/// 身份服务
pub struct IdentityService {
    pool: PgPool,
    user_repo: UserRepository,
    tokens: TokenManager,
}

/// 注册结果
#[derive(Debug)]
pub struct Registration {
    pub user_id: i64,
    pub activation_token: String,
}

impl IdentityService {
    pub fn new(pool: PgPool, user_repo: UserRepository, tokens: TokenManager) -> Self {
        Self {
            pool,
            user_repo,
            tokens,
        }
    }

    /// 注册新账户
    ///
    /// 用户行与 `UserRegistered` 发件箱事件在同一事务中落库。
    #[instrument(skip(self, password))]
    pub async fn register(&self, email: &str, password: &str) -> Result<Registration> {
        validate::validate_email(email)?;
        validate::validate_password(password)?;

        let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| IdentityError::Shared(ShopError::Internal(format!("密码哈希失败: {e}"))))?;

        let activation_token = one_shot_token();

        let mut tx = self.pool.begin().await.map_err(ShopError::from)?;

        let user_id =
            UserRepository::create(&mut tx, email, &password_hash, &activation_token).await?;

        let event = UserRegistered {
            user_id,
            email: email.to_string(),
            activation_token: activation_token.clone(),
            event_id: 0,
        };
        let outbox_event = NewOutboxEvent::new(
            "User",
            user_id,
            event_types::USER_REGISTERED,
            &event,
            topics::USER_EVENTS,
        )
        .map_err(IdentityError::Shared)?;
        OutboxRepository::save(&mut tx, &outbox_event)
            .await
            .map_err(IdentityError::Shared)?;

        tx.commit().await.map_err(ShopError::from)?;

        info!(user_id, email, "用户注册成功");
        Ok(Registration {
            user_id,
            activation_token,
        })
    }

    /// 登录：校验凭证，签发令牌对并持久化刷新会话
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<(String, String)> {
        let user = self
            .user_repo
            .get_by_email(email)
            .await
            .map_err(|_| IdentityError::InvalidCredentials)?;

        let matches = bcrypt::verify(password, &user.password_hash)
            .map_err(|e| IdentityError::Shared(ShopError::Internal(format!("密码验证失败: {e}"))))?;
        if !matches {
            warn!(email, "登录密码错误");
            return Err(IdentityError::InvalidCredentials);
        }

        let (access, refresh) = self.tokens.generate_tokens(user.id, user.is_activated)?;

        self.user_repo
            .save_session(user.id, &refresh, Utc::now() + Duration::days(SESSION_TTL_DAYS))
            .await?;

        Ok((access, refresh))
    }

    /// 刷新令牌对：旋转会话（删除旧会话、签发并保存新会话）
    ///
    /// 会话已过期时删除该行并返回错误，客户端需要重新登录。
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<(String, String)> {
        self.tokens.validate_refresh(refresh_token)?;

        let session = self.user_repo.find_session_by_token(refresh_token).await?;

        if session.expires_at < Utc::now() {
            self.user_repo.delete_session_by_id(session.id).await?;
            warn!(session_id = session.id, "刷新会话已过期");
            return Err(IdentityError::TokenExpired);
        }

        self.user_repo.delete_session_by_id(session.id).await?;

        let user = self.user_repo.get_by_id(session.user_id).await?;
        let (access, refresh) = self.tokens.generate_tokens(user.id, user.is_activated)?;

        self.user_repo
            .save_session(user.id, &refresh, Utc::now() + Duration::days(SESSION_TTL_DAYS))
            .await?;

        Ok((access, refresh))
    }

    /// 登出：删除刷新会话
    pub async fn logout(&self, refresh_token: &str) -> Result<()> {
        self.user_repo.delete_session_by_token(refresh_token).await
    }

    /// 消费激活令牌
    pub async fn verify(&self, token: &str) -> Result<()> {
        let user_id = self.user_repo.verify_user(token).await?;
        info!(user_id, "账户激活成功");
        Ok(())
    }

    /// 校验 access token（gateway 认证中间件调用）
    pub fn validate(&self, access_token: &str) -> Result<Claims> {
        self.tokens.validate_access(access_token)
    }

    /// 发起忘记密码流程
    ///
    /// 生成一次性令牌写入用户行，并在同一事务内入队
    /// `UserForgotPassword` 事件（通知服务据此发送重置邮件）。
    #[instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        let token = one_shot_token();

        let mut tx = self.pool.begin().await.map_err(ShopError::from)?;

        UserRepository::set_forgot_password_token(&mut tx, email, &token).await?;

        let event = UserForgotPassword {
            email: email.to_string(),
            forgot_password_token: token,
            event_id: 0,
        };
        let outbox_event = NewOutboxEvent::new(
            "User",
            email,
            event_types::USER_FORGOT_PASSWORD,
            &event,
            topics::USER_EVENTS,
        )
        .map_err(IdentityError::Shared)?;
        OutboxRepository::save(&mut tx, &outbox_event)
            .await
            .map_err(IdentityError::Shared)?;

        tx.commit().await.map_err(ShopError::from)?;

        info!(email, "忘记密码令牌已生成");
        Ok(())
    }

    /// 消费重置令牌并更新密码
    #[instrument(skip(self, token, password))]
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<()> {
        validate::validate_password(password)?;

        let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| IdentityError::Shared(ShopError::Internal(format!("密码哈希失败: {e}"))))?;

        let mut tx = self.pool.begin().await.map_err(ShopError::from)?;

        let email = UserRepository::reset_password(&mut tx, token, &password_hash).await?;

        let event = UserResetPassword {
            email: email.clone(),
            event_id: 0,
        };
        let outbox_event = NewOutboxEvent::new(
            "User",
            &email,
            event_types::USER_RESET_PASSWORD,
            &event,
            topics::USER_EVENTS,
        )
        .map_err(IdentityError::Shared)?;
        OutboxRepository::save(&mut tx, &outbox_event)
            .await
            .map_err(IdentityError::Shared)?;

        tx.commit().await.map_err(ShopError::from)?;

        info!(email, "密码重置成功");
        Ok(())
    }

    /// 查询用户信息
    pub async fn get_user_info(&self, user_id: i64) -> Result<(String, bool)> {
        let user = self.user_repo.get_by_id(user_id).await?;
        Ok((user.email, user.is_activated))
    }
}

/// 生成一次性令牌：32 随机字节的 URL-safe base64（无填充）
fn one_shot_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_shot_token_shape() {
        let token = one_shot_token();

        // 32 字节 -> 43 个 base64 字符（无填充）
        assert_eq!(token.len(), 43);
        assert!(!token.contains('='));
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
    }

    #[test]
    fn test_one_shot_tokens_are_unique() {
        let a = one_shot_token();
        let b = one_shot_token();
        assert_ne!(a, b);
    }
}
