//! 通知业务层
//!
//! 激活邮件和重置邮件都由一次性令牌驱动，重复发送会把失效令牌
//! 再次投递给用户，因此这两个 handler 走收件箱去重。
//! 密码已重置的确认邮件没有令牌、内容幂等，直接发送。

use std::sync::Arc;

use sqlx::PgPool;
use tracing::{info, instrument};

use shop_shared::error::ShopError;
use shop_shared::events::{UserForgotPassword, UserRegistered, UserResetPassword};
use shop_shared::inbox;

use crate::email::{EmailSender, activation_email, forgot_password_email, reset_password_email};
use crate::error::{NotificationError, Result};

/// 通知服务
pub struct NotificationService {
    pool: PgPool,
    sender: Arc<dyn EmailSender>,
}

impl NotificationService {
    pub fn new(pool: PgPool, sender: Arc<dyn EmailSender>) -> Self {
        Self { pool, sender }
    }

    /// 注册成功 -> 激活邮件（去重）
    #[instrument(skip(self, event), fields(event_id = event.event_id))]
    pub async fn handle_user_registered(&self, event: &UserRegistered) -> Result<()> {
        let sender = self.sender.clone();
        let email = event.email.clone();
        let token = event.activation_token.clone();

        inbox::process_once(&self.pool, event.event_id, move || {
            let sender = sender.clone();
            let email = email.clone();
            let token = token.clone();
            async move {
                let (subject, body) = activation_email(&token);
                sender.send(&email, &subject, &body).await
            }
        })
        .await
        .map_err(NotificationError::Shared)?;

        info!(email = %event.email, "激活邮件流程完成");
        Ok(())
    }

    /// 忘记密码 -> 重置邮件（去重）
    #[instrument(skip(self, event), fields(event_id = event.event_id))]
    pub async fn handle_user_forgot_password(&self, event: &UserForgotPassword) -> Result<()> {
        let sender = self.sender.clone();
        let email = event.email.clone();
        let token = event.forgot_password_token.clone();

        inbox::process_once(&self.pool, event.event_id, move || {
            let sender = sender.clone();
            let email = email.clone();
            let token = token.clone();
            async move {
                let (subject, body) = forgot_password_email(&token);
                sender.send(&email, &subject, &body).await
            }
        })
        .await
        .map_err(NotificationError::Shared)?;

        info!(email = %event.email, "密码重置邮件流程完成");
        Ok(())
    }

    /// 密码已重置 -> 确认邮件（内容幂等，不去重）
    #[instrument(skip(self, event))]
    pub async fn handle_user_reset_password(&self, event: &UserResetPassword) -> Result<()> {
        let (subject, body) = reset_password_email();
        self.sender
            .send(&event.email, &subject, &body)
            .await
            .map_err(|e: ShopError| NotificationError::SendFailed(e.to_string()))?;

        info!(email = %event.email, "密码重置确认邮件已发送");
        Ok(())
    }
}
