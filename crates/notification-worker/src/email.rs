//! 邮件发送器
//!
//! 通过 `EmailSender` trait 抽象发送行为。当前实现为模拟发送
//! （仅记录日志），便于在无外部依赖的情况下验证消费管道的完整性；
//! 接入真实 SMTP 服务商时只需实现同一 trait。

use async_trait::async_trait;
use tracing::info;

use shop_shared::config::SmtpConfig;
use shop_shared::error::ShopError;

/// 邮件发送器 trait
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// 发送一封邮件
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), ShopError>;
}

/// 模拟 SMTP 发送器
///
/// 持有完整 SMTP 配置但只记录日志，生产环境替换为真实 SMTP 客户端。
pub struct SmtpSender {
    config: SmtpConfig,
}

impl SmtpSender {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EmailSender for SmtpSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), ShopError> {
        info!(
            smtp_host = %self.config.host,
            from = %self.config.from_address,
            to,
            subject,
            body_len = body.len(),
            "模拟发送邮件"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 邮件内容模板
// ---------------------------------------------------------------------------

/// 激活邮件
pub fn activation_email(token: &str) -> (String, String) {
    (
        "请激活您的账户".to_string(),
        format!("点击以下链接激活账户：/auth/activate?token={token}"),
    )
}

/// 密码重置邮件
pub fn forgot_password_email(token: &str) -> (String, String) {
    (
        "密码重置请求".to_string(),
        format!("使用以下令牌重置密码（仅可使用一次）：{token}"),
    )
}

/// 密码已重置确认邮件
pub fn reset_password_email() -> (String, String) {
    (
        "密码已重置".to_string(),
        "您的密码已成功重置。如果这不是您本人的操作，请立即联系客服。".to_string(),
    )
}
