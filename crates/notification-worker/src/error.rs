//! 通知服务错误类型

use shop_shared::error::ShopError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error(transparent)]
    Shared(#[from] ShopError),

    #[error("邮件发送失败: {0}")]
    SendFailed(String),
}

pub type Result<T> = std::result::Result<T, NotificationError>;
