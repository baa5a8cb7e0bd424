//! 支付服务错误类型

use shop_shared::error::ShopError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error(transparent)]
    Shared(#[from] ShopError),
}

pub type Result<T> = std::result::Result<T, PaymentError>;

impl From<sqlx::Error> for PaymentError {
    fn from(err: sqlx::Error) -> Self {
        Self::Shared(ShopError::from(err))
    }
}
