//! 商品目录服务错误类型

use shop_shared::error::ShopError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Shared(#[from] ShopError),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        Self::Shared(ShopError::from(err))
    }
}

impl From<CatalogError> for tonic::Status {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Shared(e) => e.to_grpc_status(),
        }
    }
}
