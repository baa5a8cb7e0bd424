//! 订单服务错误类型

use shop_shared::error::ShopError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error(transparent)]
    Shared(#[from] ShopError),

    #[error("订单必须至少包含一个商品")]
    EmptyOrder,
}

pub type Result<T> = std::result::Result<T, OrderError>;

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        Self::Shared(ShopError::from(err))
    }
}

impl From<OrderError> for tonic::Status {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Shared(e) => e.to_grpc_status(),
            OrderError::EmptyOrder => tonic::Status::invalid_argument(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn test_status_mapping() {
        let status: tonic::Status = OrderError::EmptyOrder.into();
        assert_eq!(status.code(), Code::InvalidArgument);

        // 非法状态变迁是不可重试错误，必须映射为 failed-precondition
        let status: tonic::Status = OrderError::Shared(ShopError::InvalidOrderTransition {
            order_id: 1,
            from: "paid".into(),
            to: "cancelled".into(),
        })
        .into();
        assert_eq!(status.code(), Code::FailedPrecondition);
    }
}
