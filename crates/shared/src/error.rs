//! 统一错误处理模块
//!
//! 定义系统中所有共享的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 系统错误类型
#[derive(Debug, Error)]
pub enum ShopError {
    // ==================== 数据库错误 ====================
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    #[error("记录已存在: {entity} {field}={value}")]
    AlreadyExists {
        entity: String,
        field: String,
        value: String,
    },

    // ==================== 缓存错误 ====================
    #[error("Redis 错误: {0}")]
    Redis(#[from] redis::RedisError),

    // ==================== Kafka 错误 ====================
    #[error("Kafka 错误: {0}")]
    Kafka(String),

    // ==================== 业务逻辑错误 ====================
    #[error("库存不足: product_id={product_id}, 需要 {requested}")]
    InsufficientStock { product_id: i64, requested: i64 },

    #[error("订单状态非法变迁: order_id={order_id}, {from} -> {to}")]
    InvalidOrderTransition {
        order_id: i64,
        from: String,
        to: String,
    },

    // ==================== 验证错误 ====================
    #[error("参数验证失败: {0}")]
    Validation(String),

    #[error("无效的参数: {field} - {message}")]
    InvalidArgument { field: String, message: String },

    // ==================== 权限错误 ====================
    #[error("未授权访问")]
    Unauthorized,

    #[error("权限不足: {operation}")]
    Forbidden { operation: String },

    #[error("无效的令牌")]
    InvalidToken,

    // ==================== 外部服务错误 ====================
    #[error("外部服务错误: {service} - {message}")]
    ExternalService { service: String, message: String },

    #[error("外部服务超时: {service}")]
    ExternalServiceTimeout { service: String },

    // ==================== 通用错误 ====================
    #[error("序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, ShopError>;

impl ShopError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::Redis(_) => "REDIS_ERROR",
            Self::Kafka(_) => "KAFKA_ERROR",
            Self::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            Self::InvalidOrderTransition { .. } => "INVALID_ORDER_TRANSITION",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::ExternalServiceTimeout { .. } => "EXTERNAL_SERVICE_TIMEOUT",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    ///
    /// 瞬时基础设施故障（数据库、Redis、Kafka、下游超时）可以重试，
    /// 业务逻辑错误重试没有意义。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Redis(_)
                | Self::Kafka(_)
                | Self::ExternalService { .. }
                | Self::ExternalServiceTimeout { .. }
        )
    }

    /// 数据库唯一约束冲突（SQLSTATE 23505）
    ///
    /// inbox 去重和用户邮箱唯一性都依赖此判断。
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db_err)) => {
                db_err.code().as_deref() == Some("23505")
            }
            _ => false,
        }
    }

    /// 转换为 gRPC 状态码
    pub fn to_grpc_status(&self) -> tonic::Status {
        use tonic::{Code, Status};

        let code = match self {
            Self::NotFound { .. } => Code::NotFound,
            Self::AlreadyExists { .. } => Code::AlreadyExists,
            Self::Validation(_) | Self::InvalidArgument { .. } => Code::InvalidArgument,
            Self::Unauthorized | Self::InvalidToken => Code::Unauthenticated,
            Self::Forbidden { .. } => Code::PermissionDenied,
            Self::InsufficientStock { .. } | Self::InvalidOrderTransition { .. } => {
                Code::FailedPrecondition
            }
            Self::ExternalServiceTimeout { .. } => Code::DeadlineExceeded,
            _ => Code::Internal,
        };

        Status::new(code, self.to_string())
    }
}

impl From<ShopError> for tonic::Status {
    fn from(err: ShopError) -> Self {
        err.to_grpc_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = ShopError::NotFound {
            entity: "Order".to_string(),
            id: "123".to_string(),
        };
        assert_eq!(err.code(), "NOT_FOUND");

        let err = ShopError::InsufficientStock {
            product_id: 1,
            requested: 5,
        };
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");
    }

    #[test]
    fn test_is_retryable() {
        let db_err = ShopError::Database(sqlx::Error::PoolTimedOut);
        assert!(db_err.is_retryable());

        let kafka_err = ShopError::Kafka("broker unreachable".to_string());
        assert!(kafka_err.is_retryable());

        let not_found = ShopError::NotFound {
            entity: "Product".to_string(),
            id: "42".to_string(),
        };
        assert!(!not_found.is_retryable());

        let transition = ShopError::InvalidOrderTransition {
            order_id: 1,
            from: "paid".to_string(),
            to: "cancelled".to_string(),
        };
        assert!(!transition.is_retryable());
    }

    #[test]
    fn test_grpc_status_mapping() {
        use tonic::Code;

        let cases: Vec<(ShopError, Code)> = vec![
            (
                ShopError::NotFound {
                    entity: "Order".into(),
                    id: "1".into(),
                },
                Code::NotFound,
            ),
            (
                ShopError::AlreadyExists {
                    entity: "User".into(),
                    field: "email".into(),
                    value: "a@b.c".into(),
                },
                Code::AlreadyExists,
            ),
            (
                ShopError::Validation("password too short".into()),
                Code::InvalidArgument,
            ),
            (ShopError::Unauthorized, Code::Unauthenticated),
            (ShopError::InvalidToken, Code::Unauthenticated),
            (
                ShopError::InvalidOrderTransition {
                    order_id: 7,
                    from: "paid".into(),
                    to: "cancelled".into(),
                },
                Code::FailedPrecondition,
            ),
            (
                ShopError::InsufficientStock {
                    product_id: 1,
                    requested: 3,
                },
                Code::FailedPrecondition,
            ),
            (
                ShopError::ExternalServiceTimeout {
                    service: "identity".into(),
                },
                Code::DeadlineExceeded,
            ),
            (ShopError::Internal("boom".into()), Code::Internal),
        ];

        for (err, expected) in cases {
            assert_eq!(err.to_grpc_status().code(), expected, "{err}");
        }
    }

    #[test]
    fn test_unique_violation_detection() {
        // 非数据库错误一定不是唯一约束冲突
        assert!(!ShopError::Internal("x".into()).is_unique_violation());
        assert!(!ShopError::Database(sqlx::Error::PoolTimedOut).is_unique_violation());
    }
}
