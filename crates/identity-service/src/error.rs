//! 身份服务错误类型

use shop_shared::error::ShopError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error(transparent)]
    Shared(#[from] ShopError),

    /// 登录失败统一返回此错误，不区分"用户不存在"和"密码错误"，
    /// 避免泄露账户是否存在
    #[error("无效的凭证")]
    InvalidCredentials,

    #[error("令牌已过期")]
    TokenExpired,

    #[error("参数验证失败: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, IdentityError>;

impl From<sqlx::Error> for IdentityError {
    fn from(err: sqlx::Error) -> Self {
        Self::Shared(ShopError::from(err))
    }
}

impl From<IdentityError> for tonic::Status {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Shared(e) => e.to_grpc_status(),
            IdentityError::InvalidCredentials => {
                tonic::Status::unauthenticated(err.to_string())
            }
            IdentityError::TokenExpired => tonic::Status::unauthenticated(err.to_string()),
            IdentityError::Validation(_) => tonic::Status::invalid_argument(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn test_status_mapping() {
        let status: tonic::Status = IdentityError::InvalidCredentials.into();
        assert_eq!(status.code(), Code::Unauthenticated);

        let status: tonic::Status = IdentityError::Validation("密码过短".into()).into();
        assert_eq!(status.code(), Code::InvalidArgument);

        let status: tonic::Status = IdentityError::Shared(ShopError::NotFound {
            entity: "User".into(),
            id: "1".into(),
        })
        .into();
        assert_eq!(status.code(), Code::NotFound);
    }
}
