//! 错误映射
//!
//! 下游 gRPC 状态码到 HTTP 状态码的映射表，以及熔断器拒绝的
//! 专用 503 响应。错误响应体统一为 `{"error": "<人类可读信息>"}`。

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tonic::{Code, Status};
use tracing::warn;

use shop_shared::circuit_breaker::CircuitBreakerError;

/// gRPC 状态码 -> HTTP 状态码
pub fn grpc_code_to_http(code: Code) -> StatusCode {
    match code {
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::InvalidArgument => StatusCode::BAD_REQUEST,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::AlreadyExists => StatusCode::CONFLICT,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// 把受熔断器保护的 RPC 调用错误渲染为 HTTP 响应
///
/// 跳闸 -> 503；其余按映射表转换，错误消息透传下游的状态描述。
pub fn rpc_error_response(err: CircuitBreakerError<Status>) -> Response {
    match err {
        CircuitBreakerError::Open { name } => {
            warn!(breaker = %name, "熔断器跳闸，返回 503");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"error": "service temporarily unavailable"})),
            )
                .into_response()
        }
        CircuitBreakerError::Service(status) => {
            let http_code = grpc_code_to_http(status.code());
            warn!(
                grpc_code = ?status.code(),
                http_code = http_code.as_u16(),
                "下游 RPC 调用失败"
            );
            (
                http_code,
                Json(json!({"error": status.message().to_string()})),
            )
                .into_response()
        }
    }
}

/// 参数校验失败的 400 响应
pub fn validation_error_response(message: impl std::fmt::Display) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": message.to_string()})),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grpc_to_http_mapping() {
        assert_eq!(grpc_code_to_http(Code::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            grpc_code_to_http(Code::InvalidArgument),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            grpc_code_to_http(Code::Unauthenticated),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            grpc_code_to_http(Code::PermissionDenied),
            StatusCode::FORBIDDEN
        );
        assert_eq!(grpc_code_to_http(Code::AlreadyExists), StatusCode::CONFLICT);
        assert_eq!(
            grpc_code_to_http(Code::DeadlineExceeded),
            StatusCode::GATEWAY_TIMEOUT
        );
        // 其余一律 500
        assert_eq!(
            grpc_code_to_http(Code::Internal),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            grpc_code_to_http(Code::FailedPrecondition),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            grpc_code_to_http(Code::Unknown),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
