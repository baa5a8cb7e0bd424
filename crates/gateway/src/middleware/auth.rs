//! 认证与激活校验中间件
//!
//! `auth_middleware` 从 `Authorization: Bearer <token>` 提取 access token，
//! 经熔断器调用身份服务 ValidateUser，把解析出的用户身份写入请求扩展；
//! `activation_middleware` 在其后运行，拒绝未激活账户（403 EMAIL_NOT_VERIFIED）。

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::warn;

use shop_proto::identity::ValidateRequest;

use crate::state::{AppState, rpc_request};

/// 认证通过后写入请求扩展的用户身份
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: i64,
    pub is_activated: bool,
}

/// 从请求头提取 Bearer token
fn bearer_token(request: &Request<Body>) -> Option<&str> {
    let header = request.headers().get("Authorization")?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;
    if scheme != "Bearer" || token.is_empty() {
        return None;
    }
    Some(token)
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": format!("Unauthorized: {message}")})),
    )
        .into_response()
}

/// 认证中间件
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&request) else {
        return unauthorized("missing or malformed Authorization header");
    };
    let token = token.to_string();

    let mut client = state.identity.clone();
    let result = state
        .identity_breaker
        .call(|| async move {
            client
                .validate_user(rpc_request(ValidateRequest { token }))
                .await
        })
        .await;

    let validated = match result {
        Ok(response) => response.into_inner(),
        Err(e) => {
            warn!(error = %e, "token 校验失败");
            return unauthorized("invalid token");
        }
    };

    request.extensions_mut().insert(AuthUser {
        user_id: validated.user_id,
        is_activated: validated.is_activated,
    });

    next.run(request).await
}

/// 激活校验中间件（必须在 auth_middleware 之后）
pub async fn activation_middleware(request: Request<Body>, next: Next) -> Response {
    let Some(user) = request.extensions().get::<AuthUser>().copied() else {
        return unauthorized("missing user context");
    };

    if !user.is_activated {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "Account not activated",
                "code": "EMAIL_NOT_VERIFIED",
            })),
        )
            .into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_header(value: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/api/orders");
        if let Some(v) = value {
            builder = builder.header("Authorization", v);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_bearer_token_extraction() {
        let req = request_with_header(Some("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&req), Some("abc.def.ghi"));
    }

    #[test]
    fn test_missing_header_rejected() {
        let req = request_with_header(None);
        assert_eq!(bearer_token(&req), None);
    }

    #[test]
    fn test_malformed_header_rejected() {
        assert_eq!(bearer_token(&request_with_header(Some("abc"))), None);
        assert_eq!(
            bearer_token(&request_with_header(Some("Basic dXNlcjpwYXNz"))),
            None
        );
        assert_eq!(bearer_token(&request_with_header(Some("Bearer "))), None);
    }
}
