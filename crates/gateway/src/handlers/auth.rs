//! 认证相关路由处理器
//!
//! 全部是身份服务 RPC 的薄封装：参数校验 -> 经熔断器调用 -> 映射响应。

use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use shop_proto::identity::{
    ForgotPasswordRequest, LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest,
    ResetPasswordRequest, UserInfoRequest, VerifyRequest,
};

use crate::error::{rpc_error_response, validation_error_response};
use crate::middleware::auth::AuthUser;
use crate::state::{AppState, rpc_request};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(email(message = "邮箱格式无效"))]
    pub email: String,
    #[validate(length(min = 8, message = "密码长度不能少于 8 个字符"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email(message = "邮箱格式无效"))]
    pub email: String,
    #[validate(length(min = 1, message = "密码不能为空"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshInput {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordInput {
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordInput {
    pub token: String,
    #[validate(length(min = 8, message = "密码长度不能少于 8 个字符"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ActivateQuery {
    pub token: String,
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> Response {
    if let Err(e) = input.validate() {
        return validation_error_response(e);
    }

    let mut client = state.identity.clone();
    let result = state
        .identity_breaker
        .call(|| async move {
            client
                .register(rpc_request(RegisterRequest {
                    email: input.email,
                    password: input.password,
                }))
                .await
        })
        .await;

    match result {
        Ok(response) => {
            let r = response.into_inner();
            (
                StatusCode::CREATED,
                Json(json!({"user_id": r.user_id})),
            )
                .into_response()
        }
        Err(e) => rpc_error_response(e),
    }
}

/// POST /auth/login
pub async fn login(State(state): State<AppState>, Json(input): Json<LoginInput>) -> Response {
    if let Err(e) = input.validate() {
        return validation_error_response(e);
    }

    let mut client = state.identity.clone();
    let result = state
        .identity_breaker
        .call(|| async move {
            client
                .login(rpc_request(LoginRequest {
                    email: input.email,
                    password: input.password,
                }))
                .await
        })
        .await;

    match result {
        Ok(response) => {
            let r = response.into_inner();
            Json(json!({
                "access_token": r.access_token,
                "refresh_token": r.refresh_token,
            }))
            .into_response()
        }
        Err(e) => rpc_error_response(e),
    }
}

/// POST /auth/refresh
pub async fn refresh(State(state): State<AppState>, Json(input): Json<RefreshInput>) -> Response {
    let mut client = state.identity.clone();
    let result = state
        .identity_breaker
        .call(|| async move {
            client
                .refresh(rpc_request(RefreshRequest {
                    refresh_token: input.refresh_token,
                }))
                .await
        })
        .await;

    match result {
        Ok(response) => {
            let r = response.into_inner();
            Json(json!({
                "access_token": r.access_token,
                "refresh_token": r.refresh_token,
            }))
            .into_response()
        }
        Err(e) => rpc_error_response(e),
    }
}

/// POST /auth/logout
pub async fn logout(State(state): State<AppState>, Json(input): Json<RefreshInput>) -> Response {
    let mut client = state.identity.clone();
    let result = state
        .identity_breaker
        .call(|| async move {
            client
                .logout(rpc_request(LogoutRequest {
                    refresh_token: input.refresh_token,
                }))
                .await
        })
        .await;

    match result {
        Ok(_) => Json(json!({"success": true})).into_response(),
        Err(e) => rpc_error_response(e),
    }
}

/// GET /auth/activate?token=
pub async fn activate(
    State(state): State<AppState>,
    Query(query): Query<ActivateQuery>,
) -> Response {
    let mut client = state.identity.clone();
    let result = state
        .identity_breaker
        .call(|| async move {
            client
                .verify_user(rpc_request(VerifyRequest { token: query.token }))
                .await
        })
        .await;

    match result {
        Ok(_) => Json(json!({"success": true})).into_response(),
        Err(e) => rpc_error_response(e),
    }
}

/// POST /auth/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(input): Json<ForgotPasswordInput>,
) -> Response {
    let mut client = state.identity.clone();
    let result = state
        .identity_breaker
        .call(|| async move {
            client
                .forgot_password(rpc_request(ForgotPasswordRequest { email: input.email }))
                .await
        })
        .await;

    match result {
        Ok(response) => {
            let r = response.into_inner();
            Json(json!({"success": r.success, "message": r.message})).into_response()
        }
        Err(e) => rpc_error_response(e),
    }
}

/// POST /auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(input): Json<ResetPasswordInput>,
) -> Response {
    if let Err(e) = input.validate() {
        return validation_error_response(e);
    }

    let mut client = state.identity.clone();
    let result = state
        .identity_breaker
        .call(|| async move {
            client
                .reset_password(rpc_request(ResetPasswordRequest {
                    token: input.token,
                    password: input.password,
                }))
                .await
        })
        .await;

    match result {
        Ok(_) => Json(json!({"success": true})).into_response(),
        Err(e) => rpc_error_response(e),
    }
}

/// GET /api/me
pub async fn get_me(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> Response {
    let mut client = state.identity.clone();
    let result = state
        .identity_breaker
        .call(|| async move {
            client
                .get_user_info(rpc_request(UserInfoRequest {
                    user_id: user.user_id,
                }))
                .await
        })
        .await;

    match result {
        Ok(response) => {
            let r = response.into_inner();
            Json(json!({
                "user_id": r.user_id,
                "email": r.email,
                "is_activated": r.is_activated,
            }))
            .into_response()
        }
        Err(e) => rpc_error_response(e),
    }
}
