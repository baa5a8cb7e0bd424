//! 路由注册
//!
//! `/auth/*` 为公开端点；`/api/*` 先过认证中间件（ValidateUser），
//! 再过激活校验中间件。限流中间件挂在最外层，对所有路由生效。

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, post};

use crate::handlers::{auth, order, product};
use crate::middleware::auth::{activation_middleware, auth_middleware};
use crate::middleware::rate_limit::rate_limit_middleware;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/activate", get(auth::activate))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password));

    let api_routes = Router::new()
        .route("/me", get(auth::get_me))
        .route("/products", post(product::create_product))
        .route("/products", get(product::list_products))
        .route("/products/{id}", get(product::get_product))
        .route("/products/{id}", delete(product::delete_product))
        .route(
            "/products/decrease-stock/{id}",
            post(product::decrease_stock),
        )
        .route("/orders", post(order::create_order))
        // 中间件自内向外执行：先认证，后激活校验
        .layer(from_fn(activation_middleware))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/auth", auth_routes)
        .nest("/api", api_routes)
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .with_state(state)
}
