//! 订单相关路由处理器

use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use shop_proto::order::{CreateOrderRequest, OrderItemInput};

use crate::error::{rpc_error_response, validation_error_response};
use crate::middleware::auth::AuthUser;
use crate::state::{AppState, rpc_request};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct OrderItemDto {
    pub product_id: i64,
    #[validate(length(min = 1, message = "商品名称不能为空"))]
    pub name: String,
    #[validate(range(min = 0, message = "价格不能为负数"))]
    pub price: i64,
    #[validate(range(min = 1, message = "数量必须至少为 1"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderInput {
    #[validate(length(min = 1, message = "订单必须至少包含一个商品"), nested)]
    pub items: Vec<OrderItemDto>,
}

/// POST /api/orders
///
/// 下单用户取自认证中间件写入的请求扩展，客户端不能替他人下单。
pub async fn create_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<CreateOrderInput>,
) -> Response {
    if let Err(e) = input.validate() {
        return validation_error_response(e);
    }

    let items: Vec<OrderItemInput> = input
        .items
        .into_iter()
        .map(|item| OrderItemInput {
            product_id: item.product_id,
            name: item.name,
            price: item.price,
            quantity: item.quantity,
        })
        .collect();

    let mut client = state.order.clone();
    let result = state
        .order_breaker
        .call(|| async move {
            client
                .create_order(rpc_request(CreateOrderRequest {
                    user_id: user.user_id,
                    items,
                }))
                .await
        })
        .await;

    match result {
        Ok(response) => {
            let r = response.into_inner();
            (
                StatusCode::CREATED,
                Json(json!({"order_id": r.order_id})),
            )
                .into_response()
        }
        Err(e) => rpc_error_response(e),
    }
}
