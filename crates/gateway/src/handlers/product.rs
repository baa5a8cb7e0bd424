//! 商品相关路由处理器

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use shop_proto::catalog::{
    CreateProductRequest, DecreaseStockRequest, DeleteProductRequest, GetProductRequest,
    ListProductsRequest, Product,
};

use crate::error::{rpc_error_response, validation_error_response};
use crate::state::{AppState, rpc_request};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, message = "商品名称不能为空"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0, message = "价格不能为负数"))]
    pub price: i64,
    #[validate(range(min = 0, message = "库存不能为负数"))]
    pub stock_quantity: i64,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub search: String,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize, Validate)]
pub struct DecreaseStockInput {
    #[validate(range(min = 1, message = "扣减数量必须为正数"))]
    pub quantity: i64,
}

fn product_json(p: Product) -> serde_json::Value {
    json!({
        "id": p.id,
        "name": p.name,
        "description": p.description,
        "price": p.price,
        "stock_quantity": p.stock_quantity,
        "image_url": p.image_url,
        "category": p.category,
    })
}

/// POST /api/products
pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<CreateProductInput>,
) -> Response {
    if let Err(e) = input.validate() {
        return validation_error_response(e);
    }

    let mut client = state.catalog.clone();
    let result = state
        .catalog_breaker
        .call(|| async move {
            client
                .create_product(rpc_request(CreateProductRequest {
                    name: input.name,
                    description: input.description,
                    price: input.price,
                    stock_quantity: input.stock_quantity,
                    image_url: input.image_url,
                    category: input.category,
                }))
                .await
        })
        .await;

    match result {
        Ok(response) => {
            let r = response.into_inner();
            (
                StatusCode::CREATED,
                Json(json!({"product_id": r.product_id})),
            )
                .into_response()
        }
        Err(e) => rpc_error_response(e),
    }
}

/// GET /api/products/{id}
pub async fn get_product(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let mut client = state.catalog.clone();
    let result = state
        .catalog_breaker
        .call(|| async move {
            client
                .get_product(rpc_request(GetProductRequest { product_id: id }))
                .await
        })
        .await;

    match result {
        Ok(response) => match response.into_inner().product {
            Some(product) => Json(product_json(product)).into_response(),
            None => (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "product not found"})),
            )
                .into_response(),
        },
        Err(e) => rpc_error_response(e),
    }
}

/// GET /api/products
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Response {
    let mut client = state.catalog.clone();
    let result = state
        .catalog_breaker
        .call(|| async move {
            client
                .list_products(rpc_request(ListProductsRequest {
                    limit: query.limit,
                    offset: query.offset,
                    search: query.search,
                }))
                .await
        })
        .await;

    match result {
        Ok(response) => {
            let r = response.into_inner();
            Json(json!({
                "products": r.products.into_iter().map(product_json).collect::<Vec<_>>(),
                "total": r.total,
            }))
            .into_response()
        }
        Err(e) => rpc_error_response(e),
    }
}

/// DELETE /api/products/{id}
pub async fn delete_product(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let mut client = state.catalog.clone();
    let result = state
        .catalog_breaker
        .call(|| async move {
            client
                .delete_product(rpc_request(DeleteProductRequest { product_id: id }))
                .await
        })
        .await;

    match result {
        Ok(_) => Json(json!({"success": true})).into_response(),
        Err(e) => rpc_error_response(e),
    }
}

/// POST /api/products/decrease-stock/{id}
pub async fn decrease_stock(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<DecreaseStockInput>,
) -> Response {
    if let Err(e) = input.validate() {
        return validation_error_response(e);
    }

    let mut client = state.catalog.clone();
    let result = state
        .catalog_breaker
        .call(|| async move {
            client
                .decrease_stock(rpc_request(DecreaseStockRequest {
                    product_id: id,
                    quantity: input.quantity,
                }))
                .await
        })
        .await;

    match result {
        Ok(_) => Json(json!({"success": true})).into_response(),
        Err(e) => rpc_error_response(e),
    }
}
