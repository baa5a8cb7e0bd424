//! gRPC 服务端实现

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::instrument;

use shop_proto::order::order_service_server::OrderService as OrderServiceTrait;
use shop_proto::order::{CreateOrderRequest, CreateOrderResponse};

use crate::domain::NewOrderItem;
use crate::service::OrderService;

/// gRPC 服务端
pub struct OrderGrpc {
    service: Arc<OrderService>,
}

impl OrderGrpc {
    pub fn new(service: Arc<OrderService>) -> Self {
        Self { service }
    }
}

#[tonic::async_trait]
impl OrderServiceTrait for OrderGrpc {
    #[instrument(skip(self, request))]
    async fn create_order(
        &self,
        request: Request<CreateOrderRequest>,
    ) -> Result<Response<CreateOrderResponse>, Status> {
        let req = request.into_inner();

        let items: Vec<NewOrderItem> = req
            .items
            .into_iter()
            .map(|item| NewOrderItem {
                product_id: item.product_id,
                name: item.name,
                price: item.price,
                quantity: item.quantity,
            })
            .collect();

        let order_id = self.service.create_order(req.user_id, items).await?;

        Ok(Response::new(CreateOrderResponse { order_id }))
    }
}
