//! gRPC 服务端实现

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::instrument;

use shop_proto::catalog::catalog_service_server::CatalogService as CatalogServiceTrait;
use shop_proto::catalog::{
    CreateProductRequest, CreateProductResponse, DecreaseStockRequest, DecreaseStockResponse,
    DeleteProductRequest, DeleteProductResponse, GetProductRequest, GetProductResponse,
    ListProductsRequest, ListProductsResponse, Product as ProtoProduct,
};

use crate::domain::{NewProduct, Product};
use crate::service::ProductCatalog;

/// gRPC 服务端
pub struct CatalogGrpc {
    catalog: Arc<dyn ProductCatalog>,
}

impl CatalogGrpc {
    pub fn new(catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { catalog }
    }
}

fn to_proto(product: Product) -> ProtoProduct {
    ProtoProduct {
        id: product.id,
        name: product.name,
        description: product.description,
        price: product.price,
        stock_quantity: product.stock_quantity,
        image_url: product.image_url,
        category: product.category,
    }
}

#[tonic::async_trait]
impl CatalogServiceTrait for CatalogGrpc {
    #[instrument(skip(self, request))]
    async fn create_product(
        &self,
        request: Request<CreateProductRequest>,
    ) -> Result<Response<CreateProductResponse>, Status> {
        let req = request.into_inner();

        if req.name.is_empty() {
            return Err(Status::invalid_argument("商品名称不能为空"));
        }
        if req.price < 0 || req.stock_quantity < 0 {
            return Err(Status::invalid_argument("价格和库存不能为负数"));
        }

        let product_id = self
            .catalog
            .create(NewProduct {
                name: req.name,
                description: req.description,
                price: req.price,
                stock_quantity: req.stock_quantity,
                image_url: req.image_url,
                category: req.category,
            })
            .await?;

        Ok(Response::new(CreateProductResponse { product_id }))
    }

    #[instrument(skip(self, request))]
    async fn get_product(
        &self,
        request: Request<GetProductRequest>,
    ) -> Result<Response<GetProductResponse>, Status> {
        let req = request.into_inner();
        let product = self.catalog.get(req.product_id).await?;

        Ok(Response::new(GetProductResponse {
            product: Some(to_proto(product)),
        }))
    }

    #[instrument(skip(self, request))]
    async fn list_products(
        &self,
        request: Request<ListProductsRequest>,
    ) -> Result<Response<ListProductsResponse>, Status> {
        let req = request.into_inner();

        // 上限防御，避免单次请求拖垮数据库
        let limit = if req.limit <= 0 || req.limit > 100 {
            20
        } else {
            req.limit
        };
        let offset = req.offset.max(0);

        let (products, total) = self.catalog.list(limit, offset, &req.search).await?;

        Ok(Response::new(ListProductsResponse {
            products: products.into_iter().map(to_proto).collect(),
            total,
        }))
    }

    #[instrument(skip(self, request))]
    async fn delete_product(
        &self,
        request: Request<DeleteProductRequest>,
    ) -> Result<Response<DeleteProductResponse>, Status> {
        let req = request.into_inner();
        self.catalog.delete(req.product_id).await?;

        Ok(Response::new(DeleteProductResponse { success: true }))
    }

    #[instrument(skip(self, request))]
    async fn decrease_stock(
        &self,
        request: Request<DecreaseStockRequest>,
    ) -> Result<Response<DecreaseStockResponse>, Status> {
        let req = request.into_inner();

        if req.quantity <= 0 {
            return Err(Status::invalid_argument("扣减数量必须为正数"));
        }

        self.catalog
            .decrease_stock(req.product_id, req.quantity)
            .await?;

        Ok(Response::new(DecreaseStockResponse { success: true }))
    }
}
