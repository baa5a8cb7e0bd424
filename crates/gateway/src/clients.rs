//! 下游 gRPC 客户端
//!
//! 惰性连接：进程启动时不要求下游在线，首个请求时建立连接。
//! tonic 的 Channel 内部是多路复用的，客户端可以廉价 Clone。

use tonic::transport::{Channel, Endpoint};

use shop_proto::catalog::catalog_service_client::CatalogServiceClient;
use shop_proto::identity::identity_service_client::IdentityServiceClient;
use shop_proto::order::order_service_client::OrderServiceClient;

/// 创建身份服务客户端
pub fn identity_client(url: &str) -> anyhow::Result<IdentityServiceClient<Channel>> {
    let channel = Endpoint::from_shared(url.to_string())?.connect_lazy();
    Ok(IdentityServiceClient::new(channel))
}

/// 创建商品目录服务客户端
pub fn catalog_client(url: &str) -> anyhow::Result<CatalogServiceClient<Channel>> {
    let channel = Endpoint::from_shared(url.to_string())?.connect_lazy();
    Ok(CatalogServiceClient::new(channel))
}

/// 创建订单服务客户端
pub fn order_client(url: &str) -> anyhow::Result<OrderServiceClient<Channel>> {
    let channel = Endpoint::from_shared(url.to_string())?.connect_lazy();
    Ok(OrderServiceClient::new(channel))
}
