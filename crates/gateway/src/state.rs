//! 网关共享状态

use std::time::Duration;

use tonic::transport::Channel;

use shop_proto::catalog::catalog_service_client::CatalogServiceClient;
use shop_proto::identity::identity_service_client::IdentityServiceClient;
use shop_proto::order::order_service_client::OrderServiceClient;
use shop_shared::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};

use crate::middleware::rate_limit::RateLimiter;

/// 下游 RPC 默认超时
pub const RPC_TIMEOUT: Duration = Duration::from_secs(1);

/// 网关应用状态
///
/// 每个下游一个熔断器；客户端与熔断器都可廉价 Clone，
/// 整个状态随 axum Router 克隆到各 handler。
#[derive(Clone)]
pub struct AppState {
    pub identity: IdentityServiceClient<Channel>,
    pub catalog: CatalogServiceClient<Channel>,
    pub order: OrderServiceClient<Channel>,
    pub identity_breaker: CircuitBreaker,
    pub catalog_breaker: CircuitBreaker,
    pub order_breaker: CircuitBreaker,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(
        identity: IdentityServiceClient<Channel>,
        catalog: CatalogServiceClient<Channel>,
        order: OrderServiceClient<Channel>,
    ) -> Self {
        Self {
            identity,
            catalog,
            order,
            identity_breaker: CircuitBreaker::new(CircuitBreakerConfig::new("identity-service")),
            catalog_breaker: CircuitBreaker::new(CircuitBreakerConfig::new("catalog-service")),
            order_breaker: CircuitBreaker::new(CircuitBreakerConfig::new("order-service")),
            rate_limiter: RateLimiter::default(),
        }
    }
}

/// 构造带网关默认超时的 RPC 请求
pub fn rpc_request<T>(message: T) -> tonic::Request<T> {
    let mut request = tonic::Request::new(message);
    request.set_timeout(RPC_TIMEOUT);
    request
}
