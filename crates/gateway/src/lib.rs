//! 边缘网关
//!
//! HTTP -> gRPC 扇出：`/auth/*` 公开路由转发身份服务，`/api/*` 受保护
//! 路由经过认证中间件（调用 ValidateUser）与激活校验后转发各服务。
//! 每个下游一个熔断器；全局按客户端 IP 限流（20 次 / 5 秒）。
//! 网关不在事件平面内，没有数据库、broker 连接。

pub mod clients;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
