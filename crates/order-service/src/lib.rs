//! 订单服务
//!
//! 订单聚合与状态机，saga 的发起方：`CreateOrder` 落库订单并发出
//! `OrderCreated`；消费支付结果事件推进状态机（`paid` / `cancelled`），
//! 取消时发出 `OrderCancelled` 驱动库存补偿。
//! 另维护一份用户镜像投影（消费 `UserRegistered`），让订单外键
//! 校验无需同步调用身份服务。

pub mod consumer;
pub mod domain;
pub mod error;
pub mod grpc;
pub mod repository;
pub mod service;
