//! 商品目录服务
//!
//! 管理商品与库存。在订单 saga 中扮演库存预留/回补的角色：
//! 消费 `OrderCreated` 原子扣减库存并发出 `InventoryReserved`，
//! 消费 `OrderCancelled` 回补库存。商品读路径前有一层 Redis 旁路缓存。

pub mod consumer;
pub mod domain;
pub mod error;
pub mod grpc;
pub mod repository;
pub mod service;
