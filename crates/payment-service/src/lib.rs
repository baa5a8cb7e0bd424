//! 支付服务
//!
//! 消费 `InventoryReserved`、为订单生成支付记录并给出结果事件
//! （`PaymentSucceeded` / `PaymentFailed`）。支付决策在 `PaymentDecider`
//! trait 背后，saga 接线不感知具体决策实现。
//! 没有对外 RPC 面：进程只有消费循环、发件箱 relay 和健康检查端点。

pub mod consumer;
pub mod decider;
pub mod domain;
pub mod error;
pub mod repository;
pub mod service;
