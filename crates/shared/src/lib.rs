//! 共享库
//!
//! 包含所有服务共用的配置、错误处理、数据库连接、缓存、Kafka、
//! 事务性发件箱（outbox）、收件箱去重（inbox）、熔断器与遥测等基础设施代码。

pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod health;
pub mod inbox;
pub mod kafka;
pub mod outbox;
pub mod retry;
pub mod telemetry;
