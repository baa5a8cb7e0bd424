//! 事务性发件箱（transactional outbox）
//!
//! 每个服务在自己的数据库里维护一张 `outbox` 表：业务变更与待发布事件
//! 在同一个本地事务中落库，再由后台 relay 周期性地把未发布的行投递到
//! Kafka。这保证了"状态已提交但事件丢失"不可能发生——代价是至少一次
//! 投递，由消费侧幂等机制兜底。

mod event;
mod relay;
mod repository;

pub use event::{MAX_ATTEMPTS, NewOutboxEvent, OutboxEvent};
pub use relay::{OutboxRelay, RelayConfig};
pub use repository::OutboxRepository;
