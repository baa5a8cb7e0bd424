//! 身份服务
//!
//! 管理账户、凭证、刷新会话、邮箱激活与密码重置。
//! 所有会改变账户状态并需要通知其他服务的操作（注册、忘记/重置密码）
//! 都在同一个本地事务内写入业务表和发件箱，由 relay 投递到 `user_events`。

pub mod domain;
pub mod error;
pub mod grpc;
pub mod repository;
pub mod service;
pub mod token;
pub mod validate;
