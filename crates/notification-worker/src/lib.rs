//! 通知工作者服务
//!
//! 纯消费者：订阅 `user_events`，把身份域事件转换为邮件副作用。
//! 发送类 handler 通过收件箱去重获得"有效一次"语义——broker 任意
//! 重投下用户最多多收到一封重复邮件（崩溃窗口内），不会收到风暴。

pub mod consumer;
pub mod email;
pub mod error;
pub mod service;
