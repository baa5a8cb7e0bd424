//! Kafka 消费者与事件分发
//!
//! 订阅 `user_events`，把身份域事件路由到对应的邮件 handler。
//! handler 返回错误时消费循环只记录日志，broker 会按消费组语义重投。

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use shop_shared::config::AppConfig;
use shop_shared::events::{
    Envelope, UserForgotPassword, UserRegistered, UserResetPassword, event_types,
};
use shop_shared::kafka::{ConsumerMessage, KafkaConsumer, topics};

use crate::error::{NotificationError, Result};
use crate::service::NotificationService;

/// 通知消费者
pub struct NotificationConsumer {
    consumer: KafkaConsumer,
    service: Arc<NotificationService>,
}

impl NotificationConsumer {
    pub fn new(config: &AppConfig, service: Arc<NotificationService>) -> Result<Self> {
        let consumer = KafkaConsumer::new(&config.kafka).map_err(NotificationError::Shared)?;
        Ok(Self { consumer, service })
    }

    /// 启动消费循环，直到收到 shutdown 信号
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        self.consumer
            .subscribe(&[topics::USER_EVENTS])
            .map_err(NotificationError::Shared)?;

        info!(topic = topics::USER_EVENTS, "通知消费者已启动");

        let service = self.service;

        self.consumer
            .run(shutdown, |msg| {
                let service = service.clone();
                async move {
                    if let Err(e) = handle_message(&service, &msg).await {
                        error!(
                            error = %e,
                            topic = %msg.topic,
                            partition = msg.partition,
                            offset = msg.offset,
                            "处理通知事件失败"
                        );
                    }
                    Ok(())
                }
            })
            .await;

        info!("通知消费者已停止");
        Ok(())
    }
}

/// 处理单条 Kafka 消息
///
/// 拆分为独立函数而非方法，便于在测试中直接调用而无需构造完整的 Consumer。
pub async fn handle_message(service: &NotificationService, msg: &ConsumerMessage) -> Result<()> {
    let envelope: Envelope = msg.deserialize_payload().map_err(NotificationError::Shared)?;

    match envelope.event.as_str() {
        event_types::USER_REGISTERED => {
            let event: UserRegistered = envelope
                .parse_payload()
                .map_err(NotificationError::Shared)?;
            service.handle_user_registered(&event).await?;
        }
        event_types::USER_FORGOT_PASSWORD => {
            let event: UserForgotPassword = envelope
                .parse_payload()
                .map_err(NotificationError::Shared)?;
            service.handle_user_forgot_password(&event).await?;
        }
        event_types::USER_RESET_PASSWORD => {
            let event: UserResetPassword = envelope
                .parse_payload()
                .map_err(NotificationError::Shared)?;
            service.handle_user_reset_password(&event).await?;
        }
        other => {
            warn!(event_type = other, "忽略未处理的事件类型");
        }
    }

    Ok(())
}
