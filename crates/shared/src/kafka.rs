//! Kafka 基础设施封装
//!
//! 将 rdkafka 的底层 API 封装为业务友好的 Producer/Consumer 抽象，
//! 统一消息序列化、追踪上下文传播、错误映射和优雅关闭语义，
//! 避免各服务重复编写样板代码。

use std::collections::HashMap;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Header, Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::KafkaConfig;
use crate::error::ShopError;
use crate::telemetry;

// ---------------------------------------------------------------------------
// Topic 常量
// ---------------------------------------------------------------------------

/// 集中管理所有 Kafka topic 名称，防止字符串散落在各服务中导致拼写不一致
pub mod topics {
    /// identity -> 所有订阅方（注册、忘记密码、重置密码）
    pub const USER_EVENTS: &str = "user_events";
    /// order -> catalog（下单、取消补偿）
    pub const ORDER_EVENTS: &str = "order_events";
    /// catalog/order -> payment 以及 payment -> order
    pub const PAYMENT_EVENTS: &str = "payment_events";
    /// catalog -> 预留给下游订阅方
    pub const PRODUCT_EVENTS: &str = "product_events";
}

// ---------------------------------------------------------------------------
// ConsumerMessage
// ---------------------------------------------------------------------------

/// 消费到的 Kafka 消息的统一表示
///
/// 将 rdkafka 的 `BorrowedMessage`（带生命周期约束）转换为拥有所有权的结构体，
/// 使消息可以安全地跨 await 点传递给异步处理函数。
#[derive(Debug, Clone)]
pub struct ConsumerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub timestamp: Option<i64>,
    pub headers: HashMap<String, String>,
}

impl ConsumerMessage {
    /// 从 rdkafka 的借用消息构造，提取并拥有所有字段
    fn from_borrowed(msg: &BorrowedMessage<'_>) -> Self {
        let key = msg
            .key()
            .and_then(|k| std::str::from_utf8(k).ok())
            .map(String::from);

        let payload = msg.payload().map(|p| p.to_vec()).unwrap_or_default();

        let timestamp = msg.timestamp().to_millis();

        let mut headers = HashMap::new();
        if let Some(h) = msg.headers() {
            for idx in 0..h.count() {
                let header = h.get(idx);
                if let Some(raw) = header.value
                    && let Ok(value) = std::str::from_utf8(raw)
                {
                    headers.insert(header.key.to_string(), value.to_string());
                }
            }
        }

        Self {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key,
            payload,
            timestamp,
            headers,
        }
    }

    /// 将 JSON 格式负载反序列化为目标类型
    pub fn deserialize_payload<T: DeserializeOwned>(&self) -> Result<T, ShopError> {
        serde_json::from_slice(&self.payload)
            .map_err(|e| ShopError::Kafka(format!("负载反序列化失败: {e}")))
    }
}

// ---------------------------------------------------------------------------
// KafkaProducer
// ---------------------------------------------------------------------------

/// 面向业务的 Kafka 生产者
///
/// 封装 `FutureProducer` 并提供类型安全的 JSON 发送方法，发送时自动把
/// 当前 span 的 W3C 追踪上下文写入消息头。每个进程只创建一个实例，
/// 内部已派生 Clone（`FutureProducer` 本身是 Arc 包装的）。
#[derive(Clone)]
pub struct KafkaProducer {
    producer: FutureProducer,
}

impl KafkaProducer {
    /// 根据配置创建生产者
    ///
    /// `acks=all` 保证 broker 全副本确认后才算发送成功——outbox relay
    /// 只有在拿到确认后才会把事件标记为已发布；最多自动重试 5 次，
    /// 5 秒内仍无法投递则交给上层（outbox attempts）处理。
    pub fn new(config: &KafkaConfig) -> Result<Self, ShopError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("acks", "all")
            .set("message.send.max.retries", "5")
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| ShopError::Kafka(format!("创建生产者失败: {e}")))?;

        info!(brokers = %config.brokers, "Kafka 生产者已初始化");
        Ok(Self { producer })
    }

    /// 发送原始字节消息，附带指定消息头
    pub async fn send(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
        headers: &HashMap<String, String>,
    ) -> Result<(i32, i64), ShopError> {
        let mut owned_headers = OwnedHeaders::new();
        for (k, v) in headers {
            owned_headers = owned_headers.insert(Header {
                key: k,
                value: Some(v.as_str()),
            });
        }

        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload)
            .headers(owned_headers);

        // rdkafka 0.39+ 返回 Delivery 结构体而非元组
        let delivery = self
            .producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(e, _)| ShopError::Kafka(format!("发送消息失败: {e}")))?;

        debug!(
            topic,
            key,
            partition = delivery.partition,
            offset = delivery.offset,
            "消息已发送"
        );
        Ok((delivery.partition, delivery.offset))
    }

    /// 将值序列化为 JSON 后发送，并注入当前追踪上下文
    ///
    /// 序列化与网络发送拆分为两步，便于独立定位故障原因。
    pub async fn send_json<T: Serialize>(
        &self,
        topic: &str,
        key: &str,
        value: &T,
    ) -> Result<(i32, i64), ShopError> {
        let payload =
            serde_json::to_vec(value).map_err(|e| ShopError::Kafka(format!("序列化失败: {e}")))?;

        let mut headers = HashMap::new();
        telemetry::inject_trace_context(&mut headers);

        self.send(topic, key, &payload, &headers).await
    }
}

// ---------------------------------------------------------------------------
// KafkaConsumer
// ---------------------------------------------------------------------------

/// 面向业务的 Kafka 消费者
///
/// 封装 `StreamConsumer` 并提供基于 `watch` channel 的优雅关闭语义，
/// 确保进程退出时不会丢失正在处理的消息。
/// 消费组按服务命名（`<service>-service-group`），分区分配策略为 round-robin，
/// 初始偏移量从最早处开始——新服务上线即可回放全部历史事件。
pub struct KafkaConsumer {
    consumer: StreamConsumer,
}

impl KafkaConsumer {
    /// 创建消费者
    pub fn new(config: &KafkaConfig) -> Result<Self, ShopError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.consumer_group)
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("partition.assignment.strategy", "roundrobin")
            .set("enable.auto.commit", "true")
            .create()
            .map_err(|e| ShopError::Kafka(format!("创建消费者失败: {e}")))?;

        info!(
            brokers = %config.brokers,
            group_id = %config.consumer_group,
            "Kafka 消费者已初始化"
        );
        Ok(Self { consumer })
    }

    /// 订阅指定的 topic 列表
    pub fn subscribe(&self, topics: &[&str]) -> Result<(), ShopError> {
        self.consumer
            .subscribe(topics)
            .map_err(|e| ShopError::Kafka(format!("订阅 topic 失败: {e}")))?;

        info!(?topics, "已订阅 Kafka topics");
        Ok(())
    }

    /// 启动消费循环
    ///
    /// 使用 `tokio::select!` 同时监听消息流和关闭信号：
    /// - 收到消息时先从消息头提取追踪上下文，开启 consumer 侧 span，
    ///   再调用 handler 处理；handler 返回错误只记录日志而不中断循环，
    ///   避免单条坏消息导致整个消费者停止。
    /// - 关闭信号变为 `true` 时退出循环，确保正在执行的 handler 能自然完成。
    pub async fn run<F, Fut>(self, mut shutdown: watch::Receiver<bool>, handler: F)
    where
        F: Fn(ConsumerMessage) -> Fut,
        Fut: std::future::Future<Output = Result<(), ShopError>>,
    {
        use futures::StreamExt;

        let stream = self.consumer.stream();
        futures::pin_mut!(stream);

        info!("Kafka 消费循环已启动");

        loop {
            tokio::select! {
                // 偏向关闭信号，保证收到关闭时能尽快退出
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("收到关闭信号，Kafka 消费循环退出");
                        break;
                    }
                }

                msg_result = stream.next() => {
                    let Some(msg_result) = msg_result else {
                        warn!("Kafka 消息流意外结束");
                        break;
                    };

                    match msg_result {
                        Ok(borrowed_msg) => {
                            let msg = ConsumerMessage::from_borrowed(&borrowed_msg);
                            let span = info_span!(
                                "kafka_process",
                                otel.kind = "consumer",
                                topic = %msg.topic,
                                partition = msg.partition,
                                offset = msg.offset,
                            );

                            let headers = msg.headers.clone();
                            async {
                                telemetry::extract_trace_context(&headers);
                                debug!("收到 Kafka 消息");

                                if let Err(e) = handler(msg).await {
                                    error!(error = %e, "处理 Kafka 消息失败");
                                }
                            }
                            .instrument(span)
                            .await;
                        }
                        Err(e) => {
                            error!(error = %e, "接收 Kafka 消息出错");
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Envelope, OrderCreated, event_types};

    #[test]
    fn test_topic_constants() {
        assert_eq!(topics::USER_EVENTS, "user_events");
        assert_eq!(topics::ORDER_EVENTS, "order_events");
        assert_eq!(topics::PAYMENT_EVENTS, "payment_events");
        assert_eq!(topics::PRODUCT_EVENTS, "product_events");
    }

    #[test]
    fn test_consumer_message_deserialize_envelope() {
        let payload = OrderCreated {
            order_id: 1,
            user_id: 999,
            items: vec![],
            event_id: 0,
        };
        let envelope = Envelope::wrap(event_types::ORDER_CREATED, &payload).unwrap();

        let msg = ConsumerMessage {
            topic: topics::ORDER_EVENTS.to_string(),
            partition: 0,
            offset: 42,
            key: Some("1".to_string()),
            payload: envelope.to_bytes().unwrap(),
            timestamp: Some(1_700_000_000_000),
            headers: HashMap::from([(
                "traceparent".to_string(),
                "00-0123456789abcdef0123456789abcdef-0123456789abcdef-01".to_string(),
            )]),
        };

        let parsed: Envelope = msg.deserialize_payload().unwrap();
        assert_eq!(parsed.event, "OrderCreated");

        let event: OrderCreated = parsed.parse_payload().unwrap();
        assert_eq!(event.order_id, 1);
        assert_eq!(event.user_id, 999);
    }

    #[test]
    fn test_consumer_message_deserialize_invalid_json() {
        let msg = ConsumerMessage {
            topic: "events".to_string(),
            partition: 0,
            offset: 0,
            key: None,
            payload: b"not json".to_vec(),
            timestamp: None,
            headers: HashMap::new(),
        };

        let result: Result<Envelope, _> = msg.deserialize_payload();
        assert!(result.is_err());
    }
}
