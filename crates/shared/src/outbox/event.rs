//! 发件箱行模型

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;

use crate::error::Result;
use crate::events::Envelope;

/// 单行投递尝试上限，达到后该行死信化，relay 不再选取
pub const MAX_ATTEMPTS: i64 = 10;

/// 发件箱中的一行事件
///
/// `published_at` 为 NULL 表示尚未发布；一旦非 NULL，除显式重新入队外
/// 不会再变回 NULL。`attempts` 单调不减。
#[derive(Debug, Clone, FromRow)]
pub struct OutboxEvent {
    pub id: i64,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    /// 完整的事件信封 `{"event":..., "payload":...}`
    pub payload: Value,
    pub headers: Value,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub topic: String,
}

impl OutboxEvent {
    /// 生成实际投递到 broker 的字节：解析信封、注入 `event_id`、重新序列化
    ///
    /// 载荷不是合法信封或不是 JSON 对象时返回错误，调用方应将该行标记为
    /// 失败（poison 行由 MAX_ATTEMPTS 兜底）。
    pub fn wire_bytes(&self) -> Result<Vec<u8>> {
        let mut envelope: Envelope = serde_json::from_value(self.payload.clone())?;
        envelope.inject_event_id(self.id)?;
        envelope.to_bytes()
    }
}

/// 待入队的发件箱事件（插入形式）
#[derive(Debug, Clone)]
pub struct NewOutboxEvent {
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: Value,
    pub topic: String,
}

impl NewOutboxEvent {
    /// 用类型化载荷构建一行发件箱事件，载荷按统一信封格式包装
    pub fn new<T: serde::Serialize>(
        aggregate_type: &str,
        aggregate_id: impl ToString,
        event_type: &str,
        payload: &T,
        topic: &str,
    ) -> Result<Self> {
        let envelope = Envelope::wrap(event_type, payload)?;
        Ok(Self {
            aggregate_type: aggregate_type.to_string(),
            aggregate_id: aggregate_id.to_string(),
            event_type: event_type.to_string(),
            payload: serde_json::to_value(&envelope)?,
            topic: topic.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{OrderCreated, event_types};
    use crate::kafka::topics;

    fn sample_row(payload: Value) -> OutboxEvent {
        OutboxEvent {
            id: 77,
            aggregate_type: "Order".to_string(),
            aggregate_id: "42".to_string(),
            event_type: "OrderCreated".to_string(),
            payload,
            headers: Value::Null,
            created_at: Utc::now(),
            published_at: None,
            attempts: 0,
            last_error: None,
            topic: topics::ORDER_EVENTS.to_string(),
        }
    }

    #[test]
    fn test_new_outbox_event_wraps_envelope() {
        let event = OrderCreated {
            order_id: 42,
            user_id: 999,
            items: vec![],
            event_id: 0,
        };

        let row = NewOutboxEvent::new(
            "Order",
            42,
            event_types::ORDER_CREATED,
            &event,
            topics::ORDER_EVENTS,
        )
        .unwrap();

        assert_eq!(row.aggregate_id, "42");
        assert_eq!(row.event_type, "OrderCreated");
        assert_eq!(row.payload["event"], "OrderCreated");
        assert_eq!(row.payload["payload"]["order_id"], 42);
    }

    #[test]
    fn test_wire_bytes_injects_row_id() {
        let event = OrderCreated {
            order_id: 42,
            user_id: 999,
            items: vec![],
            event_id: 0,
        };
        let new_row = NewOutboxEvent::new(
            "Order",
            42,
            event_types::ORDER_CREATED,
            &event,
            topics::ORDER_EVENTS,
        )
        .unwrap();

        let row = sample_row(new_row.payload);
        let bytes = row.wire_bytes().unwrap();
        let wire: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        // event_id 等于发件箱行 id，而非业务侧预填的值
        assert_eq!(wire["payload"]["event_id"], 77);
        assert_eq!(wire["event"], "OrderCreated");
    }

    #[test]
    fn test_wire_bytes_rejects_poison_payload() {
        let row = sample_row(Value::String("not an envelope".to_string()));
        assert!(row.wire_bytes().is_err());

        let row = sample_row(serde_json::json!({"event": "X", "payload": 3}));
        assert!(row.wire_bytes().is_err());
    }
}
