//! 领域事件模型
//!
//! 定义跨服务传播的所有领域事件的统一信封格式和各事件的载荷结构。
//! 所有 broker 消息都是 `{"event": "<类型>", "payload": {...}}` 形状的 JSON，
//! 载荷中的 `event_id` 字段由 outbox relay 在发布时注入（等于 outbox 行 id），
//! 供消费侧 inbox 去重使用——消费者不应信任 broker 自身的 offset。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ShopError};

// ---------------------------------------------------------------------------
// 事件类型常量
// ---------------------------------------------------------------------------

/// 集中管理所有事件类型名称，防止字符串散落在各服务中导致拼写不一致
pub mod event_types {
    pub const USER_REGISTERED: &str = "UserRegistered";
    pub const USER_FORGOT_PASSWORD: &str = "UserForgotPassword";
    pub const USER_RESET_PASSWORD: &str = "UserResetPassword";
    pub const ORDER_CREATED: &str = "OrderCreated";
    pub const ORDER_CANCELLED: &str = "OrderCancelled";
    pub const INVENTORY_RESERVED: &str = "InventoryReserved";
    pub const PAYMENT_SUCCEEDED: &str = "PaymentSucceeded";
    pub const PAYMENT_FAILED: &str = "PaymentFailed";
    pub const PRODUCT_CREATED: &str = "ProductCreated";
}

// ---------------------------------------------------------------------------
// Envelope — 统一事件信封
// ---------------------------------------------------------------------------

/// 事件信封
///
/// 所有 broker 消息的统一外层结构。载荷保持为 `serde_json::Value`，
/// 由消费者按 `event` 字段分发后再做类型化解析，
/// 避免信封层为每种事件定义独立消息结构。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    pub payload: Value,
}

impl Envelope {
    /// 包装类型化载荷为信封
    pub fn wrap<T: Serialize>(event: &str, payload: &T) -> Result<Self> {
        Ok(Self {
            event: event.to_string(),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// 序列化为 JSON 字节
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// 从 JSON 字节解析信封
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// 将载荷解析为目标事件类型
    pub fn parse_payload<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.payload.clone()).map_err(ShopError::from)
    }

    /// 向载荷对象注入 `event_id` 字段（relay 发布时调用）
    ///
    /// 载荷不是 JSON 对象时返回错误，该事件会被标记为 poison。
    pub fn inject_event_id(&mut self, event_id: i64) -> Result<()> {
        match &mut self.payload {
            Value::Object(map) => {
                map.insert("event_id".to_string(), Value::from(event_id));
                Ok(())
            }
            other => Err(ShopError::Internal(format!(
                "事件载荷不是 JSON 对象，无法注入 event_id: {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// 身份域事件
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRegistered {
    pub user_id: i64,
    pub email: String,
    pub activation_token: String,
    #[serde(default)]
    pub event_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserForgotPassword {
    pub email: String,
    pub forgot_password_token: String,
    #[serde(default)]
    pub event_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResetPassword {
    pub email: String,
    #[serde(default)]
    pub event_id: i64,
}

// ---------------------------------------------------------------------------
// 订单域事件
// ---------------------------------------------------------------------------

/// 订单行（事件载荷中的精简形式，仅下单所需字段）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedItem {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: i64,
    pub user_id: i64,
    pub items: Vec<OrderCreatedItem>,
    #[serde(default)]
    pub event_id: i64,
}

/// 订单行（补偿事件携带完整行信息，库存回补按 quantity 执行）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledItem {
    pub product_id: i64,
    pub name: String,
    pub price: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: i64,
    pub items: Vec<OrderCancelledItem>,
    #[serde(default)]
    pub event_id: i64,
}

// ---------------------------------------------------------------------------
// 库存与支付域事件
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryReserved {
    pub order_id: i64,
    pub user_id: i64,
    /// 预留商品的总金额（分），由 catalog 按当前单价汇总
    pub amount: i64,
    pub reserved_at: DateTime<Utc>,
    #[serde(default)]
    pub event_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSucceeded {
    pub order_id: i64,
    pub payment_id: i64,
    pub amount: i64,
    pub paid_at: DateTime<Utc>,
    #[serde(default)]
    pub event_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFailed {
    pub order_id: i64,
    pub payment_id: i64,
    pub amount: i64,
    pub failed_at: DateTime<Utc>,
    #[serde(default)]
    pub event_id: i64,
}

// ---------------------------------------------------------------------------
// 商品域事件
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCreated {
    pub product_id: i64,
    #[serde(default)]
    pub event_id: i64,
}

// ---------------------------------------------------------------------------
// 单元测试
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_wrap_and_parse() {
        let payload = OrderCreated {
            order_id: 42,
            user_id: 999,
            items: vec![OrderCreatedItem {
                product_id: 1,
                quantity: 2,
            }],
            event_id: 0,
        };

        let envelope = Envelope::wrap(event_types::ORDER_CREATED, &payload).unwrap();
        assert_eq!(envelope.event, "OrderCreated");

        let bytes = envelope.to_bytes().unwrap();
        let restored = Envelope::from_bytes(&bytes).unwrap();
        let parsed: OrderCreated = restored.parse_payload().unwrap();

        assert_eq!(parsed.order_id, 42);
        assert_eq!(parsed.user_id, 999);
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].product_id, 1);
        assert_eq!(parsed.items[0].quantity, 2);
    }

    #[test]
    fn test_wire_field_names() {
        // 字段名是跨语言消费者依赖的 wire 契约，改名会静默破坏下游
        let event = UserRegistered {
            user_id: 7,
            email: "test@example.com".to_string(),
            activation_token: "tok".to_string(),
            event_id: 7,
        };
        let json = serde_json::to_string(&Envelope::wrap("UserRegistered", &event).unwrap())
            .unwrap();

        assert!(json.contains(r#""event":"UserRegistered""#));
        assert!(json.contains(r#""user_id":7"#));
        assert!(json.contains(r#""activation_token":"tok""#));

        let reserved = InventoryReserved {
            order_id: 1,
            user_id: 2,
            amount: 5350,
            reserved_at: Utc::now(),
            event_id: 0,
        };
        let json = serde_json::to_string(&reserved).unwrap();
        assert!(json.contains(r#""reserved_at""#));
        assert!(json.contains(r#""amount":5350"#));
    }

    #[test]
    fn test_inject_event_id_overwrites() {
        let payload = UserRegistered {
            user_id: 7,
            email: "a@b.c".to_string(),
            activation_token: "tok".to_string(),
            event_id: 0,
        };
        let mut envelope = Envelope::wrap(event_types::USER_REGISTERED, &payload).unwrap();

        envelope.inject_event_id(1001).unwrap();

        let parsed: UserRegistered = envelope.parse_payload().unwrap();
        assert_eq!(parsed.event_id, 1001);
    }

    #[test]
    fn test_inject_event_id_rejects_non_object_payload() {
        let mut envelope = Envelope {
            event: "Broken".to_string(),
            payload: Value::String("not an object".to_string()),
        };

        assert!(envelope.inject_event_id(1).is_err());
    }

    #[test]
    fn test_event_id_defaults_when_absent() {
        // 旧版本生产者可能没写 event_id，消费侧容忍缺省为 0
        let json = r#"{"order_id":5,"user_id":9,"items":[]}"#;
        let parsed: OrderCreated = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.event_id, 0);
    }

    #[test]
    fn test_payment_events_roundtrip() {
        let failed = PaymentFailed {
            order_id: 10,
            payment_id: 3,
            amount: 2000,
            failed_at: Utc::now(),
            event_id: 0,
        };
        let envelope = Envelope::wrap(event_types::PAYMENT_FAILED, &failed).unwrap();
        let parsed: PaymentFailed = envelope.parse_payload().unwrap();

        assert_eq!(parsed.order_id, 10);
        assert_eq!(parsed.amount, 2000);
    }
}
