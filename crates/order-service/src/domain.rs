//! 订单域模型与状态机

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// 订单状态
///
/// 合法变迁：new -> paid、new -> cancelled、paid -> shipped。
/// `cancelled` 是终态；`paid -> cancelled` 被禁止。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    New,
    Paid,
    Cancelled,
    Shipped,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
            Self::Shipped => "shipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "paid" => Some(Self::Paid),
            "cancelled" => Some(Self::Cancelled),
            "shipped" => Some(Self::Shipped),
            _ => None,
        }
    }

    /// 状态机的唯一合法变迁表
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        matches!(
            (self, target),
            (Self::New, Self::Paid) | (Self::New, Self::Cancelled) | (Self::Paid, Self::Shipped)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 订单聚合根
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub status: String,
    pub total_sum: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 订单行
#[derive(Debug, Clone, FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub name: String,
    pub price: i64,
    pub quantity: i32,
}

/// 待创建订单行
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub name: String,
    pub price: i64,
    pub quantity: i32,
}

/// 按订单行计算总金额：Σ 单价 × 数量
pub fn calculate_total(items: &[NewOrderItem]) -> i64 {
    items
        .iter()
        .map(|item| item.price * item.quantity as i64)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            OrderStatus::New,
            OrderStatus::Paid,
            OrderStatus::Cancelled,
            OrderStatus::Shipped,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("unknown"), None);
    }

    #[test]
    fn test_legal_transitions() {
        assert!(OrderStatus::New.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::New.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Shipped));
    }

    #[test]
    fn test_illegal_transitions() {
        // paid -> cancelled 被明确禁止
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Cancelled));
        // cancelled 是终态
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::New));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Paid));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Shipped));
        // 不存在回到 new 的路径
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::New));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::New));
    }

    #[test]
    fn test_calculate_total() {
        let items = vec![
            NewOrderItem {
                product_id: 1,
                name: "a".into(),
                price: 5350,
                quantity: 1,
            },
            NewOrderItem {
                product_id: 2,
                name: "b".into(),
                price: 100,
                quantity: 3,
            },
        ];

        assert_eq!(calculate_total(&items), 5350 + 300);
        assert_eq!(calculate_total(&[]), 0);
    }

    /// 条件变迁在乱序、重复投递下收敛到与顺序单次投递相同的终态
    ///
    /// 把支付结果事件建模为"仅当当前状态允许才生效"的条件更新，
    /// 随机打乱并复制事件序列后逐一应用，终态必须与基线一致。
    #[test]
    fn test_transitions_converge_under_redelivery() {
        use rand::seq::SliceRandom;

        #[derive(Clone, Copy, Debug, PartialEq)]
        enum Event {
            PaymentSucceeded,
            PaymentFailed,
        }

        // 条件更新语义：目标变迁不合法则不生效
        fn apply(status: OrderStatus, event: Event) -> OrderStatus {
            let target = match event {
                Event::PaymentSucceeded => OrderStatus::Paid,
                Event::PaymentFailed => OrderStatus::Cancelled,
            };
            if status.can_transition_to(target) {
                target
            } else {
                status
            }
        }

        let mut rng = rand::thread_rng();

        for log in [
            vec![Event::PaymentSucceeded],
            vec![Event::PaymentFailed],
        ] {
            // 基线：顺序单次投递
            let baseline = log
                .iter()
                .fold(OrderStatus::New, |s, &e| apply(s, e));

            for _ in 0..100 {
                // 每个事件复制 1..=3 次后整体乱序
                let mut delivered: Vec<Event> = Vec::new();
                for &event in &log {
                    let copies = 1 + rand::random::<u8>() as usize % 3;
                    delivered.extend(std::iter::repeat_n(event, copies));
                }
                delivered.shuffle(&mut rng);

                let final_status = delivered
                    .iter()
                    .fold(OrderStatus::New, |s, &e| apply(s, e));

                assert_eq!(final_status, baseline, "delivered = {delivered:?}");
            }
        }
    }
}
