//! 支付域模型

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// 支付状态（wire 层使用大写字符串）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Paid,
    Fail,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "PAID",
            Self::Fail => "FAIL",
        }
    }
}

/// 支付记录
///
/// 每个订单至多一条成功支付（部分唯一索引约束）。
#[derive(Debug, Clone, FromRow)]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub status: String,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_strings() {
        assert_eq!(PaymentStatus::Paid.as_str(), "PAID");
        assert_eq!(PaymentStatus::Fail.as_str(), "FAIL");
    }
}
