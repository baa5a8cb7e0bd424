//! 支付决策
//!
//! 决策被隔离在 trait 后面：saga 接线只依赖 `PaymentDecider`，
//! 接入真实支付网关时替换实现即可，不用动消费和事件逻辑。

use crate::domain::PaymentStatus;

/// 支付决策器
pub trait PaymentDecider: Send + Sync {
    /// 决定一笔支付的结果
    fn decide(&self, order_id: i64, amount: i64) -> PaymentStatus;
}

/// 确定性模拟决策器：偶数订单号失败，奇数成功
///
/// 这是测试钩子，便于端到端场景稳定地走通成功路径和补偿路径。
pub struct ParityDecider;

impl PaymentDecider for ParityDecider {
    fn decide(&self, order_id: i64, _amount: i64) -> PaymentStatus {
        if order_id % 2 == 0 {
            PaymentStatus::Fail
        } else {
            PaymentStatus::Paid
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_order_fails() {
        let decider = ParityDecider;
        assert_eq!(decider.decide(2, 100), PaymentStatus::Fail);
        assert_eq!(decider.decide(0, 100), PaymentStatus::Fail);
        assert_eq!(decider.decide(1000, 1), PaymentStatus::Fail);
    }

    #[test]
    fn test_odd_order_succeeds() {
        let decider = ParityDecider;
        assert_eq!(decider.decide(1, 100), PaymentStatus::Paid);
        assert_eq!(decider.decide(999, 0), PaymentStatus::Paid);
    }

    #[test]
    fn test_decision_ignores_amount() {
        let decider = ParityDecider;
        assert_eq!(decider.decide(3, 0), PaymentStatus::Paid);
        assert_eq!(decider.decide(3, i64::MAX), PaymentStatus::Paid);
    }
}
