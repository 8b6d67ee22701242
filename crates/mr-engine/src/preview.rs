//! Read-only "tomorrow preview" projection.

use chrono::NaiveDate;
use mr_schemas::{Money, Order, OrderItem};

use crate::{BalanceGate, Resolution};

/// What the customer would be charged for `date`, without charging them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Preview {
    pub date: NaiveDate,
    pub items: Vec<OrderItem>,
    pub total: Money,
    pub wallet_balance: Money,
    pub sufficient_balance: bool,
    /// Set when `items` is empty or the order already exists.
    pub message: Option<String>,
}

impl Preview {
    pub fn from_resolution(res: Resolution, wallet_balance: Money, gate: &BalanceGate) -> Preview {
        let check = gate.check(wallet_balance, &res.lines);
        let message = if res.on_vacation {
            Some(format!("You're on vacation on {}", res.date))
        } else if res.lines.is_empty() {
            Some(format!("No deliveries scheduled for {}", res.date))
        } else {
            None
        };
        Preview {
            date: res.date,
            items: res.lines,
            total: check.total,
            wallet_balance,
            sufficient_balance: check.sufficient,
            message,
        }
    }

    /// Preview of an order that is already placed and paid for. The wallet
    /// has been debited, so the gate is not consulted again.
    pub fn from_order(order: Order, wallet_balance: Money) -> Preview {
        Preview {
            date: order.delivery_date,
            items: order.items,
            total: order.total_amount,
            wallet_balance,
            sufficient_balance: true,
            message: Some(format!("Order already placed for {}", order.delivery_date)),
        }
    }
}
