//! Wallet balance gate.

use mr_schemas::{Money, OrderItem};

/// Outcome of checking one customer's priced lines against their wallet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BalanceCheck {
    pub sufficient: bool,
    pub total: Money,
    pub balance: Money,
}

/// `sufficient = balance + tolerance >= total`.
///
/// `tolerance` is how far below zero a wallet may be taken by one debit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BalanceGate {
    tolerance: Money,
}

impl BalanceGate {
    /// Negative tolerances are clamped to zero.
    pub fn new(tolerance: Money) -> Self {
        let tolerance = if tolerance.is_negative() {
            Money::ZERO
        } else {
            tolerance
        };
        BalanceGate { tolerance }
    }

    pub fn tolerance(&self) -> Money {
        self.tolerance
    }

    /// Check `lines` against `balance`. Empty `lines` are trivially
    /// sufficient with a zero total.
    pub fn check(&self, balance: Money, lines: &[OrderItem]) -> BalanceCheck {
        let total = order_total(lines);
        BalanceCheck {
            sufficient: self.allows(balance, total),
            total,
            balance,
        }
    }

    /// Would debiting `total` from `balance` stay within the tolerance?
    pub fn allows(&self, balance: Money, total: Money) -> bool {
        balance.saturating_add(self.tolerance) >= total
    }
}

/// Sum of line totals. Saturates, so an absurd order can never look cheap.
pub fn order_total(lines: &[OrderItem]) -> Money {
    lines
        .iter()
        .fold(Money::ZERO, |acc, l| acc.saturating_add(l.line_total))
}
