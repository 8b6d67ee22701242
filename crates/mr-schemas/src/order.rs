//! Catalog, wallet and order records.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Money;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub unit_price: Money,
    pub is_available: bool,
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Credit,
    Debit,
}

/// One entry of the wallet log. Balances change only through these.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub customer_id: Uuid,
    /// Always positive; direction comes from `kind`.
    pub amount: Money,
    pub kind: TransactionKind,
    pub description: String,
    pub balance_after: Money,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Assigned,
    OutForDelivery,
    Delivered,
    Skipped,
    Cancelled,
}

impl OrderStatus {
    pub fn parse(s: &str) -> Result<Self, UnknownOrderStatus> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "assigned" => Ok(OrderStatus::Assigned),
            "out_for_delivery" => Ok(OrderStatus::OutForDelivery),
            "delivered" => Ok(OrderStatus::Delivered),
            "skipped" => Ok(OrderStatus::Skipped),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(UnknownOrderStatus(other.to_string())),
        }
    }

    /// Every status except `cancelled` occupies the (customer, date) slot.
    pub fn occupies_delivery_slot(&self) -> bool {
        !matches!(self, OrderStatus::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOrderStatus(pub String);

impl fmt::Display for UnknownOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown order status {:?}", self.0)
    }
}

impl std::error::Error for UnknownOrderStatus {}

/// One priced line of an order. Name and price are snapshots taken at
/// materialization and never follow later catalog edits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub subscription_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub delivery_date: NaiveDate,
    pub items: Vec<OrderItem>,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Everything the materializer needs to create one order and its debit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewOrder {
    pub customer_id: Uuid,
    pub delivery_date: NaiveDate,
    pub items: Vec<OrderItem>,
    pub total_amount: Money,
    /// How far below zero the wallet may go after this debit.
    pub tolerance: Money,
}

impl NewOrder {
    /// Wallet description written next to the debit.
    pub fn debit_description(&self) -> String {
        format!("Order for {}", self.delivery_date)
    }
}
