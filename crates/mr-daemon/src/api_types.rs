//! Request and response types for the mr-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. Amounts travel as decimal strings
//! (`"75.00"`). No business logic lives here.

use chrono::NaiveDate;
use mr_engine::{Preview, ProcurementList};
use mr_schemas::{Money, OrderItem};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Errors (401 / 500 / 503)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// POST /admin/generate-orders
// ---------------------------------------------------------------------------

/// The admin pair. Customers with nothing to deliver, already materialized
/// or failed are in neither number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateOrdersResponse {
    pub orders_created: u64,
    pub orders_skipped: u64,
}

// ---------------------------------------------------------------------------
// GET /orders/tomorrow/preview
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub total: Money,
}

impl From<OrderItem> for PreviewItem {
    fn from(i: OrderItem) -> Self {
        PreviewItem {
            product_id: i.product_id,
            product_name: i.product_name,
            quantity: i.quantity,
            unit_price: i.unit_price,
            total: i.line_total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub date: NaiveDate,
    pub items: Vec<PreviewItem>,
    pub total: Money,
    pub wallet_balance: Money,
    pub sufficient_balance: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<Preview> for PreviewResponse {
    fn from(p: Preview) -> Self {
        PreviewResponse {
            date: p.date,
            items: p.items.into_iter().map(PreviewItem::from).collect(),
            total: p.total,
            wallet_balance: p.wallet_balance,
            sufficient_balance: p.sufficient_balance,
            message: p.message,
        }
    }
}

// ---------------------------------------------------------------------------
// GET /admin/procurement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcurementItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub total_quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcurementResponse {
    pub date: NaiveDate,
    pub items: Vec<ProcurementItem>,
}

impl From<ProcurementList> for ProcurementResponse {
    fn from(list: ProcurementList) -> Self {
        ProcurementResponse {
            date: list.date,
            items: list
                .items
                .into_iter()
                .map(|l| ProcurementItem {
                    product_id: l.product_id,
                    product_name: l.product_name,
                    total_quantity: l.total_quantity,
                })
                .collect(),
        }
    }
}
