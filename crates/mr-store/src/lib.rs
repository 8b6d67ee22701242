//! Persistence seam for order generation.
//!
//! [`DeliveryStore`] is everything the runtime reads and writes. Two
//! implementations exist: [`MemoryStore`] here (tests, local demos) and the
//! Postgres store in `mr-db`. Both must honour the same contract:
//!
//! - at most one order per (customer, delivery date) whose status is not
//!   `cancelled`;
//! - [`DeliveryStore::materialize`] writes the debit, the wallet transaction
//!   and the order together or not at all;
//! - the wallet is re-checked under the per-customer lock, and a failed
//!   re-check writes nothing and returns [`StoreError::BalanceRace`].

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use mr_schemas::{
    GenerationRunRecord, Modification, Money, NewOrder, Order, Product, SubscriptionRecord,
    Vacation,
};
use uuid::Uuid;

mod memory;

pub use memory::{Fault, MemoryStore};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The balance passed the gate but no longer covers the order once the
    /// wallet is locked (another debit landed in between).
    BalanceRace { available: Money, required: Money },
    /// Connection, query or constraint failure in the backing store.
    Backend(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        StoreError::Backend(msg.into())
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::BalanceRace {
                available,
                required,
            } => write!(
                f,
                "wallet changed under lock: available {available}, required {required}"
            ),
            StoreError::Backend(msg) => write!(f, "store backend error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

// ---------------------------------------------------------------------------
// Materialization result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Materialized {
    /// Order, debit and wallet transaction were committed.
    Created(Order),
    /// A live order already occupied the slot; nothing was written.
    AlreadyExists(Order),
}

impl Materialized {
    pub fn order(&self) -> &Order {
        match self {
            Materialized::Created(o) | Materialized::AlreadyExists(o) => o,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Materialized::Created(_))
    }
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Collaborator interface consumed by generation, preview and procurement.
///
/// Object safe; callers hold `Arc<dyn DeliveryStore>`.
#[async_trait]
pub trait DeliveryStore: Send + Sync {
    /// Short backend name for logs (`"memory"`, `"postgres"`).
    fn name(&self) -> &'static str;

    /// Every subscription whose status is `active`, as persisted.
    async fn active_subscriptions(&self) -> Result<Vec<SubscriptionRecord>, StoreError>;

    /// Active subscriptions of one customer.
    async fn customer_subscriptions(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<SubscriptionRecord>, StoreError>;

    /// Modifications on `date` for any of `subscription_ids`.
    async fn modifications_on(
        &self,
        subscription_ids: &[Uuid],
        date: NaiveDate,
    ) -> Result<Vec<Modification>, StoreError>;

    /// Vacations of `customer_ids` that cover `date`.
    async fn vacations_covering(
        &self,
        customer_ids: &[Uuid],
        date: NaiveDate,
    ) -> Result<Vec<Vacation>, StoreError>;

    /// Catalog rows for `ids`. Unknown ids are simply absent.
    async fn products(&self, ids: &[Uuid]) -> Result<Vec<Product>, StoreError>;

    /// Current balance; a customer without a wallet has zero.
    async fn wallet_balance(&self, customer_id: Uuid) -> Result<Money, StoreError>;

    /// The live (non-cancelled) order for the slot, if any.
    async fn existing_order(
        &self,
        customer_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<Order>, StoreError>;

    /// Create the order and debit the wallet atomically, or return the order
    /// already occupying the slot.
    async fn materialize(&self, order: &NewOrder) -> Result<Materialized, StoreError>;

    async fn record_run(&self, run: &GenerationRunRecord) -> Result<(), StoreError>;

    /// Most recently completed run, if any was recorded.
    async fn latest_run(&self) -> Result<Option<GenerationRunRecord>, StoreError>;
}
