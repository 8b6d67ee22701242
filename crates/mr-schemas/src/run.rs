//! Audit record of one generation run.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted once a run completes. Counts are per customer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRunRecord {
    pub run_id: Uuid,
    pub target_date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub orders_created: u64,
    /// Insufficient balance plus balance races.
    pub orders_skipped: u64,
    pub no_items: u64,
    pub already_materialized: u64,
    pub failed: u64,
}
