//! mr-runtime
//!
//! Store-backed services on top of the pure engine:
//! - [`GenerationRun`]: materialize one delivery date's orders, exactly once
//! - [`preview_customer_day`]: what one customer would receive, read-only
//! - [`procurement_list`]: per-product quantities for a delivery date
//!
//! All three load their inputs the same way and resolve through
//! `mr_engine::resolve_customer_day`.

pub mod generation;
mod loader;
pub mod preview;
pub mod procurement;

pub use generation::{
    CustomerOutcome, GenerationRun, RunConfig, RunError, RunReport, RunState, RunTally,
};
pub use preview::preview_customer_day;
pub use procurement::procurement_list;
