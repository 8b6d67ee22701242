//! mr-engine
//!
//! Order resolution for one (customer, delivery date):
//! - recurrence patterns (daily / alternate / custom weekdays / buy once)
//! - per-date quantity modifications
//! - vacation veto
//! - pricing and the wallet balance gate
//!
//! Deterministic, pure logic. No IO, no wall clock. The generation run, the
//! customer preview and the procurement list all call [`resolve_customer_day`]
//! so they can never disagree about what a date contains.

pub mod balance;
pub mod overlay;
pub mod pattern;
pub mod preview;
pub mod procurement;
pub mod resolve;
pub mod vacation;

pub use balance::{BalanceCheck, BalanceGate};
pub use overlay::ModificationIndex;
pub use pattern::resolve as pattern_includes;
pub use preview::Preview;
pub use procurement::{ProcurementLine, ProcurementList, ProcurementTally};
pub use resolve::{
    group_by_customer, product_ids, resolve_customer_day, subscription_ids, CustomerDay,
    Resolution, ResolutionIssue,
};
pub use vacation::VacationCalendar;
