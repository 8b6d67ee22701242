//! Domain records shared by every milkrun crate.
//!
//! Nothing here performs IO. Stores convert rows into these types; the
//! engine and runtime only ever see validated values.

pub mod calendar_records;
pub mod money;
pub mod order;
pub mod run;
pub mod subscription;

pub use calendar_records::{InvalidRange, Modification, Vacation};
pub use money::{Money, MoneyError, MINOR_SCALE};
pub use order::{
    NewOrder, Order, OrderItem, OrderStatus, Product, TransactionKind, UnknownOrderStatus,
    WalletTransaction,
};
pub use run::GenerationRunRecord;
pub use subscription::{
    Pattern, Subscription, SubscriptionError, SubscriptionRecord, SubscriptionStatus, WeekdaySet,
};
