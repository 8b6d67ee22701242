//! Read-only preview of one customer's order for one date.

use chrono::NaiveDate;
use mr_engine::{resolve_customer_day, BalanceGate, Preview};
use mr_store::{DeliveryStore, StoreError};
use uuid::Uuid;

use crate::loader::{load_day_inputs, log_issues};

/// Resolve and price what `customer_id` would receive on `date` and check it
/// against their wallet. Nothing is written.
///
/// Once the run has materialized the order, the preview reports that order
/// as placed instead of re-pricing it against the debited wallet.
pub async fn preview_customer_day(
    store: &dyn DeliveryStore,
    gate: &BalanceGate,
    customer_id: Uuid,
    date: NaiveDate,
) -> Result<Preview, StoreError> {
    if let Some(order) = store.existing_order(customer_id, date).await? {
        let balance = store.wallet_balance(customer_id).await?;
        return Ok(Preview::from_order(order, balance));
    }

    let subs = store.customer_subscriptions(customer_id).await?;
    let inputs = load_day_inputs(store, &subs, date).await?;
    let res = resolve_customer_day(&inputs.customer_day(customer_id, &subs));
    log_issues(&res);

    let balance = store.wallet_balance(customer_id).await?;
    Ok(Preview::from_resolution(res, balance, gate))
}
