//! Procurement list for a delivery date.

use chrono::NaiveDate;
use mr_engine::{group_by_customer, resolve_customer_day, ProcurementList, ProcurementTally};
use mr_store::{DeliveryStore, StoreError};

use crate::loader::{load_day_inputs, log_issues};

/// Sum resolved quantities per product across every active customer.
///
/// No balance gate: the list covers what is scheduled, funded or not.
pub async fn procurement_list(
    store: &dyn DeliveryStore,
    date: NaiveDate,
) -> Result<ProcurementList, StoreError> {
    let subs = store.active_subscriptions().await?;
    let inputs = load_day_inputs(store, &subs, date).await?;

    let mut tally = ProcurementTally::new(date);
    for (customer_id, customer_subs) in group_by_customer(subs) {
        let res = resolve_customer_day(&inputs.customer_day(customer_id, &customer_subs));
        log_issues(&res);
        tally.add(&res);
    }

    let list = tally.finish();
    tracing::info!(%date, products = list.items.len(), "procurement list built");
    Ok(list)
}
