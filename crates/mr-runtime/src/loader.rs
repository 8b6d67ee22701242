use std::collections::HashMap;

use chrono::NaiveDate;
use mr_engine::{
    product_ids, subscription_ids, CustomerDay, ModificationIndex, Resolution, VacationCalendar,
};
use mr_schemas::{Product, SubscriptionRecord};
use mr_store::{DeliveryStore, StoreError};
use uuid::Uuid;

/// Per-date inputs for a set of subscriptions, fetched in three batched reads.
pub(crate) struct DayInputs {
    pub date: NaiveDate,
    pub modifications: ModificationIndex,
    pub vacations: VacationCalendar,
    pub products: HashMap<Uuid, Product>,
}

impl DayInputs {
    pub fn customer_day<'a>(
        &'a self,
        customer_id: Uuid,
        subscriptions: &'a [SubscriptionRecord],
    ) -> CustomerDay<'a> {
        CustomerDay {
            customer_id,
            date: self.date,
            subscriptions,
            modifications: &self.modifications,
            vacations: &self.vacations,
            products: &self.products,
        }
    }
}

pub(crate) async fn load_day_inputs(
    store: &dyn DeliveryStore,
    subscriptions: &[SubscriptionRecord],
    date: NaiveDate,
) -> Result<DayInputs, StoreError> {
    let mut customers: Vec<Uuid> = subscriptions.iter().map(|s| s.customer_id).collect();
    customers.sort();
    customers.dedup();

    let modifications = store
        .modifications_on(&subscription_ids(subscriptions), date)
        .await?;
    let vacations = store.vacations_covering(&customers, date).await?;
    let products = store.products(&product_ids(subscriptions)).await?;

    Ok(DayInputs {
        date,
        modifications: ModificationIndex::from_rows(modifications),
        vacations: VacationCalendar::from_rows(vacations),
        products: products.into_iter().map(|p| (p.id, p)).collect(),
    })
}

/// Dropped lines are not fatal; they are logged and the order goes on.
pub(crate) fn log_issues(res: &Resolution) {
    for issue in &res.issues {
        tracing::warn!(
            customer_id = %res.customer_id,
            date = %res.date,
            subscription_id = %issue.subscription_id(),
            code = issue.code(),
            "line excluded: {issue}"
        );
    }
}
