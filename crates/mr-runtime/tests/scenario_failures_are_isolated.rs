//! Scenario: one customer's trouble never spills onto another.
//!
//! GREEN when:
//! - a persistence failure for one customer is reported as `failed` and the
//!   others are still materialized;
//! - a wallet spent between the gate and the debit yields no order and is
//!   counted as skipped;
//! - a store that cannot load the run's inputs aborts before writing anything
//!   and leaves the run startable.

use chrono::NaiveDate;
use mr_runtime::{CustomerOutcome, GenerationRun, RunConfig, RunError, RunState};
use mr_schemas::{Money, Product, SubscriptionRecord};
use mr_store::{Fault, MemoryStore};
use uuid::Uuid;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn m(major: i64) -> Money {
    Money::from_major(major).unwrap()
}

fn seed(store: &MemoryStore, n: usize) -> Vec<Uuid> {
    let bread = Product {
        id: Uuid::new_v4(),
        name: "Bread".to_string(),
        unit_price: m(40),
        is_available: true,
    };
    store.put_product(bread.clone());
    (0..n)
        .map(|_| {
            let c = Uuid::new_v4();
            store.insert_subscription(SubscriptionRecord {
                id: Uuid::new_v4(),
                customer_id: c,
                product_id: bread.id,
                quantity: 1,
                pattern: "daily".to_string(),
                custom_days: None,
                start_date: d("2024-01-01"),
                end_date: None,
                status: "active".to_string(),
            });
            store.credit_wallet(c, m(100)).unwrap();
            c
        })
        .collect()
}

#[tokio::test]
async fn persistence_failure_is_local_to_one_customer() {
    let store = MemoryStore::new();
    let customers = seed(&store, 3);
    store.inject_fault(customers[1], Fault::Unavailable);

    let report = GenerationRun::new(d("2024-01-10"), RunConfig::default())
        .execute(&store)
        .await
        .unwrap();

    assert_eq!(report.orders_created, 2);
    assert_eq!(report.orders_skipped, 0, "failures are not skips");
    assert_eq!(report.tally.failed, 1);
    assert!(matches!(
        report.outcomes[&customers[1]],
        CustomerOutcome::Failed { .. }
    ));
    assert_eq!(store.orders_for(customers[0]).len(), 1);
    assert!(store.orders_for(customers[1]).is_empty());
    assert_eq!(store.balance(customers[1]), m(100));
    assert_eq!(store.orders_for(customers[2]).len(), 1);
}

#[tokio::test]
async fn balance_race_commits_no_order() {
    let store = MemoryStore::new();
    let customers = seed(&store, 2);
    store.inject_fault(customers[0], Fault::ConcurrentSpend(m(70)));

    let report = GenerationRun::new(d("2024-01-10"), RunConfig::default())
        .execute(&store)
        .await
        .unwrap();

    assert_eq!(
        report.outcomes[&customers[0]],
        CustomerOutcome::SkippedBalanceRace {
            available: m(30),
            required: m(40),
        }
    );
    assert_eq!(report.orders_skipped, 1);
    assert_eq!(report.tally.skipped_balance_race, 1);
    assert!(store.orders_for(customers[0]).is_empty());
    assert_eq!(store.balance(customers[0]), m(30));
    assert_eq!(report.orders_created, 1);
}

#[tokio::test]
async fn unreadable_store_aborts_before_writing() {
    let store = MemoryStore::new();
    seed(&store, 2);
    store.set_offline(true);

    let mut run = GenerationRun::new(d("2024-01-10"), RunConfig::default());
    let err = run.execute(&store).await.unwrap_err();
    assert!(matches!(err, RunError::Load(_)));
    assert_eq!(run.state(), RunState::NotStarted);

    store.set_offline(false);
    assert!(store.orders().is_empty());
    let report = run.execute(&store).await.unwrap();
    assert_eq!(report.orders_created, 2);
}

#[tokio::test]
async fn report_serializes_admin_pair() {
    let store = MemoryStore::new();
    seed(&store, 1);
    let report = GenerationRun::new(d("2024-01-10"), RunConfig::default())
        .execute(&store)
        .await
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["orders_created"], 1);
    assert_eq!(json["orders_skipped"], 0);
    assert_eq!(json["target_date"], "2024-01-10");
    assert!(json.get("outcomes").is_none());
}
