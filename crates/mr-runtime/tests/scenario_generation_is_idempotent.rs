//! Scenario: running the same delivery date twice creates nothing new.
//!
//! GREEN when:
//! - the first run creates one order per funded customer;
//! - the second run reports `orders_created == 0` and every customer as
//!   already materialized;
//! - the set of orders and the wallet log are unchanged by the second run;
//! - a customer materialized before the run (e.g. by a run that was dropped
//!   half-way) is picked up as already materialized.

use chrono::NaiveDate;
use mr_runtime::{CustomerOutcome, GenerationRun, RunConfig, RunState};
use mr_schemas::{Money, NewOrder, Product, SubscriptionRecord};
use mr_store::{DeliveryStore, MemoryStore};
use uuid::Uuid;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn m(major: i64) -> Money {
    Money::from_major(major).unwrap()
}

fn daily(customer_id: Uuid, product_id: Uuid, qty: i64) -> SubscriptionRecord {
    SubscriptionRecord {
        id: Uuid::new_v4(),
        customer_id,
        product_id,
        quantity: qty,
        pattern: "daily".to_string(),
        custom_days: None,
        start_date: d("2024-01-01"),
        end_date: None,
        status: "active".to_string(),
    }
}

fn seed(store: &MemoryStore, customers: usize) -> (Product, Vec<Uuid>) {
    let milk = Product {
        id: Uuid::new_v4(),
        name: "Milk 1L".to_string(),
        unit_price: m(60),
        is_available: true,
    };
    store.put_product(milk.clone());
    let ids: Vec<Uuid> = (0..customers).map(|_| Uuid::new_v4()).collect();
    for c in &ids {
        store.insert_subscription(daily(*c, milk.id, 1));
        store.credit_wallet(*c, m(500)).unwrap();
    }
    (milk, ids)
}

#[tokio::test]
async fn second_run_for_same_date_creates_nothing() {
    let store = MemoryStore::new();
    let (_, customers) = seed(&store, 3);
    let date = d("2024-01-10");

    let mut first = GenerationRun::new(date, RunConfig::default());
    assert_eq!(first.state(), RunState::NotStarted);
    let r1 = first.execute(&store).await.unwrap();
    assert_eq!(first.state(), RunState::Completed);
    assert_eq!(r1.orders_created, 3);
    assert_eq!(r1.orders_skipped, 0);

    let orders_after_first: Vec<Uuid> = store.orders().iter().map(|o| o.id).collect();
    let log_after_first: usize = customers
        .iter()
        .map(|c| store.transactions_for(*c).len())
        .sum();

    let mut second = GenerationRun::new(date, RunConfig::default());
    let r2 = second.execute(&store).await.unwrap();
    assert_eq!(r2.orders_created, 0);
    assert_eq!(r2.orders_skipped, 0);
    assert_eq!(r2.tally.already_materialized, 3);

    let orders_after_second: Vec<Uuid> = store.orders().iter().map(|o| o.id).collect();
    assert_eq!(orders_after_first, orders_after_second);
    let log_after_second: usize = customers
        .iter()
        .map(|c| store.transactions_for(*c).len())
        .sum();
    assert_eq!(log_after_first, log_after_second, "no second debit");

    for c in &customers {
        assert_eq!(store.balance(*c), m(440));
    }
}

#[tokio::test]
async fn partially_materialized_date_is_completed_by_next_run() {
    let store = MemoryStore::new();
    let (milk, customers) = seed(&store, 2);
    let date = d("2024-01-10");

    // One customer was already materialized before this run started.
    let pre = store
        .materialize(&NewOrder {
            customer_id: customers[0],
            delivery_date: date,
            items: Vec::new(),
            total_amount: milk.unit_price,
            tolerance: Money::ZERO,
        })
        .await
        .unwrap();

    let mut run = GenerationRun::new(date, RunConfig::default());
    let report = run.execute(&store).await.unwrap();

    assert_eq!(report.orders_created, 1);
    assert_eq!(
        report.outcomes[&customers[0]],
        CustomerOutcome::AlreadyMaterialized {
            order_id: pre.order().id
        }
    );
    assert!(matches!(
        report.outcomes[&customers[1]],
        CustomerOutcome::Created { .. }
    ));
    assert_eq!(store.orders().len(), 2);
}

#[tokio::test]
async fn a_run_cannot_be_executed_twice() {
    let store = MemoryStore::new();
    seed(&store, 1);
    let mut run = GenerationRun::new(d("2024-01-10"), RunConfig::default());
    run.execute(&store).await.unwrap();
    let err = run.execute(&store).await.unwrap_err();
    assert_eq!(err, mr_runtime::RunError::AlreadyStarted(RunState::Completed));
}

#[tokio::test]
async fn completed_run_is_recorded() {
    let store = MemoryStore::new();
    seed(&store, 2);
    let mut run = GenerationRun::new(d("2024-01-10"), RunConfig::default());
    let report = run.execute(&store).await.unwrap();

    let runs = store.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0], report.to_record());
    assert_eq!(runs[0].run_id, run.run_id());
    assert_eq!(runs[0].orders_created, 2);
    assert_eq!(store.latest_run().await.unwrap(), Some(report.to_record()));
}

#[tokio::test]
async fn single_worker_gives_same_result_as_many() {
    let date = d("2024-01-10");
    for parallel in [1, 16] {
        let store = MemoryStore::new();
        seed(&store, 5);
        let cfg = RunConfig {
            max_parallel_customers: parallel,
            ..RunConfig::default()
        };
        let report = GenerationRun::new(date, cfg).execute(&store).await.unwrap();
        assert_eq!(report.orders_created, 5, "parallel={parallel}");
        assert_eq!(report.outcomes.len(), 5);
    }
}
