//! Scenario: the in-memory store honours the materialization contract.
//!
//! GREEN when:
//! - a second materialize for the same (customer, date) returns the existing
//!   order and debits nothing;
//! - a cancelled order does not occupy the slot;
//! - a failed balance re-check writes nothing;
//! - an unavailable store fails the call without side effects.

use chrono::{NaiveDate, Utc};
use mr_schemas::{Money, NewOrder, Order, OrderItem, OrderStatus, TransactionKind};
use mr_store::{DeliveryStore, Fault, Materialized, MemoryStore, StoreError};
use uuid::Uuid;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn m(major: i64) -> Money {
    Money::from_major(major).unwrap()
}

fn new_order(customer_id: Uuid, total: Money) -> NewOrder {
    NewOrder {
        customer_id,
        delivery_date: d("2024-04-02"),
        items: vec![OrderItem {
            subscription_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: "Milk".to_string(),
            quantity: 1,
            unit_price: total,
            line_total: total,
        }],
        total_amount: total,
        tolerance: Money::ZERO,
    }
}

#[tokio::test]
async fn second_materialize_is_a_noop() {
    let store = MemoryStore::new();
    let customer = Uuid::new_v4();
    store.credit_wallet(customer, m(100)).unwrap();

    let first = store.materialize(&new_order(customer, m(75))).await.unwrap();
    assert!(first.is_created());
    assert_eq!(first.order().status, OrderStatus::Pending);
    assert_eq!(store.balance(customer), m(25));

    let second = store.materialize(&new_order(customer, m(75))).await.unwrap();
    assert!(matches!(second, Materialized::AlreadyExists(_)));
    assert_eq!(second.order().id, first.order().id);
    assert_eq!(store.balance(customer), m(25), "no second debit");
    assert_eq!(store.orders_for(customer).len(), 1);

    let debits: Vec<_> = store
        .transactions_for(customer)
        .into_iter()
        .filter(|t| t.kind == TransactionKind::Debit)
        .collect();
    assert_eq!(debits.len(), 1);
    assert_eq!(debits[0].amount, m(75));
    assert_eq!(debits[0].balance_after, m(25));
    assert_eq!(debits[0].description, "Order for 2024-04-02");
}

#[tokio::test]
async fn cancelled_order_frees_the_slot() {
    let store = MemoryStore::new();
    let customer = Uuid::new_v4();
    store.credit_wallet(customer, m(100)).unwrap();
    store.insert_order(Order {
        id: Uuid::new_v4(),
        customer_id: customer,
        delivery_date: d("2024-04-02"),
        items: Vec::new(),
        total_amount: m(10),
        status: OrderStatus::Cancelled,
        created_at: Utc::now(),
    });

    assert_eq!(
        store.existing_order(customer, d("2024-04-02")).await.unwrap(),
        None
    );
    let out = store.materialize(&new_order(customer, m(30))).await.unwrap();
    assert!(out.is_created());
    assert_eq!(store.orders_for(customer).len(), 2);
}

#[tokio::test]
async fn balance_race_commits_nothing() {
    let store = MemoryStore::new();
    let customer = Uuid::new_v4();
    store.credit_wallet(customer, m(80)).unwrap();
    store.inject_fault(customer, Fault::ConcurrentSpend(m(20)));

    let err = store
        .materialize(&new_order(customer, m(75)))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        StoreError::BalanceRace {
            available: m(60),
            required: m(75),
        }
    );
    assert!(store.orders_for(customer).is_empty());
    // Only the recharge and the concurrent spend are on the log.
    assert_eq!(store.transactions_for(customer).len(), 2);
    assert_eq!(store.balance(customer), m(60));
}

#[tokio::test]
async fn wallet_version_bumps_on_every_write() {
    let store = MemoryStore::new();
    let customer = Uuid::new_v4();
    assert_eq!(store.wallet_version(customer), 0);
    store.credit_wallet(customer, m(100)).unwrap();
    store.materialize(&new_order(customer, m(40))).await.unwrap();
    assert_eq!(store.wallet_version(customer), 2);
}

#[tokio::test]
async fn unavailable_customer_and_offline_store_fail_cleanly() {
    let store = MemoryStore::new();
    let customer = Uuid::new_v4();
    store.credit_wallet(customer, m(100)).unwrap();
    store.inject_fault(customer, Fault::Unavailable);

    let err = store
        .materialize(&new_order(customer, m(10)))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Backend(_)));
    assert_eq!(store.balance(customer), m(100));

    store.set_offline(true);
    assert!(store.active_subscriptions().await.is_err());
    store.set_offline(false);
    assert!(store.active_subscriptions().await.unwrap().is_empty());
}
