//! Scenario: the same inputs always resolve to the same order.
//!
//! GREEN when:
//! - input ordering of subscription records does not change the output;
//! - lines are ordered by subscription start date, then subscription id;
//! - a bad line is dropped with an issue and the rest survive.

use std::collections::HashMap;

use chrono::NaiveDate;
use mr_engine::{
    resolve_customer_day, CustomerDay, ModificationIndex, ResolutionIssue, VacationCalendar,
};
use mr_schemas::{Money, Product, SubscriptionRecord};
use uuid::Uuid;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn product(name: &str, minor: i64, available: bool) -> Product {
    Product {
        id: Uuid::new_v4(),
        name: name.to_string(),
        unit_price: Money::new(minor),
        is_available: available,
    }
}

fn daily(customer: Uuid, product_id: Uuid, qty: i64, start: &str) -> SubscriptionRecord {
    SubscriptionRecord {
        id: Uuid::new_v4(),
        customer_id: customer,
        product_id,
        quantity: qty,
        pattern: "daily".to_string(),
        custom_days: None,
        start_date: d(start),
        end_date: None,
        status: "active".to_string(),
    }
}

#[test]
fn shuffled_inputs_resolve_identically() {
    let customer = Uuid::new_v4();
    let milk = product("Milk", 3_000, true);
    let curd = product("Curd", 4_500, true);
    let bread = product("Bread", 4_000, true);

    let subs = vec![
        daily(customer, milk.id, 2, "2024-01-03"),
        daily(customer, curd.id, 1, "2024-01-01"),
        daily(customer, bread.id, 1, "2024-01-03"),
    ];
    let products: HashMap<Uuid, Product> = [milk, curd, bread]
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    let mods = ModificationIndex::new();
    let vacations = VacationCalendar::default();

    let resolve = |records: &[SubscriptionRecord]| {
        resolve_customer_day(&CustomerDay {
            customer_id: customer,
            date: d("2024-01-10"),
            subscriptions: records,
            modifications: &mods,
            vacations: &vacations,
            products: &products,
        })
    };

    let forward = resolve(&subs);
    let mut reversed = subs.clone();
    reversed.reverse();
    let backward = resolve(&reversed);

    assert_eq!(forward, backward);
    assert_eq!(forward.lines.len(), 3);
    // Earliest start first; equal start dates tie-break on subscription id.
    assert_eq!(forward.lines[0].subscription_id, subs[1].id);
    let tail: Vec<Uuid> = forward.lines[1..].iter().map(|l| l.subscription_id).collect();
    let mut expected = vec![subs[0].id, subs[2].id];
    expected.sort();
    assert_eq!(tail, expected);
    assert_eq!(forward.total(), Money::new(6_000 + 4_500 + 4_000));
}

#[test]
fn bad_lines_are_dropped_individually() {
    let customer = Uuid::new_v4();
    let milk = product("Milk", 3_000, true);
    let paneer = product("Paneer", 9_000, false);
    let ghee = product("Ghee", i64::MAX / 2, true);
    let ghost = Uuid::new_v4();

    let good = daily(customer, milk.id, 1, "2024-01-01");
    let unavailable = daily(customer, paneer.id, 1, "2024-01-01");
    let overflowing = daily(customer, ghee.id, 3, "2024-01-01");
    let unknown = daily(customer, ghost, 1, "2024-01-01");
    let mut malformed = daily(customer, milk.id, 1, "2024-01-01");
    malformed.pattern = "fortnightly".to_string();

    let subs = vec![
        good.clone(),
        unavailable.clone(),
        overflowing.clone(),
        unknown.clone(),
        malformed.clone(),
    ];
    let products: HashMap<Uuid, Product> = [milk, paneer, ghee]
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let res = resolve_customer_day(&CustomerDay {
        customer_id: customer,
        date: d("2024-01-02"),
        subscriptions: &subs,
        modifications: &ModificationIndex::new(),
        vacations: &VacationCalendar::default(),
        products: &products,
    });

    assert_eq!(res.lines.len(), 1);
    assert_eq!(res.lines[0].subscription_id, good.id);

    let mut codes: Vec<(&str, Uuid)> = res
        .issues
        .iter()
        .map(|i| (i.code(), i.subscription_id()))
        .collect();
    codes.sort();
    let mut expected = vec![
        ("INVALID_SUBSCRIPTION", malformed.id),
        ("LINE_OVERFLOW", overflowing.id),
        ("PRODUCT_UNAVAILABLE", unavailable.id),
        ("UNKNOWN_PRODUCT", unknown.id),
    ];
    expected.sort();
    assert_eq!(codes, expected);
    assert!(res
        .issues
        .iter()
        .any(|i| matches!(i, ResolutionIssue::InvalidSubscription { .. })));
}

#[test]
fn other_customers_records_are_ignored() {
    let me = Uuid::new_v4();
    let someone_else = Uuid::new_v4();
    let milk = product("Milk", 3_000, true);
    let subs = vec![daily(someone_else, milk.id, 5, "2024-01-01")];
    let products = HashMap::from([(milk.id, milk)]);
    let res = resolve_customer_day(&CustomerDay {
        customer_id: me,
        date: d("2024-01-02"),
        subscriptions: &subs,
        modifications: &ModificationIndex::new(),
        vacations: &VacationCalendar::default(),
        products: &products,
    });
    assert!(res.is_empty());
}
