//! Shared per-customer resolution.
//!
//! Order of precedence for one subscription on one date:
//! 1. pattern decides inclusion,
//! 2. a modification for that exact date replaces the quantity,
//! 3. a vacation covering the date vetoes everything.
//!
//! Surviving lines are priced from the current catalog. A line that cannot be
//! priced is dropped and reported as a [`ResolutionIssue`]; the rest of the
//! customer's lines are unaffected.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::NaiveDate;
use mr_schemas::{
    Money, OrderItem, Product, Subscription, SubscriptionError, SubscriptionRecord,
};
use uuid::Uuid;

use crate::balance::order_total;
use crate::overlay::{self, ModificationIndex};
use crate::pattern;
use crate::vacation::VacationCalendar;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Everything resolution needs for one customer on one date, already loaded.
#[derive(Clone, Copy, Debug)]
pub struct CustomerDay<'a> {
    pub customer_id: Uuid,
    pub date: NaiveDate,
    /// Records belonging to other customers are ignored.
    pub subscriptions: &'a [SubscriptionRecord],
    pub modifications: &'a ModificationIndex,
    pub vacations: &'a VacationCalendar,
    pub products: &'a HashMap<Uuid, Product>,
}

// ---------------------------------------------------------------------------
// ResolutionIssue
// ---------------------------------------------------------------------------

/// Why a single line was left out of a customer's order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionIssue {
    InvalidSubscription {
        subscription_id: Uuid,
        error: SubscriptionError,
    },
    UnknownProduct {
        subscription_id: Uuid,
        product_id: Uuid,
    },
    ProductUnavailable {
        subscription_id: Uuid,
        product_id: Uuid,
    },
    LineOverflow {
        subscription_id: Uuid,
        quantity: u32,
        unit_price: Money,
    },
}

impl ResolutionIssue {
    pub fn subscription_id(&self) -> Uuid {
        match self {
            ResolutionIssue::InvalidSubscription { subscription_id, .. }
            | ResolutionIssue::UnknownProduct { subscription_id, .. }
            | ResolutionIssue::ProductUnavailable { subscription_id, .. }
            | ResolutionIssue::LineOverflow { subscription_id, .. } => *subscription_id,
        }
    }

    /// Stable machine-readable code for logs.
    pub fn code(&self) -> &'static str {
        match self {
            ResolutionIssue::InvalidSubscription { .. } => "INVALID_SUBSCRIPTION",
            ResolutionIssue::UnknownProduct { .. } => "UNKNOWN_PRODUCT",
            ResolutionIssue::ProductUnavailable { .. } => "PRODUCT_UNAVAILABLE",
            ResolutionIssue::LineOverflow { .. } => "LINE_OVERFLOW",
        }
    }
}

impl fmt::Display for ResolutionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionIssue::InvalidSubscription {
                subscription_id,
                error,
            } => write!(f, "subscription {subscription_id} is malformed: {error}"),
            ResolutionIssue::UnknownProduct {
                subscription_id,
                product_id,
            } => write!(
                f,
                "subscription {subscription_id} references unknown product {product_id}"
            ),
            ResolutionIssue::ProductUnavailable {
                subscription_id,
                product_id,
            } => write!(
                f,
                "subscription {subscription_id}: product {product_id} is unavailable"
            ),
            ResolutionIssue::LineOverflow {
                subscription_id,
                quantity,
                unit_price,
            } => write!(
                f,
                "subscription {subscription_id}: {quantity} x {unit_price} overflows"
            ),
        }
    }
}

impl std::error::Error for ResolutionIssue {}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub customer_id: Uuid,
    pub date: NaiveDate,
    /// Ordered by subscription `start_date`, then subscription id.
    pub lines: Vec<OrderItem>,
    pub on_vacation: bool,
    pub issues: Vec<ResolutionIssue>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total(&self) -> Money {
        order_total(&self.lines)
    }
}

/// Resolve what `input.customer_id` receives on `input.date`.
pub fn resolve_customer_day(input: &CustomerDay<'_>) -> Resolution {
    let CustomerDay {
        customer_id,
        date,
        subscriptions,
        modifications,
        vacations,
        products,
    } = *input;

    let mut issues = Vec::new();
    let mut subs: Vec<Subscription> = Vec::new();
    for rec in subscriptions.iter().filter(|r| r.customer_id == customer_id) {
        match Subscription::try_from_record(rec) {
            Ok(s) => subs.push(s),
            Err(error) => issues.push(ResolutionIssue::InvalidSubscription {
                subscription_id: rec.id,
                error,
            }),
        }
    }
    subs.sort_by_key(|s| (s.start_date, s.id));

    let on_vacation = vacations.is_on_vacation(customer_id, date);

    let mut lines = Vec::new();
    for sub in &subs {
        let included = pattern::resolve(sub, date);
        let quantity = overlay::apply(sub, date, included, modifications);
        if quantity == 0 || on_vacation {
            continue;
        }

        let product = match products.get(&sub.product_id) {
            Some(p) if p.is_available => p,
            Some(_) => {
                issues.push(ResolutionIssue::ProductUnavailable {
                    subscription_id: sub.id,
                    product_id: sub.product_id,
                });
                continue;
            }
            None => {
                issues.push(ResolutionIssue::UnknownProduct {
                    subscription_id: sub.id,
                    product_id: sub.product_id,
                });
                continue;
            }
        };

        let Some(line_total) = product.unit_price.checked_mul_qty(quantity) else {
            issues.push(ResolutionIssue::LineOverflow {
                subscription_id: sub.id,
                quantity,
                unit_price: product.unit_price,
            });
            continue;
        };

        lines.push(OrderItem {
            subscription_id: sub.id,
            product_id: product.id,
            product_name: product.name.clone(),
            quantity,
            unit_price: product.unit_price,
            line_total,
        });
    }

    Resolution {
        customer_id,
        date,
        lines,
        on_vacation,
        issues,
    }
}

// ---------------------------------------------------------------------------
// Loader helpers
// ---------------------------------------------------------------------------

/// Group records by customer, ordered by customer id.
pub fn group_by_customer<I>(records: I) -> BTreeMap<Uuid, Vec<SubscriptionRecord>>
where
    I: IntoIterator<Item = SubscriptionRecord>,
{
    let mut out: BTreeMap<Uuid, Vec<SubscriptionRecord>> = BTreeMap::new();
    for r in records {
        out.entry(r.customer_id).or_default().push(r);
    }
    out
}

/// Sorted, de-duplicated product ids referenced by `records`.
pub fn product_ids(records: &[SubscriptionRecord]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = records.iter().map(|r| r.product_id).collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Sorted, de-duplicated subscription ids.
pub fn subscription_ids(records: &[SubscriptionRecord]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
    ids.sort();
    ids.dedup();
    ids
}
