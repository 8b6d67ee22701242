//! Per-date quantity modifications.

use std::collections::HashMap;

use chrono::NaiveDate;
use mr_schemas::{Modification, Subscription};
use uuid::Uuid;

/// Modifications keyed by `(subscription_id, date)`.
///
/// Rows are applied in the order given; a later row for the same key
/// replaces the earlier one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModificationIndex {
    by_key: HashMap<(Uuid, NaiveDate), u32>,
}

impl ModificationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = Modification>,
    {
        let mut idx = Self::new();
        for m in rows {
            idx.record(&m);
        }
        idx
    }

    pub fn record(&mut self, m: &Modification) {
        self.by_key.insert((m.subscription_id, m.date), m.quantity);
    }

    pub fn get(&self, subscription_id: Uuid, date: NaiveDate) -> Option<u32> {
        self.by_key.get(&(subscription_id, date)).copied()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// Effective quantity of `sub` on `date`. `0` drops the line.
///
/// A modification replaces the base quantity outright: `0` skips a date the
/// pattern included, and a non-zero value adds a date the pattern excluded
/// as long as the subscription is active and `date` lies within its range.
pub fn apply(sub: &Subscription, date: NaiveDate, included: bool, mods: &ModificationIndex) -> u32 {
    if !sub.is_active() || !sub.in_range(date) {
        return 0;
    }
    match mods.get(sub.id, date) {
        Some(qty) => qty,
        None if included => sub.quantity,
        None => 0,
    }
}
