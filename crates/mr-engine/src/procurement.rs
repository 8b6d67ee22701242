//! Procurement list: how much of each product the route needs for one date.

use std::collections::HashMap;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::Resolution;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcurementLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub total_quantity: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcurementList {
    pub date: NaiveDate,
    /// Sorted by product name, then product id.
    pub items: Vec<ProcurementLine>,
}

/// Accumulates resolved lines across customers.
#[derive(Clone, Debug)]
pub struct ProcurementTally {
    date: NaiveDate,
    by_product: HashMap<Uuid, ProcurementLine>,
}

impl ProcurementTally {
    pub fn new(date: NaiveDate) -> Self {
        ProcurementTally {
            date,
            by_product: HashMap::new(),
        }
    }

    /// Add one customer's resolution. Resolutions for another date are ignored.
    pub fn add(&mut self, res: &Resolution) {
        if res.date != self.date {
            return;
        }
        for line in &res.lines {
            let entry = self
                .by_product
                .entry(line.product_id)
                .or_insert_with(|| ProcurementLine {
                    product_id: line.product_id,
                    product_name: line.product_name.clone(),
                    total_quantity: 0,
                });
            entry.total_quantity += u64::from(line.quantity);
        }
    }

    pub fn finish(self) -> ProcurementList {
        let mut items: Vec<ProcurementLine> = self.by_product.into_values().collect();
        items.sort_by(|a, b| {
            a.product_name
                .cmp(&b.product_name)
                .then(a.product_id.cmp(&b.product_id))
        });
        ProcurementList {
            date: self.date,
            items,
        }
    }
}
