//! Vacation windows.

use std::collections::HashMap;

use chrono::NaiveDate;
use mr_schemas::Vacation;
use uuid::Uuid;

/// Vacation ranges grouped by customer. Overlapping ranges are a union.
#[derive(Clone, Debug, Default)]
pub struct VacationCalendar {
    by_customer: HashMap<Uuid, Vec<Vacation>>,
}

impl VacationCalendar {
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = Vacation>,
    {
        let mut by_customer: HashMap<Uuid, Vec<Vacation>> = HashMap::new();
        for v in rows {
            by_customer.entry(v.customer_id).or_default().push(v);
        }
        VacationCalendar { by_customer }
    }

    /// True iff `date` falls inside any of the customer's inclusive ranges.
    pub fn is_on_vacation(&self, customer_id: Uuid, date: NaiveDate) -> bool {
        self.by_customer
            .get(&customer_id)
            .map_or(false, |ranges| ranges.iter().any(|v| v.contains(date)))
    }
}
