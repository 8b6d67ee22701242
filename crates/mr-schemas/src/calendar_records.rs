//! Per-date customer inputs: quantity modifications and vacation windows.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A customer override of one subscription's quantity on one date.
///
/// Keyed by `(subscription_id, date)`; a later write for the same key
/// replaces the earlier one. `quantity == 0` means "skip this date".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modification {
    pub subscription_id: Uuid,
    pub date: NaiveDate,
    pub quantity: u32,
}

/// Inclusive date range during which a customer receives nothing.
///
/// Deserialization goes through [`Vacation::new`], so an inverted range is
/// rejected at the boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "VacationFields")]
pub struct Vacation {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Vacation {
    pub fn new(
        id: Uuid,
        customer_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self, InvalidRange> {
        if end_date < start_date {
            return Err(InvalidRange {
                start: start_date,
                end: end_date,
            });
        }
        Ok(Vacation {
            id,
            customer_id,
            start_date,
            end_date,
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[derive(Deserialize)]
struct VacationFields {
    id: Uuid,
    customer_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

impl TryFrom<VacationFields> for Vacation {
    type Error = InvalidRange;

    fn try_from(f: VacationFields) -> Result<Self, Self::Error> {
        Vacation::new(f.id, f.customer_id, f.start_date, f.end_date)
    }
}

/// A date range whose end precedes its start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for InvalidRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid date range: {} is after {}", self.start, self.end)
    }
}

impl std::error::Error for InvalidRange {}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn vacation_bounds_are_inclusive() {
        let v = Vacation::new(Uuid::new_v4(), Uuid::new_v4(), d("2024-01-05"), d("2024-01-07"))
            .unwrap();
        assert!(v.contains(d("2024-01-05")));
        assert!(v.contains(d("2024-01-07")));
        assert!(!v.contains(d("2024-01-08")));
    }

    #[test]
    fn deserialized_vacation_is_range_checked() {
        let id = Uuid::new_v4();
        let customer = Uuid::new_v4();
        let ok = format!(
            r#"{{"id":"{id}","customer_id":"{customer}","start_date":"2024-01-07","end_date":"2024-01-07"}}"#
        );
        let v: Vacation = serde_json::from_str(&ok).unwrap();
        assert_eq!(v.start_date, v.end_date);

        let inverted = format!(
            r#"{{"id":"{id}","customer_id":"{customer}","start_date":"2024-01-09","end_date":"2024-01-07"}}"#
        );
        let err = serde_json::from_str::<Vacation>(&inverted).unwrap_err();
        assert!(err.to_string().contains("invalid date range"), "{err}");
    }
}
