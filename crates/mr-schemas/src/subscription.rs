//! Subscription records and their boundary validation.
//!
//! Stores hand out [`SubscriptionRecord`]s exactly as persisted (pattern as
//! text, weekday indices as plain integers). [`Subscription::try_from_record`]
//! is the only way to obtain a typed [`Subscription`]; every invariant the
//! resolver relies on is checked there, once.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// WeekdaySet
// ---------------------------------------------------------------------------

/// Set of weekday indices, `0 = Monday` … `6 = Sunday`, stored as a bitmask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    /// Build from raw indices. Duplicates are harmless; out-of-range indices
    /// are rejected.
    pub fn from_indices(indices: &[i32]) -> Result<Self, SubscriptionError> {
        let mut bits = 0u8;
        for &i in indices {
            if !(0..=6).contains(&i) {
                return Err(SubscriptionError::WeekdayOutOfRange(i));
            }
            bits |= 1 << i;
        }
        Ok(WeekdaySet(bits))
    }

    pub fn contains(&self, index: u8) -> bool {
        index < 7 && self.0 & (1 << index) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Ascending indices.
    pub fn indices(&self) -> Vec<i32> {
        (0..7).filter(|i| self.0 & (1 << i) != 0).collect()
    }
}

// ---------------------------------------------------------------------------
// Pattern / status
// ---------------------------------------------------------------------------

/// Recurrence rule of a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pattern {
    Daily,
    /// Every other day counted from `start_date` (day 0 included).
    Alternate,
    /// Only on the listed weekdays.
    Custom(WeekdaySet),
    /// Exactly one delivery on `start_date`.
    BuyOnce,
}

impl Pattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pattern::Daily => "daily",
            Pattern::Alternate => "alternate",
            Pattern::Custom(_) => "custom",
            Pattern::BuyOnce => "buy_once",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, SubscriptionError> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            other => Err(SubscriptionError::UnknownStatus(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// SubscriptionError
// ---------------------------------------------------------------------------

/// Why a persisted subscription record could not be turned into a
/// [`Subscription`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    UnknownPattern(String),
    UnknownStatus(String),
    /// `custom` pattern with no weekday selected.
    MissingCustomDays,
    WeekdayOutOfRange(i32),
    NegativeQuantity(i64),
    QuantityTooLarge(i64),
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
    /// `buy_once` whose end date differs from its start date.
    BuyOnceSpansDays { start: NaiveDate, end: NaiveDate },
}

impl fmt::Display for SubscriptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionError::UnknownPattern(p) => write!(f, "unknown pattern {p:?}"),
            SubscriptionError::UnknownStatus(s) => write!(f, "unknown status {s:?}"),
            SubscriptionError::MissingCustomDays => {
                write!(f, "custom pattern requires at least one weekday")
            }
            SubscriptionError::WeekdayOutOfRange(i) => {
                write!(f, "weekday index {i} outside 0..=6")
            }
            SubscriptionError::NegativeQuantity(q) => write!(f, "negative quantity {q}"),
            SubscriptionError::QuantityTooLarge(q) => write!(f, "quantity {q} too large"),
            SubscriptionError::EndBeforeStart { start, end } => {
                write!(f, "end_date {end} is before start_date {start}")
            }
            SubscriptionError::BuyOnceSpansDays { start, end } => {
                write!(f, "buy_once must start and end on the same day ({start} != {end})")
            }
        }
    }
}

impl std::error::Error for SubscriptionError {}

// ---------------------------------------------------------------------------
// SubscriptionRecord (untyped boundary shape)
// ---------------------------------------------------------------------------

/// A subscription row as persisted, before validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    /// "daily" | "alternate" | "custom" | "buy_once"
    pub pattern: String,
    pub custom_days: Option<Vec<i32>>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    /// "active" | "cancelled"
    pub status: String,
}

// ---------------------------------------------------------------------------
// Subscription (validated)
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscription {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub product_id: Uuid,
    pub quantity: u32,
    pub pattern: Pattern,
    pub start_date: NaiveDate,
    /// Always `Some(start_date)` for `BuyOnce`.
    pub end_date: Option<NaiveDate>,
    pub status: SubscriptionStatus,
}

impl Subscription {
    /// Validate a persisted record.
    ///
    /// A `buy_once` record without an end date is normalized to
    /// `end_date = start_date`.
    pub fn try_from_record(rec: &SubscriptionRecord) -> Result<Self, SubscriptionError> {
        if rec.quantity < 0 {
            return Err(SubscriptionError::NegativeQuantity(rec.quantity));
        }
        let quantity = u32::try_from(rec.quantity)
            .map_err(|_| SubscriptionError::QuantityTooLarge(rec.quantity))?;

        let status = SubscriptionStatus::parse(&rec.status)?;

        let pattern = match rec.pattern.as_str() {
            "daily" => Pattern::Daily,
            "alternate" => Pattern::Alternate,
            "buy_once" => Pattern::BuyOnce,
            "custom" => {
                let days = WeekdaySet::from_indices(rec.custom_days.as_deref().unwrap_or(&[]))?;
                if days.is_empty() {
                    return Err(SubscriptionError::MissingCustomDays);
                }
                Pattern::Custom(days)
            }
            other => return Err(SubscriptionError::UnknownPattern(other.to_string())),
        };

        if let Some(end) = rec.end_date {
            if end < rec.start_date {
                return Err(SubscriptionError::EndBeforeStart {
                    start: rec.start_date,
                    end,
                });
            }
        }

        let end_date = match pattern {
            Pattern::BuyOnce => match rec.end_date {
                Some(end) if end != rec.start_date => {
                    return Err(SubscriptionError::BuyOnceSpansDays {
                        start: rec.start_date,
                        end,
                    })
                }
                _ => Some(rec.start_date),
            },
            _ => rec.end_date,
        };

        Ok(Subscription {
            id: rec.id,
            customer_id: rec.customer_id,
            product_id: rec.product_id,
            quantity,
            pattern,
            start_date: rec.start_date,
            end_date,
            status,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    /// `start_date <= date <= end_date` (open-ended when `end_date` is null).
    pub fn in_range(&self, date: NaiveDate) -> bool {
        date >= self.start_date && self.end_date.map_or(true, |end| date <= end)
    }
}

impl From<&Subscription> for SubscriptionRecord {
    fn from(s: &Subscription) -> Self {
        let custom_days = match s.pattern {
            Pattern::Custom(days) => Some(days.indices()),
            _ => None,
        };
        SubscriptionRecord {
            id: s.id,
            customer_id: s.customer_id,
            product_id: s.product_id,
            quantity: i64::from(s.quantity),
            pattern: s.pattern.as_str().to_string(),
            custom_days,
            start_date: s.start_date,
            end_date: s.end_date,
            status: s.status.as_str().to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn record(pattern: &str) -> SubscriptionRecord {
        SubscriptionRecord {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity: 1,
            pattern: pattern.to_string(),
            custom_days: None,
            start_date: d("2024-01-01"),
            end_date: None,
            status: "active".to_string(),
        }
    }

    #[test]
    fn custom_without_days_is_rejected() {
        let mut rec = record("custom");
        assert_eq!(
            Subscription::try_from_record(&rec),
            Err(SubscriptionError::MissingCustomDays)
        );
        rec.custom_days = Some(vec![]);
        assert_eq!(
            Subscription::try_from_record(&rec),
            Err(SubscriptionError::MissingCustomDays)
        );
    }

    #[test]
    fn custom_day_out_of_range_is_rejected() {
        let mut rec = record("custom");
        rec.custom_days = Some(vec![0, 7]);
        assert_eq!(
            Subscription::try_from_record(&rec),
            Err(SubscriptionError::WeekdayOutOfRange(7))
        );
    }

    #[test]
    fn buy_once_without_end_is_normalized() {
        let rec = record("buy_once");
        let sub = Subscription::try_from_record(&rec).unwrap();
        assert_eq!(sub.end_date, Some(rec.start_date));
    }

    #[test]
    fn buy_once_spanning_days_is_rejected() {
        let mut rec = record("buy_once");
        rec.end_date = Some(d("2024-01-02"));
        assert!(matches!(
            Subscription::try_from_record(&rec),
            Err(SubscriptionError::BuyOnceSpansDays { .. })
        ));
    }

    #[test]
    fn end_before_start_is_rejected() {
        let mut rec = record("daily");
        rec.end_date = Some(d("2023-12-31"));
        assert!(matches!(
            Subscription::try_from_record(&rec),
            Err(SubscriptionError::EndBeforeStart { .. })
        ));
    }

    #[test]
    fn unknown_pattern_and_negative_quantity_are_rejected() {
        assert_eq!(
            Subscription::try_from_record(&record("weekly")),
            Err(SubscriptionError::UnknownPattern("weekly".to_string()))
        );
        let mut rec = record("daily");
        rec.quantity = -1;
        assert_eq!(
            Subscription::try_from_record(&rec),
            Err(SubscriptionError::NegativeQuantity(-1))
        );
    }

    #[test]
    fn record_roundtrip_preserves_custom_days() {
        let mut rec = record("custom");
        rec.custom_days = Some(vec![5, 0, 5]);
        let sub = Subscription::try_from_record(&rec).unwrap();
        let back = SubscriptionRecord::from(&sub);
        assert_eq!(back.custom_days, Some(vec![0, 5]));
        assert_eq!(Subscription::try_from_record(&back).unwrap(), sub);
    }
}
