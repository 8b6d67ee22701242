//! Delivery calendar: the single "what is tomorrow" policy.
//!
//! Deterministic, pure logic. The wall clock is an argument, never read here.
//!
//! # Design
//!
//! Every caller that needs the next delivery date (the generation run, the
//! customer preview, the procurement list) goes through one
//! [`DeliveryCalendar`] configured with one IANA timezone. The delivery date
//! is the calendar day after "today" *in that timezone*, so a preview
//! requested at 23:50 local and a run triggered at 00:10 local agree only if
//! they are on the same side of local midnight. Nothing derives dates from
//! the client's clock.
//!
//! Weekday indices follow the subscription convention: `0 = Monday` …
//! `6 = Sunday`.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;

/// Timezone used when configuration does not name one.
pub const DEFAULT_TIMEZONE: &str = "Asia/Kolkata";

// ---------------------------------------------------------------------------
// CalendarError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    UnknownTimezone(String),
    /// The next day is not representable (`NaiveDate::MAX`).
    DateOutOfRange(NaiveDate),
}

impl fmt::Display for CalendarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalendarError::UnknownTimezone(name) => write!(f, "unknown timezone {name:?}"),
            CalendarError::DateOutOfRange(d) => write!(f, "no calendar day after {d}"),
        }
    }
}

impl std::error::Error for CalendarError {}

// ---------------------------------------------------------------------------
// DeliveryCalendar
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeliveryCalendar {
    tz: Tz,
}

impl Default for DeliveryCalendar {
    fn default() -> Self {
        DeliveryCalendar {
            tz: chrono_tz::Asia::Kolkata,
        }
    }
}

impl DeliveryCalendar {
    pub fn new(tz: Tz) -> Self {
        DeliveryCalendar { tz }
    }

    /// Build from an IANA name such as `"Asia/Kolkata"` or `"UTC"`.
    pub fn from_name(name: &str) -> Result<Self, CalendarError> {
        name.trim()
            .parse::<Tz>()
            .map(DeliveryCalendar::new)
            .map_err(|_| CalendarError::UnknownTimezone(name.to_string()))
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Calendar date of `now` in the delivery timezone.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    /// The delivery date a run started at `now` produces orders for:
    /// the local day after `now`.
    pub fn target_date(&self, now: DateTime<Utc>) -> Result<NaiveDate, CalendarError> {
        let today = self.local_date(now);
        today
            .succ_opt()
            .ok_or(CalendarError::DateOutOfRange(today))
    }
}

// ---------------------------------------------------------------------------
// Date arithmetic helpers
// ---------------------------------------------------------------------------

/// `0 = Monday` … `6 = Sunday`.
pub fn weekday_index(date: NaiveDate) -> u8 {
    // num_days_from_monday is always in 0..=6.
    date.weekday().num_days_from_monday() as u8
}

/// Signed whole-day distance `date - start`.
pub fn days_since(start: NaiveDate, date: NaiveDate) -> i64 {
    date.signed_duration_since(start).num_days()
}
