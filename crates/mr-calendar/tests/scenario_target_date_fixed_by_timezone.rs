//! Scenario: the delivery date is decided by one configured timezone.
//!
//! The same UTC instant can be "today" in one zone and already "tomorrow" in
//! another. The calendar must resolve the target date from its own zone only,
//! independent of the host clock or the caller's locale.

use chrono::{NaiveDate, TimeZone, Utc};
use mr_calendar::{CalendarError, DeliveryCalendar, DEFAULT_TIMEZONE};

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn evening_utc_is_already_next_day_in_kolkata() {
    // 20:00 UTC on 2024-03-09 is 01:30 on 2024-03-10 in Asia/Kolkata (+05:30).
    let now = Utc.with_ymd_and_hms(2024, 3, 9, 20, 0, 0).unwrap();

    let kolkata = DeliveryCalendar::from_name("Asia/Kolkata").unwrap();
    assert_eq!(kolkata.local_date(now), d("2024-03-10"));
    assert_eq!(kolkata.target_date(now).unwrap(), d("2024-03-11"));

    let utc = DeliveryCalendar::from_name("UTC").unwrap();
    assert_eq!(utc.target_date(now).unwrap(), d("2024-03-10"));
}

#[test]
fn target_date_is_stable_within_a_local_day() {
    let cal = DeliveryCalendar::from_name("Asia/Kolkata").unwrap();
    // 00:05 and 23:55 local on 2024-06-01.
    let early = Utc.with_ymd_and_hms(2024, 5, 31, 18, 35, 0).unwrap();
    let late = Utc.with_ymd_and_hms(2024, 6, 1, 18, 25, 0).unwrap();
    assert_eq!(cal.target_date(early).unwrap(), d("2024-06-02"));
    assert_eq!(cal.target_date(late).unwrap(), d("2024-06-02"));
}

#[test]
fn target_date_crosses_month_and_year_boundaries() {
    let cal = DeliveryCalendar::from_name("UTC").unwrap();
    let now = Utc.with_ymd_and_hms(2024, 12, 31, 10, 0, 0).unwrap();
    assert_eq!(cal.target_date(now).unwrap(), d("2025-01-01"));
}

#[test]
fn default_calendar_uses_documented_timezone() {
    let cal = DeliveryCalendar::default();
    assert_eq!(cal.timezone().name(), DEFAULT_TIMEZONE);
}

#[test]
fn unknown_timezone_is_rejected() {
    assert_eq!(
        DeliveryCalendar::from_name("Mars/Olympus"),
        Err(CalendarError::UnknownTimezone("Mars/Olympus".to_string()))
    );
}
