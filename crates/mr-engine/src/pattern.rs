//! Recurrence patterns.

use chrono::NaiveDate;
use mr_calendar::{days_since, weekday_index};
use mr_schemas::{Pattern, Subscription};

/// Does `sub`'s recurrence rule schedule a delivery on `date`?
///
/// Cancelled subscriptions and dates outside `[start_date, end_date]` are
/// never included. Quantity plays no part here.
pub fn resolve(sub: &Subscription, date: NaiveDate) -> bool {
    if !sub.is_active() {
        return false;
    }
    match sub.pattern {
        Pattern::BuyOnce => date == sub.start_date,
        Pattern::Daily => sub.in_range(date),
        // Day 0 is start_date itself.
        Pattern::Alternate => sub.in_range(date) && days_since(sub.start_date, date) % 2 == 0,
        Pattern::Custom(days) => sub.in_range(date) && days.contains(weekday_index(date)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mr_schemas::{SubscriptionStatus, WeekdaySet};
    use uuid::Uuid;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sub(pattern: Pattern, start: &str, end: Option<&str>) -> Subscription {
        Subscription {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity: 1,
            pattern,
            start_date: d(start),
            end_date: end.map(d),
            status: SubscriptionStatus::Active,
        }
    }

    #[test]
    fn daily_respects_both_bounds() {
        let s = sub(Pattern::Daily, "2024-01-10", Some("2024-01-12"));
        assert!(!resolve(&s, d("2024-01-09")));
        assert!(resolve(&s, d("2024-01-10")));
        assert!(resolve(&s, d("2024-01-12")));
        assert!(!resolve(&s, d("2024-01-13")));
    }

    #[test]
    fn open_ended_daily_runs_forever() {
        let s = sub(Pattern::Daily, "2024-01-10", None);
        assert!(resolve(&s, d("2031-07-04")));
    }

    #[test]
    fn custom_uses_monday_zero() {
        // 0 = Monday, 6 = Sunday
        let days = WeekdaySet::from_indices(&[0, 6]).unwrap();
        let s = sub(Pattern::Custom(days), "2024-01-01", None);
        assert!(resolve(&s, d("2024-01-01"))); // Monday
        assert!(!resolve(&s, d("2024-01-02"))); // Tuesday
        assert!(resolve(&s, d("2024-01-07"))); // Sunday
    }

    #[test]
    fn cancelled_is_never_included() {
        let mut s = sub(Pattern::Daily, "2024-01-01", None);
        s.status = SubscriptionStatus::Cancelled;
        assert!(!resolve(&s, d("2024-01-01")));
    }
}
