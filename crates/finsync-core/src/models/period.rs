//! Ordering rules for stored periods.
//!
//! Periods are opaque client documents. The only field the server reads is
//! `startDate`, which lives either on the period itself or on the first
//! element when the period is stored as a list of entries.

use std::cmp::Reverse;

use serde_json::Value;
use time::{Date, Month};

/// How a stored period carries its `startDate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodShape {
    /// A list of entries; the first entry holds `startDate`.
    Nested,
    /// An object holding its own `startDate`.
    Flat,
    /// Anything else. Never has a sort key.
    Opaque,
}

impl PeriodShape {
    pub fn of(period: &Value) -> Self {
        match period {
            Value::Array(_) => PeriodShape::Nested,
            Value::Object(_) => PeriodShape::Flat,
            _ => PeriodShape::Opaque,
        }
    }
}

/// The parsed `startDate` used to order `period`, if it has a usable one.
pub fn start_date(period: &Value) -> Option<Date> {
    let holder = match PeriodShape::of(period) {
        PeriodShape::Nested => period.get(0)?,
        PeriodShape::Flat => period,
        PeriodShape::Opaque => return None,
    };
    holder.get("startDate")?.as_str().and_then(parse_start_date)
}

/// Parses `YYYY-MM-DD`, ignoring a trailing time part.
///
/// Only the calendar date is kept, so two periods starting on the same day
/// compare equal whatever their times are.
pub fn parse_start_date(s: &str) -> Option<Date> {
    let date_part = s.trim().split(['T', ' ']).next()?;
    let mut parts = date_part.splitn(3, '-');
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = parts.next()?.parse::<u8>().ok()?;
    let day = parts.next()?.parse::<u8>().ok()?;
    Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()
}

/// Sorts newest first by calendar date. The sort is stable: periods on the
/// same day keep their storage order, and undated periods go last in
/// storage order.
pub fn sort_periods(periods: &mut [Value]) {
    periods.sort_by_cached_key(|period| Reverse(start_date(period)));
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_shape_classification() {
        assert_eq!(PeriodShape::of(&json!([{ "startDate": "2024-01-01" }])), PeriodShape::Nested);
        assert_eq!(PeriodShape::of(&json!({ "startDate": "2024-01-01" })), PeriodShape::Flat);
        assert_eq!(PeriodShape::of(&json!("2024-01-01")), PeriodShape::Opaque);
    }

    #[test]
    fn test_start_date_from_first_nested_entry() {
        let period = json!([{ "startDate": "2024-03-01" }, { "startDate": "2030-01-01" }]);
        assert_eq!(
            start_date(&period),
            Date::from_calendar_date(2024, Month::March, 1).ok()
        );
    }

    #[test]
    fn test_start_date_missing_or_empty() {
        assert_eq!(start_date(&json!([])), None);
        assert_eq!(start_date(&json!({ "endDate": "2024-01-01" })), None);
        assert_eq!(start_date(&json!([["2024-01-01"]])), None);
        assert_eq!(start_date(&json!(null)), None);
    }

    #[test]
    fn test_parse_start_date_variants() {
        let expected = Date::from_calendar_date(2025, Month::July, 9).ok();
        assert_eq!(parse_start_date("2025-07-09"), expected);
        assert_eq!(parse_start_date("2025-07-09T00:00:00.000Z"), expected);
        assert_eq!(parse_start_date(" 2025-07-09 12:30"), expected);
        assert_eq!(parse_start_date("2025-7-9"), expected);
        assert_eq!(parse_start_date("2025-02-30"), None);
        assert_eq!(parse_start_date("09/07/2025"), None);
        assert_eq!(parse_start_date(""), None);
    }

    #[test]
    fn test_sort_descending_and_stable() {
        let mut periods = vec![
            json!([{ "startDate": "2024-01-01", "tag": "a" }]),
            json!([{ "startDate": "2025-01-01", "tag": "b" }]),
            json!([{ "startDate": "2024-01-01", "tag": "c" }]),
        ];
        sort_periods(&mut periods);
        let tags: Vec<_> = periods.iter().map(|p| p[0]["tag"].as_str().unwrap()).collect();
        assert_eq!(tags, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_same_day_times_keep_storage_order() {
        let mut periods = vec![
            json!({ "startDate": "2024-05-01T08:00:00Z", "tag": "morning" }),
            json!({ "startDate": "2024-05-01T20:00:00Z", "tag": "evening" }),
            json!({ "startDate": "2024-04-30T23:59:59Z", "tag": "earlier" }),
        ];
        sort_periods(&mut periods);
        let tags: Vec<_> = periods.iter().map(|p| p["tag"].as_str().unwrap()).collect();
        assert_eq!(tags, vec!["morning", "evening", "earlier"]);
    }

    #[test]
    fn test_undated_periods_sort_last_in_storage_order() {
        let mut periods = vec![
            json!({ "startDate": "not a date", "tag": "x" }),
            json!({ "startDate": "2023-05-01", "tag": "old" }),
            json!({ "tag": "y" }),
            json!([{ "startDate": "2024-05-01", "tag": "new" }]),
        ];
        sort_periods(&mut periods);
        let tags: Vec<_> = periods
            .iter()
            .map(|p| match PeriodShape::of(p) {
                PeriodShape::Nested => p[0]["tag"].as_str().unwrap(),
                _ => p["tag"].as_str().unwrap(),
            })
            .collect();
        assert_eq!(tags, vec!["new", "old", "x", "y"]);
    }
}
