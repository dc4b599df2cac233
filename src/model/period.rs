//! Date parsing and the `YYYY-MM` period labels used as the monthly grouping key.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Parses the date forms Notion hands out: a bare date (`2024-03-15`), an RFC 3339 date-time
/// (`2024-03-15T10:00:00.000+01:00`) or a naive date-time. Anything else is `None`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        // The wall-clock date the user entered, not the UTC one.
        return Some(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|dt| dt.date())
        .ok()
}

/// The `YYYY-MM` label of `date`.
pub fn period_of(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// The `YYYY-MM` label of a date string, or an empty string when it does not parse.
pub fn period_of_str(s: &str) -> String {
    parse_date(s).map(period_of).unwrap_or_default()
}
