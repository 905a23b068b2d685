//! # Date Parser Module
//!
//! Normalizes the blast date formats found in field logs into calendar dates
//!
//! ## Key Components
//! - [`parse`] - Parse `DD-MM-YYYY`, `MM/DD/YYYY` or common ISO-style strings
//! - [`format_iso`] - Canonical `YYYY-MM-DD` label used for periods
//! - [`format_display`] - Domain display format `DD-MM-YYYY`

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;

lazy_static::lazy_static! {
    static ref DAY_FIRST: Regex = Regex::new(r"^(\d{1,2})-(\d{1,2})-(\d{4})$").unwrap();
    static ref MONTH_FIRST: Regex = Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap();
}

const FALLBACK_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d %b %Y", "%b %d, %Y", "%B %d, %Y"];

const FALLBACK_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse a raw blast date.
///
/// Returns `None` for empty, unparseable or impossible dates (`31-02-2024`);
/// callers exclude such records instead of failing.
pub fn parse(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(caps) = DAY_FIRST.captures(s) {
        return from_parts(&caps[3], &caps[2], &caps[1]);
    }

    if let Some(caps) = MONTH_FIRST.captures(s) {
        return from_parts(&caps[3], &caps[1], &caps[2]);
    }

    parse_fallback(s)
}

fn from_parts(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let year = year.parse::<i32>().ok()?;
    let month = month.parse::<u32>().ok()?;
    let day = day.parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_fallback(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    for format in FALLBACK_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.date());
        }
    }

    FALLBACK_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
}

pub fn year(date: NaiveDate) -> i32 {
    date.year()
}

/// Two-digit month, e.g. `"03"`
pub fn month_padded(date: NaiveDate) -> String {
    format!("{:02}", date.month())
}

pub fn format_iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn format_display(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_first_hyphen() {
        assert_eq!(parse("15-03-2024"), Some(ymd(2024, 3, 15)));
        assert_eq!(parse("1-2-2024"), Some(ymd(2024, 2, 1)));
    }

    #[test]
    fn test_month_first_slash() {
        assert_eq!(parse("03/15/2024"), Some(ymd(2024, 3, 15)));
        assert_eq!(parse(" 12/01/2023 "), Some(ymd(2023, 12, 1)));
    }

    #[test]
    fn test_iso_fallbacks() {
        assert_eq!(parse("2024-03-15"), Some(ymd(2024, 3, 15)));
        assert_eq!(parse("2024-03-15T08:30:00Z"), Some(ymd(2024, 3, 15)));
        assert_eq!(parse("2024-03-15T08:30:00.000"), Some(ymd(2024, 3, 15)));
        assert_eq!(parse("2024/03/15"), Some(ymd(2024, 3, 15)));
        assert_eq!(parse("15 Mar 2024"), Some(ymd(2024, 3, 15)));
    }

    #[test]
    fn test_invalid_inputs_are_none() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("   "), None);
        assert_eq!(parse("not a date"), None);
        assert_eq!(parse("01-2024"), None);
        assert_eq!(parse("01/2024"), None);
        assert_eq!(parse("31-02-2024"), None);
        assert_eq!(parse("13/01/2024"), None);
    }

    #[test]
    fn test_round_trip_through_formatters() {
        let mut date = ymd(2023, 12, 25);
        for _ in 0..120 {
            assert_eq!(parse(&format_display(date)), Some(date));
            assert_eq!(parse(&format_iso(date)), Some(date));
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_month_first_strings_round_trip() {
        let mut date = ymd(2023, 11, 20);
        for _ in 0..400 {
            let padded = date.format("%m/%d/%Y").to_string();
            let unpadded = format!("{}/{}/{}", date.month(), date.day(), date.year());
            assert_eq!(parse(&padded), Some(date), "{}", padded);
            assert_eq!(parse(&unpadded), Some(date), "{}", unpadded);
            assert_eq!(parse(&format_display(parse(&padded).unwrap())), Some(date));
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_derived_fields() {
        let date = ymd(2024, 3, 5);
        assert_eq!(year(date), 2024);
        assert_eq!(month_padded(date), "03");
        assert_eq!(format_iso(date), "2024-03-05");
        assert_eq!(format_display(date), "05-03-2024");
    }
}
