//! # Time Window Module
//!
//! Selects the blast records that fall inside the user's time window
//!
//! ## Key Components
//! - [`TimeWindowConfig`] - Mode plus mode-specific bounds
//! - [`filter`] - Apply a window without mutating or reordering the input
//! - [`recent_dates`] - Default daily window (most recent distinct dates)

use chrono::NaiveDate;
use log::{debug, warn};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::cli::TimeMode;
use crate::models::BlastRecord;

/// Distinct dates kept by the daily view when no range is selected
pub const DEFAULT_RECENT_DATES: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum TimeWindowConfig {
    Daily {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
    Monthly {
        year: i32,
        month: u32,
    },
    Yearly {
        start_year: Option<i32>,
        end_year: Option<i32>,
    },
}

impl TimeWindowConfig {
    pub fn mode(&self) -> TimeMode {
        match self {
            TimeWindowConfig::Daily { .. } => TimeMode::Daily,
            TimeWindowConfig::Monthly { .. } => TimeMode::Monthly,
            TimeWindowConfig::Yearly { .. } => TimeMode::Yearly,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            TimeWindowConfig::Daily { start: None, end: None } => {
                format!("last {} blast dates", DEFAULT_RECENT_DATES)
            }
            TimeWindowConfig::Daily { start, end } => format!(
                "{} to {}",
                start.map(|d| d.to_string()).unwrap_or_else(|| "start".to_string()),
                end.map(|d| d.to_string()).unwrap_or_else(|| "latest".to_string())
            ),
            TimeWindowConfig::Monthly { year, month } => format!("{}-{:02}", year, month),
            TimeWindowConfig::Yearly { start_year, end_year } => format!(
                "{} to {}",
                start_year.map(|y| y.to_string()).unwrap_or_else(|| "first year".to_string()),
                end_year.map(|y| y.to_string()).unwrap_or_else(|| "last year".to_string())
            ),
        }
    }
}

/// The `count` most recent distinct blast dates
pub fn recent_dates(records: &[&BlastRecord], count: usize) -> BTreeSet<NaiveDate> {
    let all: BTreeSet<NaiveDate> = records.iter().filter_map(|r| r.blast_date).collect();
    all.into_iter().rev().take(count).collect()
}

/// Keep the records inside `config`, in their original order.
///
/// Records without a parsed date never pass.
pub fn filter<'a>(records: &[&'a BlastRecord], config: &TimeWindowConfig) -> Vec<&'a BlastRecord> {
    let dated = records.iter().copied().filter(|r| r.blast_date.is_some());

    let filtered: Vec<&BlastRecord> = match config {
        TimeWindowConfig::Daily { start: None, end: None } => {
            let window = recent_dates(records, DEFAULT_RECENT_DATES);
            dated
                .filter(|r| r.blast_date.is_some_and(|d| window.contains(&d)))
                .collect()
        }
        TimeWindowConfig::Daily { start, end } => dated
            .filter(|r| {
                r.blast_date.is_some_and(|date| {
                    let after_start = start.is_none_or(|s| date >= s);
                    let before_end = end.is_none_or(|e| date <= e);
                    after_start && before_end
                })
            })
            .collect(),
        TimeWindowConfig::Monthly { year, month } => dated
            .filter(|r| r.year == Some(*year) && r.month == Some(*month))
            .collect(),
        TimeWindowConfig::Yearly { start_year, end_year } => {
            if let (Some(start), Some(end)) = (start_year, end_year) {
                if start > end {
                    warn!("Start year {} is after end year {}; window is empty", start, end);
                }
            }
            dated
                .filter(|r| {
                    r.year.is_some_and(|year| {
                        start_year.is_none_or(|s| year >= s) && end_year.is_none_or(|e| year <= e)
                    })
                })
                .collect()
        }
    };

    debug!(
        "Time window {} kept {} of {} records",
        config.describe(),
        filtered.len(),
        records.len()
    );
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn record(date: &str) -> BlastRecord {
        let parsed = crate::date_parser::parse(date);
        BlastRecord {
            blast_date_raw: date.to_string(),
            blast_date: parsed,
            year: parsed.map(|d| d.year()),
            month: parsed.map(|d| d.month()),
            ..Default::default()
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn labels(records: &[&BlastRecord]) -> Vec<String> {
        records.iter().map(|r| r.blast_date_raw.clone()).collect()
    }

    #[test]
    fn test_daily_range_is_inclusive_and_order_preserving() {
        let data = vec![
            record("05-01-2024"),
            record("01-01-2024"),
            record("10-01-2024"),
            record("11-01-2024"),
            record("garbage"),
        ];
        let refs: Vec<&BlastRecord> = data.iter().collect();
        let config = TimeWindowConfig::Daily {
            start: Some(ymd(2024, 1, 1)),
            end: Some(ymd(2024, 1, 10)),
        };
        let kept = filter(&refs, &config);
        assert_eq!(labels(&kept), vec!["05-01-2024", "01-01-2024", "10-01-2024"]);
    }

    #[test]
    fn test_daily_open_ended_bound() {
        let data = vec![record("01-01-2024"), record("20-01-2024")];
        let refs: Vec<&BlastRecord> = data.iter().collect();
        let config = TimeWindowConfig::Daily {
            start: Some(ymd(2024, 1, 15)),
            end: None,
        };
        assert_eq!(labels(&filter(&refs, &config)), vec!["20-01-2024"]);
    }

    #[test]
    fn test_daily_default_keeps_seven_most_recent_dates() {
        let mut data: Vec<BlastRecord> = (1..=10).map(|d| record(&format!("{:02}-03-2024", d))).collect();
        // Second blast on the latest date must not push another date out
        data.push(record("10-03-2024"));
        let refs: Vec<&BlastRecord> = data.iter().collect();

        let kept = filter(&refs, &TimeWindowConfig::Daily { start: None, end: None });
        let dates: BTreeSet<NaiveDate> = kept.iter().filter_map(|r| r.blast_date).collect();
        assert_eq!(dates.len(), 7);
        assert_eq!(dates.iter().next().copied(), Some(ymd(2024, 3, 4)));
        assert_eq!(kept.len(), 8);
    }

    #[test]
    fn test_monthly_exact_match() {
        let data = vec![record("15-03-2024"), record("15-03-2023"), record("01-04-2024")];
        let refs: Vec<&BlastRecord> = data.iter().collect();
        let kept = filter(&refs, &TimeWindowConfig::Monthly { year: 2024, month: 3 });
        assert_eq!(labels(&kept), vec!["15-03-2024"]);
    }

    #[test]
    fn test_yearly_inclusive_range() {
        let data = vec![
            record("01-01-2021"),
            record("31-12-2022"),
            record("01-06-2023"),
            record("01-01-2024"),
        ];
        let refs: Vec<&BlastRecord> = data.iter().collect();
        let config = TimeWindowConfig::Yearly {
            start_year: Some(2022),
            end_year: Some(2023),
        };
        assert_eq!(labels(&filter(&refs, &config)), vec!["31-12-2022", "01-06-2023"]);

        let reversed = TimeWindowConfig::Yearly {
            start_year: Some(2024),
            end_year: Some(2021),
        };
        assert!(filter(&refs, &reversed).is_empty());

        let open = TimeWindowConfig::Yearly {
            start_year: None,
            end_year: None,
        };
        assert_eq!(filter(&refs, &open).len(), 4);
    }

    #[test]
    fn test_empty_input() {
        let refs: Vec<&BlastRecord> = Vec::new();
        assert!(filter(&refs, &TimeWindowConfig::Daily { start: None, end: None }).is_empty());
    }
}
