//! # Period Aggregation Module
//!
//! Turns filtered blast records into chart-ready rows
//!
//! ## Key Components
//! - [`ProcessedPeriod`] - One chart row: label, metric values, record count
//! - [`aggregate`] - Passthrough for daily/monthly, group-by-year for yearly
//! - [`aggregate_metric`] - Mean, sum or ratio-of-sums over a group

use chrono::NaiveDate;
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use std::collections::BTreeMap;

use crate::cli::{PowderFactorSource, TimeMode};
use crate::dashboards::{Aggregation, DashboardProfile, MetricSource, MetricSpec};
use crate::date_parser;
use crate::derived::safe_div;
use crate::models::{BlastRecord, is_valid_number};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PeriodKey {
    Date(NaiveDate),
    Year(i32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricValue {
    pub key: &'static str,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedPeriod {
    pub period_label: String,
    pub sort_key: PeriodKey,
    pub values: Vec<MetricValue>,
    pub record_count: usize,
}

impl ProcessedPeriod {
    pub fn value(&self, key: &str) -> Option<f64> {
        self.values.iter().find(|v| v.key == key).and_then(|v| v.value)
    }
}

// Flat row: {"period": "2024", "explosive": 110000.0, ..., "count": 2}
impl Serialize for ProcessedPeriod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 2))?;
        map.serialize_entry("period", &self.period_label)?;
        for metric in &self.values {
            map.serialize_entry(metric.key, &metric.value)?;
        }
        map.serialize_entry("count", &self.record_count)?;
        map.end()
    }
}

/// Collapse one metric over a group of records. `None` when no record in the
/// group has a valid value for it.
pub fn aggregate_metric(spec: &MetricSpec, group: &[&BlastRecord], pf_source: PowderFactorSource) -> Option<f64> {
    let ratio_fields = match spec.source {
        MetricSource::Derived(metric) => metric.ratio_fields(),
        MetricSource::Field(_) => None,
    };

    match (spec.aggregation, ratio_fields) {
        (Aggregation::RatioOfSums, Some((numerator, denominator))) => {
            let pairs: Vec<(f64, f64)> = group
                .iter()
                .filter_map(|r| Some((r.valid_value(numerator)?, r.valid_value(denominator)?)))
                .collect();
            if pairs.is_empty() {
                return None;
            }
            let numerator_sum: f64 = pairs.iter().map(|(n, _)| n).sum();
            let denominator_sum: f64 = pairs.iter().map(|(_, d)| d).sum();
            safe_div(Some(numerator_sum), Some(denominator_sum))
        }
        (aggregation, _) => {
            let values: Vec<f64> = group.iter().filter_map(|r| spec.value(r, pf_source)).collect();
            if values.is_empty() {
                return None;
            }
            let sum: f64 = values.iter().sum();
            let result = match aggregation {
                Aggregation::Sum => sum,
                Aggregation::Mean | Aggregation::RatioOfSums => sum / values.len() as f64,
            };
            Some(result).filter(|v| v.is_finite())
        }
    }
}

fn passthrough(records: &[&BlastRecord], profile: &DashboardProfile, pf_source: PowderFactorSource) -> Vec<ProcessedPeriod> {
    let mut rows: Vec<ProcessedPeriod> = records
        .iter()
        .filter_map(|record| {
            let date = record.blast_date?;
            Some(ProcessedPeriod {
                period_label: date_parser::format_iso(date),
                sort_key: PeriodKey::Date(date),
                values: profile
                    .metrics
                    .iter()
                    .map(|spec| MetricValue {
                        key: spec.key,
                        value: spec.value(record, pf_source),
                    })
                    .collect(),
                record_count: 1,
            })
        })
        .collect();

    // Stable: blasts on the same day keep their input order
    rows.sort_by_key(|row| row.sort_key);
    rows
}

fn group_by_year(records: &[&BlastRecord], profile: &DashboardProfile, pf_source: PowderFactorSource) -> Vec<ProcessedPeriod> {
    let mut groups: BTreeMap<i32, Vec<&BlastRecord>> = BTreeMap::new();
    for record in records {
        if let Some(year) = record.year {
            groups.entry(year).or_default().push(*record);
        }
    }

    groups
        .into_iter()
        .map(|(year, group)| ProcessedPeriod {
            period_label: year.to_string(),
            sort_key: PeriodKey::Year(year),
            values: profile
                .metrics
                .iter()
                .map(|spec| MetricValue {
                    key: spec.key,
                    value: aggregate_metric(spec, &group, pf_source),
                })
                .collect(),
            record_count: group.len(),
        })
        .collect()
}

/// Build chart rows, always ascending by period
pub fn aggregate(
    records: &[&BlastRecord],
    mode: TimeMode,
    profile: &DashboardProfile,
    pf_source: PowderFactorSource,
) -> Vec<ProcessedPeriod> {
    match mode {
        TimeMode::Daily | TimeMode::Monthly => passthrough(records, profile, pf_source),
        TimeMode::Yearly => group_by_year(records, profile, pf_source),
    }
}

/// Valid points of one metric across the rows, for the analysis engine
pub fn series_points(rows: &[ProcessedPeriod], key: &str) -> Vec<(String, f64)> {
    rows.iter()
        .filter_map(|row| {
            row.value(key)
                .filter(|v| is_valid_number(*v))
                .map(|v| (row.period_label.clone(), v))
        })
        .collect()
}
