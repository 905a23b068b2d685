//! # Pipeline Module
//!
//! Validate, window, aggregate and analyze in one pure pass. All inputs
//! arrive through [`PipelineState`]; nothing is read from globals.
//!
//! ## Key Components
//! - [`PipelineState`] - Dashboard, time window and toggles owned by the caller
//! - [`run`] - Execute the pipeline
//! - [`record_details`] - Per-blast derived ratios for daily and monthly views
//! - [`PipelineCache`] - Reuse the last output while records and state are unchanged

use chrono::{DateTime, FixedOffset};
use log::debug;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::aggregator::{self, ProcessedPeriod};
use crate::analysis::{AnalysisEngine, AnalysisReport, Series};
use crate::cli::{DashboardKind, PowderFactorSource, TimeMode};
use crate::dashboards::{self, DashboardProfile};
use crate::date_parser;
use crate::derived::{self, DerivedFields};
use crate::models::BlastRecord;
use crate::time_window::{self, TimeWindowConfig};
use crate::validator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Toggles {
    pub powder_factor: PowderFactorSource,
    /// Run the statistical analysis
    pub insights: bool,
    /// Forecast steps
    pub horizon: usize,
}

impl Default for Toggles {
    fn default() -> Self {
        Self {
            powder_factor: PowderFactorSource::Actual,
            insights: true,
            horizon: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    pub dashboard: DashboardKind,
    pub window: TimeWindowConfig,
    pub toggles: Toggles,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub total: usize,
    pub invalid: usize,
    pub out_of_window: usize,
    pub charted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    pub periods: Vec<ProcessedPeriod>,
    pub report: Option<AnalysisReport>,
    pub stats: PipelineStats,
}

/// One blast inside a daily or monthly window with its derived ratios
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDetail {
    /// `DD-MM-YYYY`
    pub date: String,
    /// Two-digit month
    pub month: String,
    pub mine: Option<String>,
    pub pit: Option<String>,
    #[serde(flatten)]
    pub derived: DerivedFields,
}

/// Usable records, then the subset inside the window
fn select<'a>(
    records: &'a [BlastRecord],
    profile: &DashboardProfile,
    window: &TimeWindowConfig,
) -> (Vec<&'a BlastRecord>, Vec<&'a BlastRecord>) {
    let usable: Vec<&BlastRecord> = records
        .iter()
        .filter(|record| validator::is_usable(record, &profile.rule))
        .collect();
    let windowed = time_window::filter(&usable, window);
    (usable, windowed)
}

/// One series per analyzable metric of the profile
pub fn build_series(periods: &[ProcessedPeriod], profile: &DashboardProfile) -> Vec<Series> {
    profile
        .metrics
        .iter()
        .filter(|spec| spec.analyze)
        .map(|spec| Series {
            key: spec.key,
            label: spec.label,
            polarity: spec.polarity,
            root_cause_hint: spec.root_cause_hint,
            points: aggregator::series_points(periods, spec.key),
        })
        .collect()
}

pub fn run(records: &[BlastRecord], state: &PipelineState, as_of: DateTime<FixedOffset>) -> PipelineOutput {
    let profile = dashboards::profile(state.dashboard);
    let mode = state.window.mode();

    let (usable, windowed) = select(records, &profile, &state.window);
    let periods = aggregator::aggregate(&windowed, mode, &profile, state.toggles.powder_factor);

    let stats = PipelineStats {
        total: records.len(),
        invalid: records.len() - usable.len(),
        out_of_window: usable.len() - windowed.len(),
        charted: windowed.len(),
    };
    debug!(
        "Pipeline {:?} ({}): {} records, {} invalid, {} outside window, {} periods",
        state.dashboard,
        state.window.describe(),
        stats.total,
        stats.invalid,
        stats.out_of_window,
        periods.len()
    );

    let report = if state.toggles.insights {
        let series = build_series(&periods, &profile);
        AnalysisEngine::new()
            .with_horizon(state.toggles.horizon)
            .analyze(&series, mode, as_of)
    } else {
        None
    };

    PipelineOutput { periods, report, stats }
}

/// Derived ratios for each blast in the window, in date order. Yearly views
/// have no per-blast rows.
pub fn record_details(records: &[BlastRecord], state: &PipelineState) -> Vec<RecordDetail> {
    if state.window.mode() == TimeMode::Yearly {
        return Vec::new();
    }
    let profile = dashboards::profile(state.dashboard);
    let (_, windowed) = select(records, &profile, &state.window);

    let mut details: Vec<(chrono::NaiveDate, RecordDetail)> = windowed
        .into_iter()
        .filter_map(|record| {
            let date = record.blast_date?;
            Some((
                date,
                RecordDetail {
                    date: date_parser::format_display(date),
                    month: date_parser::month_padded(date),
                    mine: record.mine.clone(),
                    pit: record.pit.clone(),
                    derived: derived::derive(record, state.toggles.powder_factor),
                },
            ))
        })
        .collect();
    details.sort_by_key(|(date, _)| *date);
    details.into_iter().map(|(_, detail)| detail).collect()
}

/// 64-bit fingerprint of the serialized records and state
pub fn fingerprint(records: &[BlastRecord], state: &PipelineState) -> u64 {
    let mut hasher = DefaultHasher::new();
    match (serde_json::to_vec(records), serde_json::to_vec(state)) {
        (Ok(records), Ok(state)) => {
            records.hash(&mut hasher);
            state.hash(&mut hasher);
        }
        // Unserializable input never matches a cached entry
        _ => records.len().hash(&mut hasher),
    }
    hasher.finish()
}

/// Remembers the most recent output. The alert timestamp is part of the
/// cached output, so a hit returns the timestamp of the run that filled it.
#[derive(Debug, Default)]
pub struct PipelineCache {
    last: Option<(u64, PipelineOutput)>,
    hits: usize,
    misses: usize,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_run(
        &mut self,
        records: &[BlastRecord],
        state: &PipelineState,
        as_of: DateTime<FixedOffset>,
    ) -> &PipelineOutput {
        let key = fingerprint(records, state);
        if matches!(&self.last, Some((cached, _)) if *cached == key) {
            self.hits += 1;
        } else {
            self.misses += 1;
            debug!("Pipeline cache miss ({:016x})", key);
            self.last = None;
        }

        let (_, output) = self
            .last
            .get_or_insert_with(|| (key, run(records, state, as_of)));
        output
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawRecord;
    use chrono::TimeZone;
    use serde_json::json;

    fn as_of() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(5 * 3600 + 1800)
            .unwrap()
            .with_ymd_and_hms(2024, 12, 31, 18, 0, 0)
            .unwrap()
    }

    fn record(value: serde_json::Value) -> BlastRecord {
        BlastRecord::from_raw(&RawRecord::from_json_object(value.as_object().unwrap()))
    }

    fn cost_state(window: TimeWindowConfig) -> PipelineState {
        PipelineState {
            dashboard: DashboardKind::Cost,
            window,
            toggles: Toggles::default(),
        }
    }

    fn yearly(start: i32, end: i32) -> TimeWindowConfig {
        TimeWindowConfig::Yearly {
            start_year: Some(start),
            end_year: Some(end),
        }
    }

    fn cost_history() -> Vec<BlastRecord> {
        (0..8)
            .map(|i| {
                record(json!({
                    "date": format!("15-06-{}", 2016 + i),
                    "explosiveCost": 100000 + i * 5000,
                    "manPowerCost": 30000 + (i % 3) * 1000,
                    "drillingCost": 50000,
                    "accessoriesCost": 20000 + i * 250,
                }))
            })
            .collect()
    }

    #[test]
    fn test_yearly_cost_example() {
        let records = vec![
            record(json!({"date": "01-01-2024", "explosiveCost": 100000, "manPowerCost": 30000, "drillingCost": 50000, "accessoriesCost": 20000})),
            record(json!({"date": "01-02-2024", "explosiveCost": 120000, "manPowerCost": 35000, "drillingCost": 60000, "accessoriesCost": 25000})),
        ];
        let output = run(&records, &cost_state(yearly(2024, 2024)), as_of());

        assert_eq!(output.periods.len(), 1);
        let row = &output.periods[0];
        assert_eq!(row.period_label, "2024");
        assert_eq!(row.value("explosive"), Some(110000.0));
        assert_eq!(row.value("manpower"), Some(32500.0));
        assert_eq!(row.value("drilling"), Some(55000.0));
        assert_eq!(row.value("accessories"), Some(22500.0));
        assert_eq!(row.record_count, 2);
        // One period is below the analysis threshold
        assert!(output.report.is_none());
    }

    #[test]
    fn test_explosive_only_record_is_absent() {
        let records = vec![
            record(json!({"date": "01-03-2024", "explosiveCost": 100000, "manPowerCost": 0, "drillingCost": 0, "accessoriesCost": 0})),
            record(json!({"date": "02-03-2024", "explosiveCost": 90000, "manPowerCost": 25000, "drillingCost": 40000, "accessoriesCost": 15000})),
        ];
        let state = cost_state(TimeWindowConfig::Daily { start: None, end: None });
        let output = run(&records, &state, as_of());

        assert_eq!(output.stats.invalid, 1);
        assert_eq!(output.periods.len(), 1);
        assert_eq!(output.periods[0].period_label, "2024-03-02");
        assert!(output.periods.iter().all(|p| p.value("explosive") != Some(100000.0)));
    }

    #[test]
    fn test_record_details_for_daily_window() {
        let records = vec![
            record(json!({"date": "02-03-2024", "mine": "North", "explosiveCost": 120000, "manPowerCost": 30000, "drillingCost": 60000, "accessoriesCost": 10000, "avgColumnWeight": 400})),
            record(json!({"date": "01-03-2024", "explosiveCost": 90000, "manPowerCost": 25000, "drillingCost": 40000, "accessoriesCost": 15000})),
            record(json!({"date": "03-03-2024", "explosiveCost": 100000})),
        ];
        let state = cost_state(TimeWindowConfig::Daily { start: None, end: None });
        let details = record_details(&records, &state);

        assert_eq!(details.len(), 2);
        assert_eq!(details[0].date, "01-03-2024");
        assert_eq!(details[0].month, "03");
        assert_eq!(details[0].derived.cost_per_ton, None);
        assert_eq!(details[0].derived.total_cost, Some(170000.0));
        assert_eq!(details[1].mine.as_deref(), Some("North"));
        assert_eq!(details[1].derived.cost_per_ton, Some(300.0));

        let json = serde_json::to_value(&details[1]).unwrap();
        assert_eq!(json["costPerTon"], json!(300.0));
        assert_eq!(json["date"], json!("02-03-2024"));

        assert!(record_details(&records, &cost_state(yearly(2024, 2024))).is_empty());
    }

    #[test]
    fn test_invalid_records_never_reach_output() {
        let mut records = cost_history();
        records.push(record(json!({"date": "not a date", "explosiveCost": 999999, "drillingCost": 1})));
        records.push(record(json!({"date": "15-06-2020", "explosiveCost": 999999})));

        let output = run(&records, &cost_state(yearly(2000, 2100)), as_of());
        assert_eq!(output.stats.invalid, 2);
        assert_eq!(output.stats.charted, 8);
        let counted: usize = output.periods.iter().map(|p| p.record_count).sum();
        assert_eq!(counted, 8);
    }

    #[test]
    fn test_insights_report_for_long_history() {
        let output = run(&cost_history(), &cost_state(yearly(2016, 2023)), as_of());
        assert_eq!(output.periods.len(), 8);
        let report = output.report.expect("eight yearly periods are enough");
        assert!(report.metrics.iter().any(|m| m.key == "explosive"));
        assert_eq!(report.metrics[0].predictions.len(), 3);
    }

    #[test]
    fn test_insights_toggle_off() {
        let mut state = cost_state(yearly(2016, 2023));
        state.toggles.insights = false;
        let output = run(&cost_history(), &state, as_of());
        assert!(output.report.is_none());
        assert_eq!(output.periods.len(), 8);
    }

    #[test]
    fn test_out_of_window_counted() {
        let output = run(&cost_history(), &cost_state(yearly(2020, 2021)), as_of());
        assert_eq!(output.stats.charted, 2);
        assert_eq!(output.stats.out_of_window, 6);
    }

    #[test]
    fn test_empty_input() {
        let output = run(&[], &cost_state(yearly(2020, 2024)), as_of());
        assert!(output.periods.is_empty());
        assert!(output.report.is_none());
        assert_eq!(output.stats, PipelineStats::default());
    }

    #[test]
    fn test_run_is_idempotent() {
        let records = cost_history();
        let state = cost_state(yearly(2016, 2023));
        let a = run(&records, &state, as_of());
        let b = run(&records, &state, as_of());
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }

    #[test]
    fn test_cache_hits_until_state_changes() {
        let records = cost_history();
        let mut state = cost_state(yearly(2016, 2023));
        let mut cache = PipelineCache::new();

        let first = cache.get_or_run(&records, &state, as_of()).clone();
        let second = cache.get_or_run(&records, &state, as_of()).clone();
        assert_eq!(first, second);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);

        state.dashboard = DashboardKind::CostPerTon;
        cache.get_or_run(&records, &state, as_of());
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_fingerprint_tracks_records() {
        let state = cost_state(yearly(2016, 2023));
        let mut records = cost_history();
        let before = fingerprint(&records, &state);
        records[0].explosive_cost = Some(1.0);
        assert_ne!(before, fingerprint(&records, &state));
    }
}
