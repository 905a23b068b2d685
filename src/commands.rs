//! # Commands Module
//!
//! Command handlers for the chart, insights, export and dashboards views
//!
//! ## Key Components
//! - [`handle_chart_command`] - Chart rows as a table or JSON
//! - [`handle_insights_command`] - Statistical analysis report
//! - [`handle_export_command`] - CSV export
//! - [`handle_dashboards_command`] - List dashboard profiles
//! - [`window_from_args`] - Turn window flags into a [`TimeWindowConfig`]

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::path::Path;

use crate::aggregator::ProcessedPeriod;
use crate::cli::{TimeMode, ViewArgs};
use crate::dashboards::{self, ALL_DASHBOARDS};
use crate::models::BlastRecord;
use crate::pipeline::{self, PipelineState, PipelineStats, RecordDetail, Toggles};
use crate::table_display::{format_dashboards, format_periods_table, format_report};
use crate::time_window::TimeWindowConfig;
use crate::{date_parser, export, loader};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChartJson<'a> {
    dashboard: &'a str,
    window: &'a TimeWindowConfig,
    periods: &'a [ProcessedPeriod],
    /// Per-blast derived ratios, daily and monthly views only
    #[serde(skip_serializing_if = "Vec::is_empty")]
    records: Vec<RecordDetail>,
    stats: PipelineStats,
}

pub fn parse_timezone(timezone: &str) -> Result<Tz> {
    timezone
        .parse::<Tz>()
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| format!("Invalid timezone: {}", timezone))
}

/// Current time in the configured zone, used to stamp alerts
pub fn now_in(timezone: &str) -> Result<DateTime<FixedOffset>> {
    let tz = parse_timezone(timezone)?;
    Ok(Utc::now().with_timezone(&tz).fixed_offset())
}

fn parse_date_arg(flag: &str, value: Option<&str>) -> Result<Option<chrono::NaiveDate>> {
    match value {
        None => Ok(None),
        Some(raw) => date_parser::parse(raw)
            .map(Some)
            .with_context(|| format!("Invalid {} date: {} (use DD-MM-YYYY, MM/DD/YYYY or YYYY-MM-DD)", flag, raw)),
    }
}

pub fn window_from_args(view: &ViewArgs) -> Result<TimeWindowConfig> {
    match view.mode {
        TimeMode::Daily => {
            let start = parse_date_arg("--from", view.from.as_deref())?;
            let end = parse_date_arg("--to", view.to.as_deref())?;
            Ok(TimeWindowConfig::Daily { start, end })
        }
        TimeMode::Monthly => {
            let (Some(year), Some(month)) = (view.year, view.month) else {
                anyhow::bail!("Monthly mode needs both --year and --month");
            };
            if !(1..=12).contains(&month) {
                anyhow::bail!("Month must be between 1 and 12, got: {}", month);
            }
            Ok(TimeWindowConfig::Monthly { year, month })
        }
        TimeMode::Yearly => Ok(TimeWindowConfig::Yearly {
            start_year: view.start_year,
            end_year: view.end_year,
        }),
    }
}

pub fn state_from_args(view: &ViewArgs, insights: bool, horizon: usize) -> Result<PipelineState> {
    Ok(PipelineState {
        dashboard: view.dashboard,
        window: window_from_args(view)?,
        toggles: Toggles {
            powder_factor: view.pf,
            insights,
            horizon,
        },
    })
}

pub fn load_records(path: &Path) -> Result<Vec<BlastRecord>> {
    if !path.exists() {
        anyhow::bail!(
            "No blast data found at {}. Pass --data or set {}.",
            path.display(),
            loader::DATA_ENV_VAR
        );
    }
    let (records, report) = loader::load_path(path)?;
    if report.skipped > 0 {
        log::warn!("Skipped {} of {} rows in {}", report.skipped, report.total_rows, path.display());
    }
    Ok(records)
}

/// Handle the chart command
pub fn handle_chart_command(data: Option<&str>, timezone: &str, view: &ViewArgs, json: bool) -> Result<()> {
    let state = state_from_args(view, false, 0)?;
    let path = loader::resolve_data_path(data)?;
    let records = load_records(&path)?;
    let output = pipeline::run(&records, &state, now_in(timezone)?);
    let profile = dashboards::profile(state.dashboard);

    if json {
        let chart = ChartJson {
            dashboard: profile.title,
            window: &state.window,
            periods: &output.periods,
            records: pipeline::record_details(&records, &state),
            stats: output.stats,
        };
        println!("{}", serde_json::to_string_pretty(&chart)?);
    } else {
        println!("{}", format_periods_table(&profile, &state.window.describe(), &output.periods));
        if output.stats.invalid > 0 {
            println!("{} record(s) excluded as incomplete.", output.stats.invalid);
        }
    }

    Ok(())
}

/// Handle the insights command
pub fn handle_insights_command(
    data: Option<&str>,
    timezone: &str,
    view: &ViewArgs,
    horizon: usize,
    json: bool,
) -> Result<()> {
    let state = state_from_args(view, true, horizon)?;
    let path = loader::resolve_data_path(data)?;
    let records = load_records(&path)?;
    let output = pipeline::run(&records, &state, now_in(timezone)?);

    match (&output.report, json) {
        (report, true) => println!("{}", serde_json::to_string_pretty(report)?),
        (Some(report), false) => println!("{}", format_report(report)),
        (None, false) => println!(
            "Insufficient data for statistical insights: each metric needs at least {} periods with values ({} period(s) in {}).",
            crate::analysis::MIN_DATA_POINTS,
            output.periods.len(),
            state.window.describe()
        ),
    }

    Ok(())
}

/// Handle the export command
pub fn handle_export_command(data: Option<&str>, view: &ViewArgs, output_path: Option<&str>) -> Result<()> {
    let state = state_from_args(view, false, 0)?;
    let path = loader::resolve_data_path(data)?;
    let records = load_records(&path)?;
    let output = pipeline::run(&records, &state, Utc::now().fixed_offset());
    let profile = dashboards::profile(state.dashboard);
    let mode = state.window.mode();

    match output_path {
        Some(file) => {
            export::write_csv(Path::new(file), &output.periods, &profile, mode)?;
            eprintln!("Wrote {} row(s) to {}", output.periods.len(), file);
        }
        None => print!("{}", export::to_csv(&output.periods, &profile, mode)?),
    }

    Ok(())
}

/// Handle the dashboards command
pub fn handle_dashboards_command() -> Result<()> {
    let profiles: Vec<_> = ALL_DASHBOARDS.iter().map(|kind| dashboards::profile(*kind)).collect();
    println!("{}", format_dashboards(&profiles));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn view(mode: TimeMode) -> ViewArgs {
        ViewArgs {
            mode,
            ..ViewArgs::default()
        }
    }

    #[test]
    fn test_daily_window_accepts_any_date_format() {
        let mut args = view(TimeMode::Daily);
        args.from = Some("01-03-2024".to_string());
        args.to = Some("03/31/2024".to_string());
        let window = window_from_args(&args).unwrap();
        assert_eq!(
            window,
            TimeWindowConfig::Daily {
                start: NaiveDate::from_ymd_opt(2024, 3, 1),
                end: NaiveDate::from_ymd_opt(2024, 3, 31),
            }
        );
    }

    #[test]
    fn test_bad_date_is_error() {
        let mut args = view(TimeMode::Daily);
        args.from = Some("31-02-2024".to_string());
        assert!(window_from_args(&args).is_err());
    }

    #[test]
    fn test_monthly_requires_year_and_month() {
        let mut args = view(TimeMode::Monthly);
        args.year = Some(2024);
        assert!(window_from_args(&args).is_err());

        args.month = Some(13);
        assert!(window_from_args(&args).is_err());

        args.month = Some(3);
        assert_eq!(
            window_from_args(&args).unwrap(),
            TimeWindowConfig::Monthly { year: 2024, month: 3 }
        );
    }

    #[test]
    fn test_yearly_window_passes_bounds() {
        let mut args = view(TimeMode::Yearly);
        args.start_year = Some(2020);
        let window = window_from_args(&args).unwrap();
        assert_eq!(
            window,
            TimeWindowConfig::Yearly {
                start_year: Some(2020),
                end_year: None
            }
        );
    }

    #[test]
    fn test_timezone_validation() {
        assert!(parse_timezone("Asia/Kolkata").is_ok());
        assert!(parse_timezone("Mars/Olympus_Mons").is_err());
        assert_eq!(now_in("UTC").unwrap().offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_missing_data_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_records(&dir.path().join("blasts.json")).unwrap_err();
        assert!(err.to_string().contains("No blast data found"));
    }
}
