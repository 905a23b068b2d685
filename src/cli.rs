//! # CLI Module
//!
//! Command-line interface definitions and argument parsing for blastmetrics
//!
//! ## Key Components
//! - [`Args`] - Main CLI arguments structure
//! - [`Commands`] - Subcommand definitions
//! - [`ViewArgs`] - Dashboard and time-window selection shared by the views
//! - [`TimeMode`] / [`DashboardKind`] / [`PowderFactorSource`] - Value enums

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeMode {
    Daily,
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DashboardKind {
    Cost,
    CostPerTon,
    Vibration,
    Drilling,
    PowderFactor,
    Production,
    BlastDesign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PowderFactorSource {
    #[default]
    Actual,
    Theoretical,
}

#[derive(Debug, Clone, ClapArgs)]
pub struct ViewArgs {
    /// Dashboard (metric family) to compute
    #[arg(long, default_value = "cost", value_enum)]
    pub dashboard: DashboardKind,

    /// Aggregation mode
    #[arg(long, default_value = "yearly", value_enum)]
    pub mode: TimeMode,

    /// Daily mode: first blast date to include (DD-MM-YYYY, MM/DD/YYYY or YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,

    /// Daily mode: last blast date to include
    #[arg(long)]
    pub to: Option<String>,

    /// Monthly mode: calendar year
    #[arg(long)]
    pub year: Option<i32>,

    /// Monthly mode: month number (1-12)
    #[arg(long)]
    pub month: Option<u32>,

    /// Yearly mode: first year to include
    #[arg(long)]
    pub start_year: Option<i32>,

    /// Yearly mode: last year to include
    #[arg(long)]
    pub end_year: Option<i32>,

    /// Powder factor column to chart
    #[arg(long, default_value = "actual", value_enum)]
    pub pf: PowderFactorSource,
}

// Same values as the clap defaults, for running without a subcommand
impl Default for ViewArgs {
    fn default() -> Self {
        Self {
            dashboard: DashboardKind::Cost,
            mode: TimeMode::Yearly,
            from: None,
            to: None,
            year: None,
            month: None,
            start_year: None,
            end_year: None,
            pf: PowderFactorSource::Actual,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show chart-ready rows for a dashboard (default)
    Chart {
        #[command(flatten)]
        view: ViewArgs,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Run the statistical analysis over the dashboard series
    Insights {
        #[command(flatten)]
        view: ViewArgs,

        /// Number of periods to forecast (1-24)
        #[arg(long, default_value = "3", value_parser = clap::value_parser!(u16).range(1..=24))]
        horizon: u16,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Export chart rows as CSV
    Export {
        #[command(flatten)]
        view: ViewArgs,

        /// Destination file (stdout when omitted)
        #[arg(long, short)]
        output: Option<String>,
    },
    /// Re-run the dashboard whenever the data file changes
    Watch {
        #[command(flatten)]
        view: ViewArgs,

        /// Number of periods to forecast (1-24)
        #[arg(long, default_value = "3", value_parser = clap::value_parser!(u16).range(1..=24))]
        horizon: u16,

        /// Poll frequency in seconds (default: 2)
        #[arg(long, default_value = "2")]
        refresh_interval: u64,
    },
    /// List dashboards and their columns
    Dashboards,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Blast record analytics - cost, vibration, drilling and powder factor dashboards"
)]
pub struct Args {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Blast data file, JSON snapshot or CSV (can also use BLASTMETRICS_DATA env var)
    #[arg(long, global = true)]
    pub data: Option<String>,

    /// Timezone used to stamp alerts
    #[arg(long, global = true, default_value = "Asia/Kolkata")]
    pub timezone: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
