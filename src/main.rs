//! # Blast Metrics
//!
//! Blast record analytics for mining operations: validation, time-window
//! aggregation, derived engineering ratios and statistical insights
//!
//! ## Key Components
//! - [`pipeline::run`] - Validate, window, aggregate and analyze in one pass
//! - [`analysis::AnalysisEngine`] - Trend, anomaly, forecast and risk statistics
//! - [`monitor`] - Live view that follows the data file

mod aggregator;
mod analysis;
mod cli;
mod commands;
mod dashboards;
mod date_parser;
mod derived;
mod export;
mod loader;
mod models;
mod monitor;
mod pipeline;
mod table_display;
mod time_window;
mod validator;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Args, Commands, ViewArgs};
use crate::commands::{
    handle_chart_command, handle_dashboards_command, handle_export_command, handle_insights_command,
    parse_timezone,
};
use crate::monitor::handle_watch_command;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger based on debug flag
    if args.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    }

    parse_timezone(&args.timezone)?;
    let data = args.data.as_deref();

    match args.command {
        Some(Commands::Chart { view, json }) => handle_chart_command(data, &args.timezone, &view, json),
        Some(Commands::Insights { view, horizon, json }) => {
            handle_insights_command(data, &args.timezone, &view, usize::from(horizon), json)
        }
        Some(Commands::Export { view, output }) => handle_export_command(data, &view, output.as_deref()),
        Some(Commands::Watch {
            view,
            horizon,
            refresh_interval,
        }) => handle_watch_command(data, &args.timezone, &view, usize::from(horizon), refresh_interval).await,
        Some(Commands::Dashboards) => handle_dashboards_command(),
        None => handle_chart_command(data, &args.timezone, &ViewArgs::default(), false),
    }
}
