//! # Monitor Module
//!
//! Live dashboard that re-runs the pipeline whenever the data file changes
//!
//! ## Key Components
//! - [`handle_watch_command`] - Terminal setup and teardown
//! - [`run_watch`] - Core polling loop
//! - [`validate_watch_config`] - Configuration validation

use anyhow::Result;
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute,
    terminal::{Clear, ClearType},
};
use std::io::{self, Write};
use std::path::Path;
use std::time::{Duration as StdDuration, SystemTime};
use tokio::{signal, time::sleep};

use crate::cli::ViewArgs;
use crate::commands::{now_in, parse_timezone, state_from_args};
use crate::dashboards;
use crate::loader;
use crate::models::BlastRecord;
use crate::pipeline::{PipelineCache, PipelineState};
use crate::table_display::{format_periods_table, format_report};

/// Handle watch command with live updates
pub async fn handle_watch_command(
    data: Option<&str>,
    timezone: &str,
    view: &ViewArgs,
    horizon: usize,
    refresh_interval: u64,
) -> Result<()> {
    validate_watch_config(refresh_interval, timezone)?;
    let state = state_from_args(view, true, horizon)?;
    let path = loader::resolve_data_path(data)?;

    // No raw mode, it interferes with output
    let mut stdout = io::stdout();
    execute!(stdout, Clear(ClearType::All), Hide)?;

    let result = run_watch(&path, &state, timezone, refresh_interval).await;

    execute!(stdout, Show)?;

    if result.is_ok() {
        println!("\n\x1b[96mWatch stopped.\x1b[0m");
        execute!(stdout, Clear(ClearType::All))?;
    }

    result
}

pub fn validate_watch_config(refresh_interval: u64, timezone: &str) -> Result<()> {
    if refresh_interval == 0 {
        anyhow::bail!("Refresh interval must be at least 1 second");
    }
    parse_timezone(timezone)?;
    Ok(())
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Main watch loop
pub async fn run_watch(path: &Path, state: &PipelineState, timezone: &str, refresh_interval: u64) -> Result<()> {
    let mut stdout = io::stdout();
    let mut cache = PipelineCache::new();
    let mut records: Vec<BlastRecord> = Vec::new();
    let mut last_modified: Option<SystemTime> = None;
    let mut load_error: Option<String> = None;
    let profile = dashboards::profile(state.dashboard);

    loop {
        let modified = modified_time(path);
        if modified.is_some() && modified != last_modified {
            match loader::load_path(path) {
                Ok((loaded, report)) => {
                    log::debug!("Reloaded {} records ({} skipped)", report.loaded, report.skipped);
                    records = loaded;
                    load_error = None;
                }
                Err(e) => load_error = Some(format!("{:#}", e)),
            }
            last_modified = modified;
        }

        execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;
        print_header(path);

        if modified.is_none() {
            println!("❌ Waiting for {} to appear...", path.display());
        } else {
            if let Some(err) = &load_error {
                println!("❌ Last reload failed: {}", err);
                println!("   Showing the previous snapshot.");
            }

            let output = cache.get_or_run(&records, state, now_in(timezone)?);
            println!("{}", format_periods_table(&profile, &state.window.describe(), &output.periods));
            println!(
                "   {} records | {} incomplete | {} outside window",
                output.stats.total, output.stats.invalid, output.stats.out_of_window
            );

            match &output.report {
                Some(report) => println!("{}", format_report(report)),
                None => println!("\n📊 Not enough periods for statistical insights yet."),
            }
        }

        stdout.flush()?;

        tokio::select! {
            _ = sleep(StdDuration::from_secs(refresh_interval)) => {},
            _ = signal::ctrl_c() => break,
        }
    }

    log::debug!("Pipeline cache: {} hits, {} misses", cache.hits(), cache.misses());
    Ok(())
}

fn print_header(path: &Path) {
    println!();
    println!("\x1b[96m╭──────────────────────────────────────────────────────╮\x1b[0m");
    println!("\x1b[96m│                                                      │\x1b[0m");
    println!("\x1b[96m│                 \x1b[1mBlast Metrics Watch\x1b[0m\x1b[96m                  │\x1b[0m");
    println!("\x1b[96m│                                                      │\x1b[0m");
    println!("\x1b[96m│                 \x1b[33mPress Ctrl+C to exit\x1b[0m\x1b[96m                 │\x1b[0m");
    println!("\x1b[96m│                                                      │\x1b[0m");
    println!("\x1b[96m╰──────────────────────────────────────────────────────╯\x1b[0m");
    println!("   Watching {}", path.display());
}
