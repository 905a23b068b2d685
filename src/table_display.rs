//! # Table Display Module
//!
//! Box-drawn terminal tables for chart rows and analysis reports
//!
//! ## Key Components
//! - [`format_periods_table`] - One row per period, one column per metric
//! - [`format_report`] - Statistics, forecasts, recommendations and alerts
//! - [`format_dashboards`] - Available dashboards and their columns
//! - [`format_value`] - Compact number formatting for table cells

use crate::aggregator::{PeriodKey, ProcessedPeriod};
use crate::analysis::{AnalysisReport, Priority, RiskLevel, Severity};
use crate::dashboards::DashboardProfile;
use crate::date_parser;

const GRAY: &str = "\x1b[90m";
const RESET: &str = "\x1b[39m";
const CYAN: &str = "\x1b[36m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";

pub fn format_value(value: Option<f64>) -> String {
    match value {
        None => "-".to_string(),
        Some(v) if v.abs() >= 1_000_000.0 => format!("{:.1}M", v / 1_000_000.0),
        Some(v) if v.abs() >= 10_000.0 => format!("{:.0}K", v / 1_000.0),
        Some(v) => format!("{:.2}", v),
    }
}

fn risk_color(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::High => RED,
        RiskLevel::Medium => YELLOW,
        RiskLevel::Low => GREEN,
    }
}

fn title_box(title: &str) -> String {
    let inner = title.chars().count() + 4;
    let bar = "─".repeat(inner);
    let blank = " ".repeat(inner);
    format!("\n ╭{bar}╮\n │{blank}│\n │  {title}  │\n │{blank}│\n ╰{bar}╯\n\n")
}

fn border(widths: &[usize], left: &str, mid: &str, right: &str) -> String {
    let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
    format!("{GRAY}{left}{}{right}{RESET}\n", segments.join(mid))
}

/// First column left-aligned, the rest right-aligned
fn row(cells: &[String], widths: &[usize], color: Option<&str>) -> String {
    let mut line = String::new();
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        line.push_str(&format!("{GRAY}│{RESET}"));
        let text = if i == 0 {
            format!(" {:<width$} ", cell, width = *width)
        } else {
            format!(" {:>width$} ", cell, width = *width)
        };
        match color {
            Some(c) => line.push_str(&format!("{c}{text}{RESET}")),
            None => line.push_str(&text),
        }
    }
    line.push_str(&format!("{GRAY}│{RESET}\n"));
    line
}

fn table(header: &[String], rows: &[Vec<String>], footer: Option<&[String]>) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for cells in rows.iter().map(Vec::as_slice).chain(footer) {
        for (width, cell) in widths.iter_mut().zip(cells.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut output = String::new();
    output.push_str(&border(&widths, "┌", "┬", "┐"));
    output.push_str(&row(header, &widths, Some(CYAN)));
    for cells in rows {
        output.push_str(&border(&widths, "├", "┼", "┤"));
        output.push_str(&row(cells, &widths, None));
    }
    if let Some(footer) = footer {
        output.push_str(&border(&widths, "├", "┼", "┤"));
        output.push_str(&row(footer, &widths, Some(GREEN)));
    }
    output.push_str(&border(&widths, "└", "┴", "┘"));
    output
}

pub fn format_periods_table(profile: &DashboardProfile, window: &str, periods: &[ProcessedPeriod]) -> String {
    let mut output = title_box(&format!("{} - {}", profile.title, window));

    if periods.is_empty() {
        output.push_str("No blast records found for the selected window.\n");
        return output;
    }

    let mut header = vec!["Period".to_string()];
    header.extend(profile.metrics.iter().map(|m| m.label.to_string()));
    header.push("Records".to_string());

    let rows: Vec<Vec<String>> = periods
        .iter()
        .map(|period| {
            let label = match period.sort_key {
                PeriodKey::Date(date) => date_parser::format_display(date),
                PeriodKey::Year(_) => period.period_label.clone(),
            };
            let mut cells = vec![label];
            cells.extend(profile.metrics.iter().map(|m| format_value(period.value(m.key))));
            cells.push(period.record_count.to_string());
            cells
        })
        .collect();

    let total_records: usize = periods.iter().map(|p| p.record_count).sum();
    let mut footer = vec!["Total".to_string()];
    footer.extend(profile.metrics.iter().map(|_| String::new()));
    footer.push(total_records.to_string());

    output.push_str(&table(&header, &rows, Some(&footer)));
    output
}

pub fn format_report(report: &AnalysisReport) -> String {
    let mut output = title_box("Statistical Insights");

    output.push_str(&format!(
        "Overall risk: {}{:?}{RESET}    Generated: {}\n\n",
        risk_color(report.overall_risk),
        report.overall_risk,
        report.generated_at.format("%Y-%m-%d %H:%M %:z")
    ));

    let header: Vec<String> = ["Metric", "Mean", "Std Dev", "CV", "Trend", "Anomalies", "Risk"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let rows: Vec<Vec<String>> = report
        .metrics
        .iter()
        .map(|m| {
            vec![
                m.label.to_string(),
                format_value(Some(m.statistics.mean)),
                format_value(Some(m.statistics.std_dev)),
                format!("{:.1}%", m.statistics.coefficient_of_variation * 100.0),
                format!("{:?} {:+.2}", m.trend.direction, m.trend.slope),
                m.anomalies.len().to_string(),
                format!("{:?} ({})", m.risk_level, m.risk_score),
            ]
        })
        .collect();
    output.push_str(&table(&header, &rows, None));

    output.push_str(&format!("\n{CYAN}Forecast{RESET}\n"));
    for m in &report.metrics {
        let steps: Vec<String> = m
            .predictions
            .iter()
            .map(|p| {
                format!(
                    "{}: {} [{} - {}] {:.0}%",
                    p.period,
                    format_value(Some(p.predicted_value)),
                    format_value(Some(p.lower_bound)),
                    format_value(Some(p.upper_bound)),
                    p.confidence * 100.0
                )
            })
            .collect();
        output.push_str(&format!("  {}: {}\n", m.label, steps.join(" | ")));
    }

    if !report.recommendations.is_empty() {
        output.push_str(&format!("\n{CYAN}Recommendations{RESET}\n"));
        for rec in &report.recommendations {
            let (color, tag) = match rec.priority {
                Priority::High => (RED, "HIGH"),
                Priority::Medium => (YELLOW, "MED "),
                Priority::Low => (GREEN, "LOW "),
            };
            output.push_str(&format!("  {color}[{tag}]{RESET} {}\n", rec.message));
            output.push_str(&format!("         → {} ({})\n", rec.action, rec.expected_impact));
            if let Some(hint) = &rec.root_cause_hint {
                output.push_str(&format!("         {GRAY}{}{RESET}\n", hint));
            }
        }
    }

    if !report.real_time_alerts.is_empty() {
        output.push_str(&format!("\n{CYAN}Alerts{RESET}\n"));
        for alert in &report.real_time_alerts {
            let color = if alert.severity == Severity::High { RED } else { YELLOW };
            output.push_str(&format!("  {color}⚠ {:?}{RESET} {}\n", alert.kind, alert.message));
        }
    }

    output
}

pub fn format_dashboards(profiles: &[DashboardProfile]) -> String {
    let mut output = title_box("Dashboards");
    for profile in profiles {
        let name = serde_json::to_value(profile.kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        output.push_str(&format!("{GREEN}{:<14}{RESET} {}\n", name, profile.title));
        for metric in profile.metrics {
            let marker = if metric.analyze { "*" } else { " " };
            output.push_str(&format!("    {} {:<16} {}\n", marker, metric.key, metric.label));
        }
    }
    output.push_str(&format!("\n{GRAY}* included in statistical insights{RESET}\n"));
    output
}
