//! # Export Module
//!
//! CSV rendition of chart rows, one column per dashboard metric

use anyhow::{Context, Result};
use csv::{QuoteStyle, WriterBuilder};
use std::path::Path;

use crate::aggregator::ProcessedPeriod;
use crate::cli::TimeMode;
use crate::dashboards::DashboardProfile;

fn header(profile: &DashboardProfile, mode: TimeMode) -> Vec<String> {
    let period = match mode {
        TimeMode::Yearly => "Year",
        TimeMode::Daily | TimeMode::Monthly => "Date",
    };
    std::iter::once(period.to_string())
        .chain(profile.metrics.iter().map(|m| m.label.to_string()))
        .chain(std::iter::once("Records".to_string()))
        .collect()
}

pub fn to_csv(periods: &[ProcessedPeriod], profile: &DashboardProfile, mode: TimeMode) -> Result<String> {
    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::NonNumeric)
        .from_writer(Vec::new());

    wtr.write_record(header(profile, mode))
        .context("Failed to write CSV header")?;

    for period in periods {
        let mut row = Vec::with_capacity(profile.metrics.len() + 2);
        row.push(period.period_label.clone());
        for metric in profile.metrics {
            row.push(
                period
                    .value(metric.key)
                    .map(|v| format!("{:.2}", v))
                    .unwrap_or_default(),
            );
        }
        row.push(period.record_count.to_string());
        wtr.write_record(&row)
            .with_context(|| format!("Failed to write CSV row for {}", period.period_label))?;
    }

    let bytes = wtr.into_inner().context("Failed to flush CSV output")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

pub fn write_csv(path: &Path, periods: &[ProcessedPeriod], profile: &DashboardProfile, mode: TimeMode) -> Result<()> {
    let csv = to_csv(periods, profile, mode)?;
    std::fs::write(path, csv).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{MetricValue, PeriodKey};
    use crate::cli::DashboardKind;
    use crate::dashboards::profile;

    fn vibration_row() -> ProcessedPeriod {
        ProcessedPeriod {
            period_label: "2023".to_string(),
            sort_key: PeriodKey::Year(2023),
            values: vec![
                MetricValue { key: "ppv", value: Some(3.14159) },
                MetricValue { key: "airBlast", value: None },
                MetricValue { key: "flyrock", value: Some(40.0) },
            ],
            record_count: 4,
        }
    }

    #[test]
    fn test_header_uses_labels() {
        let profile = profile(DashboardKind::Vibration);
        let csv = to_csv(&[], &profile, TimeMode::Yearly).unwrap();
        let first = csv.lines().next().unwrap();
        assert!(first.starts_with("\"Year\","));
        assert!(first.ends_with("\"Records\""));
        assert_eq!(first.split(',').count(), profile.metrics.len() + 2);

        let daily = to_csv(&[], &profile, TimeMode::Daily).unwrap();
        assert!(daily.starts_with("\"Date\","));
    }

    #[test]
    fn test_values_rounded_and_missing_blank() {
        let profile = profile(DashboardKind::Vibration);
        let csv = to_csv(&[vibration_row()], &profile, TimeMode::Yearly).unwrap();

        let mut rdr = csv::Reader::from_reader(csv.as_bytes());
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        let cells: Vec<&str> = rows[0].iter().collect();
        assert_eq!(cells, vec!["2023", "3.14", "", "40.00", "4"]);

        // Labels are quoted, numbers are not
        assert!(csv.contains("\"PPV (mm/s)\""));
        assert!(csv.contains(",3.14,"));
    }

    #[test]
    fn test_write_csv_matches_to_csv() {
        let profile = profile(DashboardKind::Vibration);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vibration.csv");
        write_csv(&path, &[vibration_row()], &profile, TimeMode::Yearly).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, to_csv(&[vibration_row()], &profile, TimeMode::Yearly).unwrap());
    }
}
