//! # Loader Module
//!
//! Reads blast records from JSON snapshots or CSV uploads and resolves the
//! default data file location
//!
//! ## Key Components
//! - [`load_path`] - Load a `.json` or `.csv` file
//! - [`parse_json`] / [`parse_csv`] - Format-specific readers
//! - [`resolve_data_path`] - `--data`, then `BLASTMETRICS_DATA`, then the user data dir
//! - [`LoadReport`] - Row counts for the load

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use log::debug;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::models::{BlastRecord, RawRecord, RawValue};

pub const DATA_ENV_VAR: &str = "BLASTMETRICS_DATA";

/// Keys an API response may wrap the record array in
const WRAPPER_KEYS: &[&str] = &["data", "records", "results"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded: usize,
    pub skipped: usize,
}

/// Pick the data file: explicit flag, environment variable, then
/// `<data_dir>/blastmetrics/blasts.json`
pub fn resolve_data_path(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(PathBuf::from(path));
    }
    if let Ok(path) = std::env::var(DATA_ENV_VAR) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    let data_dir = dirs::data_dir().context("Could not determine the user data directory")?;
    Ok(data_dir.join("blastmetrics").join("blasts.json"))
}

pub fn load_path(path: &Path) -> Result<(Vec<BlastRecord>, LoadReport)> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open data file {}", path.display()))?;

    let (records, report) = match extension.as_deref() {
        Some("json") => parse_json(file).with_context(|| format!("Failed to parse {}", path.display()))?,
        Some("csv") => parse_csv(file).with_context(|| format!("Failed to parse {}", path.display()))?,
        _ => anyhow::bail!(
            "Unsupported data file {}: expected a .json or .csv file",
            path.display()
        ),
    };

    debug!(
        "Loaded {}: {} rows, {} records, {} skipped",
        path.display(),
        report.total_rows,
        report.loaded,
        report.skipped
    );
    Ok((records, report))
}

/// Top-level array of objects, or an object wrapping that array
pub fn parse_json<R: Read>(reader: R) -> Result<(Vec<BlastRecord>, LoadReport)> {
    let value: serde_json::Value = serde_json::from_reader(reader).context("Invalid JSON")?;

    let rows = match &value {
        serde_json::Value::Array(rows) => rows,
        serde_json::Value::Object(object) => WRAPPER_KEYS
            .iter()
            .find_map(|key| object.get(*key).and_then(|v| v.as_array()))
            .with_context(|| {
                format!(
                    "JSON object has no record array under any of: {}",
                    WRAPPER_KEYS.join(", ")
                )
            })?,
        _ => anyhow::bail!("Expected a JSON array of blast records"),
    };

    let mut report = LoadReport {
        total_rows: rows.len(),
        ..Default::default()
    };
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        match row.as_object().map(RawRecord::from_json_object) {
            Some(raw) if !raw.is_empty() => {
                records.push(BlastRecord::from_raw(&raw));
                report.loaded += 1;
            }
            _ => report.skipped += 1,
        }
    }
    Ok((records, report))
}

/// Header row names the columns; every cell is kept as text
pub fn parse_csv<R: Read>(reader: R) -> Result<(Vec<BlastRecord>, LoadReport)> {
    let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers().context("Failed to read CSV header")?.clone();

    let mut report = LoadReport::default();
    let mut records = Vec::new();
    for result in rdr.records() {
        report.total_rows += 1;
        let row = match result {
            Ok(row) => row,
            Err(_) => {
                report.skipped += 1;
                continue;
            }
        };

        let mut raw = RawRecord::new();
        for (header, cell) in headers.iter().zip(row.iter()) {
            let value = if cell.is_empty() {
                RawValue::Null
            } else {
                RawValue::Text(cell.to_string())
            };
            raw.insert(header, value);
        }

        if raw.is_empty() {
            report.skipped += 1;
        } else {
            records.push(BlastRecord::from_raw(&raw));
            report.loaded += 1;
        }
    }
    Ok((records, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_with_suffix(suffix: &str) -> NamedTempFile {
        tempfile::Builder::new().suffix(suffix).tempfile().unwrap()
    }

    #[test]
    fn test_parse_json_array() {
        let json = r#"[
            {"blast_date": "05-03-2024", "Explosive_Cost": "1,20,000", "total_drill_mtr": 850},
            {"date": "03/06/2024", "explosiveCost": 95000.5},
            "not a record"
        ]"#;
        let (records, report) = parse_json(json.as_bytes()).unwrap();

        assert_eq!(report, LoadReport { total_rows: 3, loaded: 2, skipped: 1 });
        assert_eq!(records[0].blast_date, NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(records[0].explosive_cost, Some(120000.0));
        assert_eq!(records[0].total_drill_meters, Some(850.0));
        assert_eq!(records[1].blast_date, NaiveDate::from_ymd_opt(2024, 3, 6));
    }

    #[test]
    fn test_parse_json_wrapped() {
        let json = r#"{"status": "ok", "data": [{"date": "2024-01-15", "ppv": 2.4}]}"#;
        let (records, report) = parse_json(json.as_bytes()).unwrap();
        assert_eq!(report.loaded, 1);
        assert_eq!(records[0].ppv, Some(2.4));

        let json = r#"{"results": []}"#;
        let (records, _) = parse_json(json.as_bytes()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_json_rejects_other_shapes() {
        assert!(parse_json(r#"{"rows": []}"#.as_bytes()).is_err());
        assert!(parse_json("42".as_bytes()).is_err());
        assert!(parse_json("{".as_bytes()).is_err());
    }

    #[test]
    fn test_parse_csv_with_aliases() {
        let csv = "Blast Date,Mine,PPV,Air_Blast,Fly Rock\n\
                   12-01-2024,North,3.2,118,45\n\
                   13-01-2024,North,,120,\n\
                   14-01-2024,North,2.8\n";
        let (records, report) = parse_csv(csv.as_bytes()).unwrap();

        assert_eq!(report.total_rows, 3);
        assert_eq!(report.loaded, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(records[0].mine.as_deref(), Some("North"));
        assert_eq!(records[0].ppv, Some(3.2));
        assert_eq!(records[0].flyrock, Some(45.0));
        assert_eq!(records[1].ppv, None);
        assert_eq!(records[1].air_blast, Some(120.0));
    }

    #[test]
    fn test_load_path_dispatches_on_extension() {
        let mut json = temp_with_suffix(".json");
        write!(json, r#"[{{"date": "01-01-2024", "explosiveCost": 1000}}]"#).unwrap();
        let (records, _) = load_path(json.path()).unwrap();
        assert_eq!(records.len(), 1);

        let mut csv = temp_with_suffix(".CSV");
        writeln!(csv, "date,burden").unwrap();
        writeln!(csv, "01-01-2024,3.5").unwrap();
        let (records, _) = load_path(csv.path()).unwrap();
        assert_eq!(records[0].burden, Some(3.5));

        let other = temp_with_suffix(".xlsx");
        assert!(load_path(other.path()).is_err());
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_path(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_explicit_data_path_wins() {
        let path = resolve_data_path(Some("/tmp/blasts.csv")).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/blasts.csv"));
    }
}
