//! # Blast Record Model Module
//!
//! Typed blast records and the alias adapter that maps the field names used by
//! the various data sources onto one canonical set
//!
//! ## Key Components
//! - [`Field`] - Canonical field identifiers
//! - [`FIELD_ALIASES`] - Known source spellings for every field
//! - [`RawRecord`] - One ingested row with canonical keys and untyped values
//! - [`BlastRecord`] - Immutable typed record used by the pipeline

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

use crate::date_parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    BlastDate,
    Mine,
    Pit,
    Zone,
    Bench,
    DrillingCost,
    ManPowerCost,
    AccessoriesCost,
    ExplosiveCost,
    Burden,
    Spacing,
    StemmingLength,
    HoleDepth,
    TotalExplosiveKg,
    TotalDrillMeters,
    TonRecovered,
    TheoreticalVolume,
    AvgColumnWeight,
    Ppv,
    AirBlast,
    Flyrock,
    ActualPf,
    TheoreticalPf,
}

#[derive(Debug)]
pub struct FieldAlias {
    pub field: Field,
    pub canonical: &'static str,
    pub aliases: &'static [&'static str],
}

// Spellings observed across the API, JSON snapshots and CSV uploads
pub const FIELD_ALIASES: &[FieldAlias] = &[
    FieldAlias { field: Field::BlastDate, canonical: "blastDate", aliases: &["blastdate", "blast_date", "date", "blast date", "dateofblast"] },
    FieldAlias { field: Field::Mine, canonical: "mine", aliases: &["mine", "mine_name", "minename"] },
    FieldAlias { field: Field::Pit, canonical: "pit", aliases: &["pit", "pit_name", "pitname"] },
    FieldAlias { field: Field::Zone, canonical: "zone", aliases: &["zone", "zone_name", "zonename"] },
    FieldAlias { field: Field::Bench, canonical: "bench", aliases: &["bench", "bench_name", "benchname"] },
    FieldAlias { field: Field::DrillingCost, canonical: "drillingCost", aliases: &["drilling_cost", "drillingcost", "drill_cost"] },
    FieldAlias { field: Field::ManPowerCost, canonical: "manPowerCost", aliases: &["man_power_cost", "manpower_cost", "manpowercost", "labour_cost"] },
    FieldAlias { field: Field::AccessoriesCost, canonical: "accessoriesCost", aliases: &["accessories_cost", "accessoriescost", "accessory_cost", "blast_accessories_cost"] },
    FieldAlias { field: Field::ExplosiveCost, canonical: "explosiveCost", aliases: &["explosive_cost", "explosivecost", "total_explosive_cost", "totalexplosivecost"] },
    FieldAlias { field: Field::Burden, canonical: "burden", aliases: &["burden", "burden_m"] },
    FieldAlias { field: Field::Spacing, canonical: "spacing", aliases: &["spacing", "spacing_m"] },
    FieldAlias { field: Field::StemmingLength, canonical: "stemmingLength", aliases: &["stemming_length", "stemminglength", "stemming"] },
    FieldAlias { field: Field::HoleDepth, canonical: "holeDepth", aliases: &["hole_depth", "holedepth", "avg_hole_depth", "depth"] },
    FieldAlias { field: Field::TotalExplosiveKg, canonical: "totalExplosiveKg", aliases: &["total_explosive_kg", "totalexplosivekg", "total_explosive", "explosive_kg", "total_exp_kg"] },
    FieldAlias { field: Field::TotalDrillMeters, canonical: "totalDrillMeters", aliases: &["total_drill_mtr", "total_drilling", "total_drill", "total_drill_meters", "totaldrillmeters", "total_drilling_meterage"] },
    FieldAlias { field: Field::TonRecovered, canonical: "tonRecovered", aliases: &["ton_recovered", "tonrecovered", "tons_recovered", "production_ton"] },
    FieldAlias { field: Field::TheoreticalVolume, canonical: "theoreticalVolume", aliases: &["theoretical_volume", "theoreticalvolume", "theoretical_volume_m3", "volume"] },
    FieldAlias { field: Field::AvgColumnWeight, canonical: "avgColumnWeight", aliases: &["avg_column_weight", "avgcolumnweight", "average_column_weight", "avg_col_weight"] },
    FieldAlias { field: Field::Ppv, canonical: "ppv", aliases: &["ppv", "peak_particle_velocity", "ppv_mm_s"] },
    FieldAlias { field: Field::AirBlast, canonical: "airBlast", aliases: &["air_blast", "airblast", "air_overpressure", "air_blast_db"] },
    FieldAlias { field: Field::Flyrock, canonical: "flyrock", aliases: &["flyrock", "fly_rock", "flyrock_distance"] },
    FieldAlias { field: Field::ActualPf, canonical: "actualPF", aliases: &["actual_pf", "actualpf", "actual_powder_factor", "pf_actual"] },
    FieldAlias { field: Field::TheoreticalPf, canonical: "theoreticalPF", aliases: &["theoretical_pf", "theoreticalpf", "theoretical_powder_factor", "pf_theoretical"] },
];

/// Lower-case and drop everything that is not alphanumeric, so
/// `Total_Drill_Mtr`, `total drill mtr` and `totalDrillMtr` share one key
fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

lazy_static::lazy_static! {
    static ref ALIAS_MAP: HashMap<String, Field> = {
        let mut map = HashMap::new();
        for alias in FIELD_ALIASES {
            map.insert(normalize_key(alias.canonical), alias.field);
            for spelling in alias.aliases {
                map.insert(normalize_key(spelling), alias.field);
            }
        }
        map
    };
}

pub fn lookup_field(source_key: &str) -> Option<Field> {
    ALIAS_MAP.get(&normalize_key(source_key)).copied()
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Number(f64),
    Text(String),
    Null,
}

impl RawValue {
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(n) => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Null),
            serde_json::Value::String(s) => RawValue::Text(s.clone()),
            _ => RawValue::Null,
        }
    }

    /// Numeric view of the value; `None` when absent, empty or not a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawValue::Number(v) if v.is_finite() => Some(*v),
            RawValue::Number(_) | RawValue::Null => None,
            RawValue::Text(s) => parse_number(s),
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            RawValue::Number(v) => Some(v.to_string()),
            _ => None,
        }
    }
}

/// Parse a spreadsheet-style number such as `"₹1,20,000"` or `" 42.5 "`.
///
/// Text with letters is rejected rather than partially parsed.
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_alphabetic()) {
        return None;
    }
    let cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, ',' | '₹' | '$' | ' '))
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// One ingested row keyed by canonical field. Unknown source keys are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    values: HashMap<Field, RawValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert under the canonical field for `source_key`; returns false when
    /// the key is not a known alias. The first spelling seen wins.
    pub fn insert(&mut self, source_key: &str, value: RawValue) -> bool {
        match lookup_field(source_key) {
            Some(field) => {
                self.values.entry(field).or_insert(value);
                true
            }
            None => false,
        }
    }

    pub fn from_json_object(object: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut record = Self::new();
        for (key, value) in object {
            record.insert(key, RawValue::from_json(value));
        }
        record
    }

    pub fn get(&self, field: Field) -> Option<&RawValue> {
        self.values.get(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A logged blast event. Built once per ingested row and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlastRecord {
    pub blast_date_raw: String,
    pub blast_date: Option<NaiveDate>,
    pub year: Option<i32>,
    pub month: Option<u32>,

    pub mine: Option<String>,
    pub pit: Option<String>,
    pub zone: Option<String>,
    pub bench: Option<String>,

    pub drilling_cost: Option<f64>,
    pub man_power_cost: Option<f64>,
    pub accessories_cost: Option<f64>,
    pub explosive_cost: Option<f64>,

    pub burden: Option<f64>,
    pub spacing: Option<f64>,
    pub stemming_length: Option<f64>,
    pub hole_depth: Option<f64>,

    pub total_explosive_kg: Option<f64>,
    pub total_drill_meters: Option<f64>,
    pub ton_recovered: Option<f64>,
    pub theoretical_volume: Option<f64>,
    pub avg_column_weight: Option<f64>,

    pub ppv: Option<f64>,
    pub air_blast: Option<f64>,
    pub flyrock: Option<f64>,

    #[serde(rename = "actualPF")]
    pub actual_pf: Option<f64>,
    #[serde(rename = "theoreticalPF")]
    pub theoretical_pf: Option<f64>,
}

impl BlastRecord {
    pub fn from_raw(raw: &RawRecord) -> Self {
        let text = |field: Field| raw.get(field).and_then(RawValue::as_text);
        let number = |field: Field| raw.get(field).and_then(RawValue::as_number);

        let blast_date_raw = text(Field::BlastDate).unwrap_or_default();
        let blast_date = date_parser::parse(&blast_date_raw);
        let year = blast_date.map(date_parser::year);
        let month = blast_date.map(|d| chrono::Datelike::month(&d));

        Self {
            blast_date_raw,
            blast_date,
            year,
            month,
            mine: text(Field::Mine),
            pit: text(Field::Pit),
            zone: text(Field::Zone),
            bench: text(Field::Bench),
            drilling_cost: number(Field::DrillingCost),
            man_power_cost: number(Field::ManPowerCost),
            accessories_cost: number(Field::AccessoriesCost),
            explosive_cost: number(Field::ExplosiveCost),
            burden: number(Field::Burden),
            spacing: number(Field::Spacing),
            stemming_length: number(Field::StemmingLength),
            hole_depth: number(Field::HoleDepth),
            total_explosive_kg: number(Field::TotalExplosiveKg),
            total_drill_meters: number(Field::TotalDrillMeters),
            ton_recovered: number(Field::TonRecovered),
            theoretical_volume: number(Field::TheoreticalVolume),
            avg_column_weight: number(Field::AvgColumnWeight),
            ppv: number(Field::Ppv),
            air_blast: number(Field::AirBlast),
            flyrock: number(Field::Flyrock),
            actual_pf: number(Field::ActualPf),
            theoretical_pf: number(Field::TheoreticalPf),
        }
    }

    /// Raw numeric value of a measurement field; `None` for the descriptive ones
    pub fn value(&self, field: Field) -> Option<f64> {
        match field {
            Field::DrillingCost => self.drilling_cost,
            Field::ManPowerCost => self.man_power_cost,
            Field::AccessoriesCost => self.accessories_cost,
            Field::ExplosiveCost => self.explosive_cost,
            Field::Burden => self.burden,
            Field::Spacing => self.spacing,
            Field::StemmingLength => self.stemming_length,
            Field::HoleDepth => self.hole_depth,
            Field::TotalExplosiveKg => self.total_explosive_kg,
            Field::TotalDrillMeters => self.total_drill_meters,
            Field::TonRecovered => self.ton_recovered,
            Field::TheoreticalVolume => self.theoretical_volume,
            Field::AvgColumnWeight => self.avg_column_weight,
            Field::Ppv => self.ppv,
            Field::AirBlast => self.air_blast,
            Field::Flyrock => self.flyrock,
            Field::ActualPf => self.actual_pf,
            Field::TheoreticalPf => self.theoretical_pf,
            Field::BlastDate | Field::Mine | Field::Pit | Field::Zone | Field::Bench => None,
        }
    }

    /// Present, finite and non-zero
    pub fn valid_value(&self, field: Field) -> Option<f64> {
        self.value(field).filter(|v| is_valid_number(*v))
    }
}

/// Zero counts as "not recorded" for measurement fields
pub fn is_valid_number(v: f64) -> bool {
    v.is_finite() && v != 0.0
}
