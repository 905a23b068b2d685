//! # Derived Metrics Module
//!
//! Engineering ratios computed from raw blast fields. Every ratio is `None`
//! when an input is missing or the denominator is zero, never `0` or `NaN`.
//!
//! ## Key Components
//! - [`safe_div`] - Guarded division
//! - [`DerivedMetric`] - Named derived quantities
//! - [`derive`] - All derived fields of one record

use serde::Serialize;

use crate::cli::PowderFactorSource;
use crate::models::{BlastRecord, Field, is_valid_number};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DerivedMetric {
    /// Explosive cost per unit of average column weight
    CostPerTon,
    /// Explosive kg per drilled meter
    ExplosiveConsumption,
    /// Drilled meters per cubic meter of theoretical volume
    SpecificDrilling,
    /// Actual or theoretical powder factor, chosen by toggle
    PowderFactor,
    /// Sum of the recorded cost lines
    TotalCost,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedFields {
    pub cost_per_ton: Option<f64>,
    pub explosive_consumption: Option<f64>,
    pub specific_drilling: Option<f64>,
    pub powder_factor: Option<f64>,
    pub total_cost: Option<f64>,
}

pub fn safe_div(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let numerator = numerator?;
    let denominator = denominator?;
    if denominator == 0.0 || !denominator.is_finite() {
        return None;
    }
    Some(numerator / denominator).filter(|v| v.is_finite())
}

impl DerivedMetric {
    /// Fields a ratio is built from, as `(numerator, denominator)`
    pub fn ratio_fields(self) -> Option<(Field, Field)> {
        match self {
            DerivedMetric::CostPerTon => Some((Field::ExplosiveCost, Field::AvgColumnWeight)),
            DerivedMetric::ExplosiveConsumption => Some((Field::TotalExplosiveKg, Field::TotalDrillMeters)),
            DerivedMetric::SpecificDrilling => Some((Field::TotalDrillMeters, Field::TheoreticalVolume)),
            DerivedMetric::PowderFactor | DerivedMetric::TotalCost => None,
        }
    }

    pub fn compute(self, record: &BlastRecord, pf_source: PowderFactorSource) -> Option<f64> {
        match self {
            DerivedMetric::PowderFactor => powder_factor(record, pf_source),
            DerivedMetric::TotalCost => total_cost(record),
            ratio => {
                let (numerator, denominator) = ratio.ratio_fields()?;
                safe_div(record.value(numerator), record.value(denominator))
            }
        }
    }
}

pub fn powder_factor(record: &BlastRecord, source: PowderFactorSource) -> Option<f64> {
    let value = match source {
        PowderFactorSource::Actual => record.actual_pf,
        PowderFactorSource::Theoretical => record.theoretical_pf,
    };
    value.filter(|v| is_valid_number(*v))
}

pub fn total_cost(record: &BlastRecord) -> Option<f64> {
    let costs: Vec<f64> = [
        Field::DrillingCost,
        Field::ManPowerCost,
        Field::AccessoriesCost,
        Field::ExplosiveCost,
    ]
    .iter()
    .filter_map(|field| record.valid_value(*field))
    .collect();

    if costs.is_empty() { None } else { Some(costs.iter().sum()) }
}

pub fn derive(record: &BlastRecord, pf_source: PowderFactorSource) -> DerivedFields {
    DerivedFields {
        cost_per_ton: DerivedMetric::CostPerTon.compute(record, pf_source),
        explosive_consumption: DerivedMetric::ExplosiveConsumption.compute(record, pf_source),
        specific_drilling: DerivedMetric::SpecificDrilling.compute(record, pf_source),
        powder_factor: DerivedMetric::PowderFactor.compute(record, pf_source),
        total_cost: DerivedMetric::TotalCost.compute(record, pf_source),
    }
}
