//! # Dashboard Profiles Module
//!
//! Declarative field mapping for each metric family. One generic pipeline
//! reads these profiles instead of every dashboard carrying its own copy of
//! the filtering and aggregation logic.
//!
//! ## Key Components
//! - [`DashboardProfile`] - Validity rule plus ordered metric columns
//! - [`MetricSpec`] - Where a column comes from and how it aggregates
//! - [`profile`] - Look up the profile for a [`DashboardKind`]

use serde::Serialize;

use crate::cli::{DashboardKind, PowderFactorSource};
use crate::derived::DerivedMetric;
use crate::models::{BlastRecord, Field, is_valid_number};
use crate::validator::ValidityRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "name", rename_all = "camelCase")]
pub enum MetricSource {
    Field(Field),
    Derived(DerivedMetric),
}

/// How a column collapses when several blasts share a year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Aggregation {
    Mean,
    Sum,
    /// Sum numerator and denominator separately, then divide
    RatioOfSums,
}

/// Which direction of movement is bad news for a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Polarity {
    HigherIsWorse,
    LowerIsWorse,
    Neutral,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub source: MetricSource,
    pub aggregation: Aggregation,
    pub polarity: Polarity,
    pub analyze: bool,
    pub root_cause_hint: &'static str,
}

impl MetricSpec {
    /// Per-record value, `None` unless it is a valid (finite, non-zero) number
    pub fn value(&self, record: &BlastRecord, pf_source: PowderFactorSource) -> Option<f64> {
        let value = match self.source {
            MetricSource::Field(field) => record.value(field),
            MetricSource::Derived(metric) => metric.compute(record, pf_source),
        };
        value.filter(|v| is_valid_number(*v))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardProfile {
    pub kind: DashboardKind,
    pub title: &'static str,
    pub rule: ValidityRule,
    pub metrics: &'static [MetricSpec],
}

const COST_METRICS: &[MetricSpec] = &[
    MetricSpec {
        key: "explosive",
        label: "Explosive Cost (₹)",
        source: MetricSource::Field(Field::ExplosiveCost),
        aggregation: Aggregation::Mean,
        polarity: Polarity::HigherIsWorse,
        analyze: true,
        root_cause_hint: "Check explosive unit rates, supplier changes and charge weights per hole",
    },
    MetricSpec {
        key: "manpower",
        label: "Manpower Cost (₹)",
        source: MetricSource::Field(Field::ManPowerCost),
        aggregation: Aggregation::Mean,
        polarity: Polarity::HigherIsWorse,
        analyze: true,
        root_cause_hint: "Review crew size, overtime and idle time between blasts",
    },
    MetricSpec {
        key: "drilling",
        label: "Drilling Cost (₹)",
        source: MetricSource::Field(Field::DrillingCost),
        aggregation: Aggregation::Mean,
        polarity: Polarity::HigherIsWorse,
        analyze: true,
        root_cause_hint: "Inspect bit wear, redrilled holes and drill rig availability",
    },
    MetricSpec {
        key: "accessories",
        label: "Accessories Cost (₹)",
        source: MetricSource::Field(Field::AccessoriesCost),
        aggregation: Aggregation::Mean,
        polarity: Polarity::HigherIsWorse,
        analyze: true,
        root_cause_hint: "Audit detonator and booster consumption per hole",
    },
    MetricSpec {
        key: "total",
        label: "Total Cost (₹)",
        source: MetricSource::Derived(DerivedMetric::TotalCost),
        aggregation: Aggregation::Mean,
        polarity: Polarity::HigherIsWorse,
        analyze: false,
        root_cause_hint: "Compare the individual cost lines to find the driver",
    },
];

const COST_PER_TON_METRICS: &[MetricSpec] = &[
    MetricSpec {
        key: "costPerTon",
        label: "Cost per Ton (₹)",
        source: MetricSource::Derived(DerivedMetric::CostPerTon),
        aggregation: Aggregation::RatioOfSums,
        polarity: Polarity::HigherIsWorse,
        analyze: true,
        root_cause_hint: "Check explosive pricing against column weight; overcharged columns inflate cost",
    },
    MetricSpec {
        key: "powderFactor",
        label: "Powder Factor (kg/ton)",
        source: MetricSource::Derived(DerivedMetric::PowderFactor),
        aggregation: Aggregation::Mean,
        polarity: Polarity::Neutral,
        analyze: true,
        root_cause_hint: "Compare burden and spacing with the design pattern",
    },
];

const VIBRATION_METRICS: &[MetricSpec] = &[
    MetricSpec {
        key: "ppv",
        label: "PPV (mm/s)",
        source: MetricSource::Field(Field::Ppv),
        aggregation: Aggregation::Mean,
        polarity: Polarity::HigherIsWorse,
        analyze: true,
        root_cause_hint: "Review maximum charge per delay and initiation sequence",
    },
    MetricSpec {
        key: "airBlast",
        label: "Air Blast (dB)",
        source: MetricSource::Field(Field::AirBlast),
        aggregation: Aggregation::Mean,
        polarity: Polarity::HigherIsWorse,
        analyze: true,
        root_cause_hint: "Check stemming length and material; short stemming vents gas",
    },
    MetricSpec {
        key: "flyrock",
        label: "Flyrock (m)",
        source: MetricSource::Field(Field::Flyrock),
        aggregation: Aggregation::Mean,
        polarity: Polarity::HigherIsWorse,
        analyze: true,
        root_cause_hint: "Inspect front-row burden and geological weak zones",
    },
];

const DRILLING_METRICS: &[MetricSpec] = &[
    MetricSpec {
        key: "explosiveConsumption",
        label: "Explosive Consumption (kg/m)",
        source: MetricSource::Derived(DerivedMetric::ExplosiveConsumption),
        aggregation: Aggregation::RatioOfSums,
        polarity: Polarity::HigherIsWorse,
        analyze: true,
        root_cause_hint: "Verify charge length per hole and water in holes",
    },
    MetricSpec {
        key: "specificDrilling",
        label: "Specific Drilling (m/m³)",
        source: MetricSource::Derived(DerivedMetric::SpecificDrilling),
        aggregation: Aggregation::RatioOfSums,
        polarity: Polarity::HigherIsWorse,
        analyze: true,
        root_cause_hint: "Check pattern geometry and subdrill against the design",
    },
    MetricSpec {
        key: "totalDrill",
        label: "Total Drill (m)",
        source: MetricSource::Field(Field::TotalDrillMeters),
        aggregation: Aggregation::Sum,
        polarity: Polarity::Neutral,
        analyze: false,
        root_cause_hint: "Compare drilled meters with planned meters",
    },
    MetricSpec {
        key: "totalExplosive",
        label: "Total Explosive (kg)",
        source: MetricSource::Field(Field::TotalExplosiveKg),
        aggregation: Aggregation::Sum,
        polarity: Polarity::Neutral,
        analyze: false,
        root_cause_hint: "Compare issued explosive with charged explosive",
    },
];

const POWDER_FACTOR_METRICS: &[MetricSpec] = &[
    MetricSpec {
        key: "powderFactor",
        label: "Powder Factor (kg/ton)",
        source: MetricSource::Derived(DerivedMetric::PowderFactor),
        aggregation: Aggregation::Mean,
        polarity: Polarity::Neutral,
        analyze: true,
        root_cause_hint: "Compare burden and spacing with the design pattern",
    },
    MetricSpec {
        key: "actualPF",
        label: "Actual PF (kg/ton)",
        source: MetricSource::Field(Field::ActualPf),
        aggregation: Aggregation::Mean,
        polarity: Polarity::Neutral,
        analyze: false,
        root_cause_hint: "Check charged quantities against the blast plan",
    },
    MetricSpec {
        key: "theoreticalPF",
        label: "Theoretical PF (kg/ton)",
        source: MetricSource::Field(Field::TheoreticalPf),
        aggregation: Aggregation::Mean,
        polarity: Polarity::Neutral,
        analyze: false,
        root_cause_hint: "Revisit design assumptions on rock density",
    },
    MetricSpec {
        key: "totalExplosive",
        label: "Total Explosive (kg)",
        source: MetricSource::Field(Field::TotalExplosiveKg),
        aggregation: Aggregation::Sum,
        polarity: Polarity::Neutral,
        analyze: false,
        root_cause_hint: "Compare issued explosive with charged explosive",
    },
];

const PRODUCTION_METRICS: &[MetricSpec] = &[
    MetricSpec {
        key: "tonRecovered",
        label: "Ton Recovered (t)",
        source: MetricSource::Field(Field::TonRecovered),
        aggregation: Aggregation::Sum,
        polarity: Polarity::LowerIsWorse,
        analyze: true,
        root_cause_hint: "Look for poor fragmentation, toe problems or mucking delays",
    },
    MetricSpec {
        key: "theoreticalVolume",
        label: "Theoretical Volume (m³)",
        source: MetricSource::Field(Field::TheoreticalVolume),
        aggregation: Aggregation::Sum,
        polarity: Polarity::LowerIsWorse,
        analyze: true,
        root_cause_hint: "Check how many blasts were planned versus executed",
    },
];

const BLAST_DESIGN_METRICS: &[MetricSpec] = &[
    MetricSpec {
        key: "burden",
        label: "Burden (m)",
        source: MetricSource::Field(Field::Burden),
        aggregation: Aggregation::Mean,
        polarity: Polarity::Neutral,
        analyze: true,
        root_cause_hint: "Survey the face profile before marking the pattern",
    },
    MetricSpec {
        key: "spacing",
        label: "Spacing (m)",
        source: MetricSource::Field(Field::Spacing),
        aggregation: Aggregation::Mean,
        polarity: Polarity::Neutral,
        analyze: true,
        root_cause_hint: "Check hole marking against the pattern sheet",
    },
    MetricSpec {
        key: "stemming",
        label: "Stemming Length (m)",
        source: MetricSource::Field(Field::StemmingLength),
        aggregation: Aggregation::Mean,
        polarity: Polarity::Neutral,
        analyze: true,
        root_cause_hint: "Review stemming practice and material size",
    },
    MetricSpec {
        key: "holeDepth",
        label: "Hole Depth (m)",
        source: MetricSource::Field(Field::HoleDepth),
        aggregation: Aggregation::Mean,
        polarity: Polarity::Neutral,
        analyze: true,
        root_cause_hint: "Check bench height and subdrill control",
    },
];

pub const ALL_DASHBOARDS: &[DashboardKind] = &[
    DashboardKind::Cost,
    DashboardKind::CostPerTon,
    DashboardKind::Vibration,
    DashboardKind::Drilling,
    DashboardKind::PowderFactor,
    DashboardKind::Production,
    DashboardKind::BlastDesign,
];

pub fn profile(kind: DashboardKind) -> DashboardProfile {
    match kind {
        DashboardKind::Cost => DashboardProfile {
            kind,
            title: "Blast Cost Breakdown",
            rule: ValidityRule::cost(),
            metrics: COST_METRICS,
        },
        DashboardKind::CostPerTon => DashboardProfile {
            kind,
            title: "Cost per Ton & Powder Factor",
            rule: ValidityRule::any_positive(&[Field::ExplosiveCost, Field::ActualPf, Field::TheoreticalPf]),
            metrics: COST_PER_TON_METRICS,
        },
        DashboardKind::Vibration => DashboardProfile {
            kind,
            title: "Ground Vibration & Air Blast",
            rule: ValidityRule::any_positive(&[Field::Ppv, Field::AirBlast, Field::Flyrock]),
            metrics: VIBRATION_METRICS,
        },
        DashboardKind::Drilling => DashboardProfile {
            kind,
            title: "Drilling & Explosive Consumption",
            rule: ValidityRule::any_positive(&[
                Field::TotalExplosiveKg,
                Field::TotalDrillMeters,
                Field::TheoreticalVolume,
            ]),
            metrics: DRILLING_METRICS,
        },
        DashboardKind::PowderFactor => DashboardProfile {
            kind,
            title: "Powder Factor",
            rule: ValidityRule::any_positive(&[Field::ActualPf, Field::TheoreticalPf, Field::TotalExplosiveKg]),
            metrics: POWDER_FACTOR_METRICS,
        },
        DashboardKind::Production => DashboardProfile {
            kind,
            title: "Production",
            rule: ValidityRule::any_positive(&[Field::TonRecovered, Field::TheoreticalVolume]),
            metrics: PRODUCTION_METRICS,
        },
        DashboardKind::BlastDesign => DashboardProfile {
            kind,
            title: "Blast Design Parameters",
            rule: ValidityRule::any_positive(&[
                Field::Burden,
                Field::Spacing,
                Field::StemmingLength,
                Field::HoleDepth,
            ]),
            metrics: BLAST_DESIGN_METRICS,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_metric_keys_unique_per_profile() {
        for kind in ALL_DASHBOARDS {
            let p = profile(*kind);
            let keys: HashSet<&str> = p.metrics.iter().map(|m| m.key).collect();
            assert_eq!(keys.len(), p.metrics.len(), "duplicate key in {:?}", kind);
            assert!(!p.metrics.is_empty());
        }
    }

    #[test]
    fn test_ratio_of_sums_only_on_ratio_metrics() {
        for kind in ALL_DASHBOARDS {
            for spec in profile(*kind).metrics {
                if spec.aggregation == Aggregation::RatioOfSums {
                    match spec.source {
                        MetricSource::Derived(metric) => assert!(metric.ratio_fields().is_some()),
                        MetricSource::Field(_) => panic!("{} aggregates a plain field as a ratio", spec.key),
                    }
                }
            }
        }
    }

    #[test]
    fn test_cost_profile_columns() {
        let p = profile(DashboardKind::Cost);
        let keys: Vec<&str> = p.metrics.iter().map(|m| m.key).collect();
        assert_eq!(keys, vec!["explosive", "manpower", "drilling", "accessories", "total"]);
        assert_eq!(p.rule, ValidityRule::cost());
        assert!(p.metrics.iter().all(|m| m.key != "ppv"));
    }

    #[test]
    fn test_metric_value_filters_zero() {
        let spec = profile(DashboardKind::Vibration).metrics[0];
        let record = BlastRecord {
            ppv: Some(0.0),
            ..Default::default()
        };
        assert_eq!(spec.value(&record, PowderFactorSource::Actual), None);
    }
}
