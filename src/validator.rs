//! # Record Validation Module
//!
//! Decides whether a blast record carries enough real measurements to be
//! charted. Every dashboard supplies its own [`ValidityRule`].

use serde::Serialize;

use crate::models::{BlastRecord, Field};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "camelCase")]
pub enum ValidityRule {
    /// Cost dashboards. A record whose only populated cost is the explosive
    /// line, or whose companion costs were entered as exactly zero, is an
    /// incomplete entry.
    CostCompleteness {
        explosive: Field,
        companions: Vec<Field>,
    },
    /// At least one of `fields` is a valid positive number.
    AnyPositive { fields: Vec<Field> },
}

impl ValidityRule {
    pub fn any_positive(fields: &[Field]) -> Self {
        ValidityRule::AnyPositive {
            fields: fields.to_vec(),
        }
    }

    pub fn cost() -> Self {
        ValidityRule::CostCompleteness {
            explosive: Field::ExplosiveCost,
            companions: vec![Field::DrillingCost, Field::ManPowerCost, Field::AccessoriesCost],
        }
    }

    /// Fields the rule reads, in declaration order
    pub fn fields(&self) -> Vec<Field> {
        match self {
            ValidityRule::CostCompleteness { explosive, companions } => {
                let mut fields = companions.clone();
                fields.push(*explosive);
                fields
            }
            ValidityRule::AnyPositive { fields } => fields.clone(),
        }
    }
}

fn has_positive(record: &BlastRecord, field: Field) -> bool {
    record.valid_value(field).is_some_and(|v| v > 0.0)
}

pub fn is_usable(record: &BlastRecord, rule: &ValidityRule) -> bool {
    if record.blast_date.is_none() {
        return false;
    }

    match rule {
        ValidityRule::CostCompleteness { explosive, companions } => {
            let explosive_valid = record.valid_value(*explosive).is_some();
            if explosive_valid {
                let all_companions_invalid = companions
                    .iter()
                    .all(|field| record.valid_value(*field).is_none());
                if all_companions_invalid {
                    return false;
                }

                let any_companion_zero = companions
                    .iter()
                    .any(|field| record.value(*field) == Some(0.0));
                if any_companion_zero {
                    return false;
                }
            }

            rule.fields().into_iter().any(|field| has_positive(record, field))
        }
        ValidityRule::AnyPositive { fields } => fields.iter().any(|field| has_positive(record, *field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dated() -> BlastRecord {
        BlastRecord {
            blast_date_raw: "01-01-2024".to_string(),
            blast_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            year: Some(2024),
            month: Some(1),
            ..Default::default()
        }
    }

    fn cost_record(explosive: Option<f64>, drilling: Option<f64>, manpower: Option<f64>, accessories: Option<f64>) -> BlastRecord {
        BlastRecord {
            explosive_cost: explosive,
            drilling_cost: drilling,
            man_power_cost: manpower,
            accessories_cost: accessories,
            ..dated()
        }
    }

    #[test]
    fn test_complete_cost_record_is_usable() {
        let record = cost_record(Some(100000.0), Some(50000.0), Some(30000.0), Some(20000.0));
        assert!(is_usable(&record, &ValidityRule::cost()));
    }

    #[test]
    fn test_explosive_only_with_zero_companions_rejected() {
        let record = cost_record(Some(100000.0), Some(0.0), Some(0.0), Some(0.0));
        assert!(!is_usable(&record, &ValidityRule::cost()));
    }

    #[test]
    fn test_explosive_only_with_absent_companions_rejected() {
        let record = cost_record(Some(100000.0), None, None, None);
        assert!(!is_usable(&record, &ValidityRule::cost()));
    }

    #[test]
    fn test_single_zero_companion_rejected() {
        let record = cost_record(Some(100000.0), Some(50000.0), Some(0.0), Some(20000.0));
        assert!(!is_usable(&record, &ValidityRule::cost()));
    }

    #[test]
    fn test_missing_explosive_with_other_costs_is_usable() {
        let record = cost_record(None, Some(50000.0), Some(0.0), None);
        assert!(is_usable(&record, &ValidityRule::cost()));
    }

    #[test]
    fn test_no_costs_at_all_rejected() {
        let record = cost_record(None, None, Some(0.0), None);
        assert!(!is_usable(&record, &ValidityRule::cost()));
    }

    #[test]
    fn test_undated_record_rejected() {
        let record = BlastRecord {
            blast_date: None,
            ..cost_record(Some(1.0), Some(1.0), Some(1.0), Some(1.0))
        };
        assert!(!is_usable(&record, &ValidityRule::cost()));
    }

    #[test]
    fn test_any_positive_rule() {
        let rule = ValidityRule::any_positive(&[Field::Ppv, Field::AirBlast]);

        let mut record = dated();
        assert!(!is_usable(&record, &rule));

        record.ppv = Some(-2.0);
        assert!(!is_usable(&record, &rule));

        record.air_blast = Some(118.0);
        assert!(is_usable(&record, &rule));
    }
}
