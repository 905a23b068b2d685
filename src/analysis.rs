//! # Statistical Analysis Module
//!
//! Closed-form statistics over per-period metric series: descriptive
//! statistics, least-squares trend, anomaly detection, short-horizon
//! forecasts, risk scoring, recommendations and latest-value alerts
//!
//! ## Key Components
//! - [`AnalysisEngine`] - Thresholds plus the public [`AnalysisEngine::analyze`] entry point
//! - [`Series`] - One ordered metric series
//! - [`AnalysisReport`] - Immutable result, `None` when there is not enough data

use anyhow::{Result, ensure};
use chrono::{DateTime, FixedOffset};
use log::{debug, warn};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::cli::TimeMode;
use crate::dashboards::Polarity;

/// Series shorter than this are "insufficient data", not an error
pub const MIN_DATA_POINTS: usize = 5;

/// Longest forecast the engine produces
pub const MAX_HORIZON: usize = 24;

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub key: &'static str,
    pub label: &'static str,
    pub polarity: Polarity,
    pub root_cause_hint: &'static str,
    /// `(period label, value)` in chronological order, zeros and gaps removed
    pub points: Vec<(String, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub coefficient_of_variation: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl TrendDirection {
    fn as_str(self) -> &'static str {
        match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    pub slope: f64,
    pub intercept: f64,
    pub direction: TrendDirection,
    pub strength: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AnomalyKind {
    ZScore,
    Ewma,
    Iqr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub index: usize,
    pub period: String,
    pub value: f64,
    pub severity: Severity,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub step: usize,
    pub period: String,
    pub predicted_value: f64,
    pub confidence: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricAnalysis {
    pub key: &'static str,
    pub label: &'static str,
    pub statistics: Statistics,
    pub trend: Trend,
    pub anomalies: Vec<Anomaly>,
    pub predictions: Vec<Prediction>,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecommendationKind {
    Consistency,
    Trend,
    Drift,
    Sustain,
    AnomalyReview,
    Forecast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub priority: Priority,
    pub metric: &'static str,
    pub message: String,
    pub action: String,
    pub expected_impact: String,
    pub root_cause_hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AlertKind {
    Spike,
    Drop,
    Deviation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: Severity,
    pub metric: &'static str,
    pub message: String,
    pub timestamp: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub generated_at: DateTime<FixedOffset>,
    pub metrics: Vec<MetricAnalysis>,
    pub overall_risk: RiskLevel,
    pub recommendations: Vec<Recommendation>,
    pub real_time_alerts: Vec<Alert>,
}

#[derive(Debug, Clone)]
pub struct AnalysisEngine {
    min_data_points: usize,
    trend_threshold: f64,
    z_threshold: f64,
    z_high: f64,
    ewma_alpha: f64,
    ewma_sigmas: f64,
    ewma_high_factor: f64,
    iqr_factor: f64,
    horizon: usize,
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisEngine {
    pub fn new() -> Self {
        Self {
            min_data_points: MIN_DATA_POINTS,
            trend_threshold: 0.01,
            z_threshold: 2.5,
            z_high: 3.5,
            ewma_alpha: 0.2,
            ewma_sigmas: 2.5,
            ewma_high_factor: 1.5,
            iqr_factor: 1.5,
            horizon: 3,
        }
    }

    /// Capped at [`MAX_HORIZON`] steps
    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon.min(MAX_HORIZON);
        self
    }

    /// Analyze every series with enough points.
    ///
    /// A series whose computation fails is logged and left out. Returns `None`
    /// when no series yields a result.
    pub fn analyze(&self, series: &[Series], mode: TimeMode, as_of: DateTime<FixedOffset>) -> Option<AnalysisReport> {
        let mut metrics = Vec::new();
        let mut recommendations = Vec::new();
        let mut real_time_alerts = Vec::new();

        for s in series {
            let analysis = match self.analyze_series(s, mode) {
                Ok(Some(analysis)) => analysis,
                Ok(None) => {
                    debug!("Skipping {}: {} points", s.key, s.points.len());
                    continue;
                }
                Err(e) => {
                    warn!("Statistical analysis unavailable for {}: {:#}", s.key, e);
                    continue;
                }
            };

            recommendations.extend(build_recommendations(s, &analysis));
            if let Some(alert) = self.latest_value_alert(s, &analysis.statistics, as_of) {
                real_time_alerts.push(alert);
            }
            metrics.push(analysis);
        }

        if metrics.is_empty() {
            return None;
        }

        // Stable sort keeps rule order within a priority
        recommendations.sort_by_key(|r| Reverse(r.priority));

        let overall_risk = metrics
            .iter()
            .map(|m| m.risk_level)
            .max()
            .unwrap_or(RiskLevel::Low);

        Some(AnalysisReport {
            generated_at: as_of,
            metrics,
            overall_risk,
            recommendations,
            real_time_alerts,
        })
    }

    /// `Ok(None)` below the minimum number of points
    pub fn analyze_series(&self, series: &Series, mode: TimeMode) -> Result<Option<MetricAnalysis>> {
        if series.points.len() < self.min_data_points {
            return Ok(None);
        }

        let values: Vec<f64> = series.points.iter().map(|(_, v)| *v).collect();
        let statistics = descriptive_statistics(&values)?;
        let trend = self.fit_trend(&values, &statistics)?;
        let anomalies = self.detect_anomalies(&series.points, &statistics);
        let predictions = self.forecast(&series.points, &statistics, &trend, mode)?;
        let (risk_score, risk_level) = score_risk(&statistics, &trend, anomalies.len());

        debug!(
            "{}: mean {:.3}, cv {:.3}, slope {:.4} ({}), {} anomalies, risk {:?}",
            series.key,
            statistics.mean,
            statistics.coefficient_of_variation,
            trend.slope,
            trend.direction.as_str(),
            anomalies.len(),
            risk_level
        );

        Ok(Some(MetricAnalysis {
            key: series.key,
            label: series.label,
            statistics,
            trend,
            anomalies,
            predictions,
            risk_score,
            risk_level,
        }))
    }

    /// Ordinary least squares of value against position `0..n`
    fn fit_trend(&self, values: &[f64], stats: &Statistics) -> Result<Trend> {
        let n = values.len() as f64;
        let x_mean = (n - 1.0) / 2.0;

        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for (i, y) in values.iter().enumerate() {
            let dx = i as f64 - x_mean;
            numerator += dx * (y - stats.mean);
            denominator += dx * dx;
        }
        ensure!(denominator > 0.0, "trend needs at least two points");

        let slope = numerator / denominator;
        let intercept = stats.mean - slope * x_mean;
        ensure!(slope.is_finite() && intercept.is_finite(), "non-finite regression coefficients");

        let direction = if slope > self.trend_threshold {
            TrendDirection::Increasing
        } else if slope < -self.trend_threshold {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        };

        let strength = if stats.mean != 0.0 {
            (slope * n / stats.mean).abs()
        } else {
            0.0
        };

        Ok(Trend {
            slope,
            intercept,
            direction,
            strength,
        })
    }

    /// Z-score, EWMA and IQR detectors unioned; one entry per index, highest
    /// severity kept, ordered by index
    fn detect_anomalies(&self, points: &[(String, f64)], stats: &Statistics) -> Vec<Anomaly> {
        let mut found = self.z_score_anomalies(points, stats);
        found.extend(self.ewma_anomalies(points, stats));
        found.extend(self.iqr_anomalies(points, stats));

        let mut by_index: BTreeMap<usize, Anomaly> = BTreeMap::new();
        for anomaly in found {
            match by_index.get(&anomaly.index) {
                Some(existing) if existing.severity >= anomaly.severity => {}
                _ => {
                    by_index.insert(anomaly.index, anomaly);
                }
            }
        }
        by_index.into_values().collect()
    }

    fn z_score_anomalies(&self, points: &[(String, f64)], stats: &Statistics) -> Vec<Anomaly> {
        if stats.std_dev <= 0.0 {
            return Vec::new();
        }
        points
            .iter()
            .enumerate()
            .filter_map(|(index, (period, value))| {
                let z = (value - stats.mean).abs() / stats.std_dev;
                (z > self.z_threshold).then(|| Anomaly {
                    kind: AnomalyKind::ZScore,
                    index,
                    period: period.clone(),
                    value: *value,
                    severity: if z > self.z_high { Severity::High } else { Severity::Medium },
                    score: z,
                })
            })
            .collect()
    }

    /// Each point is compared with the EWMA of the points before it. The bound
    /// uses the residual spread of an EWMA forecast over white noise,
    /// `σ·sqrt(1 + α/(2−α))`.
    fn ewma_anomalies(&self, points: &[(String, f64)], stats: &Statistics) -> Vec<Anomaly> {
        if stats.std_dev <= 0.0 || points.is_empty() {
            return Vec::new();
        }
        let alpha = self.ewma_alpha;
        let sigma = stats.std_dev * (1.0 + alpha / (2.0 - alpha)).sqrt();
        let bound = self.ewma_sigmas * sigma;

        let mut anomalies = Vec::new();
        let mut ewma = points[0].1;
        for (index, (period, value)) in points.iter().enumerate().skip(1) {
            let residual = (value - ewma).abs();
            if residual > bound {
                anomalies.push(Anomaly {
                    kind: AnomalyKind::Ewma,
                    index,
                    period: period.clone(),
                    value: *value,
                    severity: if residual > self.ewma_high_factor * bound {
                        Severity::High
                    } else {
                        Severity::Medium
                    },
                    score: residual / sigma,
                });
            }
            ewma = alpha * value + (1.0 - alpha) * ewma;
        }
        anomalies
    }

    /// Tukey fences on nearest-rank quartiles of a sorted copy
    fn iqr_anomalies(&self, points: &[(String, f64)], stats: &Statistics) -> Vec<Anomaly> {
        if points.is_empty() {
            return Vec::new();
        }
        let mut sorted: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len();
        let q1 = sorted[n / 4];
        let q3 = sorted[(n * 3) / 4];
        let iqr = q3 - q1;
        let lower = q1 - self.iqr_factor * iqr;
        let upper = q3 + self.iqr_factor * iqr;
        let scale = if iqr > 0.0 { iqr } else { stats.std_dev };

        points
            .iter()
            .enumerate()
            .filter_map(|(index, (period, value))| {
                let beyond = if *value < lower {
                    lower - value
                } else if *value > upper {
                    value - upper
                } else {
                    return None;
                };
                Some(Anomaly {
                    kind: AnomalyKind::Iqr,
                    index,
                    period: period.clone(),
                    value: *value,
                    severity: Severity::High,
                    score: if scale > 0.0 { beyond / scale } else { 0.0 },
                })
            })
            .collect()
    }

    /// Blend of the regression line and the last observed value. Stronger
    /// trends lean on the regression, up to 80%.
    fn forecast(
        &self,
        points: &[(String, f64)],
        stats: &Statistics,
        trend: &Trend,
        mode: TimeMode,
    ) -> Result<Vec<Prediction>> {
        let Some((last_label, last_value)) = points.last() else {
            return Ok(Vec::new());
        };
        let n = points.len();
        let linear_weight = (0.5 + 2.0 * trend.strength).min(0.8);
        let stability_bonus = (0.1 - stats.coefficient_of_variation).max(0.0);
        let data_quality_bonus = (n as f64 / 100.0).min(0.1);
        let margin = 1.96 * stats.std_dev;

        let mut predictions = Vec::with_capacity(self.horizon);
        for step in 1..=self.horizon {
            let x = (n - 1 + step) as f64;
            let linear = trend.intercept + trend.slope * x;
            let predicted_value = linear_weight * linear + (1.0 - linear_weight) * last_value;
            ensure!(predicted_value.is_finite(), "non-finite forecast at step {}", step);

            let step_index = (step - 1) as f64;
            let confidence = (0.95 - 0.15 * step_index + stability_bonus + data_quality_bonus)
                .max(0.2)
                .min(0.99);

            predictions.push(Prediction {
                step,
                period: next_period_label(last_label, step, mode),
                predicted_value,
                confidence,
                lower_bound: (predicted_value - margin).max(0.0),
                upper_bound: predicted_value + margin,
            });
        }
        Ok(predictions)
    }

    /// Flags the most recent observation when it sits far from the mean in the
    /// unfavourable direction
    fn latest_value_alert(&self, series: &Series, stats: &Statistics, as_of: DateTime<FixedOffset>) -> Option<Alert> {
        let (period, value) = series.points.last()?;
        if stats.std_dev <= 0.0 {
            return None;
        }
        let deviation = (value - stats.mean) / stats.std_dev;

        let kind = match series.polarity {
            Polarity::HigherIsWorse if deviation > 2.0 => AlertKind::Spike,
            Polarity::LowerIsWorse if deviation < -1.5 => AlertKind::Drop,
            Polarity::Neutral if deviation.abs() > 2.0 => AlertKind::Deviation,
            _ => return None,
        };

        Some(Alert {
            kind,
            severity: if deviation.abs() > 3.0 { Severity::High } else { Severity::Medium },
            metric: series.key,
            message: format!(
                "Latest {} ({}) is {:.2}, {:.1}σ {} the mean of {:.2}",
                series.label,
                period,
                value,
                deviation.abs(),
                if deviation > 0.0 { "above" } else { "below" },
                stats.mean
            ),
            timestamp: as_of,
        })
    }
}

/// Mean, population standard deviation (divide by N) and CV
pub fn descriptive_statistics(values: &[f64]) -> Result<Statistics> {
    ensure!(!values.is_empty(), "no values");
    ensure!(values.iter().all(|v| v.is_finite()), "series contains non-finite values");

    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
    let std_dev = variance.sqrt();
    let coefficient_of_variation = if mean != 0.0 { std_dev / mean } else { 0.0 };
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Ok(Statistics {
        count,
        mean,
        std_dev,
        coefficient_of_variation,
        min,
        max,
    })
}

fn next_period_label(last_label: &str, step: usize, mode: TimeMode) -> String {
    match (mode, last_label.parse::<i32>()) {
        (TimeMode::Yearly, Ok(year)) => match i32::try_from(step).ok().and_then(|s| year.checked_add(s)) {
            Some(next) => next.to_string(),
            None => format!("+{}", step),
        },
        _ => format!("+{}", step),
    }
}

fn score_risk(stats: &Statistics, trend: &Trend, anomaly_count: usize) -> (u32, RiskLevel) {
    let cv = stats.coefficient_of_variation;
    let cv_points = if cv > 0.3 {
        3
    } else if cv > 0.15 {
        2
    } else {
        1
    };

    let moving = trend.direction != TrendDirection::Stable;
    let trend_points = if moving && trend.strength > 0.2 {
        3
    } else if moving && trend.strength > 0.1 {
        2
    } else {
        1
    };

    let density = if stats.count > 0 {
        anomaly_count as f64 / stats.count as f64
    } else {
        0.0
    };
    let anomaly_points = if density > 0.2 {
        3
    } else if density > 0.1 {
        2
    } else if density > 0.0 {
        1
    } else {
        0
    };

    let score = cv_points + trend_points + anomaly_points;
    let level = if score > 7 {
        RiskLevel::High
    } else if score > 4 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };
    (score, level)
}

fn is_unfavourable(polarity: Polarity, direction: TrendDirection) -> bool {
    matches!(
        (polarity, direction),
        (Polarity::HigherIsWorse, TrendDirection::Increasing) | (Polarity::LowerIsWorse, TrendDirection::Decreasing)
    )
}

fn is_favourable(polarity: Polarity, direction: TrendDirection) -> bool {
    matches!(
        (polarity, direction),
        (Polarity::HigherIsWorse, TrendDirection::Decreasing) | (Polarity::LowerIsWorse, TrendDirection::Increasing)
    )
}

/// Independent rules; every rule that applies contributes one recommendation
fn build_recommendations(series: &Series, analysis: &MetricAnalysis) -> Vec<Recommendation> {
    let stats = &analysis.statistics;
    let trend = &analysis.trend;
    let hint = Some(series.root_cause_hint.to_string());
    let mut out = Vec::new();

    let cv = stats.coefficient_of_variation;
    if cv > 0.15 {
        let high = cv > 0.3;
        out.push(Recommendation {
            kind: RecommendationKind::Consistency,
            priority: if high { Priority::High } else { Priority::Medium },
            metric: series.key,
            message: format!(
                "{} varies by {:.1}% around its mean of {:.2}",
                series.label,
                cv * 100.0,
                stats.mean
            ),
            action: format!("Standardize blast design and charging practice behind {}", series.label),
            expected_impact: if high {
                "Reduce period-to-period variation by 15-25%".to_string()
            } else {
                "Reduce period-to-period variation by 5-10%".to_string()
            },
            root_cause_hint: hint.clone(),
        });
    }

    if trend.strength > 0.1 && is_unfavourable(series.polarity, trend.direction) {
        out.push(Recommendation {
            kind: RecommendationKind::Trend,
            priority: if trend.strength > 0.2 { Priority::High } else { Priority::Medium },
            metric: series.key,
            message: format!(
                "{} is {} by {:.2} per period ({:.0}% across the window)",
                series.label,
                trend.direction.as_str(),
                trend.slope.abs(),
                trend.strength * 100.0
            ),
            action: format!("Investigate what changed in {} before the next blast cycle", series.label),
            expected_impact: "Stop further deterioration and recover the earlier level".to_string(),
            root_cause_hint: hint.clone(),
        });
    }

    if trend.strength > 0.2 && series.polarity == Polarity::Neutral && trend.direction != TrendDirection::Stable {
        out.push(Recommendation {
            kind: RecommendationKind::Drift,
            priority: Priority::Medium,
            metric: series.key,
            message: format!(
                "{} is drifting ({}) by {:.0}% across the window",
                series.label,
                trend.direction.as_str(),
                trend.strength * 100.0
            ),
            action: format!("Confirm the {} drift is intended by the blast design", series.label),
            expected_impact: "Keep actual practice aligned with the design".to_string(),
            root_cause_hint: hint.clone(),
        });
    }

    if trend.strength > 0.1 && is_favourable(series.polarity, trend.direction) {
        out.push(Recommendation {
            kind: RecommendationKind::Sustain,
            priority: Priority::Low,
            metric: series.key,
            message: format!("{} is improving ({})", series.label, trend.direction.as_str()),
            action: "Document the current practice so the improvement holds".to_string(),
            expected_impact: "Retain recent gains".to_string(),
            root_cause_hint: None,
        });
    }

    let anomaly_count = analysis.anomalies.len();
    if anomaly_count > 0 {
        let high_count = analysis
            .anomalies
            .iter()
            .filter(|a| a.severity == Severity::High)
            .count();
        let priority = if high_count >= 2 {
            Priority::High
        } else if anomaly_count >= 2 || high_count == 1 {
            Priority::Medium
        } else {
            Priority::Low
        };
        let periods: Vec<&str> = analysis.anomalies.iter().map(|a| a.period.as_str()).collect();
        out.push(Recommendation {
            kind: RecommendationKind::AnomalyReview,
            priority,
            metric: series.key,
            message: format!(
                "{} anomalous period(s) in {} ({} high severity)",
                anomaly_count, series.label, high_count
            ),
            action: format!("Review field logs for {}", periods.join(", ")),
            expected_impact: "Separate data-entry errors from genuine one-off events".to_string(),
            root_cause_hint: hint.clone(),
        });
    }

    if let Some(last) = analysis.predictions.last() {
        let breach = match series.polarity {
            Polarity::HigherIsWorse => last.predicted_value > stats.mean + stats.std_dev,
            Polarity::LowerIsWorse => last.predicted_value < stats.mean - stats.std_dev,
            Polarity::Neutral => false,
        };
        if breach {
            out.push(Recommendation {
                kind: RecommendationKind::Forecast,
                priority: Priority::Medium,
                metric: series.key,
                message: format!(
                    "{} is forecast to reach {:.2} by {} ({:.0}% confidence)",
                    series.label,
                    last.predicted_value,
                    last.period,
                    last.confidence * 100.0
                ),
                action: format!("Plan corrective measures for {} ahead of {}", series.label, last.period),
                expected_impact: "Avoid the projected excursion".to_string(),
                root_cause_hint: hint,
            });
        }
    }

    out
}
