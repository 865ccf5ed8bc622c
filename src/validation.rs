//! Offline clinical validation.
//!
//! Correlates historical indicator output against clinical-scale ground
//! truth (PHQ-9 / ISI / MMSE), bucketed by degradation state, to feed
//! recalibration of fusion weights and confidence thresholds. Never on
//! the request-serving path; failures here are logged, not raised.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::fusion::{AnalysisReport, IndicatorKind, IndicatorStatus};
use crate::session::SessionState;

/// Standardized clinical screening scales used as ground truth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClinicalScale {
    /// Depression (0-27, higher is worse)
    Phq9,
    /// Insomnia severity (0-28, higher is worse)
    Isi,
    /// Cognitive function (0-30, higher is better)
    Mmse,
}

impl ClinicalScale {
    pub fn max_score(&self) -> f32 {
        match self {
            ClinicalScale::Phq9 => 27.0,
            ClinicalScale::Isi => 28.0,
            ClinicalScale::Mmse => 30.0,
        }
    }

    /// The indicator this scale validates
    pub fn indicator(&self) -> IndicatorKind {
        match self {
            ClinicalScale::Phq9 => IndicatorKind::DepressionRisk,
            ClinicalScale::Isi => IndicatorKind::SleepDisorder,
            ClinicalScale::Mmse => IndicatorKind::CognitiveFunction,
        }
    }

    /// Normalize a raw scale score into the indicator's [0, 1]
    /// orientation. PHQ-9 and ISI grow with risk like DRI/SDI; MMSE
    /// grows with function like CFL.
    pub fn normalized(&self, score: f32) -> f32 {
        (score / self.max_score()).clamp(0.0, 1.0)
    }
}

/// Links a historical report to one ground-truth clinical score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalRecord {
    pub report: AnalysisReport,
    pub scale: ClinicalScale,
    pub score: f32,
}

/// Accuracy metrics for one degradation bucket
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketMetrics {
    /// Records in this bucket; correlation is meaningless under ~10
    pub n: usize,
    /// Pearson correlation between indicator values and normalized
    /// clinical scores; `None` below two records or with zero variance
    pub pearson_r: Option<f32>,
    /// Mean absolute error against the normalized clinical score
    pub mae: f32,
    /// Fraction of records whose status bucket matches the bucketed
    /// clinical score
    pub status_accuracy: f32,
}

/// Validation output, bucketed by analyzer-degradation state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub clean: BucketMetrics,
    pub degraded: BucketMetrics,
}

/// Compute validation metrics over historical records.
pub fn validate(records: &[ClinicalRecord], config: &Config) -> ValidationMetrics {
    let (degraded, clean): (Vec<_>, Vec<_>) = records
        .iter()
        .partition(|r| r.report.state == SessionState::CompleteDegraded);

    info!(
        "Validating {} records ({} clean, {} degraded)",
        records.len(),
        clean.len(),
        degraded.len()
    );

    ValidationMetrics {
        clean: bucket_metrics(&clean, config),
        degraded: bucket_metrics(&degraded, config),
    }
}

fn bucket_metrics(records: &[&ClinicalRecord], config: &Config) -> BucketMetrics {
    if records.is_empty() {
        return BucketMetrics::default();
    }

    let mut predicted = Vec::with_capacity(records.len());
    let mut truth = Vec::with_capacity(records.len());
    let mut status_hits = 0usize;

    for record in records {
        if record.score < 0.0 || record.score > record.scale.max_score() {
            warn!(
                "Skipping record with out-of-range {:?} score {}",
                record.scale, record.score
            );
            continue;
        }
        let indicator = record.report.indicator(record.scale.indicator());
        let normalized = record.scale.normalized(record.score);

        predicted.push(indicator.value);
        truth.push(normalized);

        if indicator.status == status_for(normalized, config) {
            status_hits += 1;
        }
    }

    let n = predicted.len();
    if n == 0 {
        return BucketMetrics::default();
    }

    let mae = predicted
        .iter()
        .zip(truth.iter())
        .map(|(p, t)| (p - t).abs())
        .sum::<f32>()
        / n as f32;

    BucketMetrics {
        n,
        pearson_r: pearson(&predicted, &truth),
        mae,
        status_accuracy: status_hits as f32 / n as f32,
    }
}

fn status_for(value: f32, config: &Config) -> IndicatorStatus {
    if value < config.thresholds.status_low_below {
        IndicatorStatus::Low
    } else if value >= config.thresholds.status_high_from {
        IndicatorStatus::High
    } else {
        IndicatorStatus::Medium
    }
}

/// Pearson correlation coefficient; `None` for degenerate inputs
fn pearson(a: &[f32], b: &[f32]) -> Option<f32> {
    let n = a.len();
    if n < 2 || n != b.len() {
        return None;
    }

    let mean_a = a.iter().sum::<f32>() / n as f32;
    let mean_b = b.iter().sum::<f32>() / n as f32;

    let mut cov = 0.0f32;
    let mut var_a = 0.0f32;
    let mut var_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a < 1e-12 || var_b < 1e-12 {
        return None;
    }

    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}
