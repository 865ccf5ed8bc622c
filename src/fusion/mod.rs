//! Indicator types and the final analysis report.

pub mod engine;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::session::{SessionState, StageStatuses};

pub use engine::{fuse, FusionInputs};

/// The five fused output indicators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    DepressionRisk,
    SleepDisorder,
    CognitiveFunction,
    EmotionalStability,
    OverallVitality,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 5] = [
        IndicatorKind::DepressionRisk,
        IndicatorKind::SleepDisorder,
        IndicatorKind::CognitiveFunction,
        IndicatorKind::EmotionalStability,
        IndicatorKind::OverallVitality,
    ];

    /// Short clinical label (DRI/SDI/CFL/ES/OV)
    pub fn abbreviation(&self) -> &'static str {
        match self {
            IndicatorKind::DepressionRisk => "DRI",
            IndicatorKind::SleepDisorder => "SDI",
            IndicatorKind::CognitiveFunction => "CFL",
            IndicatorKind::EmotionalStability => "ES",
            IndicatorKind::OverallVitality => "OV",
        }
    }
}

/// Modalities that can contribute to an indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Acoustic,
    Text,
    Neural,
}

/// Coarse status bucket derived from the indicator value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorStatus {
    Low,
    Medium,
    High,
}

/// One fused indicator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Indicator {
    pub kind: IndicatorKind,
    /// Fused value in [0, 1]
    pub value: f32,
    /// Propagated confidence in [0, 1]
    pub confidence: f32,
    pub status: IndicatorStatus,
    /// Modalities that actually contributed after exclusions
    pub contributing_modalities: Vec<Modality>,
    /// True when the removed modality weight reached the configured
    /// degradation threshold
    pub degraded: bool,
}

/// Errors from the fusion engine
#[derive(Debug, Error)]
pub enum FusionError {
    /// Every modality for every indicator was unavailable at once
    #[error("No analyzer input available for any indicator")]
    InputMissing,
}

/// Final, immutable analysis report for one session.
///
/// Produced whole by the fusion engine or not at all; consumers never
/// observe a partially written report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub session_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub depression_risk: Indicator,
    pub sleep_disorder: Indicator,
    pub cognitive_function: Indicator,
    pub emotional_stability: Indicator,
    pub overall_vitality: Indicator,
    pub stages: StageStatuses,
    pub state: SessionState,
    pub requires_expert_review: bool,
}

impl AnalysisReport {
    pub fn indicator(&self, kind: IndicatorKind) -> &Indicator {
        match kind {
            IndicatorKind::DepressionRisk => &self.depression_risk,
            IndicatorKind::SleepDisorder => &self.sleep_disorder,
            IndicatorKind::CognitiveFunction => &self.cognitive_function,
            IndicatorKind::EmotionalStability => &self.emotional_stability,
            IndicatorKind::OverallVitality => &self.overall_vitality,
        }
    }

    pub fn indicators(&self) -> impl Iterator<Item = &Indicator> {
        IndicatorKind::ALL.iter().map(move |k| self.indicator(*k))
    }

    pub fn degraded_count(&self) -> usize {
        self.indicators().filter(|i| i.degraded).count()
    }
}
