//! Neural voice classifier (sinc-filter front end).
//!
//! Two independently trained model instances — depression and insomnia —
//! run windowed inference over raw waveform and pool per-window scores
//! into one [`ClassifierScore`] per task. Models load lazily, once per
//! process; a failed load latches the task `NotReady` and is never
//! retried per-request.

pub mod model;
pub mod registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::health::AnalyzerState;

pub use registry::SincRegistry;

/// Classifier tasks, each backed by its own trained model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierTask {
    Depression,
    Insomnia,
}

impl ClassifierTask {
    pub fn name(&self) -> &'static str {
        match self {
            ClassifierTask::Depression => "depression",
            ClassifierTask::Insomnia => "insomnia",
        }
    }

    /// Weight file name in the model cache
    pub fn filename(&self) -> &'static str {
        match self {
            ClassifierTask::Depression => "sincvoice-depression.onnx",
            ClassifierTask::Insomnia => "sincvoice-insomnia.onnx",
        }
    }
}

/// How per-window scores are pooled into the task score.
///
/// Mean pooling is the default; max pooling suits indicators sensitive
/// to peak risk within a call rather than its average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    MeanPool,
    MaxPool,
}

/// One classifier result per task per session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierScore {
    pub task: ClassifierTask,
    /// Pooled risk score in [0, 1]
    pub raw_score: f32,
    pub window_count: usize,
    pub aggregation: Aggregation,
    /// Derived from window coverage and per-window agreement
    pub confidence: f32,
}

/// Errors from the neural classifier
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Model not found at path: {0}")]
    ModelNotFound(PathBuf),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Classifier for task '{}' is not ready", .0.name())]
    NotReady(ClassifierTask),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Segment too short for windowed inference: {got} samples (min {min})")]
    InsufficientAudio { got: usize, min: usize },
}

/// Capability interface over the classifier so the orchestrator and
/// tests never depend on the ONNX-backed implementation directly.
#[async_trait]
pub trait VoiceClassifier: Send + Sync {
    async fn classify(&self, samples: &[f32], task: ClassifierTask)
        -> Result<ClassifierScore, ClassifierError>;

    fn state(&self, task: ClassifierTask) -> AnalyzerState;
}

/// Pool per-window scores into one task score
pub fn pool_scores(scores: &[f32], aggregation: Aggregation) -> f32 {
    match aggregation {
        Aggregation::MeanPool => scores.iter().sum::<f32>() / scores.len() as f32,
        Aggregation::MaxPool => scores.iter().fold(0.0f32, |m, &s| m.max(s)),
    }
}

/// Confidence from window coverage and per-window agreement.
///
/// Coverage saturates at four windows; agreement is one minus twice the
/// per-window standard deviation (scores live in [0, 1] so std caps at
/// 0.5), floored so that disagreeing windows still carry some weight.
pub fn window_confidence(scores: &[f32]) -> f32 {
    if scores.is_empty() {
        return 0.0;
    }
    let coverage = (scores.len() as f32 / 4.0).min(1.0);
    let mean = scores.iter().sum::<f32>() / scores.len() as f32;
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / scores.len() as f32;
    let agreement = (1.0 - 2.0 * variance.sqrt()).max(0.25);
    (coverage * agreement).clamp(0.0, 1.0)
}
