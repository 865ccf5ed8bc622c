//! Analyzer readiness reporting.

use serde::{Deserialize, Serialize};

/// Readiness of one analyzer as seen by the status query.
///
/// `Stub` means the analyzer is configured to answer with its neutral
/// fallback; `NotReady` means it failed to initialize and is latched off
/// for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerState {
    Ready,
    NotReady,
    Stub,
}

/// Per-analyzer readiness snapshot returned by the status query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub acoustic: AnalyzerState,
    pub classifier_depression: AnalyzerState,
    pub classifier_insomnia: AnalyzerState,
    pub text_analyzer: AnalyzerState,
}

impl HealthReport {
    pub fn all_ready(&self) -> bool {
        [
            self.acoustic,
            self.classifier_depression,
            self.classifier_insomnia,
            self.text_analyzer,
        ]
        .iter()
        .all(|s| *s == AnalyzerState::Ready)
    }
}
