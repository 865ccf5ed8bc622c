//! Transcript scoring via an external language model, with a stub
//! fallback.
//!
//! The fallback is a first-class success path: when the external call is
//! disabled, times out, or fails its retries, the analyzer answers with
//! neutral midpoint scores flagged `is_stub`, and fusion applies the
//! confidence penalty downstream. The pipeline always completes.

pub mod llm;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::Config;
use crate::health::AnalyzerState;

pub use llm::LlmAnalyzer;

/// Neutral midpoint used by the stub result
pub const NEUTRAL_SCORE: f32 = 0.5;

/// Scored transcript for one session.
///
/// Risk-oriented signals (depression, fatigue) grow with risk;
/// function-oriented signals (cognitive, emotional stability, vitality)
/// grow with function, matching indicator orientation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextAnalysisResult {
    pub transcript: String,
    /// 0 = strongly negative, 1 = strongly positive
    pub sentiment: f32,
    pub emotion_distribution: HashMap<String, f32>,
    pub depression_signal: f32,
    pub fatigue_signal: f32,
    /// Cognitive-linguistic markers flagged by the model (word-finding
    /// pauses, topic drift, repetition)
    pub cognitive_markers: Vec<String>,
    pub cognitive_score: f32,
    pub emotional_stability: f32,
    pub vitality: f32,
    /// Scoring confidence reported alongside the scores
    pub confidence: f32,
    /// True when the external call was skipped or failed and neutral
    /// fallback values were substituted
    pub is_stub: bool,
}

impl TextAnalysisResult {
    /// Neutral fallback substituted when the external call is unavailable
    pub fn stub(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            sentiment: NEUTRAL_SCORE,
            emotion_distribution: HashMap::new(),
            depression_signal: NEUTRAL_SCORE,
            fatigue_signal: NEUTRAL_SCORE,
            cognitive_markers: Vec::new(),
            cognitive_score: NEUTRAL_SCORE,
            emotional_stability: NEUTRAL_SCORE,
            vitality: NEUTRAL_SCORE,
            confidence: 0.0,
            is_stub: true,
        }
    }
}

/// Errors internal to the text analyzer. These never surface to the
/// session: the orchestrator resolves all of them to the stub result.
#[derive(Debug, Error)]
pub enum TextAnalysisError {
    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Language-model call timed out")]
    Timeout,

    #[error("Unparseable response: {0}")]
    InvalidResponse(String),
}

/// Capability interface over transcript scoring. Fusion never learns
/// which variant ran; it only sees `is_stub` on the result.
#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    async fn analyze(&self, transcript: &str) -> Result<TextAnalysisResult, TextAnalysisError>;

    fn state(&self) -> AnalyzerState;
}

/// Always answers with the neutral fallback
pub struct StubAnalyzer;

#[async_trait]
impl TextAnalyzer for StubAnalyzer {
    async fn analyze(&self, transcript: &str) -> Result<TextAnalysisResult, TextAnalysisError> {
        Ok(TextAnalysisResult::stub(transcript))
    }

    fn state(&self) -> AnalyzerState {
        AnalyzerState::Stub
    }
}

/// Select the analyzer variant at startup from configuration.
///
/// The stub is chosen when explicitly toggled on or when no endpoint is
/// configured; downstream code holds the trait object and never
/// branches on the variant again.
pub fn analyzer_from_config(config: &Config) -> Arc<dyn TextAnalyzer> {
    if config.stubs.text_analyzer {
        info!("Text analyzer stubbed by configuration");
        return Arc::new(StubAnalyzer);
    }
    match config.llm.endpoint.as_deref() {
        Some(endpoint) => match LlmAnalyzer::new(
            endpoint,
            config.llm.api_key.as_deref().unwrap_or(""),
            &config.llm.model,
            config.llm.max_retries,
        ) {
            Ok(analyzer) => Arc::new(analyzer),
            Err(e) => {
                info!("Text analyzer stubbed: {}", e);
                Arc::new(StubAnalyzer)
            }
        },
        None => {
            info!("Text analyzer stubbed: no endpoint configured");
            Arc::new(StubAnalyzer)
        }
    }
}
