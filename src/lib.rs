//! wellvoice: multimodal voice analysis for elder-care phone calls.
//!
//! Ingests a call recording, isolates the senior speaker via an external
//! diarization collaborator, runs three independent analyzers
//! concurrently (acoustic/prosodic features, a sinc-filter neural voice
//! classifier, and language-model transcript scoring), and fuses their
//! normalized sub-scores into five indicators — depression risk, sleep
//! disorder, cognitive function, emotional stability, overall vitality —
//! each with propagated confidence and explicit degradation flags.
//!
//! The pipeline degrades gracefully: any analyzer may fail, time out or
//! be stubbed and the session still completes with renormalized weights
//! and penalized confidence. Only diarization failure and total fusion
//! failure are session-fatal. Risk indicators are produced for
//! professional review, never as a diagnosis.

pub mod acoustic;
pub mod audio;
pub mod classifier;
pub mod config;
pub mod diarization;
pub mod fusion;
pub mod health;
pub mod logging;
pub mod pipeline;
pub mod session;
pub mod text;
pub mod transcription;
pub mod validation;

#[cfg(test)]
mod e2e_tests;

pub use config::Config;
pub use fusion::{AnalysisReport, Indicator, IndicatorKind, IndicatorStatus};
pub use health::{AnalyzerState, HealthReport};
pub use pipeline::{Orchestrator, PipelineContext, PipelineError};
pub use session::{AudioSession, SessionState, SpeakerSegment, UserMetadata};
