//! Session types shared across the pipeline.
//!
//! An [`AudioSession`] is the immutable unit of work created at pipeline
//! entry. Diarization attributes slices of it to speakers as
//! [`SpeakerSegment`]s; everything downstream operates on the senior
//! speaker's segment only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Audio sample rate the pipeline operates at
pub const SAMPLE_RATE: u32 = 16_000;

/// Samples per millisecond at 16kHz
pub const SAMPLES_PER_MS: u64 = 16;

/// Caller metadata attached at ingest, never mutated afterwards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMetadata {
    pub user_id: String,
    pub age: Option<u32>,
    pub gender: Option<String>,
    /// Free-form tag from the calling system (e.g. care-program cohort)
    pub session_tag: Option<String>,
}

impl UserMetadata {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            age: None,
            gender: None,
            session_tag: None,
        }
    }
}

/// Immutable input unit for one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSession {
    pub id: Uuid,
    pub audio_path: PathBuf,
    pub sample_rate: u32,
    pub duration_ms: u64,
    pub metadata: UserMetadata,
    pub created_at: DateTime<Utc>,
}

impl AudioSession {
    pub fn new(audio_path: PathBuf, sample_rate: u32, duration_ms: u64, metadata: UserMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            audio_path,
            sample_rate,
            duration_ms,
            metadata,
            created_at: Utc::now(),
        }
    }
}

/// Time-bounded slice of a session attributed to one speaker.
///
/// Samples are 16kHz mono, normalized to [-1, 1].
#[derive(Debug, Clone)]
pub struct SpeakerSegment {
    pub speaker_id: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub samples: Vec<f32>,
}

impl SpeakerSegment {
    pub fn new(speaker_id: impl Into<String>, start_ms: u64, end_ms: u64, samples: Vec<f32>) -> Self {
        Self {
            speaker_id: speaker_id.into(),
            start_ms,
            end_ms,
            samples,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Pipeline state machine for one session.
///
/// Terminal states are `Complete`, `CompleteDegraded` and `Failed`;
/// `Validated` only appears in offline recalibration runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum SessionState {
    Ingested,
    Diarized,
    AnalyzersRunning,
    Fused,
    Validated,
    Complete,
    CompleteDegraded,
    Failed(String),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Complete | SessionState::CompleteDegraded | SessionState::Failed(_)
        )
    }
}

/// Outcome of a single pipeline stage, recorded on the final report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum StageStatus {
    Completed,
    /// Stage resolved through its fallback path (stub result, NotReady
    /// classifier, excluded modality). The session still completes.
    Fallback(String),
    Failed(String),
}

impl StageStatus {
    pub fn is_fallback(&self) -> bool {
        matches!(self, StageStatus::Fallback(_))
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, StageStatus::Completed)
    }
}

/// Per-stage outcomes for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageStatuses {
    pub diarization: StageStatus,
    pub acoustic: StageStatus,
    pub classifier_depression: StageStatus,
    pub classifier_insomnia: StageStatus,
    pub transcription: StageStatus,
    pub text_analysis: StageStatus,
}

impl StageStatuses {
    /// True when any stage resolved through a fallback path
    pub fn any_fallback(&self) -> bool {
        [
            &self.diarization,
            &self.acoustic,
            &self.classifier_depression,
            &self.classifier_insomnia,
            &self.transcription,
            &self.text_analysis,
        ]
        .iter()
        .any(|s| s.is_fallback())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_duration() {
        let seg = SpeakerSegment::new("Speaker 1", 1000, 3000, vec![0.0; 32000]);
        assert_eq!(seg.duration_ms(), 2000);
    }

    #[test]
    fn test_segment_duration_saturating() {
        // Edge case: end before start
        let seg = SpeakerSegment::new("Speaker 1", 3000, 1000, vec![]);
        assert_eq!(seg.duration_ms(), 0);
    }

    #[test]
    fn test_terminal_states() {
        assert!(SessionState::Complete.is_terminal());
        assert!(SessionState::CompleteDegraded.is_terminal());
        assert!(SessionState::Failed("cancelled".into()).is_terminal());
        assert!(!SessionState::AnalyzersRunning.is_terminal());
    }

    #[test]
    fn test_any_fallback() {
        let mut stages = StageStatuses {
            diarization: StageStatus::Completed,
            acoustic: StageStatus::Completed,
            classifier_depression: StageStatus::Completed,
            classifier_insomnia: StageStatus::Completed,
            transcription: StageStatus::Completed,
            text_analysis: StageStatus::Completed,
        };
        assert!(!stages.any_fallback());

        stages.text_analysis = StageStatus::Fallback("timeout".into());
        assert!(stages.any_fallback());
    }

    #[test]
    fn test_session_state_serialization() {
        let state = SessionState::Failed("diarization unavailable".into());
        let json = serde_json::to_string(&state).unwrap();
        let back: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }
}
