//! Speaker diarization collaborator interface.
//!
//! Diarization itself is an external service; the pipeline only consumes
//! its segment boundaries and picks the senior speaker's speech out of
//! the call. Diarization is the one stage with no fallback: a failure
//! here fails the session.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::session::{SpeakerSegment, SAMPLES_PER_MS};

/// Errors surfaced by the diarization collaborator
#[derive(Debug, Error)]
pub enum DiarizationError {
    #[error("Diarization service unavailable: {0}")]
    Unavailable(String),

    #[error("No speech found in recording")]
    NoSpeech,

    #[error("Diarization timed out")]
    Timeout,
}

/// External diarization collaborator.
///
/// Implementations wrap whatever service isolates per-speaker segments;
/// the pipeline never looks inside.
#[async_trait]
pub trait Diarizer: Send + Sync {
    async fn diarize(&self, samples: &[f32]) -> Result<Vec<SpeakerSegment>, DiarizationError>;
}

/// Pick the senior speaker's speech from diarized segments.
///
/// When `target_speaker` is set, that label wins. Otherwise the speaker
/// with the greatest summed talk time is taken: screening calls are
/// near-duologues and the screened caller dominates talk time. The
/// selected speaker's segments are stitched into one contiguous sample
/// buffer spanning their first to last utterance.
pub fn select_senior_segment(
    segments: &[SpeakerSegment],
    target_speaker: Option<&str>,
) -> Result<SpeakerSegment, DiarizationError> {
    if segments.is_empty() {
        return Err(DiarizationError::NoSpeech);
    }

    let mut talk_time: HashMap<&str, u64> = HashMap::new();
    for seg in segments {
        *talk_time.entry(seg.speaker_id.as_str()).or_default() += seg.duration_ms();
    }

    let speaker = match target_speaker {
        Some(label) if talk_time.contains_key(label) => label.to_string(),
        Some(label) => {
            debug!("Target speaker {:?} not found in diarization output", label);
            return Err(DiarizationError::NoSpeech);
        }
        None => talk_time
            .iter()
            .max_by_key(|(_, ms)| **ms)
            .map(|(s, _)| s.to_string())
            .ok_or(DiarizationError::NoSpeech)?,
    };

    let mut own: Vec<&SpeakerSegment> = segments
        .iter()
        .filter(|s| s.speaker_id == speaker)
        .collect();
    own.sort_by_key(|s| s.start_ms);

    let start_ms = own.first().map(|s| s.start_ms).ok_or(DiarizationError::NoSpeech)?;
    let mut samples = Vec::with_capacity(
        own.iter().map(|s| s.samples.len()).sum::<usize>(),
    );
    let mut end_ms = start_ms;
    for seg in &own {
        samples.extend_from_slice(&seg.samples);
        end_ms = end_ms.max(seg.end_ms);
    }

    info!(
        "Senior speaker {:?}: {} segment(s), {} ms of speech",
        speaker,
        own.len(),
        samples.len() as u64 / SAMPLES_PER_MS
    );

    Ok(SpeakerSegment::new(speaker, start_ms, end_ms, samples))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(speaker: &str, start_ms: u64, end_ms: u64) -> SpeakerSegment {
        let samples = vec![0.1; ((end_ms - start_ms) * SAMPLES_PER_MS) as usize];
        SpeakerSegment::new(speaker, start_ms, end_ms, samples)
    }

    #[test]
    fn test_select_longest_talker() {
        let segments = vec![
            seg("Speaker 1", 0, 2000),
            seg("Speaker 2", 2000, 10000),
            seg("Speaker 1", 10000, 11000),
        ];

        let senior = select_senior_segment(&segments, None).unwrap();
        assert_eq!(senior.speaker_id, "Speaker 2");
        assert_eq!(senior.samples.len(), (8000 * SAMPLES_PER_MS) as usize);
    }

    #[test]
    fn test_select_target_speaker_override() {
        let segments = vec![
            seg("Speaker 1", 0, 2000),
            seg("Speaker 2", 2000, 10000),
        ];

        let senior = select_senior_segment(&segments, Some("Speaker 1")).unwrap();
        assert_eq!(senior.speaker_id, "Speaker 1");
    }

    #[test]
    fn test_select_unknown_target_fails() {
        let segments = vec![seg("Speaker 1", 0, 2000)];
        let result = select_senior_segment(&segments, Some("Speaker 9"));
        assert!(matches!(result, Err(DiarizationError::NoSpeech)));
    }

    #[test]
    fn test_select_empty_fails() {
        let result = select_senior_segment(&[], None);
        assert!(matches!(result, Err(DiarizationError::NoSpeech)));
    }

    #[test]
    fn test_stitched_segments_are_time_ordered() {
        // Out-of-order input still stitches by start time
        let segments = vec![
            seg("Speaker 1", 5000, 6000),
            seg("Speaker 1", 0, 1000),
        ];

        let senior = select_senior_segment(&segments, None).unwrap();
        assert_eq!(senior.start_ms, 0);
        assert_eq!(senior.end_ms, 6000);
        assert_eq!(senior.samples.len(), (2000 * SAMPLES_PER_MS) as usize);
    }
}
