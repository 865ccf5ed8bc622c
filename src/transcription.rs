//! Speech-to-text collaborator interface.
//!
//! Transcription runs outside this crate. The text analyzer only needs
//! the final transcript string for the senior speaker's segment.

use async_trait::async_trait;
use thiserror::Error;

use crate::session::SpeakerSegment;

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("Transcription service unavailable: {0}")]
    Unavailable(String),

    #[error("Transcription timed out")]
    Timeout,
}

/// External speech-to-text collaborator
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, segment: &SpeakerSegment) -> Result<String, TranscriptionError>;
}
