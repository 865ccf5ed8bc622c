//! Audio ingest: WAV decoding with a codec fallback.
//!
//! The pipeline operates on 16kHz mono f32. Recordings arrive as WAV in
//! the common case; anything else (or a WAV at the wrong rate) gets one
//! re-encode attempt through the external `ffmpeg` tool before the
//! session is failed with a decode error.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::session::SAMPLE_RATE;

/// Errors that can occur while decoding session audio
#[derive(Debug, Error)]
pub enum AudioDecodeError {
    #[error("Audio file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Unsupported sample rate {got} Hz (expected {expected} Hz)")]
    SampleRate { got: u32, expected: u32 },

    #[error("Codec fallback failed: {0}")]
    CodecFallback(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decoded session audio: 16kHz mono samples in [-1, 1]
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration_ms(&self) -> u64 {
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }
}

/// Decode a WAV file to 16kHz mono f32.
///
/// Multi-channel input is downmixed by averaging. Returns
/// `SampleRate` if the container decodes but is not at 16kHz, so the
/// caller can route through the codec fallback.
pub fn decode_wav(path: &Path) -> Result<DecodedAudio, AudioDecodeError> {
    if !path.exists() {
        return Err(AudioDecodeError::NotFound(path.to_path_buf()));
    }

    let mut reader =
        hound::WavReader::open(path).map_err(|e| AudioDecodeError::Decode(e.to_string()))?;
    let spec = reader.spec();

    if spec.sample_rate != SAMPLE_RATE {
        return Err(AudioDecodeError::SampleRate {
            got: spec.sample_rate,
            expected: SAMPLE_RATE,
        });
    }

    let channels = spec.channels as usize;
    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| AudioDecodeError::Decode(e.to_string()))?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<Result<_, _>>()
                .map_err(|e| AudioDecodeError::Decode(e.to_string()))?
        }
    };

    let samples = if channels <= 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    debug!(
        "Decoded {:?}: {} samples ({} ms), {} channel(s)",
        path,
        samples.len(),
        samples.len() as u64 * 1000 / SAMPLE_RATE as u64,
        channels
    );

    Ok(DecodedAudio {
        samples,
        sample_rate: SAMPLE_RATE,
    })
}

/// Re-encode an arbitrary container to 16kHz mono WAV via ffmpeg.
///
/// Writes into a temp dir owned by the caller so intermediate files are
/// cleaned up with it.
pub async fn reencode_via_ffmpeg(input: &Path, work_dir: &Path) -> Result<PathBuf, AudioDecodeError> {
    let output = work_dir.join("reencoded.wav");

    info!("Re-encoding {:?} via ffmpeg", input);

    let result = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(input)
        .args(["-ac", "1", "-ar"])
        .arg(SAMPLE_RATE.to_string())
        .args(["-f", "wav"])
        .arg(&output)
        .output()
        .await
        .map_err(|e| AudioDecodeError::CodecFallback(format!("failed to spawn ffmpeg: {}", e)))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        // Last lines carry the actual failure; the banner does not
        let tail: String = stderr
            .lines()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("\n");
        return Err(AudioDecodeError::CodecFallback(format!(
            "ffmpeg exited with {}: {}",
            result.status, tail
        )));
    }

    Ok(output)
}

/// Load session audio, falling back to one ffmpeg re-encode for foreign
/// containers or sample rates.
pub async fn load_session_audio(path: &Path) -> Result<DecodedAudio, AudioDecodeError> {
    if !path.exists() {
        return Err(AudioDecodeError::NotFound(path.to_path_buf()));
    }

    let native = {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || decode_wav(&path))
            .await
            .map_err(|e| AudioDecodeError::Decode(format!("decode task panicked: {}", e)))?
    };

    match native {
        Ok(audio) => Ok(audio),
        Err(AudioDecodeError::NotFound(p)) => Err(AudioDecodeError::NotFound(p)),
        Err(first_err) => {
            warn!("Native decode failed ({}), trying codec fallback", first_err);
            let work_dir = tempfile::tempdir()?;
            let reencoded = reencode_via_ffmpeg(path, work_dir.path()).await?;
            let decoded = tokio::task::spawn_blocking(move || decode_wav(&reencoded))
                .await
                .map_err(|e| AudioDecodeError::Decode(format!("decode task panicked: {}", e)))?
                .map_err(|e| {
                    AudioDecodeError::CodecFallback(format!(
                        "re-encoded file still undecodable: {}",
                        e
                    ))
                })?;
            info!("Codec fallback succeeded for {:?}", path);
            Ok(decoded)
        }
    }
}
