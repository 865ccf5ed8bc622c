//! Acoustic/prosodic feature extraction.
//!
//! Pure function of (segment, config): conditions the audio, computes
//! frame-level pitch/spectral/timing statistics, aggregates them to
//! utterance-level scalars, and normalizes against the configured
//! population baselines into per-indicator proxies.

pub mod highpass;
pub mod normalize;
pub mod pitch;
pub mod spectral;
pub mod timing;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::session::SpeakerSegment;
use normalize::normalize;

/// Errors from acoustic feature extraction. All of them exclude the
/// acoustic modality from fusion; none abort the session.
#[derive(Debug, Error)]
pub enum AcousticError {
    #[error("Segment too short for acoustic analysis: {got_ms} ms (min {min_ms} ms)")]
    InsufficientAudio { got_ms: u64, min_ms: u64 },

    #[error("No voiced audio found in segment")]
    NoVoicedAudio,

    #[error("Conditioning failed: {0}")]
    Conditioning(String),
}

/// Raw utterance-level features before normalization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFeatures {
    pub pitch_mean_hz: f32,
    pub pitch_std_hz: f32,
    pub voiced_ratio: f32,
    pub pause_ratio: f32,
    /// Speech-onset transitions per second
    pub speech_rate: f32,
    pub energy_db: f32,
    pub peak_db: f32,
    pub clipping_ratio: f32,
    /// Cepstral peak prominence in dB; absent for irregular voicing
    pub cpp_db: Option<f32>,
    pub spectral_centroid_hz: f32,
    pub spectral_rolloff_hz: f32,
    /// Relative energy in the formant-region bands
    pub band_energy: [f32; 3],
}

/// Normalized per-indicator sub-scores from the acoustic modality.
///
/// Oriented the same way as the indicators themselves: risk indices grow
/// with risk, function indices grow with function.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IndicatorProxies {
    pub depression: f32,
    pub fatigue: f32,
    pub cognitive: f32,
    pub emotional_stability: f32,
    pub vitality: f32,
}

/// Immutable output of the acoustic extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcousticFeatures {
    pub raw: RawFeatures,
    pub proxies: IndicatorProxies,
    /// Extraction confidence from voicing coverage and signal quality
    pub confidence: f32,
}

/// Extract utterance-level acoustic features from a diarized segment.
pub fn extract(segment: &SpeakerSegment, config: &Config) -> Result<AcousticFeatures, AcousticError> {
    let min_ms = config.thresholds.min_segment_ms;
    let got_ms = (segment.samples.len() as u64 * 1000) / crate::session::SAMPLE_RATE as u64;
    if got_ms < min_ms {
        return Err(AcousticError::InsufficientAudio { got_ms, min_ms });
    }

    let sample_rate = crate::session::SAMPLE_RATE as usize;
    let conditioned = highpass::condition(&segment.samples, sample_rate as u32)
        .map_err(|e| AcousticError::Conditioning(e.to_string()))?;

    let timing = timing::compute_timing_stats(&conditioned, sample_rate).ok_or(
        AcousticError::InsufficientAudio {
            got_ms,
            min_ms,
        },
    )?;

    let pitch = pitch::compute_pitch_stats(&conditioned, sample_rate)
        .ok_or(AcousticError::NoVoicedAudio)?;

    let spectral = spectral::compute_spectral_stats(&conditioned, sample_rate)
        .ok_or(AcousticError::NoVoicedAudio)?;

    let cpp_db = spectral::compute_cpp(&conditioned, sample_rate);

    let raw = RawFeatures {
        pitch_mean_hz: pitch.f0_mean,
        pitch_std_hz: pitch.f0_std,
        voiced_ratio: pitch.voiced_ratio,
        pause_ratio: timing.pause_ratio,
        speech_rate: timing.onset_rate,
        energy_db: timing.energy_db,
        peak_db: timing.peak_db,
        clipping_ratio: timing.clipping_ratio,
        cpp_db,
        spectral_centroid_hz: spectral.centroid_hz,
        spectral_rolloff_hz: spectral.rolloff_hz,
        band_energy: spectral.band_energy,
    };

    let proxies = compute_proxies(&raw, config);
    let confidence = compute_confidence(&raw, got_ms);

    debug!(
        "Acoustic features: f0={:.0}±{:.0}Hz, pause={:.2}, rate={:.1}/s, energy={:.1}dB, cpp={:?}, conf={:.2}",
        raw.pitch_mean_hz, raw.pitch_std_hz, raw.pause_ratio, raw.speech_rate, raw.energy_db, raw.cpp_db, confidence
    );

    Ok(AcousticFeatures {
        raw,
        proxies,
        confidence,
    })
}

/// Map normalized features onto the five indicator proxies.
///
/// Orientation notes: flat pitch, long pauses and a slow rate push the
/// depression proxy up; low energy and low CPP push the fatigue proxy
/// up; moderate pitch variability reads as emotionally stable, both
/// extremes (flat and agitated) as unstable.
fn compute_proxies(raw: &RawFeatures, config: &Config) -> IndicatorProxies {
    let b = &config.baselines;

    let n_pitch_std = normalize(raw.pitch_std_hz, &b.pitch_std);
    let n_energy = normalize(raw.energy_db, &b.energy_db);
    let n_pause = normalize(raw.pause_ratio, &b.pause_ratio);
    let n_rate = normalize(raw.speech_rate, &b.speech_rate);
    let n_cpp = raw.cpp_db.map(|c| normalize(c, &b.cpp)).unwrap_or(0.5);

    let depression = ((1.0 - n_pitch_std) + n_pause + (1.0 - n_rate)) / 3.0;
    let fatigue = ((1.0 - n_energy) + (1.0 - n_cpp) + n_pause) / 3.0;
    let cognitive = (n_rate + (1.0 - n_pause)) / 2.0;
    let emotional_stability = (n_cpp + (1.0 - (n_pitch_std - 0.5).abs() * 2.0)) / 2.0;
    let vitality = (n_energy + n_pitch_std + n_rate) / 3.0;

    IndicatorProxies {
        depression: depression.clamp(0.0, 1.0),
        fatigue: fatigue.clamp(0.0, 1.0),
        cognitive: cognitive.clamp(0.0, 1.0),
        emotional_stability: emotional_stability.clamp(0.0, 1.0),
        vitality: vitality.clamp(0.0, 1.0),
    }
}

/// Extraction confidence: voicing coverage scaled by duration and signal
/// quality. Clipping eats into confidence quickly since it corrupts both
/// pitch and level statistics.
fn compute_confidence(raw: &RawFeatures, duration_ms: u64) -> f32 {
    let duration_factor = (duration_ms as f32 / 20_000.0).min(1.0);
    let voicing_factor = 0.6 + 0.4 * raw.voiced_ratio.clamp(0.0, 1.0);
    let quality_factor = (1.0 - raw.clipping_ratio * 10.0).clamp(0.0, 1.0);
    (duration_factor * voicing_factor * quality_factor).clamp(0.0, 1.0)
}
