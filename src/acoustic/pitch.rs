//! Pitch statistics via McLeod pitch detection.
//!
//! F0 mean and standard deviation over voiced frames. Reduced pitch
//! variability ("flat affect") is the primary acoustic depression proxy;
//! the voiced-frame ratio feeds extraction confidence.

use pitch_detection::detector::mcleod::McLeodDetector;
use pitch_detection::detector::PitchDetector;

/// Frame size for pitch detection (~64ms at 16kHz)
const FRAME_SIZE: usize = 1024;

/// Hop size between frames (50% overlap)
const HOP_SIZE: usize = 512;

/// Minimum pitch in Hz (human vocal range)
const MIN_PITCH: f32 = 50.0;

/// Maximum pitch in Hz (human vocal range)
const MAX_PITCH: f32 = 500.0;

/// Power threshold for pitch detection
const POWER_THRESHOLD: f32 = 0.8;

/// Clarity threshold for pitch detection
const CLARITY_THRESHOLD: f32 = 0.5;

/// Minimum number of voiced frames required for valid statistics
const MIN_VOICED_FRAMES: usize = 5;

/// Per-segment pitch statistics
#[derive(Debug, Clone, Copy)]
pub struct PitchStats {
    /// Mean F0 in Hz over voiced frames
    pub f0_mean: f32,
    /// F0 standard deviation in Hz
    pub f0_std: f32,
    /// Fraction of frames with valid pitch (0.0-1.0)
    pub voiced_ratio: f32,
}

/// Compute pitch statistics from audio samples.
///
/// Returns `None` if fewer than [`MIN_VOICED_FRAMES`] voiced frames are
/// detected (silence, noise-only, or too-short input).
pub fn compute_pitch_stats(samples: &[f32], sample_rate: usize) -> Option<PitchStats> {
    if samples.len() < FRAME_SIZE {
        return None;
    }

    let mut detector = McLeodDetector::new(FRAME_SIZE, FRAME_SIZE / 2);
    let mut pitches = Vec::new();
    let mut total_frames = 0;

    let mut start = 0;
    while start + FRAME_SIZE <= samples.len() {
        let frame = &samples[start..start + FRAME_SIZE];
        total_frames += 1;

        if let Some(pitch) =
            detector.get_pitch(frame, sample_rate, POWER_THRESHOLD, CLARITY_THRESHOLD)
        {
            // Filter to human vocal range
            if pitch.frequency >= MIN_PITCH && pitch.frequency <= MAX_PITCH {
                pitches.push(pitch.frequency);
            }
        }

        start += HOP_SIZE;
    }

    if pitches.len() < MIN_VOICED_FRAMES {
        return None;
    }

    let mean = pitches.iter().sum::<f32>() / pitches.len() as f32;
    let variance = pitches.iter().map(|p| (p - mean).powi(2)).sum::<f32>() / pitches.len() as f32;

    Some(PitchStats {
        f0_mean: mean,
        f0_std: variance.sqrt(),
        voiced_ratio: pitches.len() as f32 / total_frames as f32,
    })
}
