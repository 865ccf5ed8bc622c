//! Energy-gated activity mask and timing statistics.
//!
//! Frame-level RMS gating splits the segment into speech and pause
//! frames. Pause ratio and the speech-onset rate are the timing proxies;
//! level and clipping stats feed extraction confidence.

/// Frame size for the activity mask (32ms at 16kHz)
const FRAME_SIZE: usize = 512;

/// RMS floor below which a frame counts as a pause, in dBFS
const SILENCE_FLOOR_DB: f32 = -45.0;

/// Sample magnitude treated as clipped
const CLIP_THRESHOLD: f32 = 0.999;

/// Timing and level statistics for one segment
#[derive(Debug, Clone, Copy)]
pub struct TimingStats {
    /// Fraction of frames gated as pause (0.0-1.0)
    pub pause_ratio: f32,
    /// Speech-onset transitions per second, a speech-rate proxy
    pub onset_rate: f32,
    /// RMS level over speech frames in dBFS
    pub energy_db: f32,
    /// Peak level in dBFS
    pub peak_db: f32,
    /// Fraction of clipped samples (0.0-1.0)
    pub clipping_ratio: f32,
    /// Number of analysis frames behind these statistics
    pub frame_count: usize,
}

fn frame_rms_db(frame: &[f32]) -> f32 {
    let rms = (frame.iter().map(|x| x * x).sum::<f32>() / frame.len() as f32).sqrt();
    20.0 * (rms + 1e-10).log10()
}

/// Compute the activity mask and timing statistics.
///
/// Returns `None` for segments shorter than one frame.
pub fn compute_timing_stats(samples: &[f32], sample_rate: usize) -> Option<TimingStats> {
    if samples.len() < FRAME_SIZE {
        return None;
    }

    let mut speech_frames = 0usize;
    let mut pause_frames = 0usize;
    let mut onsets = 0usize;
    let mut prev_speech = false;
    let mut speech_energy_sum = 0.0f64;

    for frame in samples.chunks_exact(FRAME_SIZE) {
        let db = frame_rms_db(frame);
        let is_speech = db > SILENCE_FLOOR_DB;
        if is_speech {
            speech_frames += 1;
            speech_energy_sum += db as f64;
            if !prev_speech {
                onsets += 1;
            }
        } else {
            pause_frames += 1;
        }
        prev_speech = is_speech;
    }

    let frame_count = speech_frames + pause_frames;
    if frame_count == 0 {
        return None;
    }

    let duration_s = (frame_count * FRAME_SIZE) as f32 / sample_rate as f32;
    let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    let clipped = samples.iter().filter(|s| s.abs() >= CLIP_THRESHOLD).count();

    let energy_db = if speech_frames > 0 {
        (speech_energy_sum / speech_frames as f64) as f32
    } else {
        SILENCE_FLOOR_DB
    };

    Some(TimingStats {
        pause_ratio: pause_frames as f32 / frame_count as f32,
        onset_rate: onsets as f32 / duration_s,
        energy_db,
        peak_db: 20.0 * (peak + 1e-10).log10(),
        clipping_ratio: clipped as f32 / samples.len() as f32,
        frame_count,
    })
}
