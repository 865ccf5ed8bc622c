//! Segment conditioning before feature extraction.
//!
//! Phone-call recordings carry DC bias and low-frequency hum that skew
//! energy and pitch statistics. The chain is DC removal followed by an
//! 80Hz Butterworth high-pass; level normalization is deliberately left
//! to the baseline normalization stage.

use anyhow::Result;
use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type, Q_BUTTERWORTH_F32};

/// Default high-pass cutoff frequency in Hz
pub const DEFAULT_HIGHPASS_HZ: u32 = 80;

/// Simple DC blocking filter using single-pole IIR.
///
/// Implements: y[n] = x[n] - x[n-1] + alpha * y[n-1]
struct DcBlocker {
    alpha: f32,
    x_prev: f32,
    y_prev: f32,
}

impl DcBlocker {
    fn new(sample_rate: u32, cutoff_hz: f32) -> Self {
        // alpha ≈ 1 - (2 * pi * fc / fs)
        let alpha = 1.0 - (2.0 * std::f32::consts::PI * cutoff_hz / sample_rate as f32);
        let alpha = alpha.clamp(0.9, 0.9999);

        Self {
            alpha,
            x_prev: 0.0,
            y_prev: 0.0,
        }
    }

    #[inline]
    fn process_sample(&mut self, x: f32) -> f32 {
        let y = x - self.x_prev + self.alpha * self.y_prev;
        self.x_prev = x;
        self.y_prev = y;
        y
    }
}

/// One-shot segment conditioner: DC removal + high-pass.
pub struct SegmentConditioner {
    dc_blocker: DcBlocker,
    highpass: DirectForm2Transposed<f32>,
}

impl SegmentConditioner {
    pub fn new(sample_rate: u32, highpass_cutoff_hz: u32) -> Result<Self> {
        let dc_blocker = DcBlocker::new(sample_rate, 10.0);

        let highpass_coeffs = Coefficients::<f32>::from_params(
            Type::HighPass,
            sample_rate.hz(),
            highpass_cutoff_hz.hz(),
            Q_BUTTERWORTH_F32,
        )
        .map_err(|e| anyhow::anyhow!("Failed to create high-pass filter coefficients: {:?}", e))?;

        let highpass = DirectForm2Transposed::<f32>::new(highpass_coeffs);

        Ok(Self {
            dc_blocker,
            highpass,
        })
    }

    /// Condition a copy of the segment samples.
    pub fn process(mut self, samples: &[f32]) -> Vec<f32> {
        samples
            .iter()
            .map(|&s| self.highpass.run(self.dc_blocker.process_sample(s)))
            .collect()
    }
}

/// Convenience wrapper with the default cutoff.
pub fn condition(samples: &[f32], sample_rate: u32) -> Result<Vec<f32>> {
    Ok(SegmentConditioner::new(sample_rate, DEFAULT_HIGHPASS_HZ)?.process(samples))
}
