//! Spectral descriptors and the cepstral stability proxy.
//!
//! Frame-averaged magnitude spectrum (Hann window, realfft) feeding
//! spectral centroid, rolloff and formant-region band energies, plus
//! CPP (Cepstral Peak Prominence) as the voice-regularity proxy. CPP is
//! used instead of jitter/shimmer because it stays usable in the ambient
//! noise of phone recordings.

use realfft::RealFftPlanner;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::f32::consts::PI;

/// Analysis frame size (~64ms at 16kHz)
const FRAME_SIZE: usize = 1024;

/// Hop size between frames (50% overlap)
const HOP_SIZE: usize = 512;

/// Minimum quefrency in ms (corresponds to 500Hz max pitch)
const QUEFRENCY_MIN_MS: f32 = 2.0;

/// Maximum quefrency in ms (corresponds to 50Hz min pitch)
const QUEFRENCY_MAX_MS: f32 = 20.0;

/// Minimum samples required for CPP calculation
const MIN_CPP_SAMPLES: usize = 512;

/// Rolloff energy fraction
const ROLLOFF_FRACTION: f32 = 0.85;

/// Formant-region band boundaries in Hz (F1 / F2 / F3 neighborhoods)
const BAND_EDGES_HZ: [(f32, f32); 3] = [(200.0, 900.0), (900.0, 2500.0), (2500.0, 4000.0)];

/// Frame-averaged spectral descriptors
#[derive(Debug, Clone, Copy)]
pub struct SpectralStats {
    /// Magnitude-weighted mean frequency in Hz
    pub centroid_hz: f32,
    /// Frequency below which 85% of spectral energy lies, in Hz
    pub rolloff_hz: f32,
    /// Relative energy per formant-region band, sums to 1
    pub band_energy: [f32; 3],
}

/// Compute frame-averaged spectral descriptors.
///
/// Returns `None` for segments shorter than one frame or with no
/// measurable energy.
pub fn compute_spectral_stats(samples: &[f32], sample_rate: usize) -> Option<SpectralStats> {
    if samples.len() < FRAME_SIZE {
        return None;
    }

    let mut planner = RealFftPlanner::<f32>::new();
    let r2c = planner.plan_fft_forward(FRAME_SIZE);

    let n_bins = FRAME_SIZE / 2 + 1;
    let mut avg_mag = vec![0.0f32; n_bins];
    let mut frames = 0usize;

    let hann: Vec<f32> = (0..FRAME_SIZE)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / FRAME_SIZE as f32).cos())
        .collect();

    let mut input = r2c.make_input_vec();
    let mut spectrum = r2c.make_output_vec();

    let mut start = 0;
    while start + FRAME_SIZE <= samples.len() {
        for (i, slot) in input.iter_mut().enumerate() {
            *slot = samples[start + i] * hann[i];
        }
        if r2c.process(&mut input, &mut spectrum).is_err() {
            return None;
        }
        for (bin, c) in spectrum.iter().enumerate() {
            avg_mag[bin] += c.norm();
        }
        frames += 1;
        start += HOP_SIZE;
    }

    if frames == 0 {
        return None;
    }
    for m in &mut avg_mag {
        *m /= frames as f32;
    }

    let bin_hz = sample_rate as f32 / FRAME_SIZE as f32;
    let total: f32 = avg_mag.iter().sum();
    if total < 1e-9 {
        return None;
    }

    let centroid_hz = avg_mag
        .iter()
        .enumerate()
        .map(|(bin, &m)| bin as f32 * bin_hz * m)
        .sum::<f32>()
        / total;

    let mut cumulative = 0.0;
    let mut rolloff_hz = (n_bins - 1) as f32 * bin_hz;
    for (bin, &m) in avg_mag.iter().enumerate() {
        cumulative += m;
        if cumulative >= ROLLOFF_FRACTION * total {
            rolloff_hz = bin as f32 * bin_hz;
            break;
        }
    }

    let mut band_energy = [0.0f32; 3];
    for (bin, &m) in avg_mag.iter().enumerate() {
        let hz = bin as f32 * bin_hz;
        for (b, &(lo, hi)) in BAND_EDGES_HZ.iter().enumerate() {
            if hz >= lo && hz < hi {
                band_energy[b] += m * m;
            }
        }
    }
    let band_total: f32 = band_energy.iter().sum();
    if band_total > 1e-9 {
        for e in &mut band_energy {
            *e /= band_total;
        }
    }

    Some(SpectralStats {
        centroid_hz,
        rolloff_hz,
        band_energy,
    })
}

/// Calculate CPP (Cepstral Peak Prominence) from audio samples.
///
/// Returns CPP in dB; higher values indicate a more stable, regular
/// voice. Typical values for healthy voices are 3-10 dB. Returns `None`
/// if the audio is too short or no clear pitch peak exists.
pub fn compute_cpp(samples: &[f32], sample_rate: usize) -> Option<f32> {
    if samples.len() < MIN_CPP_SAMPLES {
        return None;
    }

    // Pad to next power of 2 for efficient FFT
    let n = samples.len().next_power_of_two();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    let ifft = planner.plan_fft_inverse(n);

    // Hann window to reduce spectral leakage
    let windowed: Vec<f32> = samples
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let window = 0.5 - 0.5 * (2.0 * PI * i as f32 / samples.len() as f32).cos();
            s * window
        })
        .collect();

    let mut spectrum: Vec<Complex<f32>> = windowed
        .iter()
        .map(|&s| Complex::new(s, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)).take(n - samples.len()))
        .collect();

    fft.process(&mut spectrum);

    // Log magnitude spectrum, then IFFT back to the real cepstrum
    let mut cepstrum: Vec<Complex<f32>> = spectrum
        .iter()
        .map(|c| Complex::new((c.norm() + 1e-10).ln(), 0.0))
        .collect();
    ifft.process(&mut cepstrum);

    let scale = 1.0 / n as f32;
    for c in &mut cepstrum {
        c.re *= scale;
        c.im *= scale;
    }

    // Peak in the quefrency range covering human pitch
    let min_idx = (QUEFRENCY_MIN_MS * sample_rate as f32 / 1000.0) as usize;
    let max_idx = ((QUEFRENCY_MAX_MS * sample_rate as f32 / 1000.0) as usize).min(n / 2);

    if min_idx >= max_idx || max_idx >= cepstrum.len() {
        return None;
    }

    let mut peak_value = 0.0f32;
    let mut sum = 0.0f32;
    for c in &cepstrum[min_idx..max_idx] {
        let value = c.re.abs();
        if value > peak_value {
            peak_value = value;
        }
        sum += value;
    }

    let avg_energy = sum / (max_idx - min_idx) as f32;
    if avg_energy < 1e-10 {
        return None;
    }

    let cpp = 20.0 * (peak_value / avg_energy).log10();

    if cpp.is_nan() || cpp < 0.0 || cpp > 50.0 {
        return None;
    }

    Some(cpp)
}
