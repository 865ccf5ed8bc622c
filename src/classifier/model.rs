//! ONNX-backed sinc-filter voice model.
//!
//! The architecture is fixed at export time: a bank of learned band-pass
//! sinc filters over raw waveform, convolutional layers, then
//! fully-connected layers emitting one risk probability per 200ms
//! window. This module only loads and runs the exported graph; longer
//! segments are split into overlapping windows and pooled by the caller
//! through [`classify`].

use std::path::Path;
use std::sync::Mutex;

use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Value,
};
use tracing::debug;

use super::{
    pool_scores, window_confidence, Aggregation, ClassifierError, ClassifierScore, ClassifierTask,
};

/// Fixed inference window: 200ms at 16kHz
pub const WINDOW_SAMPLES: usize = 3200;

/// Hop between windows (50% overlap)
pub const WINDOW_HOP: usize = 1600;

/// ONNX session wrapper for one trained task model.
///
/// The session is guarded by a mutex because ONNX Runtime inference
/// takes `&mut`; the loaded weights themselves are immutable and shared
/// across sessions via `Arc<SincVoiceModel>`.
pub struct SincVoiceModel {
    session: Mutex<Session>,
}

impl SincVoiceModel {
    /// Load a trained model from an ONNX file.
    pub fn load(model_path: &Path, n_threads: usize) -> Result<Self, ClassifierError> {
        if !model_path.exists() {
            return Err(ClassifierError::ModelNotFound(model_path.to_path_buf()));
        }

        let session = Session::builder()
            .map_err(|e| ClassifierError::ModelLoad(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ClassifierError::ModelLoad(e.to_string()))?
            .with_intra_threads(n_threads)
            .map_err(|e| ClassifierError::ModelLoad(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| ClassifierError::ModelLoad(e.to_string()))?;

        tracing::info!("Loaded voice classifier model from {:?}", model_path);

        Ok(Self {
            session: Mutex::new(session),
        })
    }

    /// Run one window through the model, returning its risk probability.
    fn score_window(&self, window: &[f32]) -> Result<f32, ClassifierError> {
        let input_shape = [1_usize, WINDOW_SAMPLES];
        let input_tensor = Value::from_array((input_shape, window.to_vec()))
            .map_err(|e: ort::Error| ClassifierError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ClassifierError::Inference("session mutex poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        let output = outputs
            .iter()
            .next()
            .ok_or_else(|| ClassifierError::Inference("No output from model".to_string()))?;

        let tensor = output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        let value = tensor
            .1
            .iter()
            .next()
            .copied()
            .ok_or_else(|| ClassifierError::Inference("Empty output tensor".to_string()))?;

        Ok(value.clamp(0.0, 1.0))
    }

    /// Classify a segment: split into overlapping windows, score each,
    /// pool into one task score.
    pub fn classify(
        &self,
        samples: &[f32],
        task: ClassifierTask,
        aggregation: Aggregation,
    ) -> Result<ClassifierScore, ClassifierError> {
        let windows = split_windows(samples)?;

        let mut scores = Vec::with_capacity(windows.len());
        for window in &windows {
            scores.push(self.score_window(window)?);
        }

        let raw_score = pool_scores(&scores, aggregation);
        let confidence = window_confidence(&scores);

        debug!(
            "Classifier {}: {} windows, pooled={:.3}, conf={:.2}",
            task.name(),
            scores.len(),
            raw_score,
            confidence
        );

        Ok(ClassifierScore {
            task,
            raw_score,
            window_count: scores.len(),
            aggregation,
            confidence,
        })
    }
}

/// Split a segment into fixed-length overlapping windows.
pub fn split_windows(samples: &[f32]) -> Result<Vec<&[f32]>, ClassifierError> {
    if samples.len() < WINDOW_SAMPLES {
        return Err(ClassifierError::InsufficientAudio {
            got: samples.len(),
            min: WINDOW_SAMPLES,
        });
    }

    let mut windows = Vec::new();
    let mut start = 0;
    while start + WINDOW_SAMPLES <= samples.len() {
        windows.push(&samples[start..start + WINDOW_SAMPLES]);
        start += WINDOW_HOP;
    }
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_windows_exact() {
        let samples = vec![0.0f32; WINDOW_SAMPLES];
        let windows = split_windows(&samples).unwrap();
        assert_eq!(windows.len(), 1);
    }

    #[test]
    fn test_split_windows_overlap() {
        // Two hops past the first window
        let samples = vec![0.0f32; WINDOW_SAMPLES + 2 * WINDOW_HOP];
        let windows = split_windows(&samples).unwrap();
        assert_eq!(windows.len(), 3);
        for w in windows {
            assert_eq!(w.len(), WINDOW_SAMPLES);
        }
    }

    #[test]
    fn test_split_windows_too_short() {
        let samples = vec![0.0f32; WINDOW_SAMPLES - 1];
        let result = split_windows(&samples);
        assert!(matches!(result, Err(ClassifierError::InsufficientAudio { .. })));
    }

    #[test]
    fn test_load_missing_model() {
        let result = SincVoiceModel::load(Path::new("/nonexistent/model.onnx"), 1);
        assert!(matches!(result, Err(ClassifierError::ModelNotFound(_))));
    }
}
