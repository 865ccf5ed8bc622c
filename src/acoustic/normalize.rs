//! Baseline normalization of raw features.
//!
//! Raw acoustic measurements are mapped onto [0, 1] against a reference
//! population baseline supplied by configuration, either min-max or a
//! logistic-squashed z-score. The baselines are calibration data, not
//! code.

use crate::config::{Baseline, NormMethod};

/// Normalize a raw feature value against its population baseline.
pub fn normalize(value: f32, baseline: &Baseline) -> f32 {
    match baseline.method {
        NormMethod::MinMax => {
            if baseline.scale.abs() < 1e-9 {
                return 0.5;
            }
            ((value - baseline.center) / baseline.scale).clamp(0.0, 1.0)
        }
        NormMethod::ZScore => {
            if baseline.scale.abs() < 1e-9 {
                return 0.5;
            }
            let z = (value - baseline.center) / baseline.scale;
            // Logistic squash keeps extreme outliers inside (0, 1)
            1.0 / (1.0 + (-z).exp())
        }
    }
}
