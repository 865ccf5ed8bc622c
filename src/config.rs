//! Typed pipeline configuration.
//!
//! Every recognized option lives here: per-indicator fusion weights,
//! per-stage timeouts, stub toggles, confidence and degradation
//! thresholds, normalization baselines, and model cache locations.
//! Nothing downstream reads loose key/value maps.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::fusion::IndicatorKind;

/// Weight row for one indicator. Entries for modalities that do not
/// contribute to the indicator are zero and never renormalized in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightRow {
    pub acoustic: f32,
    pub text: f32,
    pub neural: f32,
}

impl WeightRow {
    pub fn sum(&self) -> f32 {
        self.acoustic + self.text + self.neural
    }
}

/// Per-indicator fusion weights.
///
/// The depression split (30/40/30) is the clinically calibrated default;
/// the remaining rows are starting points meant to be recalibrated from
/// validation runs, which is why all five are configuration rather than
/// constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub depression_risk: WeightRow,
    pub sleep_disorder: WeightRow,
    pub cognitive_function: WeightRow,
    pub emotional_stability: WeightRow,
    pub overall_vitality: WeightRow,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            depression_risk: WeightRow { acoustic: 0.3, text: 0.4, neural: 0.3 },
            sleep_disorder: WeightRow { acoustic: 0.3, text: 0.3, neural: 0.4 },
            cognitive_function: WeightRow { acoustic: 0.4, text: 0.6, neural: 0.0 },
            emotional_stability: WeightRow { acoustic: 0.4, text: 0.6, neural: 0.0 },
            overall_vitality: WeightRow { acoustic: 0.6, text: 0.4, neural: 0.0 },
        }
    }
}

impl FusionWeights {
    pub fn row(&self, kind: IndicatorKind) -> WeightRow {
        match kind {
            IndicatorKind::DepressionRisk => self.depression_risk,
            IndicatorKind::SleepDisorder => self.sleep_disorder,
            IndicatorKind::CognitiveFunction => self.cognitive_function,
            IndicatorKind::EmotionalStability => self.emotional_stability,
            IndicatorKind::OverallVitality => self.overall_vitality,
        }
    }
}

/// Per-stage timeouts in milliseconds. A stage that exceeds its
/// deadline resolves to its fallback value; it never blocks the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTimeouts {
    pub diarization_ms: u64,
    pub acoustic_ms: u64,
    pub classifier_ms: u64,
    pub transcription_ms: u64,
    pub text_scoring_ms: u64,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            diarization_ms: 30_000,
            acoustic_ms: 20_000,
            classifier_ms: 30_000,
            transcription_ms: 45_000,
            text_scoring_ms: 20_000,
        }
    }
}

impl StageTimeouts {
    pub fn diarization(&self) -> Duration {
        Duration::from_millis(self.diarization_ms)
    }
    pub fn acoustic(&self) -> Duration {
        Duration::from_millis(self.acoustic_ms)
    }
    pub fn classifier(&self) -> Duration {
        Duration::from_millis(self.classifier_ms)
    }
    pub fn transcription(&self) -> Duration {
        Duration::from_millis(self.transcription_ms)
    }
    pub fn text_scoring(&self) -> Duration {
        Duration::from_millis(self.text_scoring_ms)
    }
}

/// Forces an analyzer into its stub/fallback path regardless of
/// availability. Used in screening deployments without LLM access and in
/// deterministic replay runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubToggles {
    pub text_analyzer: bool,
    pub neural_classifier: bool,
}

/// Confidence/degradation thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Any indicator confidence below this requests expert review
    pub expert_review_confidence: f32,
    /// An indicator is marked degraded when at least this fraction of its
    /// modality weight was removed. 1.0 = only when everything is gone.
    pub degraded_weight_fraction: f32,
    /// Indicator status bucket boundaries
    pub status_low_below: f32,
    pub status_high_from: f32,
    /// Minimum senior-speaker segment duration for the audio analyzers
    pub min_segment_ms: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            expert_review_confidence: 0.5,
            degraded_weight_fraction: 1.0,
            status_low_below: 0.4,
            status_high_from: 0.7,
            min_segment_ms: 3_000,
        }
    }
}

/// How a raw acoustic feature is mapped onto [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormMethod {
    /// (x - center) / scale, squashed through a logistic curve
    ZScore,
    /// (x - min) / (max - min), clamped
    MinMax,
}

/// Reference-population baseline for one raw feature.
///
/// For `ZScore`, `center`/`scale` are the population mean and standard
/// deviation. For `MinMax`, they are the population min and range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub method: NormMethod,
    pub center: f32,
    pub scale: f32,
}

impl Baseline {
    pub const fn z(center: f32, scale: f32) -> Self {
        Self { method: NormMethod::ZScore, center, scale }
    }

    pub const fn minmax(min: f32, range: f32) -> Self {
        Self { method: NormMethod::MinMax, center: min, scale: range }
    }
}

/// Population baselines for the raw features the acoustic proxies are
/// built from. Defaults come from the elderly reference cohort used to
/// calibrate the screening service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationBaselines {
    /// F0 standard deviation in Hz
    pub pitch_std: Baseline,
    /// F0 mean in Hz
    pub pitch_mean: Baseline,
    /// RMS level in dBFS
    pub energy_db: Baseline,
    /// Fraction of frames gated as silence
    pub pause_ratio: Baseline,
    /// Voiced-frame transitions per second of speech
    pub speech_rate: Baseline,
    /// Cepstral peak prominence in dB
    pub cpp: Baseline,
    /// Spectral centroid in Hz
    pub spectral_centroid: Baseline,
}

impl Default for NormalizationBaselines {
    fn default() -> Self {
        Self {
            pitch_std: Baseline::z(28.0, 14.0),
            pitch_mean: Baseline::z(165.0, 45.0),
            energy_db: Baseline::minmax(-45.0, 30.0),
            pause_ratio: Baseline::minmax(0.0, 0.8),
            speech_rate: Baseline::z(3.8, 1.4),
            cpp: Baseline::minmax(0.0, 18.0),
            spectral_centroid: Baseline::z(1600.0, 600.0),
        }
    }
}

/// Where classifier weights are cached and fetched from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSource {
    /// Local cache directory; defaults to `<config dir>/models`
    pub cache_dir: Option<PathBuf>,
    /// Remote base URL for weight fetch when the local cache misses
    pub remote_base_url: Option<String>,
}

/// External language-model scoring endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub max_retries: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            max_retries: 3,
        }
    }
}

/// Internal configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub schema_version: u32,
    pub weights: FusionWeights,
    pub timeouts: StageTimeouts,
    pub stubs: StubToggles,
    pub thresholds: Thresholds,
    pub baselines: NormalizationBaselines,
    pub models: ModelSource,
    pub llm: LlmSettings,
    /// Diarization label to treat as the senior speaker. When unset, the
    /// speaker with the largest summed talk time is selected.
    pub target_speaker: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: 1,
            weights: FusionWeights::default(),
            timeouts: StageTimeouts::default(),
            stubs: StubToggles::default(),
            thresholds: Thresholds::default(),
            baselines: NormalizationBaselines::default(),
            models: ModelSource::default(),
            llm: LlmSettings::default(),
            target_speaker: None,
        }
    }
}

impl Config {
    /// Get the default config directory
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".wellvoice"))
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Resolved model cache directory
    pub fn models_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.models.cache_dir {
            Ok(dir.clone())
        } else {
            Ok(Self::config_dir()?.join("models"))
        }
    }

    /// Load config from file or return default
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                debug!("Failed to load config, using default: {}", e);
                Self::default()
            }
        }
    }

    /// Load config from file
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        // Ensure directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }
}
