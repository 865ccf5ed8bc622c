//! Weighted indicator fusion with renormalization and confidence
//! propagation.
//!
//! For each indicator: gather the sub-scores of its contributing
//! modalities, drop the unavailable ones, renormalize the remaining
//! weights to sum to 1, and penalize confidence by the fraction of
//! weight removed. The penalty exactly cancels the renormalization on
//! the confidence side, so dropping a modality can never raise
//! confidence.

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::acoustic::AcousticFeatures;
use crate::classifier::ClassifierScore;
use crate::config::Config;
use crate::session::{SessionState, StageStatuses};
use crate::text::TextAnalysisResult;

use super::{
    AnalysisReport, FusionError, Indicator, IndicatorKind, IndicatorStatus, Modality,
};

/// Neutral value reported when every modality of an indicator is gone
const NEUTRAL_VALUE: f32 = 0.5;

/// Resolved analyzer outputs handed to fusion. `None` means the modality
/// is unavailable for this session (failed, timed out, or NotReady); a
/// stub text result is treated as unavailable for scoring purposes.
#[derive(Debug, Clone, Default)]
pub struct FusionInputs {
    pub acoustic: Option<AcousticFeatures>,
    pub depression: Option<ClassifierScore>,
    pub insomnia: Option<ClassifierScore>,
    pub text: Option<TextAnalysisResult>,
}

impl FusionInputs {
    fn scored_text(&self) -> Option<&TextAnalysisResult> {
        self.text.as_ref().filter(|t| !t.is_stub)
    }
}

/// One modality's contribution to one indicator
struct Contribution {
    modality: Modality,
    weight: f32,
    score: f32,
    confidence: f32,
}

/// Fuse analyzer outputs into the final report.
///
/// Fails only when every modality of every indicator is unavailable
/// simultaneously; any partial availability produces a whole report.
pub fn fuse(
    session_id: Uuid,
    inputs: &FusionInputs,
    stages: StageStatuses,
    config: &Config,
) -> Result<AnalysisReport, FusionError> {
    let depression_risk = fuse_indicator(IndicatorKind::DepressionRisk, inputs, config);
    let sleep_disorder = fuse_indicator(IndicatorKind::SleepDisorder, inputs, config);
    let cognitive_function = fuse_indicator(IndicatorKind::CognitiveFunction, inputs, config);
    let emotional_stability = fuse_indicator(IndicatorKind::EmotionalStability, inputs, config);
    let overall_vitality = fuse_indicator(IndicatorKind::OverallVitality, inputs, config);

    let indicators = [
        &depression_risk,
        &sleep_disorder,
        &cognitive_function,
        &emotional_stability,
        &overall_vitality,
    ];

    if indicators.iter().all(|i| i.contributing_modalities.is_empty()) {
        return Err(FusionError::InputMissing);
    }

    let degraded_count = indicators.iter().filter(|i| i.degraded).count();
    let low_confidence = indicators
        .iter()
        .any(|i| i.confidence < config.thresholds.expert_review_confidence);
    let requires_expert_review = low_confidence || degraded_count > 1;

    let state = if degraded_count > 0 || stages.any_fallback() {
        SessionState::CompleteDegraded
    } else {
        SessionState::Complete
    };

    info!(
        "Fused report for session {}: state={:?}, degraded={}, expert_review={}",
        session_id, state, degraded_count, requires_expert_review
    );

    Ok(AnalysisReport {
        session_id,
        generated_at: Utc::now(),
        depression_risk,
        sleep_disorder,
        cognitive_function,
        emotional_stability,
        overall_vitality,
        stages,
        state,
        requires_expert_review,
    })
}

/// Collect the available contributions for one indicator.
fn contributions(kind: IndicatorKind, inputs: &FusionInputs, config: &Config) -> (Vec<Contribution>, f32) {
    let row = config.weights.row(kind);
    let mut available = Vec::new();
    let mut removed_weight = 0.0f32;

    if row.acoustic > 0.0 {
        match inputs.acoustic.as_ref() {
            Some(features) => available.push(Contribution {
                modality: Modality::Acoustic,
                weight: row.acoustic,
                score: acoustic_score(kind, features),
                confidence: features.confidence,
            }),
            None => removed_weight += row.acoustic,
        }
    }

    if row.text > 0.0 {
        match inputs.scored_text() {
            Some(text) => available.push(Contribution {
                modality: Modality::Text,
                weight: row.text,
                score: text_score(kind, text),
                confidence: text.confidence,
            }),
            None => removed_weight += row.text,
        }
    }

    if row.neural > 0.0 {
        match neural_score(kind, inputs) {
            Some(score) => available.push(Contribution {
                modality: Modality::Neural,
                weight: row.neural,
                score: score.raw_score,
                confidence: score.confidence,
            }),
            None => removed_weight += row.neural,
        }
    }

    let total = available.iter().map(|c| c.weight).sum::<f32>() + removed_weight;
    let removed_fraction = if total > 0.0 { removed_weight / total } else { 1.0 };
    (available, removed_fraction)
}

/// Fuse a single indicator from its available modalities.
fn fuse_indicator(kind: IndicatorKind, inputs: &FusionInputs, config: &Config) -> Indicator {
    let (available, removed_fraction) = contributions(kind, inputs, config);

    let degraded = removed_fraction + 1e-6 >= config.thresholds.degraded_weight_fraction;

    if available.is_empty() {
        debug!("{}: no modality available, reporting neutral", kind.abbreviation());
        return Indicator {
            kind,
            value: NEUTRAL_VALUE,
            confidence: 0.0,
            status: status_for(NEUTRAL_VALUE, config),
            contributing_modalities: Vec::new(),
            degraded: true,
        };
    }

    let available_weight: f32 = available.iter().map(|c| c.weight).sum();
    let penalty = 1.0 - removed_fraction;

    let mut value = 0.0f32;
    let mut confidence = 0.0f32;
    for c in &available {
        let renormalized = c.weight / available_weight;
        value += renormalized * c.score;
        confidence += renormalized * c.confidence;
    }
    confidence *= penalty;

    let value = value.clamp(0.0, 1.0);
    let confidence = confidence.clamp(0.0, 1.0);

    debug!(
        "{}: value={:.3}, confidence={:.3}, removed={:.2}, modalities={}",
        kind.abbreviation(),
        value,
        confidence,
        removed_fraction,
        available.len()
    );

    Indicator {
        kind,
        value,
        confidence,
        status: status_for(value, config),
        contributing_modalities: available.iter().map(|c| c.modality).collect(),
        degraded,
    }
}

fn status_for(value: f32, config: &Config) -> IndicatorStatus {
    if value < config.thresholds.status_low_below {
        IndicatorStatus::Low
    } else if value >= config.thresholds.status_high_from {
        IndicatorStatus::High
    } else {
        IndicatorStatus::Medium
    }
}

fn acoustic_score(kind: IndicatorKind, features: &AcousticFeatures) -> f32 {
    match kind {
        IndicatorKind::DepressionRisk => features.proxies.depression,
        IndicatorKind::SleepDisorder => features.proxies.fatigue,
        IndicatorKind::CognitiveFunction => features.proxies.cognitive,
        IndicatorKind::EmotionalStability => features.proxies.emotional_stability,
        IndicatorKind::OverallVitality => features.proxies.vitality,
    }
}

fn text_score(kind: IndicatorKind, text: &TextAnalysisResult) -> f32 {
    match kind {
        IndicatorKind::DepressionRisk => text.depression_signal,
        IndicatorKind::SleepDisorder => text.fatigue_signal,
        IndicatorKind::CognitiveFunction => text.cognitive_score,
        IndicatorKind::EmotionalStability => text.emotional_stability,
        IndicatorKind::OverallVitality => text.vitality,
    }
}

fn neural_score<'a>(kind: IndicatorKind, inputs: &'a FusionInputs) -> Option<&'a ClassifierScore> {
    match kind {
        IndicatorKind::DepressionRisk => inputs.depression.as_ref(),
        IndicatorKind::SleepDisorder => inputs.insomnia.as_ref(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acoustic::{IndicatorProxies, RawFeatures};
    use crate::classifier::{Aggregation, ClassifierTask};
    use crate::session::{StageStatus, StageStatuses};

    fn all_completed() -> StageStatuses {
        StageStatuses {
            diarization: StageStatus::Completed,
            acoustic: StageStatus::Completed,
            classifier_depression: StageStatus::Completed,
            classifier_insomnia: StageStatus::Completed,
            transcription: StageStatus::Completed,
            text_analysis: StageStatus::Completed,
        }
    }

    fn acoustic_fixture(score: f32, confidence: f32) -> AcousticFeatures {
        AcousticFeatures {
            raw: RawFeatures {
                pitch_mean_hz: 160.0,
                pitch_std_hz: 25.0,
                voiced_ratio: 0.8,
                pause_ratio: 0.2,
                speech_rate: 3.5,
                energy_db: -25.0,
                peak_db: -6.0,
                clipping_ratio: 0.0,
                cpp_db: Some(8.0),
                spectral_centroid_hz: 1500.0,
                spectral_rolloff_hz: 3200.0,
                band_energy: [0.5, 0.3, 0.2],
            },
            proxies: IndicatorProxies {
                depression: score,
                fatigue: score,
                cognitive: score,
                emotional_stability: score,
                vitality: score,
            },
            confidence,
        }
    }

    fn classifier_fixture(task: ClassifierTask, score: f32, confidence: f32) -> ClassifierScore {
        ClassifierScore {
            task,
            raw_score: score,
            window_count: 8,
            aggregation: Aggregation::MeanPool,
            confidence,
        }
    }

    fn text_fixture(score: f32, confidence: f32) -> TextAnalysisResult {
        TextAnalysisResult {
            transcript: "synthetic transcript".to_string(),
            sentiment: score,
            emotion_distribution: Default::default(),
            depression_signal: score,
            fatigue_signal: score,
            cognitive_markers: Vec::new(),
            cognitive_score: score,
            emotional_stability: score,
            vitality: score,
            confidence,
            is_stub: false,
        }
    }

    fn full_inputs(score: f32, confidence: f32) -> FusionInputs {
        FusionInputs {
            acoustic: Some(acoustic_fixture(score, confidence)),
            depression: Some(classifier_fixture(ClassifierTask::Depression, score, confidence)),
            insomnia: Some(classifier_fixture(ClassifierTask::Insomnia, score, confidence)),
            text: Some(text_fixture(score, confidence)),
        }
    }

    #[test]
    fn test_all_modalities_complete() {
        let config = Config::default();
        let report = fuse(Uuid::new_v4(), &full_inputs(0.6, 0.9), all_completed(), &config).unwrap();

        assert_eq!(report.state, SessionState::Complete);
        assert!(!report.requires_expert_review);
        for indicator in report.indicators() {
            assert!((indicator.value - 0.6).abs() < 1e-5);
            assert!((indicator.confidence - 0.9).abs() < 1e-5);
            assert!(!indicator.degraded);
        }
        assert_eq!(report.depression_risk.contributing_modalities.len(), 3);
        assert_eq!(report.cognitive_function.contributing_modalities.len(), 2);
    }

    #[test]
    fn test_stub_text_is_excluded_and_renormalized() {
        let config = Config::default();
        let mut inputs = full_inputs(0.6, 0.9);
        inputs.text = Some(TextAnalysisResult::stub("transcript"));

        let report = fuse(Uuid::new_v4(), &inputs, all_completed(), &config).unwrap();

        // Remaining modalities agree at 0.6, so the value is unchanged
        let dri = &report.depression_risk;
        assert!((dri.value - 0.6).abs() < 1e-5);
        // Confidence dropped by the removed text weight (0.4)
        assert!((dri.confidence - 0.9 * 0.6).abs() < 1e-5);
        assert!(!dri.contributing_modalities.contains(&crate::fusion::Modality::Text));
        assert!(!dri.degraded);
    }

    #[test]
    fn test_penalty_is_monotone() {
        let config = Config::default();
        let full = fuse(Uuid::new_v4(), &full_inputs(0.6, 0.9), all_completed(), &config).unwrap();

        let mut reduced_inputs = full_inputs(0.6, 0.9);
        reduced_inputs.depression = None;
        let reduced = fuse(Uuid::new_v4(), &reduced_inputs, all_completed(), &config).unwrap();

        for kind in IndicatorKind::ALL {
            assert!(
                reduced.indicator(kind).confidence <= full.indicator(kind).confidence + 1e-6,
                "removing a modality raised confidence for {:?}",
                kind
            );
        }
    }

    #[test]
    fn test_neural_missing_renormalizes_dri() {
        let config = Config::default();
        let mut inputs = full_inputs(0.0, 0.9);
        // Acoustic says 0.2, text says 0.8, neural missing
        inputs.acoustic = Some(acoustic_fixture(0.2, 0.9));
        inputs.text = Some(text_fixture(0.8, 0.9));
        inputs.depression = None;
        inputs.insomnia = None;

        let report = fuse(Uuid::new_v4(), &inputs, all_completed(), &config).unwrap();
        let dri = &report.depression_risk;

        // Weights renormalize 0.3/0.4 -> 3/7 and 4/7
        let expected = 0.2 * (3.0 / 7.0) + 0.8 * (4.0 / 7.0);
        assert!((dri.value - expected).abs() < 1e-5);
        // Confidence carries the 0.3 neural penalty
        assert!((dri.confidence - 0.9 * 0.7).abs() < 1e-5);
    }

    #[test]
    fn test_all_inputs_missing_is_fatal() {
        let config = Config::default();
        let inputs = FusionInputs::default();
        let result = fuse(Uuid::new_v4(), &inputs, all_completed(), &config);
        assert!(matches!(result, Err(FusionError::InputMissing)));
    }

    #[test]
    fn test_stub_only_text_is_fatal_too() {
        // A stub result carries no score, so text alone cannot feed fusion
        let config = Config::default();
        let inputs = FusionInputs {
            text: Some(TextAnalysisResult::stub("t")),
            ..Default::default()
        };
        let result = fuse(Uuid::new_v4(), &inputs, all_completed(), &config);
        assert!(matches!(result, Err(FusionError::InputMissing)));
    }

    #[test]
    fn test_acoustic_only_session_degrades_everything_else() {
        let mut config = Config::default();
        // Degrade an indicator once half its weight is gone
        config.thresholds.degraded_weight_fraction = 0.5;

        let inputs = FusionInputs {
            acoustic: Some(acoustic_fixture(0.5, 0.8)),
            ..Default::default()
        };

        let report = fuse(Uuid::new_v4(), &inputs, all_completed(), &config).unwrap();
        assert_eq!(report.state, SessionState::CompleteDegraded);
        // DRI lost text (0.4) + neural (0.3) = 0.7 of its weight
        assert!(report.depression_risk.degraded);
        assert!(report.requires_expert_review);
    }

    #[test]
    fn test_values_and_confidence_stay_in_unit_interval() {
        let config = Config::default();
        for score in [0.0f32, 0.25, 0.5, 0.75, 1.0] {
            for conf in [0.0f32, 0.5, 1.0] {
                let report =
                    fuse(Uuid::new_v4(), &full_inputs(score, conf), all_completed(), &config).unwrap();
                for indicator in report.indicators() {
                    assert!((0.0..=1.0).contains(&indicator.value));
                    assert!((0.0..=1.0).contains(&indicator.confidence));
                }
            }
        }
    }

    #[test]
    fn test_status_buckets() {
        let config = Config::default();
        let low = fuse(Uuid::new_v4(), &full_inputs(0.1, 0.9), all_completed(), &config).unwrap();
        assert_eq!(low.depression_risk.status, IndicatorStatus::Low);

        let medium = fuse(Uuid::new_v4(), &full_inputs(0.5, 0.9), all_completed(), &config).unwrap();
        assert_eq!(medium.depression_risk.status, IndicatorStatus::Medium);

        let high = fuse(Uuid::new_v4(), &full_inputs(0.9, 0.9), all_completed(), &config).unwrap();
        assert_eq!(high.depression_risk.status, IndicatorStatus::High);
    }

    #[test]
    fn test_low_confidence_requests_expert_review() {
        let config = Config::default();
        let report = fuse(Uuid::new_v4(), &full_inputs(0.6, 0.3), all_completed(), &config).unwrap();
        assert!(report.requires_expert_review);
    }

    #[test]
    fn test_fallback_stage_forces_degraded_state() {
        let config = Config::default();
        let mut stages = all_completed();
        stages.classifier_depression = StageStatus::Fallback("model not ready".into());

        let mut inputs = full_inputs(0.6, 0.9);
        inputs.depression = None;

        let report = fuse(Uuid::new_v4(), &inputs, stages, &config).unwrap();
        assert_eq!(report.state, SessionState::CompleteDegraded);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn subset_inputs(
            acoustic: Option<(f32, f32)>,
            text: Option<(f32, f32)>,
            neural: Option<(f32, f32)>,
        ) -> FusionInputs {
            FusionInputs {
                acoustic: acoustic.map(|(s, c)| acoustic_fixture(s, c)),
                text: text.map(|(s, c)| text_fixture(s, c)),
                depression: neural
                    .map(|(s, c)| classifier_fixture(ClassifierTask::Depression, s, c)),
                insomnia: neural.map(|(s, c)| classifier_fixture(ClassifierTask::Insomnia, s, c)),
            }
        }

        proptest! {
            /// Indicator values and confidences stay in [0, 1] for any
            /// availability subset and any sub-scores.
            #[test]
            fn prop_outputs_bounded(
                a in proptest::option::of((0.0f32..=1.0, 0.0f32..=1.0)),
                t in proptest::option::of((0.0f32..=1.0, 0.0f32..=1.0)),
                n in proptest::option::of((0.0f32..=1.0, 0.0f32..=1.0)),
            ) {
                let config = Config::default();
                let inputs = subset_inputs(a, t, n);
                match fuse(Uuid::new_v4(), &inputs, all_completed(), &config) {
                    Ok(report) => {
                        for indicator in report.indicators() {
                            prop_assert!((0.0..=1.0).contains(&indicator.value));
                            prop_assert!((0.0..=1.0).contains(&indicator.confidence));
                        }
                    }
                    Err(FusionError::InputMissing) => {
                        // Only legal when nothing at all was available
                        prop_assert!(a.is_none() && t.is_none() && n.is_none());
                    }
                }
            }

            /// With weights renormalized to sum 1, unanimous sub-scores
            /// pass through unchanged for any available subset.
            #[test]
            fn prop_unanimous_score_passes_through(
                score in 0.0f32..=1.0,
                conf in 0.0f32..=1.0,
                has_t in proptest::bool::ANY,
                has_n in proptest::bool::ANY,
            ) {
                let config = Config::default();
                let inputs = subset_inputs(
                    Some((score, conf)),
                    has_t.then_some((score, conf)),
                    has_n.then_some((score, conf)),
                );
                let report = fuse(Uuid::new_v4(), &inputs, all_completed(), &config).unwrap();
                for indicator in report.indicators() {
                    prop_assert!(
                        (indicator.value - score).abs() < 1e-4,
                        "{:?}: {} vs {}", indicator.kind, indicator.value, score
                    );
                }
            }

            /// Dropping the text modality never raises any indicator's
            /// confidence.
            #[test]
            fn prop_exclusion_penalty_is_monotone(
                score in 0.0f32..=1.0,
                conf in 0.0f32..=1.0,
                n_conf in 0.0f32..=1.0,
            ) {
                let config = Config::default();
                let with_text = subset_inputs(Some((score, conf)), Some((score, conf)), Some((score, n_conf)));
                let without_text = subset_inputs(Some((score, conf)), None, Some((score, n_conf)));

                let full = fuse(Uuid::new_v4(), &with_text, all_completed(), &config).unwrap();
                let reduced = fuse(Uuid::new_v4(), &without_text, all_completed(), &config).unwrap();

                for kind in IndicatorKind::ALL {
                    prop_assert!(
                        reduced.indicator(kind).confidence
                            <= full.indicator(kind).confidence + 1e-5
                    );
                }
            }
        }
    }
}
