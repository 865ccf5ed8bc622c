// End-to-end scenario tests over the documented degradation matrix:
// clean runs, stubbed text scoring, codec fallback, missing neural
// weights, and total analyzer loss.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::classifier::SincRegistry;
    use crate::config::Config;
    use crate::fusion::Modality;
    use crate::pipeline::{Orchestrator, PipelineContext, PipelineError};
    use crate::pipeline_tests::{
        healthy_orchestrator, orchestrator, speech_like, write_wav, FailingTextAnalyzer,
        FixedClassifier, FixedTextAnalyzer, FixedTranscriber, NotReadyClassifier, SplitDiarizer,
    };
    use crate::session::{AudioSession, SessionState, UserMetadata, SAMPLE_RATE};

    fn session_from(dir: &tempfile::TempDir, samples: &[f32]) -> AudioSession {
        let path = dir.path().join("call.wav");
        write_wav(&path, samples);
        let duration_ms = (samples.len() as u64 * 1000) / SAMPLE_RATE as u64;
        AudioSession::new(path, SAMPLE_RATE, duration_ms, UserMetadata::new("senior-042"))
    }

    /// Scenario 1: 60 seconds of clean speech, every analyzer succeeds.
    #[tokio::test]
    async fn test_clean_call_all_analyzers_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_from(&dir, &speech_like(60_000));
        let orchestrator = healthy_orchestrator();

        let report = orchestrator
            .analyze(&session, &SplitDiarizer, &FixedTranscriber)
            .await
            .unwrap();

        assert_eq!(report.state, SessionState::Complete);
        assert!(!report.requires_expert_review);
        for indicator in report.indicators() {
            assert!(
                indicator.confidence > 0.8,
                "{:?} confidence {} not > 0.8",
                indicator.kind,
                indicator.confidence
            );
            assert!(!indicator.degraded);
        }
        assert_eq!(report.depression_risk.contributing_modalities.len(), 3);
        assert_eq!(report.sleep_disorder.contributing_modalities.len(), 3);
    }

    /// Scenario 2: the language-model call fails; DRI/SDI fuse from the
    /// remaining modalities with renormalized weights.
    #[tokio::test]
    async fn test_llm_failure_substitutes_stub() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_from(&dir, &speech_like(30_000));
        let orchestrator = orchestrator(
            Config::default(),
            Arc::new(FixedClassifier { score: 0.4, confidence: 0.9 }),
            Arc::new(FailingTextAnalyzer),
        );

        let report = orchestrator
            .analyze(&session, &SplitDiarizer, &FixedTranscriber)
            .await
            .unwrap();

        assert_eq!(report.state, SessionState::CompleteDegraded);
        assert!(report.stages.text_analysis.is_fallback());

        // Text is excluded; acoustic + neural carry DRI and SDI
        for kind in [
            crate::fusion::IndicatorKind::DepressionRisk,
            crate::fusion::IndicatorKind::SleepDisorder,
        ] {
            let indicator = report.indicator(kind);
            assert!(!indicator.contributing_modalities.contains(&Modality::Text));
            assert!(indicator.contributing_modalities.contains(&Modality::Acoustic));
            assert!(indicator.contributing_modalities.contains(&Modality::Neural));
            assert!((0.0..=1.0).contains(&indicator.value));
        }

        // CFL/ES/OV fall back to acoustic only
        assert_eq!(
            report.cognitive_function.contributing_modalities,
            vec![Modality::Acoustic]
        );
    }

    /// Scenario 3: unsupported container goes through the ffmpeg
    /// fallback and the pipeline completes as if natively decoded.
    /// Skipped when ffmpeg is not installed.
    #[tokio::test]
    async fn test_codec_fallback_for_foreign_sample_rate() {
        let have_ffmpeg = tokio::process::Command::new("ffmpeg")
            .arg("-version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false);
        if !have_ffmpeg {
            eprintln!("ffmpeg not available, skipping codec fallback test");
            return;
        }

        // 8kHz recording: decodable as WAV but at the wrong rate
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("call8k.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        let n = 8000 * 20;
        for i in 0..n {
            let t = i as f32 / 8000.0;
            let s = (2.0 * std::f32::consts::PI * 180.0 * t).sin() * 0.4;
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();

        let decoded = crate::audio::load_session_audio(&path).await.unwrap();
        assert_eq!(decoded.sample_rate, SAMPLE_RATE);
        assert!(decoded.duration_ms() >= 19_000 && decoded.duration_ms() <= 21_000);

        let session = AudioSession::new(path, SAMPLE_RATE, decoded.duration_ms(), UserMetadata::new("senior-042"));
        let report = healthy_orchestrator()
            .analyze(&session, &SplitDiarizer, &FixedTranscriber)
            .await
            .unwrap();
        assert!(matches!(
            report.state,
            SessionState::Complete | SessionState::CompleteDegraded
        ));
    }

    /// Garbage bytes fail decode even through the fallback and surface
    /// as an explicit decode error, never a partial result.
    #[tokio::test]
    async fn test_undecodable_input_fails_explicitly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.bin");
        std::fs::write(&path, b"definitely not audio").unwrap();

        let session = AudioSession::new(path, SAMPLE_RATE, 0, UserMetadata::new("senior-042"));
        let result = healthy_orchestrator()
            .analyze(&session, &SplitDiarizer, &FixedTranscriber)
            .await;
        assert!(matches!(result, Err(PipelineError::Audio(_))));
    }

    /// Scenario 4: neural weights unavailable locally and remotely; the
    /// registry latches NotReady and DRI/SDI fuse from acoustic + text.
    #[tokio::test]
    async fn test_missing_model_weights_degrade_neural_modality() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_from(&dir, &speech_like(30_000));

        let models_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.models.cache_dir = Some(models_dir.path().to_path_buf());

        let registry = SincRegistry::new(&config).unwrap();
        let orchestrator = Orchestrator::new(PipelineContext::with_analyzers(
            config,
            Arc::new(registry),
            Arc::new(FixedTextAnalyzer { score: 0.4, confidence: 0.92 }),
        ));

        let report = orchestrator
            .analyze(&session, &SplitDiarizer, &FixedTranscriber)
            .await
            .unwrap();

        assert_eq!(report.state, SessionState::CompleteDegraded);
        assert!(report.stages.classifier_depression.is_fallback());
        assert!(report.stages.classifier_insomnia.is_fallback());

        for kind in [
            crate::fusion::IndicatorKind::DepressionRisk,
            crate::fusion::IndicatorKind::SleepDisorder,
        ] {
            let indicator = report.indicator(kind);
            assert!(!indicator.contributing_modalities.contains(&Modality::Neural));
            assert!(indicator.contributing_modalities.contains(&Modality::Acoustic));
            assert!(indicator.contributing_modalities.contains(&Modality::Text));
        }
    }

    /// Scenario 5a: every analyzer unavailable at once is the one
    /// fusion-fatal case.
    #[tokio::test]
    async fn test_total_analyzer_loss_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // Near-silence: acoustic finds no voiced audio
        let samples = vec![0.0001f32; (SAMPLE_RATE * 10) as usize];
        let session = session_from(&dir, &samples);

        let orchestrator = orchestrator(
            Config::default(),
            Arc::new(NotReadyClassifier),
            Arc::new(FailingTextAnalyzer),
        );

        let result = orchestrator
            .analyze(&session, &SplitDiarizer, &FixedTranscriber)
            .await;
        assert!(matches!(result, Err(PipelineError::Fusion(_))));
    }

    /// Scenario 5b: partial availability (acoustic only) keeps the
    /// session alive but forces expert review.
    #[tokio::test]
    async fn test_acoustic_only_session_requires_expert_review() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_from(&dir, &speech_like(30_000));

        let orchestrator = orchestrator(
            Config::default(),
            Arc::new(NotReadyClassifier),
            Arc::new(FailingTextAnalyzer),
        );

        let report = orchestrator
            .analyze(&session, &SplitDiarizer, &FixedTranscriber)
            .await
            .unwrap();

        assert_eq!(report.state, SessionState::CompleteDegraded);
        assert!(report.requires_expert_review);
        for indicator in report.indicators() {
            assert_eq!(indicator.contributing_modalities, vec![Modality::Acoustic]);
        }
    }

    /// The report is a stable JSON contract for the persistence and
    /// notification collaborators.
    #[tokio::test]
    async fn test_report_serializes_whole() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_from(&dir, &speech_like(15_000));
        let report = healthy_orchestrator()
            .analyze(&session, &SplitDiarizer, &FixedTranscriber)
            .await
            .unwrap();

        let json = serde_json::to_string(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert!(value.get("depression_risk").is_some());
        assert!(value.get("overall_vitality").is_some());
        assert!(value.get("stages").is_some());
        assert!(value.get("requires_expert_review").is_some());

        let back: crate::fusion::AnalysisReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.session_id, report.session_id);
    }

    /// Health query over a context with missing neural weights.
    #[tokio::test]
    async fn test_health_query_after_failed_load() {
        let models_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.models.cache_dir = Some(models_dir.path().to_path_buf());

        let registry = Arc::new(SincRegistry::new(&config).unwrap());
        let orchestrator = Orchestrator::new(PipelineContext::with_analyzers(
            config,
            registry.clone(),
            Arc::new(crate::text::StubAnalyzer),
        ));

        // Before any classify call the registry reports loadable
        let health = orchestrator.health();
        assert_eq!(health.text_analyzer, crate::health::AnalyzerState::Stub);

        // Force a failed lazy load, then the latch shows NotReady
        use crate::classifier::{ClassifierTask, VoiceClassifier};
        let _ = registry
            .classify(&vec![0.0f32; 4000], ClassifierTask::Depression)
            .await;
        let health = orchestrator.health();
        assert_eq!(
            health.classifier_depression,
            crate::health::AnalyzerState::NotReady
        );
    }

    /// The orchestrator future must be Send so callers can spawn it.
    #[tokio::test]
    async fn test_analyze_future_is_send() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_from(&dir, &speech_like(5_000));
        let orchestrator = Arc::new(healthy_orchestrator());

        let orch = orchestrator.clone();
        let handle = tokio::spawn(async move {
            orch.analyze(&session, &SplitDiarizer, &FixedTranscriber).await
        });
        let result = handle.await.unwrap();
        assert!(result.is_ok());
    }
}
