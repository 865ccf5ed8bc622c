//! Pipeline orchestration.
//!
//! One orchestrator task per session: decode, diarize, then fan the
//! three analyzers out concurrently over the same senior-speaker
//! segment and join before fusion. CPU-bound stages (feature
//! extraction, inference) run on the blocking pool so slow external
//! calls never starve them. Every stage has its own timeout and
//! resolves to its fallback value instead of blocking the session;
//! only diarization failure and total fusion failure are fatal.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::acoustic::{self, AcousticFeatures};
use crate::audio::{self, AudioDecodeError, DecodedAudio};
use crate::classifier::{ClassifierError, ClassifierScore, ClassifierTask, SincRegistry, VoiceClassifier};
use crate::config::Config;
use crate::diarization::{select_senior_segment, DiarizationError, Diarizer};
use crate::fusion::{self, AnalysisReport, FusionError, FusionInputs};
use crate::health::{AnalyzerState, HealthReport};
use crate::logging;
use crate::session::{
    AudioSession, SessionState, SpeakerSegment, StageStatus, StageStatuses, UserMetadata,
    SAMPLE_RATE,
};
use crate::text::{analyzer_from_config, TextAnalysisResult, TextAnalyzer};
use crate::transcription::Transcriber;

/// Session-fatal pipeline errors. Everything else degrades in place.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Audio(#[from] AudioDecodeError),

    #[error(transparent)]
    Diarization(#[from] DiarizationError),

    #[error(transparent)]
    Fusion(#[from] FusionError),

    #[error("Session cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Stable reason code reported to the caller with the FAILED state
    pub fn reason_code(&self) -> &'static str {
        match self {
            PipelineError::Audio(_) => "audio_decode",
            PipelineError::Diarization(_) => "diarization",
            PipelineError::Fusion(_) => "fusion_input_missing",
            PipelineError::Cancelled => "cancelled",
        }
    }
}

/// Explicit context object constructed once at process start.
///
/// Holds read-only handles to configuration and the loaded analyzers;
/// passed into the orchestrator instead of any process-wide mutable
/// state.
#[derive(Clone)]
pub struct PipelineContext {
    pub config: Arc<Config>,
    pub classifier: Arc<dyn VoiceClassifier>,
    pub text_analyzer: Arc<dyn TextAnalyzer>,
}

impl PipelineContext {
    /// Build the production context: ONNX-backed classifier registry and
    /// the configured text-analyzer variant.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let classifier = Arc::new(SincRegistry::new(&config)?);
        let text_analyzer = analyzer_from_config(&config);
        Ok(Self {
            config: Arc::new(config),
            classifier,
            text_analyzer,
        })
    }

    /// Assemble a context from explicit analyzer handles.
    pub fn with_analyzers(
        config: Config,
        classifier: Arc<dyn VoiceClassifier>,
        text_analyzer: Arc<dyn TextAnalyzer>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            classifier,
            text_analyzer,
        }
    }
}

/// Per-session pipeline orchestrator
pub struct Orchestrator {
    ctx: PipelineContext,
    cancellations: Mutex<HashMap<Uuid, watch::Sender<bool>>>,
}

impl Orchestrator {
    pub fn new(ctx: PipelineContext) -> Self {
        Self {
            ctx,
            cancellations: Mutex::new(HashMap::new()),
        }
    }

    /// Request cooperative cancellation of one in-flight session.
    ///
    /// Has no effect on other sessions or on the shared model cache.
    pub fn cancel(&self, session_id: Uuid) {
        if let Ok(map) = self.cancellations.lock() {
            if let Some(tx) = map.get(&session_id) {
                info!("Cancellation requested for session {}", session_id);
                let _ = tx.send(true);
            }
        }
    }

    /// Per-analyzer readiness snapshot.
    pub fn health(&self) -> HealthReport {
        let classifier_state = |task| {
            if self.ctx.config.stubs.neural_classifier {
                AnalyzerState::Stub
            } else {
                self.ctx.classifier.state(task)
            }
        };
        HealthReport {
            acoustic: AnalyzerState::Ready,
            classifier_depression: classifier_state(ClassifierTask::Depression),
            classifier_insomnia: classifier_state(ClassifierTask::Insomnia),
            text_analyzer: self.ctx.text_analyzer.state(),
        }
    }

    /// Analyze a recording from its path, constructing the session.
    pub async fn analyze_recording(
        &self,
        audio_path: &Path,
        metadata: UserMetadata,
        diarizer: &dyn Diarizer,
        transcriber: &dyn Transcriber,
    ) -> Result<AnalysisReport, PipelineError> {
        let audio = audio::load_session_audio(audio_path).await?;
        let session = AudioSession::new(
            audio_path.to_path_buf(),
            SAMPLE_RATE,
            audio.duration_ms(),
            metadata,
        );
        self.run_registered(&session, audio, diarizer, transcriber).await
    }

    /// Analyze an existing session, decoding its audio reference.
    pub async fn analyze(
        &self,
        session: &AudioSession,
        diarizer: &dyn Diarizer,
        transcriber: &dyn Transcriber,
    ) -> Result<AnalysisReport, PipelineError> {
        let audio = audio::load_session_audio(&session.audio_path).await?;
        self.run_registered(session, audio, diarizer, transcriber).await
    }

    /// Register the cancellation handle for the session's lifetime and run.
    async fn run_registered(
        &self,
        session: &AudioSession,
        audio: DecodedAudio,
        diarizer: &dyn Diarizer,
        transcriber: &dyn Transcriber,
    ) -> Result<AnalysisReport, PipelineError> {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        if let Ok(mut map) = self.cancellations.lock() {
            map.insert(session.id, cancel_tx);
        }

        let result = self.run_session(session, audio, diarizer, transcriber, cancel_rx).await;

        if let Ok(mut map) = self.cancellations.lock() {
            map.remove(&session.id);
        }

        if let Err(ref e) = result {
            logging::log_error(
                "pipeline",
                e.reason_code(),
                &e.to_string(),
                Some(&session.id.to_string()),
            );
        }
        result
    }

    async fn run_session(
        &self,
        session: &AudioSession,
        audio: DecodedAudio,
        diarizer: &dyn Diarizer,
        transcriber: &dyn Transcriber,
        mut cancel_rx: watch::Receiver<bool>,
    ) -> Result<AnalysisReport, PipelineError> {
        let sid = session.id.to_string();
        let config = &self.ctx.config;
        logging::log_session_transition(&sid, "ingested", "diarizing");

        // Diarization is the one stage with no fallback
        let diarize_started = Instant::now();
        let segments = tokio::select! {
            _ = cancelled(&mut cancel_rx) => return Err(PipelineError::Cancelled),
            result = timeout(config.timeouts.diarization(), diarizer.diarize(&audio.samples)) => {
                result.map_err(|_| DiarizationError::Timeout)??
            }
        };
        let segment = Arc::new(select_senior_segment(
            &segments,
            config.target_speaker.as_deref(),
        )?);
        logging::log_stage_resolved(&sid, "diarization", diarize_started.elapsed().as_millis() as u64, false, None);
        logging::log_session_transition(&sid, "diarized", "analyzers_running");

        // Fan out the three analyzers over the same segment; no ordering
        // between them is assumed, fusion only needs all three resolved.
        let analyzer_results = tokio::select! {
            _ = cancelled(&mut cancel_rx) => return Err(PipelineError::Cancelled),
            results = async {
                tokio::join!(
                    self.run_acoustic(&sid, segment.clone()),
                    self.run_classifiers(&sid, segment.clone()),
                    self.run_text(&sid, segment.clone(), transcriber),
                )
            } => results,
        };
        let ((acoustic, acoustic_status), neural, text_outcome) = analyzer_results;
        let ((depression, depression_status), (insomnia, insomnia_status)) = neural;
        let (text, transcription_status, text_status) = text_outcome;

        logging::log_session_transition(&sid, "analyzers_running", "fusing");

        let stages = StageStatuses {
            diarization: StageStatus::Completed,
            acoustic: acoustic_status,
            classifier_depression: depression_status,
            classifier_insomnia: insomnia_status,
            transcription: transcription_status,
            text_analysis: text_status,
        };

        let inputs = FusionInputs {
            acoustic,
            depression,
            insomnia,
            text,
        };

        let report = fusion::fuse(session.id, &inputs, stages, config)?;

        logging::log_report_finalized(
            &sid,
            match report.state {
                SessionState::Complete => "complete",
                SessionState::CompleteDegraded => "complete_degraded",
                _ => "other",
            },
            report.degraded_count(),
            report.requires_expert_review,
        );

        Ok(report)
    }

    /// Acoustic feature extraction with timeout; failures exclude the
    /// modality, never the session.
    async fn run_acoustic(
        &self,
        sid: &str,
        segment: Arc<SpeakerSegment>,
    ) -> (Option<AcousticFeatures>, StageStatus) {
        let started = Instant::now();
        let config = self.ctx.config.clone();

        let task = tokio::task::spawn_blocking(move || acoustic::extract(&segment, &config));
        let outcome = match timeout(self.ctx.config.timeouts.acoustic(), task).await {
            Err(_) => (None, StageStatus::Fallback("acoustic extraction timed out".into())),
            Ok(Err(join_err)) => (
                None,
                StageStatus::Fallback(format!("acoustic task panicked: {}", join_err)),
            ),
            Ok(Ok(Ok(features))) => (Some(features), StageStatus::Completed),
            Ok(Ok(Err(e))) => {
                warn!("Acoustic modality excluded: {}", e);
                (None, StageStatus::Fallback(e.to_string()))
            }
        };

        logging::log_stage_resolved(
            sid,
            "acoustic",
            started.elapsed().as_millis() as u64,
            !outcome.1.is_completed(),
            fallback_reason(&outcome.1),
        );
        outcome
    }

    async fn run_classifiers(
        &self,
        sid: &str,
        segment: Arc<SpeakerSegment>,
    ) -> (
        (Option<ClassifierScore>, StageStatus),
        (Option<ClassifierScore>, StageStatus),
    ) {
        tokio::join!(
            self.run_classifier_task(sid, segment.clone(), ClassifierTask::Depression),
            self.run_classifier_task(sid, segment.clone(), ClassifierTask::Insomnia),
        )
    }

    /// One classifier task with timeout. `NotReady` and inference
    /// failures resolve to exclusion of the neural modality.
    async fn run_classifier_task(
        &self,
        sid: &str,
        segment: Arc<SpeakerSegment>,
        task: ClassifierTask,
    ) -> (Option<ClassifierScore>, StageStatus) {
        let stage_name = match task {
            ClassifierTask::Depression => "classifier_depression",
            ClassifierTask::Insomnia => "classifier_insomnia",
        };
        let started = Instant::now();

        if self.ctx.config.stubs.neural_classifier {
            let status = StageStatus::Fallback("stubbed by configuration".into());
            logging::log_stage_resolved(sid, stage_name, 0, true, fallback_reason(&status));
            return (None, status);
        }

        let outcome = match timeout(
            self.ctx.config.timeouts.classifier(),
            self.ctx.classifier.classify(&segment.samples, task),
        )
        .await
        {
            Err(_) => (
                None,
                StageStatus::Fallback(format!("{} inference timed out", task.name())),
            ),
            Ok(Ok(score)) => (Some(score), StageStatus::Completed),
            Ok(Err(e @ ClassifierError::NotReady(_))) => {
                (None, StageStatus::Fallback(e.to_string()))
            }
            Ok(Err(e)) => {
                warn!("Neural modality excluded for {}: {}", task.name(), e);
                (None, StageStatus::Fallback(e.to_string()))
            }
        };

        logging::log_stage_resolved(
            sid,
            stage_name,
            started.elapsed().as_millis() as u64,
            !outcome.1.is_completed(),
            fallback_reason(&outcome.1),
        );
        outcome
    }

    /// Transcription followed by language-model scoring. Every failure
    /// path substitutes the stub result so the pipeline always completes.
    async fn run_text(
        &self,
        sid: &str,
        segment: Arc<SpeakerSegment>,
        transcriber: &dyn Transcriber,
    ) -> (Option<TextAnalysisResult>, StageStatus, StageStatus) {
        let config = &self.ctx.config;
        let started = Instant::now();

        let transcript = match timeout(
            config.timeouts.transcription(),
            transcriber.transcribe(&segment),
        )
        .await
        {
            Err(_) => Err("transcription timed out".to_string()),
            Ok(Err(e)) => Err(e.to_string()),
            Ok(Ok(text)) => Ok(text),
        };

        let (transcript, transcription_status) = match transcript {
            Ok(text) => (text, StageStatus::Completed),
            Err(reason) => {
                warn!("Transcription unavailable, text analyzer will stub: {}", reason);
                let status = StageStatus::Fallback(reason);
                logging::log_stage_resolved(sid, "transcription", started.elapsed().as_millis() as u64, true, fallback_reason(&status));
                let stub = TextAnalysisResult::stub("");
                let text_status = StageStatus::Fallback("no transcript available".into());
                logging::log_stage_resolved(sid, "text_analysis", 0, true, fallback_reason(&text_status));
                return (Some(stub), status, text_status);
            }
        };
        logging::log_stage_resolved(sid, "transcription", started.elapsed().as_millis() as u64, false, None);

        let scoring_started = Instant::now();
        let (result, text_status) = match timeout(
            config.timeouts.text_scoring(),
            self.ctx.text_analyzer.analyze(&transcript),
        )
        .await
        {
            Err(_) => (
                TextAnalysisResult::stub(&transcript),
                StageStatus::Fallback("language-model call timed out".into()),
            ),
            Ok(Err(e)) => {
                warn!("Text scoring failed, substituting stub: {}", e);
                (
                    TextAnalysisResult::stub(&transcript),
                    StageStatus::Fallback(e.to_string()),
                )
            }
            Ok(Ok(result)) if result.is_stub => {
                (result, StageStatus::Fallback("stub analyzer".into()))
            }
            Ok(Ok(result)) => (result, StageStatus::Completed),
        };

        logging::log_stage_resolved(
            sid,
            "text_analysis",
            scoring_started.elapsed().as_millis() as u64,
            !text_status.is_completed(),
            fallback_reason(&text_status),
        );
        (Some(result), transcription_status, text_status)
    }
}

fn fallback_reason(status: &StageStatus) -> Option<&str> {
    match status {
        StageStatus::Fallback(reason) => Some(reason.as_str()),
        _ => None,
    }
}

/// Resolves when cancellation is requested; pends forever otherwise.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender dropped without cancelling
            std::future::pending::<()>().await;
        }
    }
}
