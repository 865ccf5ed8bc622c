//! Lazy load-once model registry.
//!
//! Each task's weights load on first use and stay cached for the
//! process lifetime: the first caller populates the cell, concurrent
//! callers wait on it, and nobody mutates the loaded weights. A load
//! that fails after exhausting the local cache and the remote fetch
//! latches the task `NotReady` — later requests fail fast instead of
//! hammering storage.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::Config;
use crate::health::AnalyzerState;
use crate::logging;

use super::model::SincVoiceModel;
use super::{Aggregation, ClassifierError, ClassifierScore, ClassifierTask, VoiceClassifier};

/// Outcome of a one-shot model load, latched for the process lifetime
enum LoadOutcome {
    Ready(Arc<SincVoiceModel>),
    Failed(String),
}

/// ONNX-backed registry implementing [`VoiceClassifier`]
pub struct SincRegistry {
    cache_dir: PathBuf,
    remote_base_url: Option<String>,
    n_threads: usize,
    http: reqwest::Client,
    depression: OnceCell<LoadOutcome>,
    insomnia: OnceCell<LoadOutcome>,
}

impl SincRegistry {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            cache_dir: config.models_dir()?,
            remote_base_url: config.models.remote_base_url.clone(),
            n_threads: 2,
            http: reqwest::Client::new(),
            depression: OnceCell::new(),
            insomnia: OnceCell::new(),
        })
    }

    fn cell(&self, task: ClassifierTask) -> &OnceCell<LoadOutcome> {
        match task {
            ClassifierTask::Depression => &self.depression,
            ClassifierTask::Insomnia => &self.insomnia,
        }
    }

    fn model_path(&self, task: ClassifierTask) -> PathBuf {
        self.cache_dir.join(task.filename())
    }

    /// Fetch weights from remote storage into the local cache.
    ///
    /// Downloads to a sibling temp file and renames into place so a
    /// concurrent reader never sees a partial file.
    async fn fetch_remote(&self, task: ClassifierTask) -> Result<PathBuf, String> {
        let base = self
            .remote_base_url
            .as_deref()
            .ok_or_else(|| "no remote model storage configured".to_string())?;
        let url = format!("{}/{}", base.trim_end_matches('/'), task.filename());
        let dest = self.model_path(task);

        info!("Fetching {} model weights from {}", task.name(), url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        if !response.status().is_success() {
            let err = format!("HTTP {} for {}", response.status(), url);
            logging::log_model_fetch(task.name(), &url, 0, false, Some(&err));
            return Err(err);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| format!("download failed: {}", e))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("failed to create cache dir: {}", e))?;
        }

        let temp = dest.with_extension("download");
        tokio::fs::write(&temp, &bytes)
            .await
            .map_err(|e| format!("failed to write weights: {}", e))?;
        tokio::fs::rename(&temp, &dest)
            .await
            .map_err(|e| format!("failed to finalize weights: {}", e))?;

        logging::log_model_fetch(task.name(), &url, bytes.len() as u64, true, None);
        Ok(dest)
    }

    async fn load(&self, task: ClassifierTask) -> LoadOutcome {
        let started = Instant::now();
        let path = self.model_path(task);

        let path = if path.exists() {
            path
        } else {
            match self.fetch_remote(task).await {
                Ok(p) => p,
                Err(fetch_err) => {
                    let msg = format!(
                        "weights missing from cache ({:?}) and remote fetch failed: {}",
                        path, fetch_err
                    );
                    logging::log_model_load(task.name(), &path.to_string_lossy(), 0, false, Some(&msg));
                    return LoadOutcome::Failed(msg);
                }
            }
        };

        let n_threads = self.n_threads;
        let load_path = path.clone();
        let result = tokio::task::spawn_blocking(move || SincVoiceModel::load(&load_path, n_threads))
            .await
            .map_err(|e| ClassifierError::ModelLoad(format!("load task panicked: {}", e)))
            .and_then(|r| r);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(model) => {
                logging::log_model_load(task.name(), &path.to_string_lossy(), elapsed_ms, true, None);
                LoadOutcome::Ready(Arc::new(model))
            }
            Err(e) => {
                let msg = e.to_string();
                logging::log_model_load(task.name(), &path.to_string_lossy(), elapsed_ms, false, Some(&msg));
                warn!("Classifier {} latched NotReady: {}", task.name(), msg);
                LoadOutcome::Failed(msg)
            }
        }
    }

    async fn model_for(&self, task: ClassifierTask) -> Result<Arc<SincVoiceModel>, ClassifierError> {
        let outcome = self
            .cell(task)
            .get_or_init(|| self.load(task))
            .await;

        match outcome {
            LoadOutcome::Ready(model) => Ok(model.clone()),
            LoadOutcome::Failed(_) => Err(ClassifierError::NotReady(task)),
        }
    }
}

#[async_trait::async_trait]
impl VoiceClassifier for SincRegistry {
    async fn classify(
        &self,
        samples: &[f32],
        task: ClassifierTask,
    ) -> Result<ClassifierScore, ClassifierError> {
        let model = self.model_for(task).await?;
        let samples = samples.to_vec();

        tokio::task::spawn_blocking(move || model.classify(&samples, task, Aggregation::MeanPool))
            .await
            .map_err(|e| ClassifierError::Inference(format!("inference task panicked: {}", e)))?
    }

    fn state(&self, task: ClassifierTask) -> AnalyzerState {
        match self.cell(task).get() {
            Some(LoadOutcome::Ready(_)) => AnalyzerState::Ready,
            Some(LoadOutcome::Failed(_)) => AnalyzerState::NotReady,
            // Not yet requested; will load lazily on first use
            None => AnalyzerState::Ready,
        }
    }
}
