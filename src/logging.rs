//! Audit logging.
//!
//! Structured logging for clinical auditing and debugging.
//! IMPORTANT: this module must NEVER log PHI (Protected Health Information).
//!
//! What IS logged:
//! - Session IDs, stage names, durations
//! - Indicator confidence and degradation flags (no values alone are PHI,
//!   but transcripts are)
//! - Model names, cache paths, fetch outcomes
//! - Error messages (sanitized)
//!
//! What is NOT logged:
//! - Transcript text
//! - Raw audio content
//! - Caller names or free-text metadata

use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Guard that must be held for the duration of the process
/// to ensure logs are flushed before exit
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize the audit logging system.
///
/// Sets up dual logging:
/// - Console output (human-readable, for development)
/// - File output (JSON, for auditing and analysis)
///
/// Log files are stored in ~/.wellvoice/logs/ with daily rotation.
pub fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = get_log_directory()?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "audit.log");

    // Non-blocking writer for file output
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    LOG_GUARD.set(guard).ok();

    // File layer - JSON format for structured logging with explicit UTC timestamps
    let file_layer = fmt::layer()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(non_blocking)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    // Console layer - human-readable format
    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();

    info!(
        event = "logging_initialized",
        log_dir = %log_dir.display(),
        "Audit logging system initialized"
    );

    Ok(())
}

/// Get the log directory path
fn get_log_directory() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let home = dirs::home_dir().ok_or("Could not determine home directory")?;
    Ok(home.join(".wellvoice").join("logs"))
}

/// Log session state transition
pub fn log_session_transition(session_id: &str, from_state: &str, to_state: &str) {
    info!(
        event = "session_transition",
        session_id = %session_id,
        from_state = %from_state,
        to_state = %to_state,
        "Session state changed"
    );
}

/// Log stage resolution (success or fallback), without content
pub fn log_stage_resolved(
    session_id: &str,
    stage: &str,
    elapsed_ms: u64,
    fallback: bool,
    reason: Option<&str>,
) {
    if fallback {
        warn!(
            event = "stage_resolved",
            session_id = %session_id,
            stage = %stage,
            elapsed_ms = elapsed_ms,
            fallback = true,
            reason = reason,
            "Stage resolved via fallback"
        );
    } else {
        info!(
            event = "stage_resolved",
            session_id = %session_id,
            stage = %stage,
            elapsed_ms = elapsed_ms,
            fallback = false,
            "Stage completed"
        );
    }
}

/// Log model loading
pub fn log_model_load(task: &str, model_path: &str, load_time_ms: u64, success: bool, error: Option<&str>) {
    if success {
        info!(
            event = "model_load",
            task = %task,
            model_path = %model_path,
            load_time_ms = load_time_ms,
            success = true,
            "Classifier model loaded"
        );
    } else {
        error!(
            event = "model_load",
            task = %task,
            model_path = %model_path,
            load_time_ms = load_time_ms,
            success = false,
            error = error,
            "Classifier model load failed"
        );
    }
}

/// Log model-weight fetch from remote storage
pub fn log_model_fetch(task: &str, url: &str, size_bytes: u64, success: bool, error: Option<&str>) {
    if success {
        info!(
            event = "model_fetch",
            task = %task,
            url = %url,
            size_bytes = size_bytes,
            success = true,
            "Model weights fetched"
        );
    } else {
        warn!(
            event = "model_fetch",
            task = %task,
            url = %url,
            success = false,
            error = error,
            "Model weight fetch failed"
        );
    }
}

/// Log report finalization (indicator values are screening data, not PHI;
/// transcripts never pass through here)
pub fn log_report_finalized(
    session_id: &str,
    state: &str,
    degraded_indicators: usize,
    requires_expert_review: bool,
) {
    info!(
        event = "report_finalized",
        session_id = %session_id,
        state = %state,
        degraded_indicators = degraded_indicators,
        requires_expert_review = requires_expert_review,
        "Analysis report finalized"
    );
}

/// Log an error (sanitized - no PHI)
pub fn log_error(context: &str, error_type: &str, error_message: &str, session_id: Option<&str>) {
    error!(
        event = "error",
        context = %context,
        error_type = %error_type,
        error_message = %error_message,
        session_id = session_id,
        "Error occurred"
    );
}
