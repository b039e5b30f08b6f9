//! Tracing setup and log redaction.

use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

use crate::config::ClientConfig;

const LOG_FILE_NAME: &str = "urban-guard.log";

/// Markers whose trailing text is masked by [`redact_sensitive`].
const SECRET_MARKERS: [&str; 5] = ["password", "access_token", "token", "authorization", "bearer"];

static LOG_GUARD: Mutex<Option<WorkerGuard>> = Mutex::new(None);

/// Installs the global subscriber: stderr plus an append-only file in the
/// configured log directory.
///
/// Subsequent calls, including ones racing the first, are no-ops.
///
/// # Errors
/// Returns [`LoggingError`] when the filter is invalid, the log directory
/// cannot be created, or another subscriber is already installed.
pub fn init_tracing(config: &ClientConfig) -> Result<PathBuf, LoggingError> {
    let log_dir = config.log_dir();
    let log_path = log_dir.join(LOG_FILE_NAME);
    let mut installed = LOG_GUARD.lock().unwrap_or_else(PoisonError::into_inner);
    if installed.is_some() {
        return Ok(log_path);
    }

    let filter = EnvFilter::try_new(&config.log_filter)
        .map_err(|error| LoggingError::Filter(error.to_string()))?;
    fs::create_dir_all(&log_dir).map_err(|source| LoggingError::CreateDir {
        path: log_dir.clone(),
        source,
    })?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&log_dir, LOG_FILE_NAME));
    let subscriber = Registry::default()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer));
    tracing::subscriber::set_global_default(subscriber).map_err(LoggingError::SetGlobal)?;
    *installed = Some(guard);
    drop(installed);

    tracing::info!(stage = "logging", action = "file_created", log_file = %log_path.display());
    Ok(log_path)
}

/// Masks everything from the first secret marker onward.
///
/// Free-form text such as server error bodies passes through here before it
/// reaches a log line.
pub fn redact_sensitive(input: &str) -> String {
    let lower = input.to_ascii_lowercase();
    let first = SECRET_MARKERS
        .iter()
        .filter_map(|marker| lower.find(marker).map(|position| (position, *marker)))
        .min_by_key(|(position, _)| *position);

    match first {
        Some((position, marker)) => format!("{}{marker}=<redacted>", &input[..position]),
        None => input.to_string(),
    }
}

/// Logging initialisation errors.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// Filter directive did not parse.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Log directory could not be created.
    #[error("failed to prepare log directory {path}: {source}")]
    CreateDir {
        /// Directory that was being created.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// Another global subscriber was already installed.
    #[error("failed to install global tracing subscriber: {0}")]
    SetGlobal(tracing::subscriber::SetGlobalDefaultError),
}
