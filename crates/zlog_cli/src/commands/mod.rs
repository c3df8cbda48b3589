//! CLI command implementations.

pub mod inspect;
pub mod read;
pub mod write;

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use zlog_core::{Config, CoreError, Log};
use zlog_storage::{FileBackend, LogBackend, StorageError};

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// No `--path` was given.
    #[error("log directory required: pass --path <dir>")]
    MissingPath,

    /// A log operation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The backend could not be opened.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// JSON output failed.
    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Opens the file backend rooted at `path`.
pub fn open_backend(path: &Path) -> CliResult<Arc<FileBackend>> {
    Ok(Arc::new(FileBackend::open(path)?))
}

/// Opens the named log in the directory at `path`.
pub fn open_log(path: &Path, name: &str) -> CliResult<Log> {
    debug!(path = %path.display(), log = %name, "opening log");
    let backend: Arc<dyn LogBackend> = open_backend(path)?;
    Ok(Log::open(backend, name)?)
}

/// Opens the named log for commands that must not write to it.
///
/// Stream scans stop at holes instead of filling them, so an append still
/// in flight in another process is left alone.
pub fn open_log_read_only(path: &Path, name: &str) -> CliResult<Log> {
    debug!(path = %path.display(), log = %name, "opening log read-only");
    let backend: Arc<dyn LogBackend> = open_backend(path)?;
    Ok(Log::open_with_config(
        backend,
        name,
        Config::new().fill_gaps_on_sync(false),
    )?)
}

/// Prints `value` as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Renders a payload for display.
pub fn render_payload(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}
