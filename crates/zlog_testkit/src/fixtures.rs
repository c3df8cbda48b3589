//! Test fixtures and log helpers.
//!
//! Provides convenience functions for setting up test logs
//! and common test scenarios.

use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use zlog_core::{Config, Log, Position, StreamId};
use zlog_storage::{FileBackend, InMemoryBackend, LogBackend};

/// Name of the log every fixture creates.
pub const TEST_LOG_NAME: &str = "test";

/// A test log with automatic cleanup.
pub struct TestLog {
    /// The log handle.
    pub log: Log,
    /// The backend holding the log.
    pub backend: Arc<dyn LogBackend>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestLog {
    /// Creates a log on a fresh in-memory backend.
    pub fn memory() -> Self {
        Self::memory_with_config(Config::new())
    }

    /// Creates a log on a fresh in-memory backend with `config`.
    pub fn memory_with_config(config: Config) -> Self {
        let backend: Arc<dyn LogBackend> = Arc::new(InMemoryBackend::new());
        let log = Log::open_with_config(
            Arc::clone(&backend),
            TEST_LOG_NAME,
            config.create_if_missing(true).error_if_exists(true),
        )
        .expect("Failed to create in-memory log");

        Self {
            log,
            backend,
            _temp_dir: None,
        }
    }

    /// Creates a log on a file backend in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let backend: Arc<dyn LogBackend> =
            Arc::new(FileBackend::open(temp_dir.path()).expect("Failed to open file backend"));
        let log = Log::create(Arc::clone(&backend), TEST_LOG_NAME, 3)
            .expect("Failed to create file log");

        Self {
            log,
            backend,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the backend directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self._temp_dir.as_ref().map(TempDir::path)
    }

    /// Opens another handle on the same log.
    ///
    /// File logs get a handle through an independent `FileBackend`, as a
    /// separate process would; memory logs share the backend.
    pub fn another_handle(&self) -> Log {
        let backend: Arc<dyn LogBackend> = match self.path() {
            Some(path) => {
                Arc::new(FileBackend::open(path).expect("Failed to reopen file backend"))
            }
            None => Arc::clone(&self.backend),
        };
        Log::open(backend, TEST_LOG_NAME).expect("Failed to open second handle")
    }
}

impl std::ops::Deref for TestLog {
    type Target = Log;

    fn deref(&self) -> &Self::Target {
        &self.log
    }
}

/// Runs a test with a temporary in-memory log.
///
/// # Example
///
/// ```rust,ignore
/// use zlog_testkit::with_temp_log;
///
/// #[test]
/// fn my_test() {
///     with_temp_log(|log| {
///         let pos = log.append(b"hello").unwrap();
///         assert_eq!(log.read_to_vec(pos).unwrap(), b"hello");
///     });
/// }
/// ```
pub fn with_temp_log<F, R>(f: F) -> R
where
    F: FnOnce(&Log) -> R,
{
    let test_log = TestLog::memory();
    f(&test_log.log)
}

/// Runs a test with a temporary file-backed log.
pub fn with_file_log<F, R>(f: F) -> R
where
    F: FnOnce(&Log, &Path) -> R,
{
    let test_log = TestLog::file();
    let path = test_log.path().expect("File log should have a path");
    f(&test_log.log, path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a log holding `count` plain records.
    ///
    /// Record `i` is `format!("record-{i}")`.
    pub fn populated_log(count: usize) -> (TestLog, Vec<Position>) {
        let test_log = TestLog::memory();
        let positions = (0..count)
            .map(|i| {
                test_log
                    .append(format!("record-{i}").as_bytes())
                    .expect("Failed to append")
            })
            .collect();
        (test_log, positions)
    }

    /// Creates a log where record `i` belongs to stream `i % stream_count`.
    ///
    /// Returns the expected history of each stream.
    pub fn round_robin_streams(
        stream_count: u64,
        records: usize,
    ) -> (TestLog, Vec<Vec<Position>>) {
        let test_log = TestLog::memory();
        let mut histories = vec![Vec::new(); stream_count as usize];

        for i in 0..records {
            let stream = i as u64 % stream_count;
            let pos = test_log
                .multi_append(format!("s{stream}-{i}").as_bytes(), &[StreamId::new(stream)])
                .expect("Failed to multi-append");
            histories[stream as usize].push(pos);
        }

        (test_log, histories)
    }
}
