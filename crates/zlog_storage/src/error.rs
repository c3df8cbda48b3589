//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during backend operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A log with this name is already registered in the backend.
    #[error("log already exists: {name}")]
    LogExists {
        /// The conflicting log name.
        name: String,
    },

    /// No log with this name is registered in the backend.
    #[error("log not found: {name}")]
    LogNotFound {
        /// The missing log name.
        name: String,
    },

    /// The log name cannot be represented by this backend.
    #[error("invalid log name: {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// An argument was rejected by the backend.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A stored object could not be decoded.
    #[error("storage corrupted: {0}")]
    Corrupted(String),
}
