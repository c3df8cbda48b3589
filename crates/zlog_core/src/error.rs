//! Error types for zlog core.

use crate::types::{Position, StreamId};
use thiserror::Error;
use zlog_storage::StorageError;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in log operations.
///
/// Only the category is load-bearing; callers branch on the variant.
/// A lost race for a position is never reported here: appends retry it
/// internally.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Backend failure, propagated verbatim.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Bad caller argument.
    #[error("invalid argument: {message}")]
    Invalid {
        /// What was wrong.
        message: String,
    },

    /// The named log does not exist.
    #[error("log not found: {name}")]
    LogNotFound {
        /// Name of the log.
        name: String,
    },

    /// A log with this name already exists.
    #[error("log already exists: {name}")]
    LogExists {
        /// Name of the log.
        name: String,
    },

    /// The position holds a completed append and cannot be filled.
    #[error("position {position} is read-only")]
    ReadOnly {
        /// The written position.
        position: Position,
    },

    /// Nothing has been written at the position.
    #[error("position {position} not written")]
    NotWritten {
        /// The empty position.
        position: Position,
    },

    /// The position was filled.
    #[error("position {position} is filled")]
    Filled {
        /// The filled position.
        position: Position,
    },

    /// The position was trimmed.
    #[error("position {position} is trimmed")]
    Trimmed {
        /// The trimmed position.
        position: Position,
    },

    /// The stream cursor is past the last known member position.
    #[error("end of stream {stream_id}")]
    EndOfStream {
        /// The exhausted stream.
        stream_id: StreamId,
    },

    /// A bounded retry policy ran out before an append landed.
    #[error("append gave up after {attempts} contended attempts")]
    AppendContention {
        /// Number of positions tried.
        attempts: u32,
    },
}

impl CoreError {
    /// Creates an invalid argument error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Converts a backend lifecycle failure into its core category.
    ///
    /// Registry conflicts become `LogExists`/`LogNotFound`, names the
    /// backend cannot represent become `Invalid`; everything else stays
    /// a storage error.
    pub fn from_lifecycle(err: StorageError) -> Self {
        match err {
            StorageError::LogExists { name } => Self::LogExists { name },
            StorageError::LogNotFound { name } => Self::LogNotFound { name },
            StorageError::InvalidName { name } => {
                Self::invalid(format!("log name {name:?} is not supported by the backend"))
            }
            StorageError::InvalidArgument(message) => Self::Invalid { message },
            other => Self::Storage(other),
        }
    }

    /// Returns true for tombstone and unwritten-read errors.
    ///
    /// These are outcomes of a read against a valid position rather than
    /// faults.
    #[must_use]
    pub fn is_read_state(&self) -> bool {
        matches!(
            self,
            Self::NotWritten { .. } | Self::Filled { .. } | Self::Trimmed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_errors_map_to_categories() {
        let exists = CoreError::from_lifecycle(StorageError::LogExists { name: "a".into() });
        assert!(matches!(exists, CoreError::LogExists { name } if name == "a"));

        let missing = CoreError::from_lifecycle(StorageError::LogNotFound { name: "b".into() });
        assert!(matches!(missing, CoreError::LogNotFound { .. }));

        let bad_name = CoreError::from_lifecycle(StorageError::InvalidName { name: "..".into() });
        assert!(matches!(bad_name, CoreError::Invalid { .. }));

        let io = CoreError::from_lifecycle(StorageError::Corrupted("x".into()));
        assert!(matches!(io, CoreError::Storage(_)));
    }

    #[test]
    fn read_state_classification() {
        let pos = Position::new(3);
        assert!(CoreError::NotWritten { position: pos }.is_read_state());
        assert!(CoreError::Trimmed { position: pos }.is_read_state());
        assert!(!CoreError::ReadOnly { position: pos }.is_read_state());
    }

    #[test]
    fn messages_name_the_position() {
        let err = CoreError::Filled {
            position: Position::new(232),
        };
        assert_eq!(err.to_string(), "position pos:232 is filled");
    }
}
