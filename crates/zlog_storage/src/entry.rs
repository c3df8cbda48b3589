//! Per-position entries and log metadata stored by backends.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a single log position.
///
/// Transitions only move forward: `Empty` becomes `Written` or `Filled`,
/// and any state may become `Trimmed`. `Trimmed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EntryState {
    /// Nothing has been stored at this position.
    #[default]
    Empty,
    /// A payload was appended.
    Written,
    /// The position was tombstoned before any payload landed.
    Filled,
    /// The position was logically deleted.
    Trimmed,
}

impl EntryState {
    /// Returns the lowercase name used in logs and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Written => "written",
            Self::Filled => "filled",
            Self::Trimmed => "trimmed",
        }
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The full content of a log position.
///
/// Payload and stream membership are always stored together so a
/// conditional write publishes both or neither.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Entry {
    /// Current state.
    pub state: EntryState,
    /// Payload bytes. Empty unless the entry was written.
    pub payload: Vec<u8>,
    /// Stream ids recorded at append time, in caller order.
    pub streams: Vec<u64>,
}

impl Entry {
    /// An unwritten position.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A written position carrying `payload` and membership in `streams`.
    #[must_use]
    pub fn written(payload: Vec<u8>, streams: Vec<u64>) -> Self {
        Self {
            state: EntryState::Written,
            payload,
            streams,
        }
    }

    /// A fill tombstone.
    #[must_use]
    pub fn filled() -> Self {
        Self {
            state: EntryState::Filled,
            ..Self::default()
        }
    }

    /// Returns this entry marked as trimmed, keeping payload and membership.
    #[must_use]
    pub fn into_trimmed(self) -> Self {
        Self {
            state: EntryState::Trimmed,
            ..self
        }
    }

    /// Returns true if the entry lists `stream_id` as a member.
    #[must_use]
    pub fn has_stream(&self, stream_id: u64) -> bool {
        self.streams.contains(&stream_id)
    }
}

/// Creation parameters of a log, as registered in the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMetadata {
    /// Log name.
    pub name: String,
    /// Number of backend objects positions are striped across.
    pub stripe_width: u32,
}

impl LogMetadata {
    /// Returns the stripe (backend object index) holding `position`.
    #[must_use]
    pub fn stripe_of(&self, position: u64) -> u32 {
        (position % u64::from(self.stripe_width.max(1))) as u32
    }
}

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome {
    /// The expected state matched and the new entry is stored.
    Swapped,
    /// The expected state did not match; carries the entry that is stored.
    Mismatch(Entry),
}

impl CasOutcome {
    /// Returns true if the write was applied.
    #[must_use]
    pub fn is_swapped(&self) -> bool {
        matches!(self, Self::Swapped)
    }
}
