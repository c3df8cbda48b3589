//! Per-position state machine over the backend's conditional write.
//!
//! ```text
//!            append              trim
//!   Empty ───────────▶ Written ───────▶ Trimmed
//!     │                                   ▲  ▲
//!     │ fill                       trim   │  │ trim
//!     └──────────────▶ Filled ────────────┘  │
//!     └──────────────────────────────────────┘
//! ```
//!
//! Every transition is a compare-and-swap against the state observed
//! before it, so two actors can never both win the same position.

use crate::error::{CoreError, CoreResult};
use crate::types::Position;
use std::fmt;
use std::sync::Arc;
use zlog_storage::{CasOutcome, Entry, EntryState, LogBackend};

/// Result of trying to fill a position.
#[derive(Debug)]
pub(crate) enum FillOutcome {
    /// This call moved the position from Empty to Filled.
    Filled,
    /// The position was already claimed; carries what is stored.
    Claimed(Entry),
}

/// Conditional reads and writes of individual log positions.
pub(crate) struct RecordStore {
    backend: Arc<dyn LogBackend>,
    log: String,
}

impl fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("log", &self.log)
            .finish_non_exhaustive()
    }
}

impl RecordStore {
    pub(crate) fn new(backend: Arc<dyn LogBackend>, log: impl Into<String>) -> Self {
        Self {
            backend,
            log: log.into(),
        }
    }

    /// Reads the raw entry at `position`.
    pub(crate) fn entry(&self, position: Position) -> CoreResult<Entry> {
        Ok(self.backend.read_entry(&self.log, position.as_u64())?)
    }

    /// Reads the raw entries at `[start, end)`.
    pub(crate) fn entries(&self, start: Position, end: Position) -> CoreResult<Vec<Entry>> {
        Ok(self
            .backend
            .read_range(&self.log, start.as_u64(), end.as_u64())?)
    }

    /// Stores `entry` if the position is still Empty.
    ///
    /// Returns `None` on success, or the entry that beat us to it.
    pub(crate) fn write_if_empty(
        &self,
        position: Position,
        entry: Entry,
    ) -> CoreResult<Option<Entry>> {
        match self.backend.compare_and_swap(
            &self.log,
            position.as_u64(),
            EntryState::Empty,
            entry,
        )? {
            CasOutcome::Swapped => Ok(None),
            CasOutcome::Mismatch(current) => Ok(Some(current)),
        }
    }

    /// Moves an Empty position to Filled.
    pub(crate) fn fill(&self, position: Position) -> CoreResult<FillOutcome> {
        Ok(match self.write_if_empty(position, Entry::filled())? {
            None => FillOutcome::Filled,
            Some(current) => FillOutcome::Claimed(current),
        })
    }

    /// Marks the position Trimmed, whatever its state.
    ///
    /// Returns true if this call made the transition, false if the
    /// position was already trimmed.
    pub(crate) fn trim(&self, position: Position) -> CoreResult<bool> {
        let mut current = self.entry(position)?;
        // Terminates: each mismatch observes a strictly later state.
        loop {
            if current.state == EntryState::Trimmed {
                return Ok(false);
            }
            let expected = current.state;
            match self.backend.compare_and_swap(
                &self.log,
                position.as_u64(),
                expected,
                current.into_trimmed(),
            )? {
                CasOutcome::Swapped => return Ok(true),
                CasOutcome::Mismatch(now) => current = now,
            }
        }
    }

    /// Copies the payload at `position` into `buf`.
    ///
    /// Returns the full payload size, which exceeds `buf.len()` when the
    /// copy was truncated.
    pub(crate) fn read(&self, position: Position, buf: &mut [u8]) -> CoreResult<usize> {
        let entry = self.entry(position)?;
        let payload = written_payload(position, entry)?;
        let n = payload.len().min(buf.len());
        buf[..n].copy_from_slice(&payload[..n]);
        Ok(payload.len())
    }

    /// Returns the payload at `position`.
    pub(crate) fn read_to_vec(&self, position: Position) -> CoreResult<Vec<u8>> {
        written_payload(position, self.entry(position)?)
    }
}

fn written_payload(position: Position, entry: Entry) -> CoreResult<Vec<u8>> {
    match entry.state {
        EntryState::Written => Ok(entry.payload),
        EntryState::Empty => Err(CoreError::NotWritten { position }),
        EntryState::Filled => Err(CoreError::Filled { position }),
        EntryState::Trimmed => Err(CoreError::Trimmed { position }),
    }
}
