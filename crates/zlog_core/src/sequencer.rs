//! Position allocation.
//!
//! A sequencer hands out unique, strictly increasing positions. The log
//! holds it as an injected capability: production logs use
//! [`BackendSequencer`], whose counter lives in the shared backend, and
//! tests may substitute a [`MemorySequencer`].
//!
//! ## Invariants
//!
//! - `check_tail(true)` never returns the same position twice, to any
//!   caller, in any process sharing the counter
//! - `check_tail_batch(n)` reserves `n` contiguous positions in one step;
//!   either all are reserved or none
//! - `check_tail(false)` has no side effects

use crate::error::{CoreError, CoreResult};
use crate::types::Position;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use zlog_storage::LogBackend;

/// Atomic position allocator.
pub trait Sequencer: Send + Sync {
    /// Returns the tail, allocating it when `advance` is true.
    ///
    /// Without `advance` the result is the next position that would be
    /// handed out.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the counter cannot be reached. Nothing
    /// is allocated in that case.
    fn check_tail(&self, advance: bool) -> CoreResult<Position>;

    /// Allocates `count` contiguous positions as one operation.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` if `count` is zero, or a storage error if the
    /// counter cannot be reached.
    fn check_tail_batch(&self, count: usize) -> CoreResult<Vec<Position>>;
}

fn batch_from(first: u64, count: usize) -> Vec<Position> {
    (first..first + count as u64).map(Position::new).collect()
}

/// Sequencer backed by the backend's atomic counter.
pub struct BackendSequencer {
    backend: Arc<dyn LogBackend>,
    log: String,
}

impl BackendSequencer {
    /// Creates a sequencer for the named log.
    pub fn new(backend: Arc<dyn LogBackend>, log: impl Into<String>) -> Self {
        Self {
            backend,
            log: log.into(),
        }
    }
}

impl fmt::Debug for BackendSequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendSequencer")
            .field("log", &self.log)
            .finish_non_exhaustive()
    }
}

impl Sequencer for BackendSequencer {
    fn check_tail(&self, advance: bool) -> CoreResult<Position> {
        let pos = if advance {
            self.backend.allocate(&self.log, 1)?
        } else {
            self.backend.tail(&self.log)?
        };
        Ok(Position::new(pos))
    }

    fn check_tail_batch(&self, count: usize) -> CoreResult<Vec<Position>> {
        if count == 0 {
            return Err(CoreError::invalid("batch size must be positive"));
        }
        let first = self.backend.allocate(&self.log, count as u64)?;
        Ok(batch_from(first, count))
    }
}

/// In-process counter.
///
/// Only unique within the process that owns it; meant for tests and for
/// logs that are never shared.
#[derive(Debug, Default)]
pub struct MemorySequencer {
    next: AtomicU64,
}

impl MemorySequencer {
    /// Creates a sequencer whose first position is 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sequencer whose first position is `start`.
    #[must_use]
    pub fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }

    fn reserve(&self, count: u64) -> CoreResult<u64> {
        self.next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| {
                next.checked_add(count)
            })
            .map_err(|_| CoreError::invalid("position space exhausted"))
    }
}

impl Sequencer for MemorySequencer {
    fn check_tail(&self, advance: bool) -> CoreResult<Position> {
        if advance {
            self.reserve(1).map(Position::new)
        } else {
            Ok(Position::new(self.next.load(Ordering::SeqCst)))
        }
    }

    fn check_tail_batch(&self, count: usize) -> CoreResult<Vec<Position>> {
        if count == 0 {
            return Err(CoreError::invalid("batch size must be positive"));
        }
        let first = self.reserve(count as u64)?;
        Ok(batch_from(first, count))
    }
}
