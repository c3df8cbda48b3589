//! Backend trait definition.

use crate::entry::{CasOutcome, Entry, EntryState, LogMetadata};
use crate::error::StorageResult;

/// The shared durable store a log is built on.
///
/// Backends are **opaque state holders**. They know nothing about
/// appends, fills, trims or streams; they provide exactly three primitives
/// and the coordination protocol in `zlog_core` is built on top of them:
///
/// - an atomic position counter (`tail` / `allocate`)
/// - a per-position conditional write (`compare_and_swap`) and read
/// - a registry of logs and their creation parameters
///
/// # Invariants
///
/// - `allocate` never hands out the same position twice, across all
///   handles that share the underlying store
/// - `compare_and_swap` is all-or-nothing: payload and stream membership
///   of the new entry become visible together
/// - positions that were never written read back as [`Entry::empty`]
///
/// All methods take `&self`; implementations are shared across threads.
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing and single-process use
/// - [`super::FileBackend`] - Directory-backed, safe across processes
pub trait LogBackend: Send + Sync {
    /// Registers a new log.
    ///
    /// # Errors
    ///
    /// Returns `LogExists` if the name is already registered, or
    /// `InvalidArgument` if `stripe_width` is zero.
    fn create_log(&self, name: &str, stripe_width: u32) -> StorageResult<LogMetadata>;

    /// Looks up a registered log.
    ///
    /// # Errors
    ///
    /// Returns `LogNotFound` if no log with this name exists.
    fn log_metadata(&self, name: &str) -> StorageResult<LogMetadata>;

    /// Returns the next position the counter would hand out.
    fn tail(&self, name: &str) -> StorageResult<u64>;

    /// Atomically reserves `count` consecutive positions.
    ///
    /// Returns the first reserved position; the reservation covers
    /// `[first, first + count)`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `count` is zero.
    fn allocate(&self, name: &str, count: u64) -> StorageResult<u64>;

    /// Reads the entry stored at `position`.
    fn read_entry(&self, name: &str, position: u64) -> StorageResult<Entry>;

    /// Reads the entries at `[start, end)`, in position order.
    ///
    /// The default reads one position at a time. Backends that keep many
    /// positions in one object override this to load each object once.
    fn read_range(&self, name: &str, start: u64, end: u64) -> StorageResult<Vec<Entry>> {
        (start..end)
            .map(|position| self.read_entry(name, position))
            .collect()
    }

    /// Stores `entry` at `position` if the current state equals `expected`.
    ///
    /// On mismatch nothing is written and the stored entry is returned.
    fn compare_and_swap(
        &self,
        name: &str,
        position: u64,
        expected: EntryState,
        entry: Entry,
    ) -> StorageResult<CasOutcome>;
}
