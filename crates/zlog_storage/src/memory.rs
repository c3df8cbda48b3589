//! In-memory backend for testing.

use crate::backend::LogBackend;
use crate::entry::{CasOutcome, Entry, EntryState, LogMetadata};
use crate::error::{StorageError, StorageResult};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// An in-memory backend.
///
/// This backend keeps every log in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Single-process logs that don't need persistence
///
/// # Thread Safety
///
/// Each stripe is guarded by its own mutex and the position counter by
/// another, so conditional writes to different stripes proceed in parallel.
///
/// # Example
///
/// ```rust
/// use zlog_storage::{Entry, EntryState, InMemoryBackend, LogBackend};
///
/// let backend = InMemoryBackend::new();
/// backend.create_log("events", 4).unwrap();
/// let pos = backend.allocate("events", 1).unwrap();
/// let outcome = backend
///     .compare_and_swap("events", pos, EntryState::Empty, Entry::written(b"hi".to_vec(), vec![]))
///     .unwrap();
/// assert!(outcome.is_swapped());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    logs: RwLock<HashMap<String, Arc<MemoryLog>>>,
}

type Stripe = Arc<Mutex<BTreeMap<u64, Entry>>>;

#[derive(Debug)]
struct MemoryLog {
    meta: LogMetadata,
    tail: Mutex<u64>,
    // Stripes are created on first write.
    stripes: RwLock<HashMap<u32, Stripe>>,
}

impl MemoryLog {
    fn new(meta: LogMetadata) -> Self {
        Self {
            meta,
            tail: Mutex::new(0),
            stripes: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the stripe holding `position`, if anything was ever written to it.
    fn existing_stripe(&self, position: u64) -> Option<Stripe> {
        let index = self.meta.stripe_of(position);
        self.stripes.read().get(&index).cloned()
    }

    fn stripe(&self, position: u64) -> Stripe {
        if let Some(stripe) = self.existing_stripe(position) {
            return stripe;
        }
        let index = self.meta.stripe_of(position);
        Arc::clone(self.stripes.write().entry(index).or_default())
    }
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the names of all registered logs, sorted.
    #[must_use]
    pub fn log_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.logs.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the number of non-empty positions stored for a log.
    ///
    /// Useful for testing and debugging.
    pub fn stored_entries(&self, name: &str) -> StorageResult<usize> {
        let log = self.get(name)?;
        let stripes = log.stripes.read();
        let count = stripes.values().map(|s| s.lock().len()).sum();
        Ok(count)
    }

    fn get(&self, name: &str) -> StorageResult<Arc<MemoryLog>> {
        self.logs
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::LogNotFound {
                name: name.to_string(),
            })
    }
}

impl LogBackend for InMemoryBackend {
    fn create_log(&self, name: &str, stripe_width: u32) -> StorageResult<LogMetadata> {
        if stripe_width == 0 {
            return Err(StorageError::InvalidArgument(
                "stripe width must be positive".into(),
            ));
        }

        let mut logs = self.logs.write();
        if logs.contains_key(name) {
            return Err(StorageError::LogExists {
                name: name.to_string(),
            });
        }

        let meta = LogMetadata {
            name: name.to_string(),
            stripe_width,
        };
        logs.insert(name.to_string(), Arc::new(MemoryLog::new(meta.clone())));
        Ok(meta)
    }

    fn log_metadata(&self, name: &str) -> StorageResult<LogMetadata> {
        Ok(self.get(name)?.meta.clone())
    }

    fn tail(&self, name: &str) -> StorageResult<u64> {
        Ok(*self.get(name)?.tail.lock())
    }

    fn allocate(&self, name: &str, count: u64) -> StorageResult<u64> {
        if count == 0 {
            return Err(StorageError::InvalidArgument(
                "cannot allocate zero positions".into(),
            ));
        }

        let log = self.get(name)?;
        let mut tail = log.tail.lock();
        let first = *tail;
        *tail = first
            .checked_add(count)
            .ok_or_else(|| StorageError::InvalidArgument("position space exhausted".into()))?;
        Ok(first)
    }

    fn read_entry(&self, name: &str, position: u64) -> StorageResult<Entry> {
        let log = self.get(name)?;
        let Some(stripe) = log.existing_stripe(position) else {
            return Ok(Entry::empty());
        };
        let entry = stripe.lock().get(&position).cloned().unwrap_or_default();
        Ok(entry)
    }

    fn compare_and_swap(
        &self,
        name: &str,
        position: u64,
        expected: EntryState,
        entry: Entry,
    ) -> StorageResult<CasOutcome> {
        let log = self.get(name)?;
        let stripe = log.stripe(position);
        let mut stripe = stripe.lock();

        let current_state = stripe
            .get(&position)
            .map_or(EntryState::Empty, |e| e.state);
        if current_state != expected {
            let current = stripe.get(&position).cloned().unwrap_or_default();
            return Ok(CasOutcome::Mismatch(current));
        }

        stripe.insert(position, entry);
        Ok(CasOutcome::Swapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn backend_with_log() -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        backend.create_log("log", 3).unwrap();
        backend
    }

    #[test]
    fn memory_create_and_lookup() {
        let backend = backend_with_log();
        let meta = backend.log_metadata("log").unwrap();
        assert_eq!(meta.name, "log");
        assert_eq!(meta.stripe_width, 3);
        assert_eq!(backend.log_names(), vec!["log".to_string()]);
    }

    #[test]
    fn memory_create_twice_fails() {
        let backend = backend_with_log();
        let result = backend.create_log("log", 3);
        assert!(matches!(result, Err(StorageError::LogExists { .. })));
    }

    #[test]
    fn memory_zero_stripe_width_rejected() {
        let backend = InMemoryBackend::new();
        let result = backend.create_log("log", 0);
        assert!(matches!(result, Err(StorageError::InvalidArgument(_))));
    }

    #[test]
    fn memory_widest_stripe_width_is_cheap() {
        let backend = InMemoryBackend::new();
        backend.create_log("wide", u32::MAX).unwrap();
        assert_eq!(backend.log_metadata("wide").unwrap().stripe_width, u32::MAX);
        assert_eq!(backend.stored_entries("wide").unwrap(), 0);

        let pos = backend.allocate("wide", 1).unwrap();
        assert_eq!(backend.read_entry("wide", pos).unwrap(), Entry::empty());
        let outcome = backend
            .compare_and_swap("wide", pos, EntryState::Empty, Entry::filled())
            .unwrap();
        assert!(outcome.is_swapped());
        assert_eq!(backend.stored_entries("wide").unwrap(), 1);
    }

    #[test]
    fn memory_unknown_log() {
        let backend = InMemoryBackend::new();
        assert!(matches!(
            backend.tail("nope"),
            Err(StorageError::LogNotFound { .. })
        ));
    }

    #[test]
    fn memory_allocate_is_contiguous() {
        let backend = backend_with_log();
        assert_eq!(backend.tail("log").unwrap(), 0);
        assert_eq!(backend.allocate("log", 1).unwrap(), 0);
        assert_eq!(backend.allocate("log", 5).unwrap(), 1);
        assert_eq!(backend.tail("log").unwrap(), 6);
    }

    #[test]
    fn memory_allocate_zero_fails() {
        let backend = backend_with_log();
        assert!(backend.allocate("log", 0).is_err());
        assert_eq!(backend.tail("log").unwrap(), 0);
    }

    #[test]
    fn memory_unwritten_reads_empty() {
        let backend = backend_with_log();
        assert_eq!(backend.read_entry("log", 99).unwrap(), Entry::empty());
    }

    #[test]
    fn memory_cas_only_applies_on_expected_state() {
        let backend = backend_with_log();
        let written = Entry::written(b"data".to_vec(), vec![7]);

        let first = backend
            .compare_and_swap("log", 4, EntryState::Empty, written.clone())
            .unwrap();
        assert!(first.is_swapped());

        let second = backend
            .compare_and_swap("log", 4, EntryState::Empty, Entry::filled())
            .unwrap();
        assert_eq!(second, CasOutcome::Mismatch(written.clone()));
        assert_eq!(backend.read_entry("log", 4).unwrap(), written);
        assert_eq!(backend.stored_entries("log").unwrap(), 1);
    }

    #[test]
    fn memory_concurrent_allocations_are_unique() {
        let backend = Arc::new(backend_with_log());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let backend = Arc::clone(&backend);
                thread::spawn(move || {
                    (0..100)
                        .map(|_| backend.allocate("log", 1).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 800);
        assert_eq!(backend.tail("log").unwrap(), 800);
    }
}
