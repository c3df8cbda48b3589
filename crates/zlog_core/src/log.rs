//! Log facade and lifecycle.

use crate::config::{Config, RetryPolicy};
use crate::error::{CoreError, CoreResult};
use crate::record::{FillOutcome, RecordStore};
use crate::sequencer::{BackendSequencer, Sequencer};
use crate::stats::LogStats;
use crate::stream::StreamHandle;
use crate::types::{Position, StreamId};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};
use zlog_storage::{Entry, EntryState, LogBackend, LogMetadata, StorageError};

/// Handle to a shared, totally ordered log.
///
/// `Log` is the primary entry point. It provides:
/// - Position allocation (`check_tail`, `check_tail_batch`)
/// - Conditional appends with transparent retry on lost races
/// - Fill and trim tombstones
/// - Multi-stream appends and stream handles
///
/// Many handles, in many processes, may operate on the same log at once.
/// Correctness comes only from the backend's atomic primitives; there is
/// no in-process lock on the write path.
///
/// # Lifecycle
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use zlog_core::Log;
/// use zlog_storage::InMemoryBackend;
///
/// let backend = Arc::new(InMemoryBackend::new());
/// let log = Log::create(backend.clone(), "mylog", 5)?;
/// let pos = log.append(b"hello")?;
///
/// // Releases the local handle; the log stays in the backend.
/// log.close();
/// let log = Log::open(backend, "mylog")?;
/// assert_eq!(log.read_to_vec(pos)?, b"hello");
/// ```
///
/// Cloning is cheap and clones share statistics. The backend handle is
/// released when the last clone, including any open stream handle, is
/// dropped.
#[derive(Clone)]
pub struct Log {
    inner: Arc<LogInner>,
}

struct LogInner {
    meta: LogMetadata,
    config: Config,
    records: RecordStore,
    sequencer: Arc<dyn Sequencer>,
    stats: LogStats,
}

impl fmt::Debug for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Log")
            .field("name", &self.inner.meta.name)
            .field("stripe_width", &self.inner.meta.stripe_width)
            .finish_non_exhaustive()
    }
}

impl Drop for LogInner {
    fn drop(&mut self) {
        debug!(log = %self.meta.name, "released log handle");
    }
}

impl Log {
    /// Creates a new log.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` for an empty name or a zero stripe width, and
    /// `LogExists` if the name is taken.
    pub fn create(
        backend: Arc<dyn LogBackend>,
        name: &str,
        stripe_width: u32,
    ) -> CoreResult<Self> {
        let config = Config::new()
            .create_if_missing(true)
            .error_if_exists(true)
            .stripe_width(stripe_width);
        Self::open_with_config(backend, name, config)
    }

    /// Opens an existing log.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` for an empty name and `LogNotFound` if no such
    /// log exists.
    pub fn open(backend: Arc<dyn LogBackend>, name: &str) -> CoreResult<Self> {
        Self::open_with_config(backend, name, Config::new())
    }

    /// Opens a log, creating it with `stripe_width` if it doesn't exist.
    pub fn open_or_create(
        backend: Arc<dyn LogBackend>,
        name: &str,
        stripe_width: u32,
    ) -> CoreResult<Self> {
        let config = Config::new()
            .create_if_missing(true)
            .stripe_width(stripe_width);
        Self::open_with_config(backend, name, config)
    }

    /// Opens a log with a custom configuration.
    ///
    /// Positions are allocated by the backend's counter.
    pub fn open_with_config(
        backend: Arc<dyn LogBackend>,
        name: &str,
        config: Config,
    ) -> CoreResult<Self> {
        let sequencer = Arc::new(BackendSequencer::new(Arc::clone(&backend), name));
        Self::open_with_sequencer(backend, name, config, sequencer)
    }

    /// Opens a log with a custom configuration and position allocator.
    ///
    /// The sequencer must be the only allocator for this log, or share its
    /// counter with every other handle; otherwise appends from different
    /// handles will keep colliding.
    pub fn open_with_sequencer(
        backend: Arc<dyn LogBackend>,
        name: &str,
        config: Config,
        sequencer: Arc<dyn Sequencer>,
    ) -> CoreResult<Self> {
        if name.is_empty() {
            return Err(CoreError::invalid("log name must not be empty"));
        }
        if config.create_if_missing && config.stripe_width == 0 {
            return Err(CoreError::invalid("stripe width must be positive"));
        }

        let meta = Self::resolve(backend.as_ref(), name, &config)?;
        debug!(log = %meta.name, stripe_width = meta.stripe_width, "opened log");

        Ok(Self {
            inner: Arc::new(LogInner {
                records: RecordStore::new(backend, name),
                meta,
                config,
                sequencer,
                stats: LogStats::new(),
            }),
        })
    }

    fn resolve(backend: &dyn LogBackend, name: &str, config: &Config) -> CoreResult<LogMetadata> {
        match backend.log_metadata(name) {
            Ok(_) if config.error_if_exists => Err(CoreError::LogExists {
                name: name.to_string(),
            }),
            Ok(meta) => Ok(meta),
            Err(StorageError::LogNotFound { .. }) if config.create_if_missing => {
                match backend.create_log(name, config.stripe_width) {
                    Ok(meta) => {
                        info!(log = %name, stripe_width = meta.stripe_width, "created log");
                        Ok(meta)
                    }
                    // Lost a creation race to another client.
                    Err(StorageError::LogExists { .. }) if !config.error_if_exists => {
                        backend.log_metadata(name).map_err(CoreError::from_lifecycle)
                    }
                    Err(e) => Err(CoreError::from_lifecycle(e)),
                }
            }
            Err(e) => Err(CoreError::from_lifecycle(e)),
        }
    }

    /// Releases this handle. Data in the backend is untouched.
    pub fn close(self) {
        drop(self);
    }

    /// Returns the log name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.meta.name
    }

    /// Returns the stripe width the log was created with.
    #[must_use]
    pub fn stripe_width(&self) -> u32 {
        self.inner.meta.stripe_width
    }

    /// Returns the configuration this handle was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Returns statistics for this handle and its clones.
    #[must_use]
    pub fn stats(&self) -> &LogStats {
        &self.inner.stats
    }

    // === Sequencing ===

    /// Returns the tail, allocating it when `advance` is true.
    pub fn check_tail(&self, advance: bool) -> CoreResult<Position> {
        self.inner.sequencer.check_tail(advance)
    }

    /// Allocates `count` contiguous positions in one step.
    pub fn check_tail_batch(&self, count: usize) -> CoreResult<Vec<Position>> {
        self.inner.sequencer.check_tail_batch(count)
    }

    // === Appends ===

    /// Appends `data` and returns the position it landed at.
    ///
    /// If another actor claims the allocated position first (for example a
    /// concurrent fill), the append moves on to a fresh position according
    /// to the configured [`RetryPolicy`].
    ///
    /// # Errors
    ///
    /// Returns `Invalid` for an empty payload, `AppendContention` if a
    /// bounded retry policy runs out, or a storage error.
    pub fn append(&self, data: &[u8]) -> CoreResult<Position> {
        if data.is_empty() {
            return Err(CoreError::invalid("payload must not be empty"));
        }
        self.inner
            .append_entry(Entry::written(data.to_vec(), Vec::new()))
    }

    /// Appends `data` as a member of every stream in `stream_ids`.
    ///
    /// Payload and membership are committed together: a concurrent
    /// [`Log::stream_membership`] sees either nothing or the full set.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` for an empty payload, an empty stream set, or a
    /// stream listed twice.
    pub fn multi_append(&self, data: &[u8], stream_ids: &[StreamId]) -> CoreResult<Position> {
        if data.is_empty() {
            return Err(CoreError::invalid("payload must not be empty"));
        }
        if stream_ids.is_empty() {
            return Err(CoreError::invalid("stream set must not be empty"));
        }
        let mut seen = HashSet::with_capacity(stream_ids.len());
        if let Some(dup) = stream_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(CoreError::invalid(format!("{dup} listed more than once")));
        }

        let streams = stream_ids.iter().map(|id| id.as_u64()).collect();
        self.inner
            .append_entry(Entry::written(data.to_vec(), streams))
    }

    /// Appends several payloads with a single allocation round trip.
    ///
    /// Positions are returned in input order: the `i`th position holds the
    /// `i`th payload. A record whose reserved position was claimed by
    /// someone else is appended individually after the reserved block, so
    /// the returned positions are unique but neither contiguous nor
    /// necessarily increasing.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` if any payload is empty; nothing is allocated in
    /// that case.
    pub fn append_batch<T: AsRef<[u8]>>(&self, payloads: &[T]) -> CoreResult<Vec<Position>> {
        if payloads.is_empty() {
            return Ok(Vec::new());
        }
        if payloads.iter().any(|p| p.as_ref().is_empty()) {
            return Err(CoreError::invalid("payload must not be empty"));
        }

        let reserved = self.check_tail_batch(payloads.len())?;
        let mut positions = Vec::with_capacity(payloads.len());
        for (payload, position) in payloads.iter().zip(reserved) {
            let data = payload.as_ref();
            let entry = Entry::written(data.to_vec(), Vec::new());
            match self.inner.records.write_if_empty(position, entry)? {
                None => {
                    self.inner.stats.record_append(data.len() as u64);
                    positions.push(position);
                }
                Some(current) => {
                    self.inner.stats.record_append_retry();
                    debug!(
                        log = %self.name(),
                        %position,
                        state = %current.state,
                        "batch position claimed, appending individually"
                    );
                    positions.push(self.append(data)?);
                }
            }
        }
        Ok(positions)
    }

    // === Tombstones ===

    /// Fills `position`, so no append can ever land there.
    ///
    /// Filling a filled or trimmed position succeeds.
    ///
    /// # Errors
    ///
    /// Returns `ReadOnly` if the position holds a completed append.
    pub fn fill(&self, position: Position) -> CoreResult<()> {
        match self.inner.records.fill(position)? {
            FillOutcome::Filled => {
                self.inner.stats.record_fill();
                debug!(log = %self.name(), %position, "filled position");
                Ok(())
            }
            FillOutcome::Claimed(entry) => match entry.state {
                EntryState::Written => Err(CoreError::ReadOnly { position }),
                _ => Ok(()),
            },
        }
    }

    /// Trims `position`, logically deleting it.
    ///
    /// Succeeds for every prior state, including positions never written
    /// and positions already trimmed. Stream histories keep the position.
    pub fn trim(&self, position: Position) -> CoreResult<()> {
        if self.inner.records.trim(position)? {
            debug!(log = %self.name(), %position, "trimmed position");
        }
        self.inner.stats.record_trim();
        Ok(())
    }

    // === Reads ===

    /// Reads the record at `position` into `buf`.
    ///
    /// Copies at most `buf.len()` bytes and returns the record's full
    /// size; a return value larger than `buf.len()` means the copy was
    /// truncated.
    ///
    /// # Errors
    ///
    /// Returns `NotWritten`, `Filled` or `Trimmed` depending on the state
    /// of the position.
    pub fn read(&self, position: Position, buf: &mut [u8]) -> CoreResult<usize> {
        let size = self.inner.records.read(position, buf)?;
        self.inner
            .stats
            .record_read(size.min(buf.len()) as u64);
        Ok(size)
    }

    /// Reads the record at `position` into a new buffer.
    pub fn read_to_vec(&self, position: Position) -> CoreResult<Vec<u8>> {
        let data = self.inner.records.read_to_vec(position)?;
        self.inner.stats.record_read(data.len() as u64);
        Ok(data)
    }

    /// Returns the state of `position`.
    pub fn state(&self, position: Position) -> CoreResult<EntryState> {
        Ok(self.inner.records.entry(position)?.state)
    }

    // === Streams ===

    /// Returns the streams `position` was appended to, in append order.
    ///
    /// Plain appends and filled positions have no members. Trimming does
    /// not change membership.
    ///
    /// # Errors
    ///
    /// Returns `NotWritten` if nothing is stored at the position.
    pub fn stream_membership(&self, position: Position) -> CoreResult<Vec<StreamId>> {
        let entry = self.inner.records.entry(position)?;
        if entry.state == EntryState::Empty {
            return Err(CoreError::NotWritten { position });
        }
        Ok(entry.streams.into_iter().map(StreamId::new).collect())
    }

    /// Opens a handle on stream `id` and syncs it with the log.
    ///
    /// The stream needs no prior history.
    pub fn open_stream(&self, id: StreamId) -> CoreResult<StreamHandle> {
        StreamHandle::open(self.clone(), id)
    }

    // === Crate internals used by streams ===

    pub(crate) fn entries(&self, start: Position, end: Position) -> CoreResult<Vec<Entry>> {
        self.inner.records.entries(start, end)
    }

    /// Fills a hole found by a stream scan.
    ///
    /// Returns what the position holds afterwards, which is the writer's
    /// entry if the writer got there first.
    pub(crate) fn fill_hole(&self, position: Position) -> CoreResult<Entry> {
        match self.inner.records.fill(position)? {
            FillOutcome::Filled => {
                self.inner.stats.record_fill();
                debug!(log = %self.name(), %position, "filled hole during stream sync");
                Ok(Entry::filled())
            }
            FillOutcome::Claimed(entry) => Ok(entry),
        }
    }
}

impl LogInner {
    /// Allocates positions until `entry` lands on one.
    fn append_entry(&self, entry: Entry) -> CoreResult<Position> {
        let policy: RetryPolicy = self.config.retry_policy;
        let bytes = entry.payload.len() as u64;
        let mut attempts: u32 = 0;

        loop {
            attempts = attempts.saturating_add(1);
            let position = self.sequencer.check_tail(true)?;

            let Some(current) = self.records.write_if_empty(position, entry.clone())? else {
                self.stats.record_append(bytes);
                return Ok(position);
            };

            self.stats.record_append_retry();
            debug!(
                log = %self.meta.name,
                %position,
                state = %current.state,
                attempts,
                "lost position race, retrying on a fresh position"
            );

            if !policy.allows_retry(attempts) {
                warn!(log = %self.meta.name, attempts, "append retry policy exhausted");
                return Err(CoreError::AppendContention { attempts });
            }
            if !policy.backoff.is_zero() {
                thread::sleep(policy.backoff);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::MemorySequencer;
    use zlog_storage::InMemoryBackend;

    fn backend() -> Arc<dyn LogBackend> {
        Arc::new(InMemoryBackend::new())
    }

    #[test]
    fn create_validates_arguments() {
        let backend = backend();
        assert!(matches!(
            Log::create(backend.clone(), "mylog", 0),
            Err(CoreError::Invalid { .. })
        ));
        assert!(matches!(
            Log::create(backend.clone(), "", 5),
            Err(CoreError::Invalid { .. })
        ));

        let log = Log::create(backend.clone(), "mylog", 5).unwrap();
        assert_eq!(log.name(), "mylog");
        assert_eq!(log.stripe_width(), 5);
        log.close();

        assert!(matches!(
            Log::create(backend, "mylog", 5),
            Err(CoreError::LogExists { .. })
        ));
    }

    #[test]
    fn open_requires_existing_log() {
        let backend = backend();
        assert!(matches!(
            Log::open(backend.clone(), ""),
            Err(CoreError::Invalid { .. })
        ));
        assert!(matches!(
            Log::open(backend.clone(), "dne"),
            Err(CoreError::LogNotFound { .. })
        ));

        Log::create(backend.clone(), "mylog", 5).unwrap();
        let log = Log::open(backend, "mylog").unwrap();
        assert_eq!(log.stripe_width(), 5);
    }

    #[test]
    fn open_or_create_is_idempotent() {
        let backend = backend();
        let first = Log::open_or_create(backend.clone(), "mylog", 3).unwrap();
        let pos = first.append(b"x").unwrap();

        // Existing stripe width wins over the requested one.
        let second = Log::open_or_create(backend, "mylog", 9).unwrap();
        assert_eq!(second.stripe_width(), 3);
        assert_eq!(second.read_to_vec(pos).unwrap(), b"x");
    }

    #[test]
    fn append_rejects_empty_payload() {
        let log = Log::create(backend(), "log", 2).unwrap();
        assert!(matches!(log.append(b""), Err(CoreError::Invalid { .. })));
        assert_eq!(log.check_tail(false).unwrap(), Position::new(0));
    }

    #[test]
    fn append_skips_filled_position() {
        let log = Log::create(backend(), "log", 2).unwrap();
        let tail = log.check_tail(false).unwrap();
        log.fill(tail).unwrap();

        let pos = log.append(b"data").unwrap();
        assert_eq!(pos, tail.next());
        assert_eq!(log.stats().append_retries(), 1);
        assert!(matches!(log.read(tail, &mut [0u8; 4]), Err(CoreError::Filled { .. })));
    }

    #[test]
    fn bounded_policy_surfaces_contention() {
        let config = Config::new()
            .create_if_missing(true)
            .retry_policy(RetryPolicy::bounded(2));
        let log = Log::open_with_config(backend(), "log", config).unwrap();

        log.fill(Position::new(0)).unwrap();
        log.fill(Position::new(1)).unwrap();

        let err = log.append(b"data").unwrap_err();
        assert!(matches!(err, CoreError::AppendContention { attempts: 2 }));
        // Both lost positions were consumed.
        assert_eq!(log.check_tail(false).unwrap(), Position::new(2));
    }

    #[test]
    fn injected_sequencer_is_used() {
        let backend = backend();
        backend.create_log("log", 4).unwrap();
        let log = Log::open_with_sequencer(
            backend,
            "log",
            Config::new(),
            Arc::new(MemorySequencer::starting_at(100)),
        )
        .unwrap();

        assert_eq!(log.append(b"a").unwrap(), Position::new(100));
        assert_eq!(log.check_tail(false).unwrap(), Position::new(101));
    }

    #[test]
    fn multi_append_validation() {
        let log = Log::create(backend(), "log", 2).unwrap();
        assert!(matches!(
            log.multi_append(b"data", &[]),
            Err(CoreError::Invalid { .. })
        ));
        assert!(matches!(
            log.multi_append(b"", &[StreamId::new(1)]),
            Err(CoreError::Invalid { .. })
        ));
        assert!(matches!(
            log.multi_append(b"data", &[StreamId::new(1), StreamId::new(1)]),
            Err(CoreError::Invalid { .. })
        ));
    }

    #[test]
    fn membership_of_plain_filled_and_trimmed_positions() {
        let log = Log::create(backend(), "log", 2).unwrap();

        assert!(matches!(
            log.stream_membership(Position::new(0)),
            Err(CoreError::NotWritten { .. })
        ));

        let plain = log.append(b"plain").unwrap();
        assert!(log.stream_membership(plain).unwrap().is_empty());

        log.fill(Position::new(50)).unwrap();
        assert!(log.stream_membership(Position::new(50)).unwrap().is_empty());

        let ids = [StreamId::new(3), StreamId::new(1)];
        let member = log.multi_append(b"m", &ids).unwrap();
        log.trim(member).unwrap();
        assert_eq!(log.stream_membership(member).unwrap(), ids.to_vec());
    }

    #[test]
    fn batch_append_falls_back_on_claimed_positions() {
        let log = Log::create(backend(), "log", 3).unwrap();
        log.fill(Position::new(1)).unwrap();

        let positions = log.append_batch(&[b"a".as_slice(), b"b", b"c"]).unwrap();
        assert_eq!(
            positions,
            vec![Position::new(0), Position::new(3), Position::new(2)]
        );
        assert_eq!(log.read_to_vec(Position::new(3)).unwrap(), b"b");
        assert_eq!(log.read_to_vec(Position::new(2)).unwrap(), b"c");
    }

    #[test]
    fn batch_append_validates_before_allocating() {
        let log = Log::create(backend(), "log", 3).unwrap();
        assert!(log.append_batch(&[b"a".as_slice(), b""]).is_err());
        assert_eq!(log.check_tail(false).unwrap(), Position::new(0));
        assert!(log.append_batch::<&[u8]>(&[]).unwrap().is_empty());
    }

    #[test]
    fn state_reports_transitions() {
        let log = Log::create(backend(), "log", 3).unwrap();
        let pos = log.append(b"a").unwrap();
        assert_eq!(log.state(pos).unwrap(), EntryState::Written);
        log.trim(pos).unwrap();
        assert_eq!(log.state(pos).unwrap(), EntryState::Trimmed);
        assert_eq!(log.state(Position::new(99)).unwrap(), EntryState::Empty);
    }
}
