//! Per-handle log statistics.
//!
//! Counters cover operations issued through one `Log` handle (and the
//! stream handles opened from it), not the whole shared log.
//!
//! # Usage
//!
//! ```rust,ignore
//! let log = Log::open(backend, "events")?;
//! log.append(b"payload")?;
//!
//! let stats = log.stats().snapshot();
//! println!("appends: {}, lost races: {}", stats.appends, stats.append_retries);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Log statistics.
///
/// All counters are atomic and can be read while operations are in progress.
#[derive(Debug, Default)]
pub struct LogStats {
    /// Records written by append, multi-append and batch append.
    appends: AtomicU64,
    /// Positions lost to another actor during an append.
    append_retries: AtomicU64,
    /// Payload bytes written.
    bytes_appended: AtomicU64,
    /// Positions this handle filled, including holes filled by stream sync.
    fills: AtomicU64,
    /// Trim calls that completed.
    trims: AtomicU64,
    /// Successful reads.
    reads: AtomicU64,
    /// Payload bytes returned by reads.
    bytes_read: AtomicU64,
    /// Stream syncs performed.
    stream_syncs: AtomicU64,
}

impl LogStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_append(&self, bytes: u64) {
        self.appends.fetch_add(1, Ordering::Relaxed);
        self.bytes_appended.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_append_retry(&self) {
        self.append_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fill(&self) {
        self.fills.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_trim(&self) {
        self.trims.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_read(&self, bytes: u64) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_stream_sync(&self) {
        self.stream_syncs.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of records appended.
    pub fn appends(&self) -> u64 {
        self.appends.load(Ordering::Relaxed)
    }

    /// Returns the number of positions lost to other actors.
    pub fn append_retries(&self) -> u64 {
        self.append_retries.load(Ordering::Relaxed)
    }

    /// Returns the number of positions filled.
    pub fn fills(&self) -> u64 {
        self.fills.load(Ordering::Relaxed)
    }

    /// Returns the number of completed trims.
    pub fn trims(&self) -> u64 {
        self.trims.load(Ordering::Relaxed)
    }

    /// Returns the number of successful reads.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            appends: self.appends(),
            append_retries: self.append_retries(),
            bytes_appended: self.bytes_appended.load(Ordering::Relaxed),
            fills: self.fills(),
            trims: self.trims(),
            reads: self.reads(),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            stream_syncs: self.stream_syncs.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`LogStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Records appended.
    pub appends: u64,
    /// Positions lost to other actors.
    pub append_retries: u64,
    /// Payload bytes written.
    pub bytes_appended: u64,
    /// Positions filled.
    pub fills: u64,
    /// Completed trims.
    pub trims: u64,
    /// Successful reads.
    pub reads: u64,
    /// Payload bytes read.
    pub bytes_read: u64,
    /// Stream syncs performed.
    pub stream_syncs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = LogStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn record_operations() {
        let stats = LogStats::new();

        stats.record_append(10);
        stats.record_append(5);
        stats.record_append_retry();
        stats.record_read(7);
        stats.record_fill();

        let snap = stats.snapshot();
        assert_eq!(snap.appends, 2);
        assert_eq!(snap.bytes_appended, 15);
        assert_eq!(snap.append_retries, 1);
        assert_eq!(snap.reads, 1);
        assert_eq!(snap.bytes_read, 7);
        assert_eq!(snap.fills, 1);
        assert_eq!(snap.trims, 0);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(LogStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        s.record_append(1);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(stats.appends(), 800);
    }
}
