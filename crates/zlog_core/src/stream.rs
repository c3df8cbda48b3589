//! Stream handles.
//!
//! A stream is the ordered subsequence of log positions whose membership
//! includes the stream's id. Membership is written together with the
//! payload, so a stream's history is recovered by scanning entries below
//! the tail; there is no separate index to keep consistent.
//!
//! ## Cursor semantics
//!
//! - `sync` only extends the history forward, in ascending position order
//! - `read_next` moves past trimmed positions without returning them
//! - `reset` rewinds to the first history entry
//!
//! A [`StreamHandle`] is a single-owner object. Its methods take
//! `&mut self`; sharing one handle across threads requires external
//! synchronization. Open one handle per consumer instead.

use crate::error::{CoreError, CoreResult};
use crate::log::Log;
use crate::types::{Position, StreamId};
use tracing::trace;
use zlog_storage::EntryState;

/// Positions fetched per backend round trip during `sync`.
const SYNC_WINDOW: u64 = 1024;

/// Client-local view of a stream.
#[derive(Debug, Default)]
struct StreamCursor {
    /// Member positions discovered so far, ascending.
    history: Vec<Position>,
    /// Index into `history` of the next record to return.
    next: usize,
    /// First position not yet scanned.
    scanned_to: Position,
}

/// Handle for appending to and consuming one stream.
#[derive(Debug)]
pub struct StreamHandle {
    log: Log,
    id: StreamId,
    cursor: StreamCursor,
}

impl StreamHandle {
    pub(crate) fn open(log: Log, id: StreamId) -> CoreResult<Self> {
        let mut handle = Self {
            log,
            id,
            cursor: StreamCursor::default(),
        };
        handle.sync()?;
        Ok(handle)
    }

    /// Returns the stream id.
    #[must_use]
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Appends `data` to this stream.
    ///
    /// The record takes a position in the shared log like any other
    /// append. It becomes visible to this handle's cursor after the next
    /// [`sync`](Self::sync).
    pub fn append(&self, data: &[u8]) -> CoreResult<Position> {
        self.log.multi_append(data, &[self.id])
    }

    /// Reads the next record of the stream into `buf`.
    ///
    /// Returns the record's full size (see [`Log::read`]) and its position,
    /// and advances the cursor past it.
    ///
    /// # Errors
    ///
    /// Returns `EndOfStream` once the known history is consumed; the cursor
    /// is not moved and a later `sync` may reveal more records. Other read
    /// errors leave the cursor on the failing position.
    pub fn read_next(&mut self, buf: &mut [u8]) -> CoreResult<(usize, Position)> {
        while let Some(&position) = self.cursor.history.get(self.cursor.next) {
            match self.log.read(position, buf) {
                Ok(size) => {
                    self.cursor.next += 1;
                    return Ok((size, position));
                }
                Err(CoreError::Trimmed { .. }) => {
                    trace!(stream = %self.id, %position, "skipping trimmed record");
                    self.cursor.next += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Err(CoreError::EndOfStream { stream_id: self.id })
    }

    /// Extends the history with members appended since the last sync.
    ///
    /// Holes below the tail are filled when the log was opened with
    /// `fill_gaps_on_sync`; otherwise the scan stops at the first hole.
    ///
    /// Entries are fetched in windows of `SYNC_WINDOW` positions, so a
    /// backend that stores positions in shared objects loads each object
    /// once per window.
    pub fn sync(&mut self) -> CoreResult<()> {
        let tail = self.log.check_tail(false)?;
        let fill_gaps = self.log.config().fill_gaps_on_sync;
        let start = self.cursor.scanned_to;
        let before = self.cursor.history.len();

        let mut position = start;
        'scan: while position < tail {
            let window_end = Position::new(
                tail.as_u64()
                    .min(position.as_u64().saturating_add(SYNC_WINDOW)),
            );
            for mut entry in self.log.entries(position, window_end)? {
                if entry.state == EntryState::Empty {
                    if !fill_gaps {
                        break 'scan;
                    }
                    entry = self.log.fill_hole(position)?;
                }
                if entry.has_stream(self.id.as_u64()) {
                    self.cursor.history.push(position);
                }
                position = position.next();
            }
        }
        self.cursor.scanned_to = position;

        self.log.stats().record_stream_sync();
        trace!(
            stream = %self.id,
            from = start.as_u64(),
            to = position.as_u64(),
            found = self.cursor.history.len() - before,
            "synced stream"
        );
        Ok(())
    }

    /// Rewinds the cursor to the first history entry.
    pub fn reset(&mut self) {
        self.cursor.next = 0;
    }

    /// Returns the member positions known to this handle, ascending.
    #[must_use]
    pub fn history(&self) -> Vec<Position> {
        self.cursor.history.clone()
    }

    /// Returns the position `read_next` will try next, if any.
    #[must_use]
    pub fn cursor_position(&self) -> Option<Position> {
        self.cursor.history.get(self.cursor.next).copied()
    }

    /// Returns the log this stream belongs to.
    #[must_use]
    pub fn log(&self) -> &Log {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Arc;
    use zlog_storage::{Entry, InMemoryBackend, LogBackend};

    fn log_with(config: Config) -> Log {
        Log::open_with_config(
            Arc::new(InMemoryBackend::new()),
            "log",
            config.create_if_missing(true),
        )
        .unwrap()
    }

    fn log() -> Log {
        log_with(Config::new())
    }

    #[test]
    fn stream_id_round_trip() {
        let log = log();
        for id in [0, 10, 11] {
            assert_eq!(log.open_stream(StreamId::new(id)).unwrap().id(), StreamId::new(id));
        }
    }

    #[test]
    fn replay_requires_sync() {
        let log = log();
        let mut stream = log.open_stream(StreamId::new(0)).unwrap();
        let mut buf = [0u8; 64];

        let pos = stream.append(b"record").unwrap();
        assert!(matches!(
            stream.read_next(&mut buf),
            Err(CoreError::EndOfStream { .. })
        ));

        stream.sync().unwrap();
        let (size, got) = stream.read_next(&mut buf).unwrap();
        assert_eq!((size, got), (6, pos));
        assert_eq!(&buf[..size], b"record");

        assert!(matches!(
            stream.read_next(&mut buf),
            Err(CoreError::EndOfStream { .. })
        ));

        stream.reset();
        let (size, got) = stream.read_next(&mut buf).unwrap();
        assert_eq!(got, pos);
        assert_eq!(&buf[..size], b"record");
    }

    #[test]
    fn history_filters_by_membership() {
        let log = log();
        let a = StreamId::new(1);
        let b = StreamId::new(2);

        let p0 = log.multi_append(b"ab", &[a, b]).unwrap();
        log.append(b"plain").unwrap();
        let p2 = log.multi_append(b"b", &[b]).unwrap();
        let p3 = log.multi_append(b"a", &[a]).unwrap();

        assert_eq!(log.open_stream(a).unwrap().history(), vec![p0, p3]);
        assert_eq!(log.open_stream(b).unwrap().history(), vec![p0, p2]);
        assert!(log.open_stream(StreamId::new(3)).unwrap().history().is_empty());
    }

    #[test]
    fn trimmed_members_are_skipped_not_forgotten() {
        let log = log();
        let id = StreamId::new(9);
        let first = log.multi_append(b"one", &[id]).unwrap();
        let second = log.multi_append(b"two", &[id]).unwrap();
        log.trim(first).unwrap();

        let mut stream = log.open_stream(id).unwrap();
        assert_eq!(stream.history(), vec![first, second]);

        let mut buf = [0u8; 8];
        let (_, pos) = stream.read_next(&mut buf).unwrap();
        assert_eq!(pos, second);
        assert!(stream.read_next(&mut buf).is_err());
    }

    #[test]
    fn sync_fills_holes_by_default() {
        let log = log();
        let id = StreamId::new(4);

        // Allocated but never written.
        let hole = log.check_tail(true).unwrap();
        let member = log.multi_append(b"m", &[id]).unwrap();

        let stream = log.open_stream(id).unwrap();
        assert_eq!(stream.history(), vec![member]);
        assert_eq!(log.state(hole).unwrap(), EntryState::Filled);
        assert_eq!(log.stats().fills(), 1);
    }

    #[test]
    fn sync_without_filling_stops_at_hole() {
        let backend = Arc::new(InMemoryBackend::new());
        let log = Log::open_with_config(
            backend.clone(),
            "log",
            Config::new().create_if_missing(true).fill_gaps_on_sync(false),
        )
        .unwrap();
        let id = StreamId::new(4);

        let hole = log.check_tail(true).unwrap();
        let member = log.multi_append(b"m", &[id]).unwrap();

        let mut stream = log.open_stream(id).unwrap();
        assert!(stream.history().is_empty());
        assert_eq!(log.state(hole).unwrap(), EntryState::Empty);

        // The delayed writer completes; the next sync picks both up in order.
        let late = Entry::written(b"late".to_vec(), vec![id.as_u64()]);
        let outcome = backend
            .compare_and_swap("log", hole.as_u64(), EntryState::Empty, late)
            .unwrap();
        assert!(outcome.is_swapped());

        stream.sync().unwrap();
        assert_eq!(stream.history(), vec![hole, member]);
    }

    #[test]
    fn sync_spans_several_windows() {
        let log = log_with(Config::new().fill_gaps_on_sync(false));
        let id = StreamId::new(3);
        let total = SYNC_WINDOW * 2 + 7;

        let mut expected = Vec::new();
        for i in 0..total {
            if i % 3 == 0 {
                expected.push(log.multi_append(b"m", &[id]).unwrap());
            } else {
                log.append(b"x").unwrap();
            }
        }
        // A hole past the second window boundary stops the scan there.
        let hole = log.check_tail(true).unwrap();
        log.multi_append(b"after", &[id]).unwrap();

        let stream = log.open_stream(id).unwrap();
        assert_eq!(stream.history(), expected);
        assert_eq!(stream.cursor.scanned_to, hole);
    }

    #[test]
    fn cursor_position_tracks_reads() {
        let log = log();
        let id = StreamId::new(1);
        let p0 = log.multi_append(b"a", &[id]).unwrap();
        let p1 = log.multi_append(b"b", &[id]).unwrap();

        let mut stream = log.open_stream(id).unwrap();
        assert_eq!(stream.cursor_position(), Some(p0));
        stream.read_next(&mut [0u8; 1]).unwrap();
        assert_eq!(stream.cursor_position(), Some(p1));
        stream.read_next(&mut [0u8; 1]).unwrap();
        assert_eq!(stream.cursor_position(), None);
    }
}
