//! Integration tests for logs stored with the file backend.
//!
//! Each test opens the directory through separate `FileBackend` values,
//! the way independent processes would.

use std::sync::Arc;
use std::thread;
use tempfile::TempDir;
use zlog_core::{CoreError, EntryState, Log, Position, StreamId};
use zlog_storage::{FileBackend, LogBackend};

fn open_backend(dir: &TempDir) -> Arc<dyn LogBackend> {
    Arc::new(FileBackend::open(dir.path()).unwrap())
}

#[test]
fn log_survives_reopen() {
    let dir = TempDir::new().unwrap();

    let (plain, member) = {
        let log = Log::create(open_backend(&dir), "events", 3).unwrap();
        let plain = log.append(b"plain").unwrap();
        let member = log
            .multi_append(b"member", &[StreamId::new(8), StreamId::new(2)])
            .unwrap();
        log.fill(Position::new(5)).unwrap();
        log.trim(plain).unwrap();
        (plain, member)
    };

    let log = Log::open(open_backend(&dir), "events").unwrap();
    assert_eq!(log.stripe_width(), 3);
    assert_eq!(log.check_tail(false).unwrap(), Position::new(2));
    assert_eq!(log.state(plain).unwrap(), EntryState::Trimmed);
    assert_eq!(log.read_to_vec(member).unwrap(), b"member");
    assert_eq!(
        log.stream_membership(member).unwrap(),
        vec![StreamId::new(8), StreamId::new(2)]
    );
    assert!(matches!(
        log.read(Position::new(5), &mut [0u8; 4]),
        Err(CoreError::Filled { .. })
    ));
}

#[test]
fn lifecycle_errors_across_handles() {
    let dir = TempDir::new().unwrap();
    Log::create(open_backend(&dir), "events", 3).unwrap();

    assert!(matches!(
        Log::create(open_backend(&dir), "events", 3),
        Err(CoreError::LogExists { .. })
    ));
    assert!(matches!(
        Log::open(open_backend(&dir), "other"),
        Err(CoreError::LogNotFound { .. })
    ));
    assert!(matches!(
        Log::create(open_backend(&dir), "../escape", 3),
        Err(CoreError::Invalid { .. })
    ));
}

#[test]
fn fill_from_one_handle_blocks_append_from_another() {
    let dir = TempDir::new().unwrap();
    let writer = Log::create(open_backend(&dir), "events", 2).unwrap();
    let filler = Log::open(open_backend(&dir), "events").unwrap();

    let tail = filler.check_tail(false).unwrap();
    filler.fill(tail).unwrap();

    let pos = writer.append(b"data").unwrap();
    assert_eq!(pos, tail.next());
    assert!(matches!(filler.fill(pos), Err(CoreError::ReadOnly { .. })));
}

#[test]
fn concurrent_handles_append_distinct_positions() {
    let dir = TempDir::new().unwrap();
    Log::create(open_backend(&dir), "events", 4).unwrap();

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let log = Log::open(open_backend(&dir), "events").unwrap();
            thread::spawn(move || {
                (0..25)
                    .map(|i| {
                        let data = format!("{t}-{i}").into_bytes();
                        (log.append(&data).unwrap(), data)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let reader = Log::open(open_backend(&dir), "events").unwrap();
    let mut positions = Vec::new();
    for writer in writers {
        for (pos, data) in writer.join().unwrap() {
            assert_eq!(reader.read_to_vec(pos).unwrap(), data);
            positions.push(pos);
        }
    }

    positions.sort();
    positions.dedup();
    assert_eq!(positions.len(), 100);
    assert_eq!(reader.check_tail(false).unwrap(), Position::new(100));
}

#[test]
fn stream_sync_sees_other_handles() {
    let dir = TempDir::new().unwrap();
    let producer = Log::create(open_backend(&dir), "events", 3).unwrap();
    let consumer = Log::open(open_backend(&dir), "events").unwrap();
    let id = StreamId::new(11);

    let mut stream = consumer.open_stream(id).unwrap();
    assert!(stream.history().is_empty());

    let first = producer.multi_append(b"one", &[id]).unwrap();
    producer.append(b"noise").unwrap();
    let second = producer.multi_append(b"two", &[id, StreamId::new(12)]).unwrap();

    stream.sync().unwrap();
    assert_eq!(stream.history(), vec![first, second]);

    let mut buf = [0u8; 8];
    let (size, pos) = stream.read_next(&mut buf).unwrap();
    assert_eq!((&buf[..size], pos), (&b"one"[..], first));
}
