//! Commands that change a log.

use super::{open_backend, open_log, CliResult};
use std::path::Path;
use std::sync::Arc;
use zlog_core::{Log, Position, StreamId};
use zlog_storage::LogBackend;

/// Runs the create command.
pub fn create(path: &Path, name: &str, stripe_width: u32) -> CliResult<()> {
    let backend: Arc<dyn LogBackend> = open_backend(path)?;
    let log = Log::create(backend, name, stripe_width)?;
    println!(
        "Created log '{}' with {} stripes",
        log.name(),
        log.stripe_width()
    );
    Ok(())
}

/// Runs the append command.
pub fn append(path: &Path, name: &str, data: &[u8]) -> CliResult<()> {
    let log = open_log(path, name)?;
    let pos = log.append(data)?;
    println!("{}", pos.as_u64());
    Ok(())
}

/// Runs the multi-append command.
pub fn multi_append(path: &Path, name: &str, data: &[u8], streams: &[u64]) -> CliResult<()> {
    let log = open_log(path, name)?;
    let ids: Vec<StreamId> = streams.iter().copied().map(StreamId::new).collect();
    let pos = log.multi_append(data, &ids)?;
    println!("{}", pos.as_u64());
    Ok(())
}

/// Runs the fill command.
pub fn fill(path: &Path, name: &str, position: u64) -> CliResult<()> {
    let log = open_log(path, name)?;
    log.fill(Position::new(position))?;
    println!("Filled position {}", position);
    Ok(())
}

/// Runs the trim command.
pub fn trim(path: &Path, name: &str, position: u64) -> CliResult<()> {
    let log = open_log(path, name)?;
    log.trim(Position::new(position))?;
    println!("Trimmed position {}", position);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use zlog_core::EntryState;

    #[test]
    fn test_create_then_append() {
        let dir = TempDir::new().unwrap();
        create(dir.path(), "events", 2).unwrap();
        append(dir.path(), "events", b"hello").unwrap();
        multi_append(dir.path(), "events", b"both", &[1, 2]).unwrap();

        let log = open_log(dir.path(), "events").unwrap();
        assert_eq!(log.read_to_vec(Position::new(0)).unwrap(), b"hello");
        assert_eq!(
            log.stream_membership(Position::new(1)).unwrap(),
            vec![StreamId::new(1), StreamId::new(2)]
        );
    }

    #[test]
    fn test_tombstones() {
        let dir = TempDir::new().unwrap();
        create(dir.path(), "events", 2).unwrap();
        fill(dir.path(), "events", 3).unwrap();
        trim(dir.path(), "events", 4).unwrap();

        let log = open_log(dir.path(), "events").unwrap();
        assert_eq!(log.state(Position::new(3)).unwrap(), EntryState::Filled);
        assert_eq!(log.state(Position::new(4)).unwrap(), EntryState::Trimmed);
    }

    #[test]
    fn test_append_to_missing_log() {
        let dir = TempDir::new().unwrap();
        assert!(append(dir.path(), "missing", b"x").is_err());
    }
}
