//! Commands that query a log.

use super::{open_log, open_log_read_only, print_json, render_payload, CliResult};
use serde::Serialize;
use std::path::Path;
use zlog_core::{CoreError, EntryState, Position, StreamId};

/// A record returned by `read`.
#[derive(Debug, Serialize)]
pub struct RecordOutput {
    /// Position of the record.
    pub position: u64,
    /// State of the position.
    pub state: &'static str,
    /// Payload size in bytes.
    pub size: usize,
    /// Payload, lossily decoded as UTF-8.
    pub data: String,
}

impl RecordOutput {
    fn written(position: u64, size: usize, data: &[u8]) -> Self {
        Self {
            position,
            state: EntryState::Written.as_str(),
            size,
            data: render_payload(data),
        }
    }

    fn unreadable(position: u64, state: EntryState) -> Self {
        Self {
            position,
            state: state.as_str(),
            size: 0,
            data: String::new(),
        }
    }
}

/// Stream membership of one position.
#[derive(Debug, Serialize)]
pub struct MembershipOutput {
    /// Position looked up.
    pub position: u64,
    /// Member streams, in append order.
    pub streams: Vec<u64>,
}

/// History of one stream.
#[derive(Debug, Serialize)]
pub struct HistoryOutput {
    /// Stream ID.
    pub stream: u64,
    /// Member positions, ascending.
    pub positions: Vec<u64>,
    /// Readable records in stream order (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<RecordOutput>>,
}

/// Runs the tail command.
pub fn tail(path: &Path, name: &str, next: bool) -> CliResult<()> {
    let log = open_log(path, name)?;
    println!("{}", log.check_tail(next)?.as_u64());
    Ok(())
}

/// Runs the read command.
///
/// Unwritten and tombstoned positions are reported by state rather than
/// as failures.
pub fn read(path: &Path, name: &str, position: u64, format: &str) -> CliResult<()> {
    let record = read_record(path, name, position)?;

    match format {
        "json" => print_json(&record)?,
        _ if record.state == EntryState::Written.as_str() => println!("{}", record.data),
        _ => println!("<{}>", record.state),
    }
    Ok(())
}

fn read_record(path: &Path, name: &str, position: u64) -> CliResult<RecordOutput> {
    let log = open_log(path, name)?;
    let pos = Position::new(position);
    match log.read_to_vec(pos) {
        Ok(data) => Ok(RecordOutput::written(position, data.len(), &data)),
        Err(e) if e.is_read_state() => Ok(RecordOutput::unreadable(position, log.state(pos)?)),
        Err(e) => Err(e.into()),
    }
}

/// Runs the membership command.
pub fn membership(path: &Path, name: &str, position: u64, format: &str) -> CliResult<()> {
    let log = open_log(path, name)?;
    let streams = log
        .stream_membership(Position::new(position))?
        .into_iter()
        .map(StreamId::as_u64)
        .collect();
    let output = MembershipOutput { position, streams };

    match format {
        "json" => print_json(&output)?,
        _ => {
            let ids: Vec<String> = output.streams.iter().map(u64::to_string).collect();
            println!("{}", ids.join(" "));
        }
    }
    Ok(())
}

/// Runs the history command.
pub fn history(
    path: &Path,
    name: &str,
    stream: u64,
    with_records: bool,
    format: &str,
) -> CliResult<()> {
    let output = collect_history(path, name, stream, with_records)?;

    match format {
        "json" => print_json(&output)?,
        _ => match &output.records {
            Some(records) => {
                for record in records {
                    println!("{}\t{}", record.position, record.data);
                }
            }
            None => {
                for pos in &output.positions {
                    println!("{}", pos);
                }
            }
        },
    }
    Ok(())
}

fn collect_history(
    path: &Path,
    name: &str,
    stream: u64,
    with_records: bool,
) -> CliResult<HistoryOutput> {
    let log = open_log_read_only(path, name)?;
    let mut handle = log.open_stream(StreamId::new(stream))?;
    let positions = handle.history().into_iter().map(Position::as_u64).collect();

    let records = if with_records {
        let mut records = Vec::new();
        let mut buf = vec![0u8; 4096];
        loop {
            match handle.read_next(&mut buf) {
                Ok((size, pos)) => {
                    let record = if size <= buf.len() {
                        RecordOutput::written(pos.as_u64(), size, &buf[..size])
                    } else {
                        // Truncated; the cursor already moved past it.
                        RecordOutput::written(pos.as_u64(), size, &log.read_to_vec(pos)?)
                    };
                    records.push(record);
                }
                Err(CoreError::EndOfStream { .. }) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Some(records)
    } else {
        None
    };

    Ok(HistoryOutput {
        stream,
        positions,
        records,
    })
}
