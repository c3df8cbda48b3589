//! Inspect command implementation.

use super::{open_backend, print_json, CliResult};
use serde::Serialize;
use std::path::Path;
use zlog_core::CoreError;
use zlog_storage::{EntryState, LogBackend};

/// Log inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Backend directory.
    pub path: String,
    /// Log name.
    pub log: String,
    /// Stripe width.
    pub stripe_width: u32,
    /// Next position to be allocated.
    pub tail: u64,
    /// Positions below the tail by state.
    pub states: StateCounts,
    /// Positions in the requested range.
    pub entries: Vec<EntryInfo>,
}

/// Number of positions in each state.
#[derive(Debug, Default, Serialize)]
pub struct StateCounts {
    /// Allocated but never written.
    pub empty: u64,
    /// Holding a record.
    pub written: u64,
    /// Filled tombstones.
    pub filled: u64,
    /// Trimmed positions.
    pub trimmed: u64,
}

impl StateCounts {
    fn add(&mut self, state: EntryState) {
        match state {
            EntryState::Empty => self.empty += 1,
            EntryState::Written => self.written += 1,
            EntryState::Filled => self.filled += 1,
            EntryState::Trimmed => self.trimmed += 1,
        }
    }
}

/// One position of a log.
#[derive(Debug, Serialize)]
pub struct EntryInfo {
    /// Position.
    pub position: u64,
    /// State name.
    pub state: &'static str,
    /// Stored payload size in bytes.
    pub size: usize,
    /// Member streams.
    pub streams: Vec<u64>,
}

/// Summary of one log for `list`.
#[derive(Debug, Serialize)]
pub struct LogSummary {
    /// Log name.
    pub name: String,
    /// Stripe width.
    pub stripe_width: u32,
    /// Next position to be allocated.
    pub tail: u64,
}

/// Runs the inspect command for one log.
pub fn run(
    path: &Path,
    name: &str,
    from: u64,
    limit: Option<u64>,
    format: &str,
) -> CliResult<()> {
    let result = inspect(path, name, from, limit)?;

    match format {
        "json" => print_json(&result)?,
        _ => print_text_output(&result),
    }
    Ok(())
}

/// Lists the logs in the directory.
pub fn list(path: &Path, format: &str) -> CliResult<()> {
    let backend = open_backend(path)?;
    let mut logs = Vec::new();
    for name in backend.log_names()? {
        let meta = backend.log_metadata(&name)?;
        logs.push(LogSummary {
            tail: backend.tail(&name)?,
            stripe_width: meta.stripe_width,
            name,
        });
    }

    match format {
        "json" => print_json(&logs)?,
        _ => {
            if logs.is_empty() {
                println!("No logs found at {}", path.display());
            }
            for log in &logs {
                println!(
                    "{}  stripes={}  tail={}",
                    log.name, log.stripe_width, log.tail
                );
            }
        }
    }
    Ok(())
}

fn inspect(path: &Path, name: &str, from: u64, limit: Option<u64>) -> CliResult<InspectResult> {
    let backend = open_backend(path)?;
    let meta = backend
        .log_metadata(name)
        .map_err(CoreError::from_lifecycle)?;
    let tail = backend.tail(name)?;
    let end = match limit {
        Some(limit) => from.saturating_add(limit).min(tail),
        None => tail,
    };

    let mut states = StateCounts::default();
    let mut entries = Vec::new();
    for position in 0..tail {
        let entry = backend.read_entry(name, position)?;
        states.add(entry.state);
        if (from..end).contains(&position) {
            entries.push(EntryInfo {
                position,
                state: entry.state.as_str(),
                size: entry.payload.len(),
                streams: entry.streams,
            });
        }
    }

    Ok(InspectResult {
        path: path.display().to_string(),
        log: meta.name,
        stripe_width: meta.stripe_width,
        tail,
        states,
        entries,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("zlog Log Inspection");
    println!("===================");
    println!();
    println!("Path:         {}", result.path);
    println!("Log:          {}", result.log);
    println!("Stripe width: {}", result.stripe_width);
    println!("Tail:         {}", result.tail);
    println!();
    println!("Positions:");
    println!("  Written: {}", result.states.written);
    println!("  Filled:  {}", result.states.filled);
    println!("  Trimmed: {}", result.states.trimmed);
    println!("  Empty:   {}", result.states.empty);

    if !result.entries.is_empty() {
        println!();
        println!("Entries:");
        for entry in &result.entries {
            let streams: Vec<String> = entry.streams.iter().map(u64::to_string).collect();
            println!(
                "  [{}] {:<7} {} bytes  streams=[{}]",
                entry.position,
                entry.state,
                format_size(entry.size as u64),
                streams.join(",")
            );
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
