//! zlog CLI
//!
//! Command-line tools for logs stored in a directory.
//!
//! # Commands
//!
//! - `create` - Create a log
//! - `tail` - Show or allocate the tail position
//! - `append` / `multi-append` - Append a record
//! - `read` - Read the record at a position
//! - `fill` / `trim` - Write tombstones
//! - `membership` - Show the streams of a position
//! - `history` - List or replay a stream
//! - `inspect` - Display logs, tails and position states

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// zlog command-line tools.
#[derive(Parser)]
#[command(name = "zlog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the log directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new log
    Create {
        /// Log name
        log: String,

        /// Number of stripes position storage is spread over
        #[arg(short, long, default_value_t = zlog_core::DEFAULT_STRIPE_WIDTH)]
        stripe_width: u32,
    },

    /// Show the tail position
    Tail {
        /// Log name
        log: String,

        /// Allocate the tail instead of only reading it
        #[arg(short, long)]
        next: bool,
    },

    /// Append a record
    Append {
        /// Log name
        log: String,

        /// Record payload
        data: String,
    },

    /// Append a record to one or more streams
    MultiAppend {
        /// Log name
        log: String,

        /// Record payload
        data: String,

        /// Stream to add the record to (repeatable)
        #[arg(short, long = "stream", required = true)]
        streams: Vec<u64>,
    },

    /// Read the record at a position
    Read {
        /// Log name
        log: String,

        /// Position to read
        position: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Fill a position so no record can be appended there
    Fill {
        /// Log name
        log: String,

        /// Position to fill
        position: u64,
    },

    /// Trim a position
    Trim {
        /// Log name
        log: String,

        /// Position to trim
        position: u64,
    },

    /// Show the streams a position belongs to
    Membership {
        /// Log name
        log: String,

        /// Position to look up
        position: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List the positions of a stream (read-only: stops at unwritten positions)
    History {
        /// Log name
        log: String,

        /// Stream ID
        stream: u64,

        /// Also print each record's payload
        #[arg(short, long)]
        records: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Display logs and position states
    Inspect {
        /// Log to inspect; lists all logs when omitted
        log: Option<String>,

        /// First position to show
        #[arg(long, default_value = "0")]
        from: u64,

        /// Maximum number of positions to show
        #[arg(short, long)]
        limit: Option<u64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("zlog CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("zlog Core v{}", zlog_core::VERSION);
        return Ok(());
    }

    let path = cli.path.ok_or(commands::CliError::MissingPath)?;

    match cli.command {
        Commands::Create { log, stripe_width } => {
            commands::write::create(&path, &log, stripe_width)?;
        }
        Commands::Tail { log, next } => {
            commands::read::tail(&path, &log, next)?;
        }
        Commands::Append { log, data } => {
            commands::write::append(&path, &log, data.as_bytes())?;
        }
        Commands::MultiAppend { log, data, streams } => {
            commands::write::multi_append(&path, &log, data.as_bytes(), &streams)?;
        }
        Commands::Read {
            log,
            position,
            format,
        } => {
            commands::read::read(&path, &log, position, &format)?;
        }
        Commands::Fill { log, position } => {
            commands::write::fill(&path, &log, position)?;
        }
        Commands::Trim { log, position } => {
            commands::write::trim(&path, &log, position)?;
        }
        Commands::Membership {
            log,
            position,
            format,
        } => {
            commands::read::membership(&path, &log, position, &format)?;
        }
        Commands::History {
            log,
            stream,
            records,
            format,
        } => {
            commands::read::history(&path, &log, stream, records, &format)?;
        }
        Commands::Inspect {
            log,
            from,
            limit,
            format,
        } => match log {
            Some(log) => commands::inspect::run(&path, &log, from, limit, &format)?,
            None => commands::inspect::list(&path, &format)?,
        },
        Commands::Version => {}
    }

    Ok(())
}
