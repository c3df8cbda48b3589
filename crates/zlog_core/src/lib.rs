//! # zlog Core
//!
//! Coordination protocol for a shared, totally ordered log.
//!
//! This crate provides:
//! - Position allocation through an injected [`Sequencer`]
//! - Conditional append with transparent retry on lost races
//! - Fill and trim tombstones with a per-position state machine
//! - Atomic multi-stream append and stream membership lookup
//! - [`StreamHandle`] cursors for consuming one stream
//!
//! Any number of clients, in any number of processes, may share a log.
//! Safety comes from the backend's atomic counter and conditional write;
//! nothing here takes a lock on the write path.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use zlog_core::{Log, StreamId};
//! use zlog_storage::InMemoryBackend;
//!
//! let log = Log::create(Arc::new(InMemoryBackend::new()), "events", 5).unwrap();
//!
//! let pos = log.multi_append(b"hello", &[StreamId::new(1), StreamId::new(2)]).unwrap();
//! assert_eq!(log.read_to_vec(pos).unwrap(), b"hello");
//! assert_eq!(log.stream_membership(pos).unwrap(), vec![StreamId::new(1), StreamId::new(2)]);
//!
//! let mut stream = log.open_stream(StreamId::new(2)).unwrap();
//! let mut buf = [0u8; 16];
//! let (size, at) = stream.read_next(&mut buf).unwrap();
//! assert_eq!((&buf[..size], at), (&b"hello"[..], pos));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod log;
mod record;
mod sequencer;
mod stats;
mod stream;
mod types;

pub use config::{Config, RetryPolicy, DEFAULT_STRIPE_WIDTH};
pub use error::{CoreError, CoreResult};
pub use log::Log;
pub use sequencer::{BackendSequencer, MemorySequencer, Sequencer};
pub use stats::{LogStats, StatsSnapshot};
pub use stream::StreamHandle;
pub use types::{Position, StreamId};
pub use zlog_storage::EntryState;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
