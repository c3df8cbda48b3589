//! # zlog Storage
//!
//! Backend contract and implementations for the zlog shared log.
//!
//! This crate provides the lowest-level abstraction the log is built on.
//! Backends are **opaque state holders** - they do not know what an
//! append, a fill or a stream is.
//!
//! ## Design Principles
//!
//! - A backend offers an atomic position counter, a conditional
//!   per-position write, and a registry of logs - nothing else
//! - Must be `Send + Sync`; every operation takes `&self`
//! - `zlog_core` owns the state machine and all protocol decisions
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and single-process logs
//! - [`FileBackend`] - Directory-backed, safe across processes
//!
//! ## Example
//!
//! ```rust
//! use zlog_storage::{Entry, EntryState, InMemoryBackend, LogBackend};
//!
//! let backend = InMemoryBackend::new();
//! backend.create_log("mylog", 5).unwrap();
//!
//! let pos = backend.allocate("mylog", 1).unwrap();
//! backend
//!     .compare_and_swap("mylog", pos, EntryState::Empty, Entry::written(b"hello".to_vec(), vec![]))
//!     .unwrap();
//! assert_eq!(backend.read_entry("mylog", pos).unwrap().payload, b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod entry;
mod error;
mod file;
mod memory;

pub use backend::LogBackend;
pub use entry::{CasOutcome, Entry, EntryState, LogMetadata};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
