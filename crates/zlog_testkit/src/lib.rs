//! # zlog Testkit
//!
//! Test utilities for zlog.
//!
//! This crate provides:
//! - Test fixtures for memory and file-backed logs
//! - Property-based test generators using proptest
//! - Multithreaded stress helpers that check position uniqueness and
//!   stream histories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zlog_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_log() {
//!     with_temp_log(|log| {
//!         let pos = log.append(b"hello").unwrap();
//!         // ... test operations
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
