//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that respects the log's argument rules.

use proptest::prelude::*;
use std::collections::BTreeSet;
use zlog_core::StreamId;

/// Strategy for generating non-empty record payloads.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..512)
}

/// Strategy for generating valid log names.
pub fn log_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_-]{0,31}").expect("Invalid regex")
}

/// Strategy for generating stream IDs.
pub fn stream_id_strategy() -> impl Strategy<Value = StreamId> {
    any::<u64>().prop_map(StreamId::new)
}

/// Strategy for generating non-empty sets of distinct stream IDs.
///
/// The set is returned in a random order, not sorted, so callers can
/// check that membership preserves the order given at append time.
pub fn stream_set_strategy(max_len: usize) -> impl Strategy<Value = Vec<StreamId>> {
    prop::collection::btree_set(0u64..64, 1..=max_len.max(1))
        .prop_map(|ids: BTreeSet<u64>| ids.into_iter().map(StreamId::new).collect::<Vec<_>>())
        .prop_shuffle()
}

/// An operation against a log.
#[derive(Debug, Clone)]
pub enum LogOperation {
    /// Plain append.
    Append {
        /// Record payload
        data: Vec<u8>,
    },
    /// Append to a set of streams.
    MultiAppend {
        /// Record payload
        data: Vec<u8>,
        /// Member streams
        streams: Vec<StreamId>,
    },
    /// Fill the position at `offset` below the current tail.
    Fill {
        /// Distance from the tail
        offset: u64,
    },
    /// Trim the position at `offset` below the current tail.
    Trim {
        /// Distance from the tail
        offset: u64,
    },
}

/// Strategy for generating log operations.
pub fn log_operation_strategy() -> impl Strategy<Value = LogOperation> {
    prop_oneof![
        4 => payload_strategy().prop_map(|data| LogOperation::Append { data }),
        3 => (payload_strategy(), stream_set_strategy(4))
            .prop_map(|(data, streams)| LogOperation::MultiAppend { data, streams }),
        1 => (0u64..8).prop_map(|offset| LogOperation::Fill { offset }),
        1 => (0u64..8).prop_map(|offset| LogOperation::Trim { offset }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<LogOperation>> {
    prop::collection::vec(log_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
