//! Benchmark utilities.

#![warn(missing_docs)]

use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use zlog_core::{Log, StreamId};
use zlog_storage::{InMemoryBackend, LogBackend};

/// Generate random record data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate a batch of random payloads.
pub fn generate_payloads(count: usize, payload_size: usize) -> Vec<Vec<u8>> {
    (0..count).map(|_| random_data(payload_size)).collect()
}

/// Pick `count` distinct streams out of `0..universe`, in random order.
pub fn random_streams(count: usize, universe: u64) -> Vec<StreamId> {
    let mut rng = rand::thread_rng();
    let mut ids: Vec<u64> = (0..universe.max(count as u64)).collect();
    ids.shuffle(&mut rng);
    ids.truncate(count);
    ids.into_iter().map(StreamId::new).collect()
}

/// Create a log on a fresh in-memory backend.
pub fn memory_log(stripe_width: u32) -> Log {
    let backend: Arc<dyn LogBackend> = Arc::new(InMemoryBackend::new());
    Log::create(backend, "bench", stripe_width).expect("Failed to create bench log")
}

/// Create a log where every `stride`-th record of `records` belongs to
/// `stream`; the rest are plain appends.
pub fn log_with_stream(records: usize, stride: usize, stream: StreamId) -> Log {
    let log = memory_log(8);
    let data = random_data(64);
    for i in 0..records {
        if i % stride.max(1) == 0 {
            log.multi_append(&data, &[stream]).expect("Failed to multi-append");
        } else {
            log.append(&data).expect("Failed to append");
        }
    }
    log
}
