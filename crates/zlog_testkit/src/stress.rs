//! Stress tests for zlog.
//!
//! These helpers drive a log from many threads at once and check the
//! results against the log's ordering guarantees.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use zlog_core::{CoreError, Log, Position, StreamId};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Positions handed out more than once.
    pub duplicate_positions: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duplicate_positions: 0,
            duration,
            ops_per_second,
        }
    }

    fn with_duplicates(mut self, duplicates: usize) -> Self {
        self.duplicate_positions = duplicates;
        self
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duplicate positions: {}", self.duplicate_positions);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Size of record payloads in bytes.
    pub record_size: usize,
    /// Number of distinct streams.
    pub stream_count: u64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            record_size: 256,
            stream_count: 8,
        }
    }
}

fn count_duplicates(positions: &[Position]) -> usize {
    let unique: HashSet<_> = positions.iter().collect();
    positions.len() - unique.len()
}

/// Run a sequential append stress test.
pub fn stress_sequential_appends(log: &Log, config: &StressConfig) -> StressTestResult {
    let data = vec![0xABu8; config.record_size.max(1)];

    let start = Instant::now();
    let mut positions = Vec::with_capacity(config.operations);
    let mut failed = 0usize;

    for _ in 0..config.operations {
        match log.append(&data) {
            Ok(pos) => positions.push(pos),
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(positions.len(), failed, start.elapsed())
        .with_duplicates(count_duplicates(&positions))
}

/// Run appends from several threads sharing one log.
///
/// Every thread writes its own payloads; afterwards each returned position
/// is read back and must hold the payload of the append that got it.
pub fn stress_concurrent_appends(log: &Log, config: &StressConfig) -> StressTestResult {
    let failed = Arc::new(AtomicUsize::new(0));
    let ops_per_thread = config.operations / config.threads.max(1);

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let log = log.clone();
            let failed = Arc::clone(&failed);
            let record_size = config.record_size;

            thread::spawn(move || {
                let mut written = Vec::with_capacity(ops_per_thread);
                for i in 0..ops_per_thread {
                    let data = record_payload(t, i, record_size);
                    match log.append(&data) {
                        Ok(pos) => written.push((pos, data)),
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
                written
            })
        })
        .collect();

    let mut written = Vec::new();
    for handle in handles {
        written.extend(handle.join().expect("Thread panicked"));
    }
    let elapsed = start.elapsed();

    let mut mismatched = 0usize;
    for (pos, data) in &written {
        if log.read_to_vec(*pos).ok().as_ref() != Some(data) {
            mismatched += 1;
        }
    }

    let positions: Vec<Position> = written.iter().map(|(pos, _)| *pos).collect();
    StressTestResult::new(
        written.len() - mismatched,
        failed.load(Ordering::Relaxed) + mismatched,
        elapsed,
    )
    .with_duplicates(count_duplicates(&positions))
}

/// Run appends while another thread keeps filling the tail.
///
/// Appends that lose their position to a fill must retry elsewhere; no
/// append may ever report a position that reads back as filled.
pub fn stress_append_fill_race(log: &Log, config: &StressConfig) -> StressTestResult {
    let data = vec![0xCDu8; config.record_size.max(1)];
    let done = Arc::new(AtomicUsize::new(0));

    let filler = {
        let log = log.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut fills = 0usize;
            while done.load(Ordering::Acquire) == 0 {
                if let Ok(tail) = log.check_tail(false) {
                    if log.fill(tail).is_ok() {
                        fills += 1;
                    }
                }
            }
            fills
        })
    };

    let start = Instant::now();
    let mut positions = Vec::with_capacity(config.operations);
    let mut failed = 0usize;
    for _ in 0..config.operations {
        match log.append(&data) {
            Ok(pos) => positions.push(pos),
            Err(_) => failed += 1,
        }
    }
    done.store(1, Ordering::Release);
    let _ = filler.join().expect("Filler thread panicked");
    let elapsed = start.elapsed();

    let unreadable = positions
        .iter()
        .filter(|pos| log.read_to_vec(**pos).is_err())
        .count();

    StressTestResult::new(positions.len() - unreadable, failed + unreadable, elapsed)
        .with_duplicates(count_duplicates(&positions))
}

/// Run multi-appends from several threads across `stream_count` streams,
/// then check every stream's history against what the writers saw.
pub fn stress_concurrent_multi_appends(log: &Log, config: &StressConfig) -> StressTestResult {
    let ops_per_thread = config.operations / config.threads.max(1);
    let stream_count = config.stream_count.max(1);

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let log = log.clone();
            let record_size = config.record_size;
            thread::spawn(move || {
                let mut written: Vec<(Position, Vec<StreamId>)> = Vec::new();
                let mut failed = 0usize;
                for i in 0..ops_per_thread {
                    let first = (t + i) as u64 % stream_count;
                    let mut streams = vec![StreamId::new(first)];
                    if stream_count > 1 && i % 2 == 0 {
                        streams.push(StreamId::new((first + 1) % stream_count));
                    }
                    match log.multi_append(&record_payload(t, i, record_size), &streams) {
                        Ok(pos) => written.push((pos, streams)),
                        Err(_) => failed += 1,
                    }
                }
                (written, failed)
            })
        })
        .collect();

    let mut expected: BTreeMap<StreamId, Vec<Position>> = BTreeMap::new();
    let mut positions = Vec::new();
    let mut failed = 0usize;
    for handle in handles {
        let (written, thread_failed) = handle.join().expect("Thread panicked");
        failed += thread_failed;
        for (pos, streams) in written {
            positions.push(pos);
            for id in streams {
                expected.entry(id).or_default().push(pos);
            }
        }
    }
    let elapsed = start.elapsed();

    let mut mismatched_streams = 0usize;
    for (id, mut history) in expected {
        history.sort();
        let actual = log.open_stream(id).map(|s| s.history());
        if actual.as_ref().ok() != Some(&history) {
            mismatched_streams += 1;
        }
    }

    StressTestResult::new(positions.len(), failed + mismatched_streams, elapsed)
        .with_duplicates(count_duplicates(&positions))
}

/// Consume a stream to its end, returning the positions read.
///
/// Trimmed records are skipped by the cursor; any other error stops the
/// scan and is returned.
pub fn drain_stream(log: &Log, id: StreamId) -> Result<Vec<Position>, CoreError> {
    let mut stream = log.open_stream(id)?;
    let mut buf = vec![0u8; 4096];
    let mut positions = Vec::new();
    loop {
        match stream.read_next(&mut buf) {
            Ok((_, pos)) => positions.push(pos),
            Err(CoreError::EndOfStream { .. }) => return Ok(positions),
            Err(e) => return Err(e),
        }
    }
}

fn record_payload(thread: usize, index: usize, size: usize) -> Vec<u8> {
    let mut data = format!("t{thread}-i{index}:").into_bytes();
    data.resize(size.max(data.len()), 0xAB);
    data
}
