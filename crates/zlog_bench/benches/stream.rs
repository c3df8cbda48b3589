//! Stream benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use zlog_bench::{log_with_stream, random_data};
use zlog_core::{CoreError, StreamId};

/// Benchmark opening a stream, which scans the whole log.
fn bench_open_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("open_stream");
    group.sample_size(20);
    let stream = StreamId::new(1);

    for records in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*records as u64));
        group.bench_with_input(BenchmarkId::from_parameter(records), records, |b, &records| {
            let log = log_with_stream(records, 4, stream);
            b.iter(|| black_box(log.open_stream(stream).unwrap().history().len()));
        });
    }

    group.finish();
}

/// Benchmark incremental sync after a handful of new appends.
fn bench_incremental_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("incremental_sync");
    let stream = StreamId::new(1);

    group.bench_function("10_new_records", |b| {
        let log = log_with_stream(1_000, 4, stream);
        let mut handle = log.open_stream(stream).unwrap();
        let data = random_data(64);

        b.iter(|| {
            for _ in 0..10 {
                handle.append(&data).unwrap();
            }
            handle.sync().unwrap();
        });
    });

    group.finish();
}

/// Benchmark replaying a synced stream.
fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");
    let stream = StreamId::new(1);
    let log = log_with_stream(2_000, 2, stream);
    let mut handle = log.open_stream(stream).unwrap();
    group.throughput(Throughput::Elements(handle.history().len() as u64));

    group.bench_function("read_next_all", |b| {
        let mut buf = vec![0u8; 128];
        b.iter(|| {
            handle.reset();
            let mut count = 0usize;
            loop {
                match handle.read_next(&mut buf) {
                    Ok(_) => count += 1,
                    Err(CoreError::EndOfStream { .. }) => break,
                    Err(e) => panic!("replay failed: {e}"),
                }
            }
            black_box(count)
        });
    });

    group.finish();
}

criterion_group!(benches, bench_open_stream, bench_incremental_sync, bench_replay);

criterion_main!(benches);
