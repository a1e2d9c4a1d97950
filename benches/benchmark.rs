//! Benchmarks for emberkv performance.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use emberkv::{Compression, Database, Options, ReadOptions, WriteOptions};
use tempfile::TempDir;

fn create_options() -> Options<'static> {
    let mut opts = Options::new();
    opts.set_create_if_missing(true);
    opts
}

/// Benchmark sequential writes.
fn bench_sequential_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_write");
    let opts = create_options();

    for size in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter_with_setup(
                || {
                    let dir = TempDir::new().unwrap();
                    let db = Database::open(&opts, dir.path()).unwrap();
                    (db, dir)
                },
                |(db, _dir)| {
                    let wo = WriteOptions::new();
                    for i in 0..size {
                        let key = format!("key{:08}", i);
                        let value = format!("value{:08}", i);
                        db.put(&wo, key.as_bytes(), value.as_bytes()).unwrap();
                    }
                    black_box(())
                },
            );
        });
    }

    group.finish();
}

/// Benchmark random writes.
fn bench_random_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_write");
    let opts = create_options();

    // Pre-generate random keys
    let keys: Vec<String> = (0..10000)
        .map(|i| format!("rkey{:08}", (i * 7919) % 100000)) // Pseudo-random distribution
        .collect();

    group.throughput(Throughput::Elements(10000));
    group.bench_function("10000_keys", |b| {
        b.iter_with_setup(
            || {
                let dir = TempDir::new().unwrap();
                let db = Database::open(&opts, dir.path()).unwrap();
                (db, dir)
            },
            |(db, _dir)| {
                let wo = WriteOptions::new();
                for key in &keys {
                    db.put(&wo, key.as_bytes(), b"value").unwrap();
                }
                black_box(())
            },
        );
    });

    group.finish();
}

/// Benchmark point reads from the memtable and from a compacted table.
fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");
    let opts = create_options();

    for compacted in [false, true] {
        let dir = TempDir::new().unwrap();
        let db = Database::open(&opts, dir.path()).unwrap();
        let wo = WriteOptions::new();
        for i in 0..10000 {
            let key = format!("key{:08}", i);
            db.put(&wo, key.as_bytes(), &[b'v'; 100]).unwrap();
        }
        if compacted {
            db.compact_range(b"", b"");
        }

        let name = if compacted { "table" } else { "memtable" };
        let ro = ReadOptions::new();
        let mut i = 0u64;
        group.bench_function(name, |b| {
            b.iter(|| {
                let key = format!("key{:08}", (i * 7919) % 10000);
                i += 1;
                black_box(db.get(&ro, key.as_bytes()).unwrap())
            });
        });
    }

    group.finish();
}

/// Benchmark synced vs unsynced writes.
fn bench_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync");
    let opts = create_options();
    let dir = TempDir::new().unwrap();
    let db = Database::open(&opts, dir.path()).unwrap();

    for sync in [false, true] {
        let mut wo = WriteOptions::new();
        wo.set_sync(sync);
        let mut i = 0u64;
        group.bench_function(if sync { "synced" } else { "buffered" }, |b| {
            b.iter(|| {
                let key = format!("key{:08}", i);
                i += 1;
                db.put(&wo, key.as_bytes(), b"value").unwrap();
            });
        });
    }

    group.finish();
}

/// Benchmark compaction with different compression settings.
fn bench_compression(c: &mut Criterion) {
    let mut group = c.benchmark_group("compression");
    group.sample_size(10);

    for compression in [Compression::None, Compression::Snappy] {
        let mut opts = create_options();
        opts.set_compression(compression);

        group.bench_function(compression.name(), |b| {
            b.iter_with_setup(
                || {
                    let dir = TempDir::new().unwrap();
                    let db = Database::open(&opts, dir.path()).unwrap();
                    let wo = WriteOptions::new();
                    for i in 0..5000 {
                        let key = format!("key{:08}", i);
                        let value = format!("{:0>200}", i);
                        db.put(&wo, key.as_bytes(), value.as_bytes()).unwrap();
                    }
                    (db, dir)
                },
                |(db, _dir)| {
                    db.compact_range(b"", b"");
                },
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_sequential_write,
    bench_random_write,
    bench_read,
    bench_sync,
    bench_compression,
);

criterion_main!(benches);
