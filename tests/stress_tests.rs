//! Stress tests for volume, concurrency and durability.

use bytes::Bytes;
use emberkv::{Database, Options, ReadOptions, WriteOptions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn create_options() -> Options<'static> {
    let mut opts = Options::new();
    opts.set_create_if_missing(true)
        .set_write_buffer_size(64 << 20);
    opts
}

/// A full-range compaction after mass deletion must not bring keys back.
///
/// Default sizes, so loading drives background and stalled compactions.
#[test]
fn stress_million_keys_delete_then_compact() {
    let dir = TempDir::new().unwrap();
    let mut opts = Options::new();
    opts.set_create_if_missing(true);
    let db = Database::open(&opts, dir.path()).unwrap();
    let (ro, wo) = (ReadOptions::new(), WriteOptions::new());

    for i in 0..1_000_000 {
        let key = format!("key{}", i);
        let value = format!("data{}", i);
        db.put(&wo, key.as_bytes(), value.as_bytes()).unwrap();
    }

    assert_eq!(db.get(&ro, b"key100").unwrap(), Some(Bytes::from("data100")));

    for i in 0..1_000_000 {
        db.delete(&wo, format!("key{}", i).as_bytes()).unwrap();
    }
    assert_eq!(db.get(&ro, b"key100").unwrap(), None);

    db.compact_range(b"", b"");
    assert_eq!(db.get(&ro, b"key100").unwrap(), None);
    assert_eq!(db.get(&ro, b"key999999").unwrap(), None);
    assert_eq!(db.property("emberkv.estimate-num-keys").as_deref(), Some("0"));
}

/// Test concurrent writers with many keys.
#[test]
fn stress_concurrent_writers() {
    let dir = TempDir::new().unwrap();
    let mut opts = create_options();
    opts.set_write_buffer_size(1 << 20);
    let db = Arc::new(Database::open(&opts, dir.path()).unwrap());

    let num_threads = 8;
    let keys_per_thread = 1000;

    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                let wo = WriteOptions::new();
                for i in 0..keys_per_thread {
                    let key = format!("thread{:02}_key{:05}", t, i);
                    let value = format!("value_{}", i);
                    db.put(&wo, key.as_bytes(), value.as_bytes()).unwrap();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    // Verify all keys exist
    let ro = ReadOptions::new();
    for t in 0..num_threads {
        for i in 0..keys_per_thread {
            let key = format!("thread{:02}_key{:05}", t, i);
            let value = db.get(&ro, key.as_bytes()).unwrap();
            assert!(value.is_some(), "Missing key: {}", key);
        }
    }
}

/// Readers never observe a torn or missing value while writers overwrite.
#[test]
fn stress_concurrent_read_write() {
    let dir = TempDir::new().unwrap();
    let mut opts = create_options();
    opts.set_write_buffer_size(128 << 10);
    let db = Database::open(&opts, dir.path()).unwrap();

    let wo = WriteOptions::new();
    for i in 0..100 {
        db.put(&wo, format!("key{:03}", i).as_bytes(), b"v0000").unwrap();
    }

    thread::scope(|s| {
        for _ in 0..2 {
            s.spawn(|| {
                let wo = WriteOptions::new();
                for round in 1..200 {
                    for i in 0..100 {
                        let value = format!("v{:04}", round);
                        db.put(&wo, format!("key{:03}", i).as_bytes(), value.as_bytes())
                            .unwrap();
                    }
                }
            });
        }
        for _ in 0..4 {
            s.spawn(|| {
                let ro = ReadOptions::new();
                for _ in 0..50 {
                    for i in 0..100 {
                        let value = db.get(&ro, format!("key{:03}", i).as_bytes()).unwrap();
                        let value = value.expect("key vanished");
                        assert_eq!(value.len(), 5);
                        assert_eq!(value[0], b'v');
                    }
                }
            });
        }
    });
}

/// A key that is never deleted stays visible while it is overwritten and
/// compacted underneath concurrent readers.
#[test]
fn stress_reads_during_compaction() {
    let dir = TempDir::new().unwrap();
    let mut opts = create_options();
    opts.set_disable_auto_compactions(true);
    let db = Database::open(&opts, dir.path()).unwrap();

    let wo = WriteOptions::new();
    db.put(&wo, b"a", b"0").unwrap();
    db.compact_range(b"", b"");

    let done = AtomicBool::new(false);
    thread::scope(|s| {
        s.spawn(|| {
            let wo = WriteOptions::new();
            for i in 1..2000 {
                db.put(&wo, b"a", i.to_string().as_bytes()).unwrap();
                db.compact_range(b"", b"");
            }
            done.store(true, Ordering::SeqCst);
        });
        for _ in 0..4 {
            s.spawn(|| {
                let ro = ReadOptions::new();
                let mut reads = 0u64;
                while !done.load(Ordering::SeqCst) || reads < 1000 {
                    assert!(db.get(&ro, b"a").unwrap().is_some(), "key vanished after {} reads", reads);
                    reads += 1;
                }
            });
        }
    });

    let last = db.get(&ReadOptions::new(), b"a").unwrap();
    assert_eq!(last, Some(Bytes::from("1999")));
}

/// Test durability of synced writes across several reopen cycles.
#[test]
fn stress_reopen_cycles() {
    let dir = TempDir::new().unwrap();
    let mut opts = create_options();
    opts.set_write_buffer_size(64 << 10);
    let (ro, mut wo) = (ReadOptions::new(), WriteOptions::new());
    wo.set_sync(true);

    for cycle in 0..5 {
        let db = Database::open(&opts, dir.path()).unwrap();
        for i in 0..500 {
            let key = format!("c{}-{:03}", cycle, i);
            db.put(&wo, key.as_bytes(), key.as_bytes()).unwrap();
        }
        if cycle % 2 == 1 {
            db.compact_range(b"", b"");
        }
        db.close();
    }

    let db = Database::open(&opts, dir.path()).unwrap();
    for cycle in 0..5 {
        for i in (0..500).step_by(50) {
            let key = format!("c{}-{:03}", cycle, i);
            assert_eq!(db.get(&ro, key.as_bytes()).unwrap(), Some(Bytes::from(key)));
        }
    }
}
