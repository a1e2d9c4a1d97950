//! Resource lifecycle tests.
//!
//! The engine counts live objects process-wide, so everything here runs in
//! a single test to keep the counts free of interference.

use emberkv::{
    live_objects, Cache, Database, Env, FilterPolicy, Options, ReadOptions,
    UniversalCompactionOptions, WriteOptions,
};
use tempfile::TempDir;

fn documented_order_teardown() {
    let dir = TempDir::new().unwrap();
    let cache = Cache::new_lru(4 << 20);
    let compressed = Cache::new_lru(1 << 20);
    let policy = FilterPolicy::new_bloom(10);
    let env = Env::new();

    let mut opts = Options::new();
    opts.set_create_if_missing(true)
        .set_cache(&cache)
        .set_cache_compressed(&compressed)
        .set_filter_policy(&policy)
        .set_env(&env);
    {
        let universal = UniversalCompactionOptions::new();
        opts.set_universal_compaction_options(&universal);
    }

    let db = Database::open(&opts, dir.path()).unwrap();
    let (mut ro, wo) = (ReadOptions::new(), WriteOptions::new());
    db.put(&wo, b"key", b"value").unwrap();

    let snapshot = db.snapshot();
    ro.set_snapshot(&snapshot);
    assert!(db.get(&ro, b"key").unwrap().is_some());

    let live = live_objects();
    assert_eq!(live.databases, 1);
    assert_eq!(live.snapshots, 1);
    assert_eq!(live.caches, 2);
    assert_eq!(live.universal_compaction_options, 0);

    // Reads done, then snapshot, database, options, resources.
    drop(ro);
    snapshot.release();
    drop(wo);
    db.close();
    drop(opts);
    drop(env);
    drop(policy);
    drop(compressed);
    drop(cache);
}

fn failed_open_leaks_nothing() {
    let dir = TempDir::new().unwrap();
    let opts = Options::new();
    assert!(Database::open(&opts, dir.path().join("missing")).is_err());
}

fn reopen_after_close() {
    let dir = TempDir::new().unwrap();
    let mut opts = Options::new();
    opts.set_create_if_missing(true);
    for _ in 0..3 {
        let db = Database::open(&opts, dir.path()).unwrap();
        let _snapshot = db.snapshot();
    }
}

#[test]
fn lifecycle_leaves_no_live_objects() {
    assert_eq!(live_objects().total(), 0);

    documented_order_teardown();
    assert_eq!(live_objects().total(), 0, "{:?}", live_objects());

    failed_open_leaks_nothing();
    assert_eq!(live_objects().total(), 0, "{:?}", live_objects());

    reopen_after_close();
    assert_eq!(live_objects().total(), 0, "{:?}", live_objects());
}
