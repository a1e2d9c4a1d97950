// Example API Usage
// Shows the handle lifecycle: resources, options, database, per-call options.

use emberkv::{
    Cache, CompactionStyle, Compression, Database, Env, Error, FilterPolicy, MemtableRep,
    Options, ReadOptions, WriteOptions,
};

fn main() -> Result<(), Error> {
    // ===========================================
    // Shared resources
    // ===========================================

    // Created first, released last. Options and databases only borrow them.
    let cache = Cache::new_lru(64 << 20);
    let policy = FilterPolicy::new_bloom(10);
    let mut env = Env::new();
    env.set_background_threads(4);

    // ===========================================
    // Options
    // ===========================================

    let mut opts = Options::new();
    opts.set_create_if_missing(true)
        .set_write_buffer_size(16 << 20)
        .set_compression(Compression::Snappy)
        .set_compaction_style(CompactionStyle::Level)
        .set_memtable_rep(MemtableRep::SkipList)
        .set_cache(&cache)
        .set_filter_policy(&policy)
        .set_env(&env);

    // The same settings as text, e.g. from a config file
    opts.set_from_string("max_open_files=500; paranoid_checks=true")?;

    // ===========================================
    // Basic Usage
    // ===========================================

    let db = Database::open(&opts, "./my_data")?;
    let (ro, mut wo) = (ReadOptions::new(), WriteOptions::new());

    db.put(&wo, b"hello", b"world")?;
    assert_eq!(db.get(&ro, b"hello")?.as_deref(), Some(&b"world"[..]));

    wo.set_sync(true);
    db.delete(&wo, b"hello")?;
    assert_eq!(db.get(&ro, b"hello")?, None);

    // ===========================================
    // Snapshots
    // ===========================================

    db.put(&wo, b"counter", b"1")?;
    let snapshot = db.snapshot();
    db.put(&wo, b"counter", b"2")?;

    let mut at = ReadOptions::new();
    at.set_snapshot(&snapshot);
    assert_eq!(db.get(&at, b"counter")?.as_deref(), Some(&b"1"[..]));

    // Reads that use the snapshot end before it is released
    drop(at);
    snapshot.release();

    // ===========================================
    // Maintenance
    // ===========================================

    db.compact_range(b"", b"");
    if let Some(stats) = db.property("emberkv.stats") {
        println!("{}", stats);
    }

    // Database, then options, then the shared resources
    db.close();
    drop(opts);
    drop(env);
    drop(policy);
    drop(cache);

    Ok(())
}
