//! Database core.
//!
//! A database is one directory holding a single sorted table, the
//! write-ahead log of everything newer than that table, and a `CURRENT`
//! file naming both. Writes go to the log and then to the active memtable.
//! A compaction freezes the memtable, merges every frozen memtable with the
//! table into a replacement table, and retires the logs it covered.
//!
//! Readers never block writers: the memtables and the table in use are
//! published together as one immutable [`Version`] behind an `ArcSwap`.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::CStr;
use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use bytes::Bytes;
use libc::{c_char, c_int, size_t};
use parking_lot::{const_mutex, Condvar, Mutex, RwLock};

use crate::types::{InternalKey, LogRecord, LookupResult};
use crate::util::conv::cstr_to_path;
use crate::util::filename::{
    current_file_path, delete_file, list_files_of_type, lock_file_path, log_file_path,
    options_file_path, parse_file_name, read_current_file, table_file_path, temp_file_path,
    write_current_file, CurrentState, FileType,
};
use crate::{Error, Result};

use super::cache::BlockCache;
use super::compaction::{GarbageFilter, GcStats, MergingIter, Source};
use super::env::{default_env, EnvInner, Priority};
use super::memtable::MemTable;
use super::options::{
    emberkv_options_t, emberkv_readoptions_t, emberkv_writeoptions_t, NativeOptions,
    EMBERKV_BZIP2_COMPRESSION, EMBERKV_DEBUG_LEVEL, EMBERKV_ERROR_LEVEL, EMBERKV_INFO_LEVEL,
    EMBERKV_WARN_LEVEL, EMBERKV_ZLIB_COMPRESSION,
};
use super::table::{BlockCaches, ReadPolicy, Table, TableBuilder, TableOptions};
use super::wal::{LogReader, LogWriter, SyncPolicy};
use super::{drop_raw, engine_string, into_raw, malloc_copy, set_error, ObjectKind};

/// Block cache created for a database whose options name none.
pub const DEFAULT_INTERNAL_CACHE_SIZE: usize = 8 << 20;

/// Emit a `tracing` event unless the configured info log level filters it.
macro_rules! engine_log {
    ($min:expr, debug, $($arg:tt)+) => {
        if $min <= EMBERKV_DEBUG_LEVEL {
            tracing::debug!($($arg)+);
        }
    };
    ($min:expr, info, $($arg:tt)+) => {
        if $min <= EMBERKV_INFO_LEVEL {
            tracing::info!($($arg)+);
        }
    };
    ($min:expr, warn, $($arg:tt)+) => {
        if $min <= EMBERKV_WARN_LEVEL {
            tracing::warn!($($arg)+);
        }
    };
    ($min:expr, error, $($arg:tt)+) => {
        if $min <= EMBERKV_ERROR_LEVEL {
            tracing::error!($($arg)+);
        }
    };
}

/// Directories locked by this process. `flock` does not conflict between
/// two descriptors of one process on every platform, so the registry makes
/// a second open in the same process fail too.
static LOCKED_DIRS: Mutex<BTreeSet<PathBuf>> = const_mutex(BTreeSet::new());

/// Exclusive hold on a database directory, released on drop.
struct DirLock {
    file: File,
    key: PathBuf,
}

impl DirLock {
    fn acquire(dir: &Path) -> Result<Self> {
        let key = dir.canonicalize()?;
        let path = lock_file_path(dir);
        if !LOCKED_DIRS.lock().insert(key.clone()) {
            return Err(Error::Io(format!(
                "lock {}: already held by process",
                path.display()
            )));
        }

        match Self::lock_file(&path) {
            Ok(file) => Ok(Self { file, key }),
            Err(e) => {
                LOCKED_DIRS.lock().remove(&key);
                Err(e)
            }
        }
    }

    fn lock_file(path: &Path) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| Error::Io(format!("lock {}: {}", path.display(), e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // SAFETY: the descriptor stays owned by `file` for the call.
            let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
            if rc != 0 {
                return Err(Error::Io(format!(
                    "lock {}: {}",
                    path.display(),
                    io::Error::last_os_error()
                )));
            }
        }

        Ok(file)
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // SAFETY: as in `lock_file`.
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }
        LOCKED_DIRS.lock().remove(&self.key);
    }
}

/// The memtables and table a read sees, published atomically.
struct Version {
    mem: Arc<MemTable>,
    /// Frozen memtables waiting for compaction, newest first.
    imms: Vec<Arc<MemTable>>,
    table: Option<Arc<Table>>,
}

impl Version {
    fn table_number(&self) -> u64 {
        self.table.as_ref().map_or(0, |t| t.number())
    }
}

/// Operation counters behind the `emberkv.stats` property.
#[derive(Default)]
struct Statistics {
    keys_written: AtomicU64,
    keys_deleted: AtomicU64,
    deletes_filtered: AtomicU64,
    bytes_written: AtomicU64,
    keys_read: AtomicU64,
    keys_found: AtomicU64,
    bytes_read: AtomicU64,
    wal_syncs: AtomicU64,
    compactions: AtomicU64,
    stall_compactions: AtomicU64,
    entries_dropped: AtomicU64,
    compaction_bytes_written: AtomicU64,
}

fn bump(counter: &AtomicU64, n: u64) {
    counter.fetch_add(n, Ordering::Relaxed);
}

fn table_options(options: &NativeOptions) -> TableOptions {
    TableOptions {
        block_size: options.block_size,
        restart_interval: usize::try_from(options.block_restart_interval)
            .unwrap_or(1)
            .max(1),
        compression: options.compression_for_level(options.table_level()),
        filter: if options.whole_key_filtering {
            options.filter_policy.clone()
        } else {
            None
        },
    }
}

fn wal_dir_for(options: &NativeOptions, path: &Path) -> PathBuf {
    if options.wal_dir.is_empty() {
        path.to_path_buf()
    } else {
        PathBuf::from(&options.wal_dir)
    }
}

fn read_current(path: &Path) -> Result<Option<CurrentState>> {
    read_current_file(path).map_err(|e| match e.kind() {
        io::ErrorKind::InvalidData => {
            Error::corruption(format!("{}: {}", current_file_path(path).display(), e))
        }
        _ => e.into(),
    })
}

/// Highest file number in use by any log, table or temp file.
fn max_file_number(path: &Path, wal_dir: &Path) -> io::Result<u64> {
    let mut max = 0;
    for file_type in [FileType::Table, FileType::Temp] {
        max = max.max(list_files_of_type(path, file_type)?.last().copied().unwrap_or(0));
    }
    max = max.max(list_files_of_type(wal_dir, FileType::Log)?.last().copied().unwrap_or(0));
    Ok(max)
}

/// Shared state of an open database.
pub(crate) struct DbCore {
    path: PathBuf,
    wal_dir: PathBuf,
    options: NativeOptions,
    table_options: TableOptions,
    sync_policy: SyncPolicy,
    block_cache: Option<Arc<BlockCache>>,
    compressed_cache: Option<Arc<BlockCache>>,
    env: Arc<EnvInner>,
    version: ArcSwap<Version>,
    last_sequence: AtomicU64,
    next_file: AtomicU64,
    /// Serializes writers and owns the active log.
    wal: Mutex<LogWriter>,
    compaction_lock: Mutex<()>,
    /// Live snapshot sequences and how many handles share each.
    snapshots: Mutex<BTreeMap<u64, usize>>,
    /// Set by a failed write in paranoid mode; every later write fails with it.
    bg_error: RwLock<Option<Error>>,
    compaction_scheduled: AtomicBool,
    bg_mutex: Mutex<()>,
    bg_done: Condvar,
    shutting_down: AtomicBool,
    stats: Statistics,
    lock: Mutex<Option<DirLock>>,
    #[cfg(test)]
    fail_wal_writes: AtomicBool,
}

impl DbCore {
    pub fn open(mut options: NativeOptions, path: PathBuf) -> Result<Arc<Self>> {
        options.sanitize()?;
        let level = options.info_log_level;

        if !path.exists() {
            if !options.create_if_missing {
                return Err(Error::config(format!(
                    "{}: does not exist (create_if_missing is false)",
                    path.display()
                )));
            }
            fs::create_dir_all(&path)?;
        }
        let wal_dir = wal_dir_for(&options, &path);
        fs::create_dir_all(&wal_dir)?;

        let lock = DirLock::acquire(&path)?;

        let state = match read_current(&path)? {
            Some(_) if options.error_if_exists => {
                return Err(Error::config(format!(
                    "{}: exists (error_if_exists is true)",
                    path.display()
                )));
            }
            Some(state) => state,
            None if options.create_if_missing => CurrentState {
                next_file: 1,
                ..CurrentState::default()
            },
            None => {
                return Err(Error::config(format!(
                    "{}: does not exist (create_if_missing is false)",
                    current_file_path(&path).display()
                )));
            }
        };

        let table = match state.table {
            0 => None,
            number => {
                let table = Table::open(&table_file_path(&path, number), number)?;
                if options.paranoid_checks {
                    table.verify()?;
                }
                Some(Arc::new(table))
            }
        };

        let (mem, last_sequence) = Self::recover_logs(&options, &wal_dir, &state)?;

        let mut next_file = state.next_file.max(max_file_number(&path, &wal_dir)? + 1);
        let log_number = next_file;
        next_file += 1;

        let sync_policy = SyncPolicy {
            disable_data_sync: options.disable_data_sync,
            use_fsync: options.use_fsync,
            bytes_per_sync: options.bytes_per_sync,
        };
        let wal = LogWriter::create(&log_file_path(&wal_dir, log_number), log_number, sync_policy)?;

        fs::write(options_file_path(&path), options.dump())?;

        for (l, compression) in options
            .compression_per_level
            .iter()
            .copied()
            .enumerate()
            .chain(std::iter::once((usize::MAX, options.compression)))
        {
            if compression == EMBERKV_ZLIB_COMPRESSION || compression == EMBERKV_BZIP2_COMPRESSION
            {
                let table_level = if l == usize::MAX {
                    "default".to_string()
                } else {
                    l.to_string()
                };
                engine_log!(
                    level,
                    warn,
                    table_level = %table_level,
                    compression,
                    "compression type not built in, tables are stored uncompressed"
                );
            }
        }

        let block_cache = if options.no_block_cache {
            None
        } else {
            Some(
                options
                    .cache
                    .clone()
                    .unwrap_or_else(|| Arc::new(BlockCache::new(DEFAULT_INTERNAL_CACHE_SIZE))),
            )
        };
        let compressed_cache = options.cache_compressed.clone();
        let env = options.env.clone().unwrap_or_else(default_env);

        let recovered = !mem.is_empty();
        let core = Arc::new(Self {
            wal_dir,
            table_options: table_options(&options),
            sync_policy,
            block_cache,
            compressed_cache,
            env,
            version: ArcSwap::from_pointee(Version {
                mem: Arc::new(mem),
                imms: Vec::new(),
                table,
            }),
            last_sequence: AtomicU64::new(last_sequence),
            next_file: AtomicU64::new(next_file),
            wal: Mutex::new(wal),
            compaction_lock: Mutex::new(()),
            snapshots: Mutex::new(BTreeMap::new()),
            bg_error: RwLock::new(None),
            compaction_scheduled: AtomicBool::new(false),
            bg_mutex: Mutex::new(()),
            bg_done: Condvar::new(),
            shutting_down: AtomicBool::new(false),
            stats: Statistics::default(),
            lock: Mutex::new(Some(lock)),
            #[cfg(test)]
            fail_wal_writes: AtomicBool::new(false),
            path,
            options,
        });

        if recovered {
            // Move the replayed writes into the table so the old logs can go.
            core.compact(None, None)?;
        } else {
            let table_number = core.version.load().table_number();
            core.write_current(table_number, log_number)?;
            core.delete_obsolete_files(table_number, log_number);
        }

        engine_log!(
            level,
            info,
            path = %core.path.display(),
            last_sequence,
            recovered,
            "database opened"
        );
        Ok(core)
    }

    /// Replay every log at or after the one `CURRENT` names.
    fn recover_logs(
        options: &NativeOptions,
        wal_dir: &Path,
        state: &CurrentState,
    ) -> Result<(MemTable, u64)> {
        let level = options.info_log_level;
        let fatal = options.paranoid_checks && !options.skip_log_error_on_recovery;
        let mem = MemTable::new();
        let mut last_sequence = state.last_sequence;

        for number in list_files_of_type(wal_dir, FileType::Log)? {
            if number < state.log {
                continue;
            }
            let path = log_file_path(wal_dir, number);
            let contents = LogReader::open(&path, fatal)?.read_all()?;
            if contents.dropped > 0 {
                engine_log!(
                    level,
                    warn,
                    log = number,
                    dropped = contents.dropped,
                    "dropped corrupt log fragments during recovery"
                );
            }

            let mut replayed = 0u64;
            for raw in contents.records {
                match LogRecord::decode(&raw) {
                    Ok(record) => {
                        last_sequence = last_sequence.max(record.sequence);
                        mem.add(record.internal_key(), record.value);
                        replayed += 1;
                    }
                    Err(e) if fatal => return Err(e),
                    Err(e) => {
                        engine_log!(level, warn, log = number, error = %e, "skipping bad log record");
                    }
                }
            }
            engine_log!(level, debug, log = number, replayed, "replayed log");
        }

        Ok((mem, last_sequence))
    }

    fn log_level(&self) -> c_int {
        self.options.info_log_level
    }

    fn new_file_number(&self) -> u64 {
        self.next_file.fetch_add(1, Ordering::SeqCst)
    }

    fn caches(&self) -> BlockCaches<'_> {
        BlockCaches {
            uncompressed: self.block_cache.as_deref(),
            compressed: self.compressed_cache.as_deref(),
        }
    }

    fn write_current(&self, table: u64, log: u64) -> Result<()> {
        let state = CurrentState {
            table,
            log,
            next_file: self.new_file_number(),
            last_sequence: self.last_sequence.load(Ordering::SeqCst),
        };
        write_current_file(&self.path, &state)?;
        Ok(())
    }

    /// Remove logs older than `live_log`, tables other than `live_table`,
    /// and leftover temp files.
    fn delete_obsolete_files(&self, live_table: u64, live_log: u64) {
        let mut doomed = Vec::new();
        match list_files_of_type(&self.wal_dir, FileType::Log) {
            Ok(logs) => doomed.extend(
                logs.into_iter()
                    .filter(|&n| n < live_log)
                    .map(|n| log_file_path(&self.wal_dir, n)),
            ),
            Err(e) => {
                engine_log!(self.log_level(), warn, error = %e, "cannot list log files");
            }
        }
        match list_files_of_type(&self.path, FileType::Table) {
            Ok(tables) => doomed.extend(
                tables
                    .into_iter()
                    .filter(|&n| n != live_table)
                    .map(|n| table_file_path(&self.path, n)),
            ),
            Err(e) => {
                engine_log!(self.log_level(), warn, error = %e, "cannot list table files");
            }
        }
        if let Ok(temps) = list_files_of_type(&self.path, FileType::Temp) {
            doomed.extend(temps.into_iter().map(|n| temp_file_path(&self.path, n)));
        }

        for path in doomed {
            if let Err(e) = delete_file(&path) {
                engine_log!(
                    self.log_level(),
                    warn,
                    file = %path.display(),
                    error = %e,
                    "cannot delete obsolete file"
                );
            }
        }
    }

    fn append_to_log(&self, wal: &mut LogWriter, data: &[u8], sync: bool) -> io::Result<()> {
        #[cfg(test)]
        {
            if self.fail_wal_writes.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
            }
        }
        wal.add_record(data, sync)
    }

    /// Log and apply one put (`Some`) or delete (`None`).
    pub fn write(self: &Arc<Self>, key: &[u8], value: Option<&[u8]>, sync: bool) -> Result<()> {
        if let Some(err) = self.bg_error.read().clone() {
            return Err(err);
        }

        if value.is_none() && self.options.filter_deletes && !self.key_may_exist(key) {
            bump(&self.stats.deletes_filtered, 1);
            return Ok(());
        }

        self.make_room_for_write()?;

        let mut wal = self.wal.lock();
        let record = LogRecord {
            sequence: self.last_sequence.load(Ordering::SeqCst) + 1,
            key: Bytes::copy_from_slice(key),
            value: value.map(Bytes::copy_from_slice),
        };

        if let Err(e) = self.append_to_log(&mut wal, &record.encode(), sync) {
            let err = Error::Io(format!(
                "{}: {}",
                log_file_path(&self.wal_dir, wal.number()).display(),
                e
            ));
            drop(wal);
            engine_log!(self.log_level(), error, error = %err, "log write failed");
            if self.options.paranoid_checks {
                *self.bg_error.write() = Some(err.clone());
            }
            return Err(err);
        }

        let sequence = record.sequence;
        let written = (key.len() + value.map_or(0, <[u8]>::len)) as u64;
        self.version.load().mem.add(record.internal_key(), record.value);
        self.last_sequence.store(sequence, Ordering::SeqCst);
        drop(wal);

        if value.is_some() {
            bump(&self.stats.keys_written, 1);
        } else {
            bump(&self.stats.keys_deleted, 1);
        }
        bump(&self.stats.bytes_written, written);
        if sync && !self.options.disable_data_sync {
            bump(&self.stats.wal_syncs, 1);
        }
        Ok(())
    }

    fn make_room_for_write(self: &Arc<Self>) -> Result<()> {
        let usage = self.version.load().mem.approximate_memory_usage();
        let buffer = self.options.write_buffer_size;
        if usage < buffer {
            return Ok(());
        }

        let max_buffers = usize::try_from(self.options.max_write_buffer_number).unwrap_or(2);
        if usage >= buffer.saturating_mul(max_buffers) {
            bump(&self.stats.stall_compactions, 1);
            engine_log!(
                self.log_level(),
                info,
                usage,
                "memtable limit reached, compacting before the write"
            );
            return self.compact(None, None);
        }

        if !self.options.disable_auto_compactions {
            self.maybe_schedule_compaction();
        }
        Ok(())
    }

    fn maybe_schedule_compaction(self: &Arc<Self>) {
        if self.shutting_down.load(Ordering::SeqCst) || self.bg_error.read().is_some() {
            return;
        }
        if self.compaction_scheduled.swap(true, Ordering::SeqCst) {
            return;
        }

        let priority = if self.options.max_background_flushes > 0 {
            Priority::High
        } else {
            Priority::Low
        };
        let core = Arc::clone(self);
        if let Err(e) = self
            .env
            .schedule(priority, move || core.background_compaction())
        {
            engine_log!(self.log_level(), warn, error = %e, "cannot schedule compaction");
            self.finish_background_work();
        }
    }

    fn background_compaction(&self) {
        if !self.shutting_down.load(Ordering::SeqCst) {
            let needed = {
                let version = self.version.load();
                !version.imms.is_empty()
                    || version.mem.approximate_memory_usage() >= self.options.write_buffer_size
            };
            // Failures are logged and recorded by `compact`.
            if needed && self.compact(None, None).is_err() {
                engine_log!(self.log_level(), debug, "background compaction abandoned");
            }
        }
        self.finish_background_work();
    }

    fn finish_background_work(&self) {
        self.compaction_scheduled.store(false, Ordering::SeqCst);
        let _guard = self.bg_mutex.lock();
        self.bg_done.notify_all();
    }

    /// Newest visible state of `key` across memtables and the table.
    fn lookup(
        &self,
        version: &Version,
        key: &[u8],
        sequence: u64,
        policy: ReadPolicy,
    ) -> Result<LookupResult> {
        match version.mem.get(key, sequence) {
            LookupResult::NotFound => {}
            found => return Ok(found),
        }
        for imm in &version.imms {
            match imm.get(key, sequence) {
                LookupResult::NotFound => {}
                found => return Ok(found),
            }
        }
        match &version.table {
            Some(table) => table.get(key, sequence, self.caches(), policy),
            None => Ok(LookupResult::NotFound),
        }
    }

    pub fn get(
        &self,
        key: &[u8],
        snapshot: Option<u64>,
        policy: ReadPolicy,
    ) -> Result<Option<Bytes>> {
        // Version before sequence: anything a later compaction drops was
        // shadowed above the read point by an entry this version still holds.
        let version = self.version.load_full();
        let sequence = snapshot.unwrap_or_else(|| self.last_sequence.load(Ordering::SeqCst));
        bump(&self.stats.keys_read, 1);

        match self.lookup(&version, key, sequence, policy)? {
            LookupResult::Found(value) => {
                bump(&self.stats.keys_found, 1);
                bump(&self.stats.bytes_read, value.len() as u64);
                Ok(Some(value))
            }
            LookupResult::Deleted | LookupResult::NotFound => Ok(None),
        }
    }

    /// False only when `key` certainly has no live value.
    fn key_may_exist(&self, key: &[u8]) -> bool {
        let policy = ReadPolicy {
            verify_checksums: false,
            fill_cache: false,
        };
        let version = self.version.load_full();
        let sequence = self.last_sequence.load(Ordering::SeqCst);
        !matches!(
            self.lookup(&version, key, sequence, policy),
            Ok(LookupResult::Deleted | LookupResult::NotFound)
        )
    }

    pub fn snapshot(&self) -> u64 {
        let mut snapshots = self.snapshots.lock();
        let sequence = self.last_sequence.load(Ordering::SeqCst);
        *snapshots.entry(sequence).or_insert(0) += 1;
        sequence
    }

    pub fn release_snapshot(&self, sequence: u64) {
        let mut snapshots = self.snapshots.lock();
        if let Some(count) = snapshots.get_mut(&sequence) {
            *count -= 1;
            if *count == 0 {
                snapshots.remove(&sequence);
            }
        }
    }

    /// Swap in a fresh memtable and log. Returns the number of the active
    /// log; every older log is covered by the frozen memtables or the table.
    fn freeze_memtable(&self) -> Result<u64> {
        let mut wal = self.wal.lock();
        let current = self.version.load_full();
        if current.mem.is_empty() {
            return Ok(wal.number());
        }

        let number = self.new_file_number();
        let writer = LogWriter::create(
            &log_file_path(&self.wal_dir, number),
            number,
            self.sync_policy,
        )?;
        wal.sync()?;

        let mut imms = Vec::with_capacity(current.imms.len() + 1);
        imms.push(Arc::clone(&current.mem));
        imms.extend(current.imms.iter().cloned());
        self.version.store(Arc::new(Version {
            mem: Arc::new(MemTable::new()),
            imms,
            table: current.table.clone(),
        }));
        *wal = writer;
        Ok(number)
    }

    /// Merge frozen memtables and the table into a new table file.
    /// Returns the table (if any entries survived) and the counters.
    fn build_table(
        &self,
        version: &Version,
        number: u64,
        start: Option<&[u8]>,
        limit: Option<&[u8]>,
    ) -> Result<(Option<Table>, GcStats)> {
        let snapshots: Vec<u64> = self.snapshots.lock().keys().copied().collect();

        let mut sources: Vec<Source<'_>> = version
            .imms
            .iter()
            .map(|mem| Box::new(mem.iter().map(Ok::<_, Error>)) as Source<'_>)
            .collect();
        if let Some(table) = &version.table {
            sources.push(Box::new(
                table.iter(self.options.verify_checksums_in_compaction),
            ));
        }

        let temp = temp_file_path(&self.path, number);
        let mut builder = TableBuilder::create(&temp, self.table_options.clone())?;
        let mut filter = GarbageFilter::new(&snapshots, start, limit);
        for entry in MergingIter::new(sources) {
            let (key, value) = entry?;
            filter.feed(key, value, &mut |k: &InternalKey, v: &[u8]| {
                builder.add(k, v).map_err(Error::from)
            })?;
        }
        let stats = filter.finish();

        let entries = builder.entries();
        let file_size = builder.finish()?;
        if entries == 0 {
            delete_file(&temp)?;
            return Ok((None, stats));
        }

        let path = table_file_path(&self.path, number);
        fs::rename(&temp, &path)?;
        bump(&self.stats.compaction_bytes_written, file_size);
        Ok((Some(Table::open(&path, number)?), stats))
    }

    /// Compact everything into a new table, collecting garbage for user keys
    /// in `[start, limit]`.
    pub fn compact(&self, start: Option<&[u8]>, limit: Option<&[u8]>) -> Result<()> {
        let result = self.compact_locked(start, limit);
        if let Err(e) = &result {
            engine_log!(self.log_level(), error, error = %e, "compaction failed");
            if self.options.paranoid_checks {
                *self.bg_error.write() = Some(e.clone());
            }
        }
        result
    }

    fn compact_locked(&self, start: Option<&[u8]>, limit: Option<&[u8]>) -> Result<()> {
        let _compaction = self.compaction_lock.lock();
        let live_log = self.freeze_memtable()?;
        let version = self.version.load_full();
        if version.imms.is_empty() && version.table.is_none() {
            return Ok(());
        }

        let number = self.new_file_number();
        let (table, stats) = match self.build_table(&version, number, start, limit) {
            Ok(built) => built,
            Err(e) => {
                // Best effort; leftovers are also swept at the next open.
                delete_file(&temp_file_path(&self.path, number)).ok();
                return Err(e);
            }
        };

        let table_number = table.as_ref().map_or(0, Table::number);
        self.write_current(table_number, live_log)?;
        {
            let _wal = self.wal.lock();
            let current = self.version.load_full();
            self.version.store(Arc::new(Version {
                mem: Arc::clone(&current.mem),
                imms: Vec::new(),
                table: table.map(Arc::new),
            }));
        }
        self.delete_obsolete_files(table_number, live_log);

        bump(&self.stats.compactions, 1);
        bump(&self.stats.entries_dropped, stats.input - stats.output);
        engine_log!(
            self.log_level(),
            info,
            table = table_number,
            input = stats.input,
            output = stats.output,
            shadowed = stats.shadowed,
            tombstones = stats.tombstones,
            "compaction finished"
        );
        Ok(())
    }

    pub fn property(&self, name: &str) -> Option<String> {
        let version = self.version.load_full();
        match name {
            "emberkv.stats" => self.options.statistics.then(|| self.stats_report()),
            "emberkv.options" => Some(self.options.dump()),
            "emberkv.num-entries-active-mem-table" => Some(version.mem.len().to_string()),
            "emberkv.estimate-num-keys" => {
                let memtables: usize =
                    version.mem.len() + version.imms.iter().map(|m| m.len()).sum::<usize>();
                let table = version.table.as_ref().map_or(0, |t| t.num_entries());
                Some((memtables as u64 + table).to_string())
            }
            "emberkv.block-cache-usage" => Some(
                self.block_cache
                    .as_ref()
                    .map_or(0, |c| c.usage())
                    .to_string(),
            ),
            "emberkv.total-table-size" => Some(
                version
                    .table
                    .as_ref()
                    .map_or(0, |t| t.file_size())
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn stats_report(&self) -> String {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let s = &self.stats;
        let mut out = String::from("** emberkv statistics **\n");
        let rows = [
            ("keys.written", get(&s.keys_written)),
            ("keys.deleted", get(&s.keys_deleted)),
            ("keys.deletes.filtered", get(&s.deletes_filtered)),
            ("bytes.written", get(&s.bytes_written)),
            ("keys.read", get(&s.keys_read)),
            ("keys.found", get(&s.keys_found)),
            ("bytes.read", get(&s.bytes_read)),
            ("wal.syncs", get(&s.wal_syncs)),
            ("compactions", get(&s.compactions)),
            ("compactions.stall", get(&s.stall_compactions)),
            ("compaction.entries.dropped", get(&s.entries_dropped)),
            ("compaction.bytes.written", get(&s.compaction_bytes_written)),
        ];
        for (name, value) in rows {
            let _ = writeln!(out, "{}: {}", name, value);
        }
        if let Some(cache) = &self.block_cache {
            let stats = cache.stats();
            let _ = writeln!(out, "block.cache.hit: {}", get(&stats.hits));
            let _ = writeln!(out, "block.cache.miss: {}", get(&stats.misses));
            let _ = writeln!(out, "block.cache.usage: {}", cache.usage());
        }
        out
    }

    /// Wait for background work, sync the log and release the directory.
    pub fn close(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        {
            let mut guard = self.bg_mutex.lock();
            while self.compaction_scheduled.load(Ordering::SeqCst) {
                self.bg_done.wait(&mut guard);
            }
        }

        if let Err(e) = self.wal.lock().sync() {
            engine_log!(self.log_level(), warn, error = %e, "log sync at close failed");
        }
        self.lock.lock().take();
        engine_log!(self.log_level(), debug, path = %self.path.display(), "database closed");
    }

    /// Delete every database file in an unlocked directory.
    pub fn destroy(options: &NativeOptions, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        let lock = DirLock::acquire(path)?;
        let wal_dir = wal_dir_for(options, path);

        let mut dirs = vec![path];
        if wal_dir != path && wal_dir.exists() {
            dirs.push(wal_dir.as_path());
        }
        let mut doomed = Vec::new();
        for dir in dirs {
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                match parse_file_name(&entry.file_name().to_string_lossy()) {
                    Some((FileType::Lock, _)) | None => {}
                    Some(_) => doomed.push(entry.path()),
                }
            }
        }
        for file in &doomed {
            delete_file(file)?;
        }

        drop(lock);
        delete_file(&lock_file_path(path))?;
        if wal_dir != path {
            fs::remove_dir(&wal_dir).ok();
        }
        // Only succeeds when nothing foreign is left behind.
        fs::remove_dir(path).ok();

        engine_log!(
            options.info_log_level,
            info,
            path = %path.display(),
            files = doomed.len(),
            "database destroyed"
        );
        Ok(())
    }

    /// Rebuild a consistent database from whatever tables and logs survive.
    pub fn repair(mut options: NativeOptions, path: &Path) -> Result<()> {
        options.sanitize()?;
        let level = options.info_log_level;
        if !path.exists() {
            return Err(Error::config(format!("{}: does not exist", path.display())));
        }
        let _lock = DirLock::acquire(path)?;
        let wal_dir = wal_dir_for(&options, path);

        let mut entries: Vec<(InternalKey, Bytes)> = Vec::new();
        let mut last_sequence = read_current(path)
            .ok()
            .flatten()
            .map_or(0, |state| state.last_sequence);

        let tables = list_files_of_type(path, FileType::Table)?;
        for &number in &tables {
            match Table::open(&table_file_path(path, number), number) {
                Ok(table) => {
                    let (mut salvaged, bad_blocks) = table.salvage();
                    if bad_blocks > 0 {
                        engine_log!(level, warn, table = number, bad_blocks, "dropped unreadable blocks");
                    }
                    entries.append(&mut salvaged);
                }
                Err(e) => {
                    engine_log!(level, warn, table = number, error = %e, "skipping unreadable table");
                }
            }
        }

        let logs = if wal_dir.exists() {
            list_files_of_type(&wal_dir, FileType::Log)?
        } else {
            Vec::new()
        };
        for &number in &logs {
            let contents = LogReader::open(&log_file_path(&wal_dir, number), false)
                .map_err(Error::from)
                .and_then(|reader| reader.read_all());
            match contents {
                Ok(contents) => entries.extend(
                    contents
                        .records
                        .iter()
                        .filter_map(|raw| LogRecord::decode(raw).ok())
                        .map(|record| (record.internal_key(), record.value.unwrap_or_default())),
                ),
                Err(e) => {
                    engine_log!(level, warn, log = number, error = %e, "skipping unreadable log");
                }
            }
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.dedup_by(|a, b| a.0 == b.0);
        last_sequence = entries
            .iter()
            .map(|(k, _)| k.sequence())
            .fold(last_sequence, u64::max);

        let number = max_file_number(path, &wal_dir)? + 1;
        let temp = temp_file_path(path, number);
        let mut builder = TableBuilder::create(&temp, table_options(&options))?;
        let mut filter = GarbageFilter::new(&[], None, None);
        for (key, value) in entries {
            filter.feed(key, value, &mut |k: &InternalKey, v: &[u8]| {
                builder.add(k, v).map_err(Error::from)
            })?;
        }
        let stats = filter.finish();
        let kept = builder.entries();
        builder.finish()?;

        let table = if kept == 0 {
            delete_file(&temp)?;
            0
        } else {
            fs::rename(&temp, table_file_path(path, number))?;
            number
        };

        fs::create_dir_all(&wal_dir)?;
        let log = number + 1;
        let sync_policy = SyncPolicy {
            disable_data_sync: options.disable_data_sync,
            use_fsync: options.use_fsync,
            bytes_per_sync: 0,
        };
        LogWriter::create(&log_file_path(&wal_dir, log), log, sync_policy)?.sync()?;
        write_current_file(
            path,
            &CurrentState {
                table,
                log,
                next_file: log + 1,
                last_sequence,
            },
        )?;

        for old in tables.into_iter().filter(|&n| n != table) {
            delete_file(&table_file_path(path, old))?;
        }
        for old in logs {
            delete_file(&log_file_path(&wal_dir, old))?;
        }

        engine_log!(
            level,
            info,
            path = %path.display(),
            entries = stats.output,
            dropped = stats.input - stats.output,
            "database repaired"
        );
        Ok(())
    }
}

/// Engine handle for an open database.
pub struct emberkv_t {
    core: Arc<DbCore>,
}

/// Engine handle for a point-in-time view.
#[derive(Debug, Clone, Copy)]
pub struct emberkv_snapshot_t {
    /// Identity of the database the snapshot was taken from.
    pub(crate) db: usize,
    pub(crate) sequence: u64,
}

impl emberkv_t {
    fn id(&self) -> usize {
        Arc::as_ptr(&self.core) as usize
    }
}

/// Engine status text for an error, in the engine's `Kind: message` style.
fn status(err: &Error) -> String {
    match err {
        Error::InvalidConfiguration(msg) => format!("Invalid argument: {}", msg),
        Error::Corruption(msg) => format!("Corruption: {}", msg),
        Error::Io(msg) => format!("IO error: {}", msg),
        other => other.to_string(),
    }
}

unsafe fn raw_slice<'a>(data: *const c_char, len: size_t) -> &'a [u8] {
    if len == 0 || data.is_null() {
        &[]
    } else {
        slice::from_raw_parts(data.cast(), len)
    }
}

/// Open the database named by the NUL-terminated path `name`. On failure
/// returns null and stores the reason in `errptr`.
///
/// # Safety
///
/// `options` must be a live options handle, `name` a valid C string and
/// `errptr` null or a valid error slot.
pub unsafe fn emberkv_open(
    options: *const emberkv_options_t,
    name: *const c_char,
    errptr: *mut *mut c_char,
) -> *mut emberkv_t {
    let path = cstr_to_path(CStr::from_ptr(name));
    match DbCore::open((*options).inner.clone(), path) {
        Ok(core) => into_raw(ObjectKind::Database, emberkv_t { core }),
        Err(e) => {
            set_error(errptr, &status(&e));
            ptr::null_mut()
        }
    }
}

/// # Safety
///
/// `db` must come from [`emberkv_open`] and not be closed twice.
pub unsafe fn emberkv_close(db: *mut emberkv_t) {
    if let Some(handle) = db.as_ref() {
        handle.core.close();
    }
    drop_raw(ObjectKind::Database, db);
}

/// # Safety
///
/// `db` and `options` must be live handles; `key` and `val` must point to
/// `keylen` and `vallen` readable bytes.
pub unsafe fn emberkv_put(
    db: *mut emberkv_t,
    options: *const emberkv_writeoptions_t,
    key: *const c_char,
    keylen: size_t,
    val: *const c_char,
    vallen: size_t,
    errptr: *mut *mut c_char,
) {
    let result = (*db).core.write(
        raw_slice(key, keylen),
        Some(raw_slice(val, vallen)),
        (*options).sync,
    );
    if let Err(e) = result {
        set_error(errptr, &status(&e));
    }
}

/// # Safety
///
/// As for [`emberkv_put`].
pub unsafe fn emberkv_delete(
    db: *mut emberkv_t,
    options: *const emberkv_writeoptions_t,
    key: *const c_char,
    keylen: size_t,
    errptr: *mut *mut c_char,
) {
    if let Err(e) = (*db).core.write(raw_slice(key, keylen), None, (*options).sync) {
        set_error(errptr, &status(&e));
    }
}

/// Returns a copy of the value, released with `emberkv_free`, and stores
/// its length in `vallen`. Null with no error means the key is absent.
///
/// # Safety
///
/// `db` and `options` must be live handles, `key` must point to `keylen`
/// readable bytes and `vallen` must be writable.
pub unsafe fn emberkv_get(
    db: *mut emberkv_t,
    options: *const emberkv_readoptions_t,
    key: *const c_char,
    keylen: size_t,
    vallen: *mut size_t,
    errptr: *mut *mut c_char,
) -> *mut c_char {
    let options = &*options;
    let policy = ReadPolicy {
        verify_checksums: options.verify_checksums,
        fill_cache: options.fill_cache,
    };
    *vallen = 0;
    let snapshot = match options.snapshot {
        Some(snap) if snap.db != (*db).id() => {
            set_error(
                errptr,
                "Invalid argument: snapshot was taken from another database",
            );
            return ptr::null_mut();
        }
        snap => snap.map(|s| s.sequence),
    };
    match (*db).core.get(raw_slice(key, keylen), snapshot, policy) {
        Ok(Some(value)) => {
            *vallen = value.len();
            malloc_copy(&value)
        }
        Ok(None) => ptr::null_mut(),
        Err(e) => {
            set_error(errptr, &status(&e));
            ptr::null_mut()
        }
    }
}

/// Compact the key range `[start_key, limit_key]`; a null bound leaves
/// that side open. Failures are logged, and in paranoid mode make the
/// database read-only.
///
/// # Safety
///
/// `db` must be a live handle; non-null bounds must point to the given
/// number of readable bytes.
pub unsafe fn emberkv_compact_range(
    db: *mut emberkv_t,
    start_key: *const c_char,
    start_key_len: size_t,
    limit_key: *const c_char,
    limit_key_len: size_t,
) {
    let start = (!start_key.is_null()).then(|| raw_slice(start_key, start_key_len));
    let limit = (!limit_key.is_null()).then(|| raw_slice(limit_key, limit_key_len));
    // Already logged and recorded by `compact`.
    (*db).core.compact(start, limit).ok();
}

/// # Safety
///
/// `db` must be a live handle.
pub unsafe fn emberkv_create_snapshot(db: *mut emberkv_t) -> *const emberkv_snapshot_t {
    let sequence = (*db).core.snapshot();
    into_raw(
        ObjectKind::Snapshot,
        emberkv_snapshot_t {
            db: (*db).id(),
            sequence,
        },
    )
}

/// # Safety
///
/// `snapshot` must come from [`emberkv_create_snapshot`] on this `db` and
/// not be released twice.
pub unsafe fn emberkv_release_snapshot(db: *mut emberkv_t, snapshot: *const emberkv_snapshot_t) {
    if let Some(snap) = snapshot.as_ref() {
        (*db).core.release_snapshot(snap.sequence);
    }
    drop_raw(ObjectKind::Snapshot, snapshot as *mut emberkv_snapshot_t);
}

/// Value of a named property, released with `emberkv_free`, or null when
/// the property is unknown.
///
/// # Safety
///
/// `db` must be a live handle and `propname` a valid C string.
pub unsafe fn emberkv_property_value(db: *mut emberkv_t, propname: *const c_char) -> *mut c_char {
    let name = CStr::from_ptr(propname).to_string_lossy();
    match (*db).core.property(&name) {
        Some(value) => engine_string(&value),
        None => ptr::null_mut(),
    }
}

/// # Safety
///
/// As for [`emberkv_open`].
pub unsafe fn emberkv_destroy_db(
    options: *const emberkv_options_t,
    name: *const c_char,
    errptr: *mut *mut c_char,
) {
    let path = cstr_to_path(CStr::from_ptr(name));
    if let Err(e) = DbCore::destroy(&(*options).inner, &path) {
        set_error(errptr, &status(&e));
    }
}

/// # Safety
///
/// As for [`emberkv_open`].
pub unsafe fn emberkv_repair_db(
    options: *const emberkv_options_t,
    name: *const c_char,
    errptr: *mut *mut c_char,
) {
    let path = cstr_to_path(CStr::from_ptr(name));
    if let Err(e) = DbCore::repair((*options).inner.clone(), &path) {
        set_error(errptr, &status(&e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    fn options() -> NativeOptions {
        NativeOptions {
            create_if_missing: true,
            ..NativeOptions::default()
        }
    }

    fn read() -> ReadPolicy {
        ReadPolicy {
            verify_checksums: true,
            fill_cache: true,
        }
    }

    fn get(core: &DbCore, key: &[u8]) -> Option<Bytes> {
        core.get(key, None, read()).unwrap()
    }

    #[test]
    fn test_put_get_delete() {
        let dir = tempdir().unwrap();
        let core = DbCore::open(options(), dir.path().join("db")).unwrap();

        core.write(b"key", Some(b"value"), false).unwrap();
        assert_eq!(get(&core, b"key"), Some(Bytes::from("value")));

        core.write(b"key", None, false).unwrap();
        assert_eq!(get(&core, b"key"), None);
        assert_eq!(get(&core, b"never"), None);
        core.close();
    }

    #[test]
    fn test_missing_directory_without_create() {
        let dir = tempdir().unwrap();
        let err = DbCore::open(NativeOptions::default(), dir.path().join("absent"))
            .err()
            .unwrap();
        assert!(status(&err).starts_with("Invalid argument:"));
        assert!(status(&err).contains("does not exist"));
    }

    #[test]
    fn test_error_if_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        DbCore::open(options(), path.clone()).unwrap().close();

        let strict = NativeOptions {
            error_if_exists: true,
            ..options()
        };
        let err = DbCore::open(strict, path).err().unwrap();
        assert!(err.message().contains("exists"));
    }

    #[test]
    fn test_second_open_fails_while_locked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        let core = DbCore::open(options(), path.clone()).unwrap();

        let err = DbCore::open(options(), path.clone()).err().unwrap();
        assert!(status(&err).starts_with("IO error: lock"));

        core.close();
        DbCore::open(options(), path).unwrap().close();
    }

    #[test]
    fn test_reopen_recovers_from_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        {
            let core = DbCore::open(options(), path.clone()).unwrap();
            core.write(b"a", Some(b"1"), false).unwrap();
            core.write(b"b", Some(b"2"), true).unwrap();
            core.write(b"a", None, false).unwrap();
            core.close();
        }

        let core = DbCore::open(options(), path.clone()).unwrap();
        assert_eq!(get(&core, b"a"), None);
        assert_eq!(get(&core, b"b"), Some(Bytes::from("2")));
        assert_eq!(core.property("emberkv.estimate-num-keys").unwrap(), "1");

        // Sequence numbers continue after recovery.
        core.write(b"c", Some(b"3"), false).unwrap();
        assert!(core.last_sequence.load(Ordering::SeqCst) >= 4);
        core.close();
    }

    #[test]
    fn test_compaction_keeps_data_and_drops_garbage() {
        let dir = tempdir().unwrap();
        let core = DbCore::open(options(), dir.path().join("db")).unwrap();

        for i in 0..100u32 {
            core.write(format!("k{:03}", i).as_bytes(), Some(b"old"), false)
                .unwrap();
        }
        for i in 0..100u32 {
            core.write(format!("k{:03}", i).as_bytes(), Some(b"new"), false)
                .unwrap();
        }
        for i in 0..50u32 {
            core.write(format!("k{:03}", i).as_bytes(), None, false).unwrap();
        }

        core.compact(None, None).unwrap();
        assert_eq!(core.property("emberkv.estimate-num-keys").unwrap(), "50");
        assert_ne!(core.property("emberkv.total-table-size").unwrap(), "0");
        assert_eq!(get(&core, b"k010"), None);
        assert_eq!(get(&core, b"k077"), Some(Bytes::from("new")));
        core.close();
    }

    #[test]
    fn test_compact_range_limits_collection() {
        let dir = tempdir().unwrap();
        let core = DbCore::open(options(), dir.path().join("db")).unwrap();
        for key in [b"a", b"m", b"z"] {
            core.write(key, Some(b"v"), false).unwrap();
            core.write(key, None, false).unwrap();
        }

        core.compact(Some(b"b"), Some(b"m")).unwrap();
        // "a" and "z" keep both versions; "m" is gone entirely.
        assert_eq!(core.property("emberkv.estimate-num-keys").unwrap(), "4");
        core.close();
    }

    #[test]
    fn test_snapshot_survives_compaction() {
        let dir = tempdir().unwrap();
        let core = DbCore::open(options(), dir.path().join("db")).unwrap();

        core.write(b"key", Some(b"v1"), false).unwrap();
        let snap = core.snapshot();
        core.write(b"key", Some(b"v2"), false).unwrap();
        core.write(b"gone", Some(b"x"), false).unwrap();
        core.compact(None, None).unwrap();

        assert_eq!(core.get(b"key", Some(snap), read()).unwrap(), Some(Bytes::from("v1")));
        assert_eq!(core.get(b"gone", Some(snap), read()).unwrap(), None);
        assert_eq!(get(&core, b"key"), Some(Bytes::from("v2")));

        core.release_snapshot(snap);
        core.compact(None, None).unwrap();
        assert_eq!(core.property("emberkv.estimate-num-keys").unwrap(), "2");
        core.close();
    }

    #[test]
    fn test_table_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        {
            let core = DbCore::open(options(), path.clone()).unwrap();
            core.write(b"persisted", Some(b"yes"), false).unwrap();
            core.compact(None, None).unwrap();
            core.close();
        }
        let logs = list_files_of_type(&path, FileType::Log).unwrap();
        assert_eq!(logs.len(), 1);

        let paranoid = NativeOptions {
            paranoid_checks: true,
            ..options()
        };
        let core = DbCore::open(paranoid, path).unwrap();
        assert_eq!(get(&core, b"persisted"), Some(Bytes::from("yes")));
        core.close();
    }

    #[test]
    fn test_paranoid_write_failure_makes_read_only() {
        let dir = tempdir().unwrap();
        let paranoid = NativeOptions {
            paranoid_checks: true,
            ..options()
        };
        let core = DbCore::open(paranoid, dir.path().join("db")).unwrap();
        core.write(b"a", Some(b"1"), false).unwrap();

        core.fail_wal_writes.store(true, Ordering::SeqCst);
        let err = core.write(b"b", Some(b"2"), false).unwrap_err();
        core.fail_wal_writes.store(false, Ordering::SeqCst);

        assert_eq!(core.write(b"c", Some(b"3"), false).unwrap_err(), err);
        assert_eq!(get(&core, b"a"), Some(Bytes::from("1")));
        assert_eq!(get(&core, b"b"), None);
        core.close();
    }

    #[test]
    fn test_write_failure_without_paranoid_is_transient() {
        let dir = tempdir().unwrap();
        let core = DbCore::open(options(), dir.path().join("db")).unwrap();

        core.fail_wal_writes.store(true, Ordering::SeqCst);
        assert!(core.write(b"b", Some(b"2"), false).is_err());
        core.fail_wal_writes.store(false, Ordering::SeqCst);

        core.write(b"c", Some(b"3"), false).unwrap();
        core.close();
    }

    #[test]
    fn test_filter_deletes_skips_absent_keys() {
        let dir = tempdir().unwrap();
        let opts = NativeOptions {
            filter_deletes: true,
            statistics: true,
            ..options()
        };
        let core = DbCore::open(opts, dir.path().join("db")).unwrap();

        core.write(b"absent", None, false).unwrap();
        core.write(b"present", Some(b"x"), false).unwrap();
        core.write(b"present", None, false).unwrap();

        assert_eq!(core.stats.deletes_filtered.load(Ordering::SeqCst), 1);
        assert_eq!(core.stats.keys_deleted.load(Ordering::SeqCst), 1);
        assert_eq!(get(&core, b"present"), None);
        core.close();
    }

    #[test]
    fn test_wal_dir_holds_logs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        let wal_dir = dir.path().join("wal");
        let opts = NativeOptions {
            wal_dir: wal_dir.to_string_lossy().into_owned(),
            ..options()
        };
        {
            let core = DbCore::open(opts.clone(), path.clone()).unwrap();
            core.write(b"k", Some(b"v"), false).unwrap();
            core.close();
        }
        assert!(!list_files_of_type(&wal_dir, FileType::Log).unwrap().is_empty());
        assert!(list_files_of_type(&path, FileType::Log).unwrap().is_empty());

        let core = DbCore::open(opts, path).unwrap();
        assert_eq!(get(&core, b"k"), Some(Bytes::from("v")));
        core.close();
    }

    #[test]
    fn test_auto_compaction_runs_in_background() {
        let dir = tempdir().unwrap();
        let opts = NativeOptions {
            write_buffer_size: 64 << 10,
            env: Some(Arc::new(EnvInner::new())),
            ..options()
        };
        let core = DbCore::open(opts, dir.path().join("db")).unwrap();

        let value = vec![b'x'; 100];
        for i in 0..2000u32 {
            core.write(format!("key{:05}", i).as_bytes(), Some(&value), false)
                .unwrap();
        }

        let deadline = Instant::now() + Duration::from_secs(10);
        while core.property("emberkv.total-table-size").unwrap() == "0" {
            assert!(Instant::now() < deadline, "no compaction ran");
            thread::sleep(Duration::from_millis(10));
        }
        for i in (0..2000u32).step_by(97) {
            assert_eq!(get(&core, format!("key{:05}", i).as_bytes()).unwrap().len(), 100);
        }
        core.close();
    }

    #[test]
    fn test_properties() {
        let dir = tempdir().unwrap();
        let core = DbCore::open(options(), dir.path().join("db")).unwrap();
        core.write(b"a", Some(b"1"), false).unwrap();

        assert_eq!(core.property("emberkv.stats"), None);
        assert_eq!(core.property("emberkv.num-entries-active-mem-table").unwrap(), "1");
        assert!(core
            .property("emberkv.options")
            .unwrap()
            .contains("create_if_missing=true"));
        assert_eq!(core.property("emberkv.no-such-property"), None);
        core.close();

        let dir = tempdir().unwrap();
        let opts = NativeOptions {
            statistics: true,
            ..options()
        };
        let core = DbCore::open(opts, dir.path().join("db")).unwrap();
        core.write(b"a", Some(b"1"), false).unwrap();
        get(&core, b"a");
        let stats = core.property("emberkv.stats").unwrap();
        assert!(stats.contains("keys.written: 1"));
        assert!(stats.contains("keys.found: 1"));
        core.close();
    }

    #[test]
    fn test_options_file_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        DbCore::open(options(), path.clone()).unwrap().close();
        let dump = fs::read_to_string(options_file_path(&path)).unwrap();
        assert!(dump.contains("write_buffer_size="));
    }

    #[test]
    fn test_destroy_removes_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        let core = DbCore::open(options(), path.clone()).unwrap();
        core.write(b"k", Some(b"v"), false).unwrap();

        assert!(DbCore::destroy(&options(), &path).is_err());
        core.close();

        DbCore::destroy(&options(), &path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_repair_rebuilds_from_table_and_logs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        {
            let core = DbCore::open(options(), path.clone()).unwrap();
            core.write(b"in-table", Some(b"1"), false).unwrap();
            core.compact(None, None).unwrap();
            core.write(b"in-log", Some(b"2"), false).unwrap();
            core.close();
        }

        fs::write(current_file_path(&path), "garbage=\n").unwrap();
        let err = DbCore::open(options(), path.clone()).err().unwrap();
        assert!(err.is_corruption());

        DbCore::repair(options(), &path).unwrap();
        let core = DbCore::open(options(), path).unwrap();
        assert_eq!(get(&core, b"in-table"), Some(Bytes::from("1")));
        assert_eq!(get(&core, b"in-log"), Some(Bytes::from("2")));
        core.close();
    }

    #[test]
    fn test_raw_api_round_trip() {
        let dir = tempdir().unwrap();
        let name = std::ffi::CString::new(dir.path().join("db").to_str().unwrap()).unwrap();
        let mut err: *mut c_char = ptr::null_mut();

        unsafe {
            let opts = super::super::emberkv_options_create();
            super::super::emberkv_options_set_create_if_missing(opts, 1);
            let db = emberkv_open(opts, name.as_ptr(), &mut err);
            assert!(err.is_null());

            let wopts = super::super::emberkv_writeoptions_create();
            let ropts = super::super::emberkv_readoptions_create();
            emberkv_put(db, wopts, b"k".as_ptr().cast(), 1, b"v".as_ptr().cast(), 1, &mut err);
            assert!(err.is_null());

            let mut len = 0;
            let value = emberkv_get(db, ropts, b"k".as_ptr().cast(), 1, &mut len, &mut err);
            assert_eq!(slice::from_raw_parts(value.cast::<u8>(), len), b"v");
            super::super::emberkv_free(value.cast());

            let missing = emberkv_get(db, ropts, b"x".as_ptr().cast(), 1, &mut len, &mut err);
            assert!(missing.is_null() && err.is_null());

            let snap = emberkv_create_snapshot(db);
            emberkv_delete(db, wopts, b"k".as_ptr().cast(), 1, &mut err);
            emberkv_compact_range(db, ptr::null(), 0, ptr::null(), 0);
            super::super::emberkv_readoptions_set_snapshot(ropts, snap);
            let old = emberkv_get(db, ropts, b"k".as_ptr().cast(), 1, &mut len, &mut err);
            assert_eq!(slice::from_raw_parts(old.cast::<u8>(), len), b"v");
            super::super::emberkv_free(old.cast());
            emberkv_release_snapshot(db, snap);

            super::super::emberkv_readoptions_destroy(ropts);
            super::super::emberkv_writeoptions_destroy(wopts);
            emberkv_close(db);
            super::super::emberkv_options_destroy(opts);
        }
    }
}
