//! Configuration options for emberkv.
//!
//! [`Options`] owns one engine options object and exposes one setter per
//! tunable. Values are forwarded as given; the engine decides what is legal
//! when the database is opened. Unset tunables keep the engine defaults
//! listed below.
//!
//! The engine encodes booleans two ways: most setters take a byte flag,
//! while `disable_data_sync`, `use_fsync`, `disable_seek_compaction` and
//! `disable_auto_compactions` take an integer flag. Each setter below
//! names its encoding explicitly.

mod parse;
mod read_write;
mod universal;

use std::fmt;
use std::marker::PhantomData;
use std::path::Path;

use libc::c_int;

use crate::cache::Cache;
use crate::env::Env;
use crate::filter::FilterPolicy;
use crate::handle::Handle;
use crate::sys;
use crate::util::conv::{
    bool_to_uchar, btoi, itob, path_to_cstring, take_engine_string, uchar_to_bool,
};
use crate::{Error, Result};

pub use read_write::{ReadOptions, WriteOptions};
pub use universal::UniversalCompactionOptions;

/// Default memtable size before it is compacted (4MB).
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 4 << 20;

/// Default number of memtables held before writes stall.
pub const DEFAULT_MAX_WRITE_BUFFER_NUMBER: i32 = 2;

/// Default target size of a table block (4KB).
pub const DEFAULT_BLOCK_SIZE: usize = 4 << 10;

/// Default number of keys between block restart points.
pub const DEFAULT_BLOCK_RESTART_INTERVAL: i32 = 16;

/// Default limit on open files.
pub const DEFAULT_MAX_OPEN_FILES: i32 = 1000;

/// Default number of levels.
pub const DEFAULT_NUM_LEVELS: i32 = 7;

/// Default level-0 file count that triggers a compaction.
pub const DEFAULT_LEVEL0_FILE_NUM_COMPACTION_TRIGGER: i32 = 4;

/// Block cache the engine creates when no cache is set (8MB).
pub use crate::sys::DEFAULT_INTERNAL_CACHE_SIZE;

/// Engine enumerations with fixed ordinals.
pub(crate) trait EngineEnum: Sized + Copy {
    const KIND: &'static str;

    fn from_raw(raw: c_int) -> Option<Self>;

    fn from_name(name: &str) -> Option<Self>;
}

macro_rules! engine_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal) {
            $( $(#[$vmeta:meta])* $variant:ident = $raw:path, $text:literal; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )*
        }

        impl $name {
            /// Every value, in ordinal order.
            pub const ALL: &'static [$name] = &[$($name::$variant),*];

            /// The engine ordinal.
            pub fn as_raw(self) -> c_int {
                match self {
                    $( $name::$variant => $raw, )*
                }
            }

            /// The name accepted by [`Options::set_from_string`].
            pub fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => $text, )*
                }
            }
        }

        impl EngineEnum for $name {
            const KIND: &'static str = $kind;

            fn from_raw(raw: c_int) -> Option<Self> {
                match raw {
                    $( r if r == $raw => Some($name::$variant), )*
                    _ => None,
                }
            }

            fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( $text => Some($name::$variant), )*
                    _ => None,
                }
            }
        }

        impl TryFrom<c_int> for $name {
            type Error = Error;

            fn try_from(raw: c_int) -> Result<Self> {
                <$name as EngineEnum>::from_raw(raw)
                    .ok_or_else(|| Error::config(format!("unknown {} {}", $kind, raw)))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

engine_enum! {
    /// Block compression algorithm.
    Compression ("compression type") {
        None = sys::EMBERKV_NO_COMPRESSION, "none";
        #[default]
        Snappy = sys::EMBERKV_SNAPPY_COMPRESSION, "snappy";
        Zlib = sys::EMBERKV_ZLIB_COMPRESSION, "zlib";
        Bzip2 = sys::EMBERKV_BZIP2_COMPRESSION, "bzip2";
    }
}

engine_enum! {
    /// How the engine picks files to compact.
    CompactionStyle ("compaction style") {
        #[default]
        Level = sys::EMBERKV_LEVEL_COMPACTION, "level";
        Universal = sys::EMBERKV_UNIVERSAL_COMPACTION, "universal";
    }
}

engine_enum! {
    /// File access pattern advised to the OS when a compaction starts.
    AccessHint ("access hint") {
        None = sys::EMBERKV_ACCESS_NONE, "none";
        #[default]
        Normal = sys::EMBERKV_ACCESS_NORMAL, "normal";
        Sequential = sys::EMBERKV_ACCESS_SEQUENTIAL, "sequential";
        WillNeed = sys::EMBERKV_ACCESS_WILLNEED, "willneed";
    }
}

engine_enum! {
    /// Lowest severity the engine logs.
    InfoLogLevel ("info log level") {
        Debug = sys::EMBERKV_DEBUG_LEVEL, "debug";
        #[default]
        Info = sys::EMBERKV_INFO_LEVEL, "info";
        Warn = sys::EMBERKV_WARN_LEVEL, "warn";
        Error = sys::EMBERKV_ERROR_LEVEL, "error";
        Fatal = sys::EMBERKV_FATAL_LEVEL, "fatal";
    }
}

engine_enum! {
    /// Universal compaction stop condition.
    UniversalStopStyle ("stop style") {
        SimilarSize = sys::EMBERKV_STOP_STYLE_SIMILAR_SIZE, "similar_size";
        #[default]
        TotalSize = sys::EMBERKV_STOP_STYLE_TOTAL_SIZE, "total_size";
    }
}

/// In-memory representation of the memtable. Exactly one is active; the
/// last one set wins.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MemtableRep {
    #[default]
    SkipList,
    Vector,
    HashSkipList {
        bucket_count: usize,
        height: i32,
        branching_factor: i32,
    },
    HashLinkList {
        bucket_count: usize,
    },
    PlainTable {
        key_len: u32,
        bloom_bits_per_key: i32,
        hash_table_ratio: f64,
        index_sparseness: usize,
    },
}

macro_rules! setters {
    (@conv $v:ident) => { $v };
    (@conv $v:ident, $conv:path) => { $conv($v) };
    ($( $(#[$doc:meta])* $name:ident($ty:ty) => $sys:ident $(, $conv:path)?; )*) => {
        $(
            $(#[$doc])*
            pub fn $name(&mut self, value: $ty) -> &mut Self {
                // SAFETY: the handle is live and `&mut self` excludes other users.
                unsafe { sys::$sys(self.handle.as_ptr(), setters!(@conv value $(, $conv)?)) };
                self
            }
        )*
    };
}

macro_rules! getters {
    (@conv $v:ident) => { $v };
    (@conv $v:ident, $conv:path) => { $conv($v) };
    ($( $(#[$doc:meta])* $name:ident -> $ty:ty => $sys:ident $(, $conv:path)?; )*) => {
        $(
            $(#[$doc])*
            pub fn $name(&self) -> $ty {
                // SAFETY: the handle is live for as long as `self`.
                let raw = unsafe { sys::$sys(self.handle.as_const()) };
                getters!(@conv raw $(, $conv)?)
            }
        )*
    };
}

/// Database configuration.
///
/// Shared resources set on the options (cache, filter policy, environment)
/// are borrowed for `'r`, and a database opened with these options carries
/// the same lifetime, so none of them can be dropped while still in use.
pub struct Options<'r> {
    handle: Handle<sys::emberkv_options_t>,
    _resources: PhantomData<&'r ()>,
}

impl<'r> Options<'r> {
    /// Options with every tunable at its engine default.
    pub fn new() -> Self {
        Self {
            handle: Handle::from_raw(sys::emberkv_options_create()),
            _resources: PhantomData,
        }
    }

    pub(crate) fn as_const(&self) -> *const sys::emberkv_options_t {
        self.handle.as_const()
    }

    setters! {
        // === Lifecycle (byte flags) ===
        /// Create the database directory if it does not exist. Default false.
        set_create_if_missing(bool) => emberkv_options_set_create_if_missing, bool_to_uchar;
        /// Fail to open a database that already exists. Default false.
        set_error_if_exists(bool) => emberkv_options_set_error_if_exists, bool_to_uchar;
        /// Verify everything the engine reads and stop accepting writes after
        /// the first write failure. Default false.
        set_paranoid_checks(bool) => emberkv_options_set_paranoid_checks, bool_to_uchar;
        set_info_log_level(InfoLogLevel) => emberkv_options_set_info_log_level, InfoLogLevel::as_raw;

        // === Memtable ===
        /// Bytes buffered in the memtable before it is compacted.
        set_write_buffer_size(usize) => emberkv_options_set_write_buffer_size;
        /// Memtables held in memory before writers stall.
        set_max_write_buffer_number(i32) => emberkv_options_set_max_write_buffer_number;
        set_min_write_buffer_number_to_merge(i32) => emberkv_options_set_min_write_buffer_number_to_merge;
        set_arena_block_size(usize) => emberkv_options_set_arena_block_size;
        set_inplace_update_support(bool) => emberkv_options_set_inplace_update_support, bool_to_uchar;
        set_inplace_update_num_locks(usize) => emberkv_options_set_inplace_update_num_locks;
        set_memtable_prefix_bloom_bits(u32) => emberkv_options_set_memtable_prefix_bloom_bits;
        set_memtable_prefix_bloom_probes(u32) => emberkv_options_set_memtable_prefix_bloom_probes;
        set_bloom_locality(u32) => emberkv_options_set_bloom_locality;
        set_max_successive_merges(usize) => emberkv_options_set_max_successive_merges;
        set_min_partial_merge_operands(u32) => emberkv_options_set_min_partial_merge_operands;

        // === Tables ===
        set_max_open_files(i32) => emberkv_options_set_max_open_files;
        /// Target uncompressed size of a table block.
        set_block_size(usize) => emberkv_options_set_block_size;
        set_block_restart_interval(i32) => emberkv_options_set_block_restart_interval;
        set_block_size_deviation(i32) => emberkv_options_set_block_size_deviation;
        set_compression(Compression) => emberkv_options_set_compression, Compression::as_raw;
        /// Put whole keys in the table filter. Default true.
        set_whole_key_filtering(bool) => emberkv_options_set_whole_key_filtering, bool_to_uchar;
        /// Run without any block cache, not even the internal one.
        set_no_block_cache(bool) => emberkv_options_set_no_block_cache, bool_to_uchar;
        set_table_cache_numshardbits(i32) => emberkv_options_set_table_cache_numshardbits;
        set_table_cache_remove_scan_count_limit(i32) => emberkv_options_set_table_cache_remove_scan_count_limit;

        // === Compaction ===
        set_num_levels(i32) => emberkv_options_set_num_levels;
        set_level0_file_num_compaction_trigger(i32) => emberkv_options_set_level0_file_num_compaction_trigger;
        set_level0_slowdown_writes_trigger(i32) => emberkv_options_set_level0_slowdown_writes_trigger;
        set_level0_stop_writes_trigger(i32) => emberkv_options_set_level0_stop_writes_trigger;
        set_max_mem_compaction_level(i32) => emberkv_options_set_max_mem_compaction_level;
        set_target_file_size_base(u64) => emberkv_options_set_target_file_size_base;
        set_target_file_size_multiplier(i32) => emberkv_options_set_target_file_size_multiplier;
        set_max_bytes_for_level_base(u64) => emberkv_options_set_max_bytes_for_level_base;
        set_max_bytes_for_level_multiplier(i32) => emberkv_options_set_max_bytes_for_level_multiplier;
        set_expanded_compaction_factor(i32) => emberkv_options_set_expanded_compaction_factor;
        set_source_compaction_factor(i32) => emberkv_options_set_source_compaction_factor;
        set_max_grandparent_overlap_factor(i32) => emberkv_options_set_max_grandparent_overlap_factor;
        /// Integer flag.
        set_disable_seek_compaction(bool) => emberkv_options_set_disable_seek_compaction, btoi;
        /// Integer flag. Memtables are then only compacted on demand or when
        /// writers stall.
        set_disable_auto_compactions(bool) => emberkv_options_set_disable_auto_compactions, btoi;
        set_max_background_compactions(i32) => emberkv_options_set_max_background_compactions;
        /// When positive, memtable compactions run on the environment's
        /// high-priority pool.
        set_max_background_flushes(i32) => emberkv_options_set_max_background_flushes;
        set_compaction_style(CompactionStyle) => emberkv_options_set_compaction_style, CompactionStyle::as_raw;
        set_access_hint_on_compaction_start(AccessHint) => emberkv_options_set_access_hint_on_compaction_start, AccessHint::as_raw;
        set_verify_checksums_in_compaction(bool) => emberkv_options_set_verify_checksums_in_compaction, bool_to_uchar;
        set_purge_redundant_kvs_while_flush(bool) => emberkv_options_set_purge_redundant_kvs_while_flush, bool_to_uchar;
        /// Skip writing deletes of keys that certainly do not exist.
        set_filter_deletes(bool) => emberkv_options_set_filter_deletes, bool_to_uchar;
        set_max_sequential_skip_in_iterations(u64) => emberkv_options_set_max_sequential_skip_in_iterations;

        // === Write-ahead log and durability ===
        /// Integer flag. Never sync the log, even for synced writes.
        set_disable_data_sync(bool) => emberkv_options_set_disable_data_sync, btoi;
        /// Integer flag. Sync with `fsync` rather than `fdatasync`.
        set_use_fsync(bool) => emberkv_options_set_use_fsync, btoi;
        /// Sync the log in the background every this many bytes; 0 disables.
        set_bytes_per_sync(u64) => emberkv_options_set_bytes_per_sync;
        /// Tolerate a corrupt log tail during recovery.
        set_skip_log_error_on_recovery(bool) => emberkv_options_set_skip_log_error_on_recovery, bool_to_uchar;
        set_wal_ttl_seconds(u64) => emberkv_options_set_wal_ttl_seconds;
        set_wal_size_limit_mb(u64) => emberkv_options_set_wal_size_limit_mb;
        set_max_manifest_file_size(usize) => emberkv_options_set_max_manifest_file_size;
        set_manifest_preallocation_size(usize) => emberkv_options_set_manifest_preallocation_size;
        set_delete_obsolete_files_period_micros(u64) => emberkv_options_set_delete_obsolete_files_period_micros;

        // === Info log ===
        set_max_log_file_size(usize) => emberkv_options_set_max_log_file_size;
        set_log_file_time_to_roll(usize) => emberkv_options_set_log_file_time_to_roll;
        set_keep_log_file_num(usize) => emberkv_options_set_keep_log_file_num;
        set_db_stats_log_interval(i32) => emberkv_options_set_db_stats_log_interval;
        set_stats_dump_period_sec(u32) => emberkv_options_set_stats_dump_period_sec;

        // === Rate limiting ===
        set_soft_rate_limit(f64) => emberkv_options_set_soft_rate_limit;
        set_hard_rate_limit(f64) => emberkv_options_set_hard_rate_limit;
        set_rate_limit_delay_max_milliseconds(u32) => emberkv_options_set_rate_limit_delay_max_milliseconds;

        // === OS interaction ===
        set_allow_os_buffer(bool) => emberkv_options_set_allow_os_buffer, bool_to_uchar;
        set_allow_mmap_reads(bool) => emberkv_options_set_allow_mmap_reads, bool_to_uchar;
        set_allow_mmap_writes(bool) => emberkv_options_set_allow_mmap_writes, bool_to_uchar;
        set_is_fd_close_on_exec(bool) => emberkv_options_set_is_fd_close_on_exec, bool_to_uchar;
        set_advise_random_on_open(bool) => emberkv_options_set_advise_random_on_open, bool_to_uchar;
        set_use_adaptive_mutex(bool) => emberkv_options_set_use_adaptive_mutex, bool_to_uchar;
        set_allow_thread_local(bool) => emberkv_options_set_allow_thread_local, bool_to_uchar;
    }

    /// Compression per level, the last entry applying to every deeper
    /// level. The slice must not be empty.
    pub fn set_compression_per_level(&mut self, levels: &[Compression]) -> Result<&mut Self> {
        if levels.is_empty() {
            return Err(Error::config("compression_per_level must not be empty"));
        }
        let raw: Vec<c_int> = levels.iter().map(|c| c.as_raw()).collect();
        // SAFETY: `raw` holds `raw.len()` values and outlives the call.
        unsafe {
            sys::emberkv_options_set_compression_per_level(self.handle.as_ptr(), raw.as_ptr(), raw.len())
        };
        Ok(self)
    }

    /// Per-level extra size multipliers. The slice must not be empty.
    pub fn set_max_bytes_for_level_multiplier_additional(
        &mut self,
        levels: &[i32],
    ) -> Result<&mut Self> {
        if levels.is_empty() {
            return Err(Error::config(
                "max_bytes_for_level_multiplier_additional must not be empty",
            ));
        }
        // SAFETY: as above.
        unsafe {
            sys::emberkv_options_set_max_bytes_for_level_multiplier_additional(
                self.handle.as_ptr(),
                levels.as_ptr(),
                levels.len(),
            )
        };
        Ok(self)
    }

    /// Store levels below `level` uncompressed and the rest with snappy.
    /// A negative level clears any per-level compression.
    pub fn set_min_level_to_compress(&mut self, level: i32) -> &mut Self {
        // SAFETY: the handle is live and `&mut self` excludes other users.
        unsafe { sys::emberkv_options_set_min_level_to_compress(self.handle.as_ptr(), level) };
        self
    }

    pub fn set_db_log_dir(&mut self, dir: impl AsRef<Path>) -> Result<&mut Self> {
        let dir = path_to_cstring(dir.as_ref())?;
        // SAFETY: the engine copies the string before returning.
        unsafe { sys::emberkv_options_set_db_log_dir(self.handle.as_ptr(), dir.as_ptr()) };
        Ok(self)
    }

    /// Keep the write-ahead log in `dir` instead of the database directory.
    pub fn set_wal_dir(&mut self, dir: impl AsRef<Path>) -> Result<&mut Self> {
        let dir = path_to_cstring(dir.as_ref())?;
        // SAFETY: as above.
        unsafe { sys::emberkv_options_set_wal_dir(self.handle.as_ptr(), dir.as_ptr()) };
        Ok(self)
    }

    /// Block cache for uncompressed blocks. Without one the engine creates
    /// a private cache of [`DEFAULT_INTERNAL_CACHE_SIZE`] bytes.
    pub fn set_cache(&mut self, cache: &'r Cache) -> &mut Self {
        // SAFETY: `cache` is borrowed for as long as these options and any
        // database opened from them.
        unsafe { sys::emberkv_options_set_cache(self.handle.as_ptr(), cache.as_const()) };
        self
    }

    /// Cache for blocks as stored on disk.
    pub fn set_cache_compressed(&mut self, cache: &'r Cache) -> &mut Self {
        // SAFETY: as for `set_cache`.
        unsafe { sys::emberkv_options_set_cache_compressed(self.handle.as_ptr(), cache.as_const()) };
        self
    }

    pub fn set_filter_policy(&mut self, policy: &'r FilterPolicy) -> &mut Self {
        // SAFETY: as for `set_cache`.
        unsafe { sys::emberkv_options_set_filter_policy(self.handle.as_ptr(), policy.as_const()) };
        self
    }

    pub fn set_env(&mut self, env: &'r Env) -> &mut Self {
        // SAFETY: as for `set_cache`.
        unsafe { sys::emberkv_options_set_env(self.handle.as_ptr(), env.as_const()) };
        self
    }

    /// Copy universal compaction settings; `universal` may be dropped
    /// afterwards.
    pub fn set_universal_compaction_options(
        &mut self,
        universal: &UniversalCompactionOptions,
    ) -> &mut Self {
        // SAFETY: both handles are live; the engine copies the settings.
        unsafe {
            sys::emberkv_options_set_universal_compaction_options(
                self.handle.as_ptr(),
                universal.as_const(),
            )
        };
        self
    }

    /// Select the memtable representation, replacing any earlier choice.
    pub fn set_memtable_rep(&mut self, rep: MemtableRep) -> &mut Self {
        let opt = self.handle.as_ptr();
        // SAFETY: the handle is live and `&mut self` excludes other users.
        unsafe {
            match rep {
                MemtableRep::SkipList => sys::emberkv_options_set_memtable_skip_list_rep(opt),
                MemtableRep::Vector => sys::emberkv_options_set_memtable_vector_rep(opt),
                MemtableRep::HashSkipList {
                    bucket_count,
                    height,
                    branching_factor,
                } => sys::emberkv_options_set_hash_skip_list_rep(
                    opt,
                    bucket_count,
                    height,
                    branching_factor,
                ),
                MemtableRep::HashLinkList { bucket_count } => {
                    sys::emberkv_options_set_hash_link_list_rep(opt, bucket_count)
                }
                MemtableRep::PlainTable {
                    key_len,
                    bloom_bits_per_key,
                    hash_table_ratio,
                    index_sparseness,
                } => sys::emberkv_options_set_plain_table_factory(
                    opt,
                    key_len,
                    bloom_bits_per_key,
                    hash_table_ratio,
                    index_sparseness,
                ),
            }
        }
        self
    }

    /// Count operations and report them through the `emberkv.stats`
    /// property.
    pub fn enable_statistics(&mut self) -> &mut Self {
        // SAFETY: the handle is live and `&mut self` excludes other users.
        unsafe { sys::emberkv_options_enable_statistics(self.handle.as_ptr()) };
        self
    }

    /// Tune for loading a lot of data before reading any: auto compactions
    /// and log syncs are turned off.
    ///
    /// Any other setter called afterwards overrides the value chosen here.
    /// The memtable representation is not touched.
    pub fn prepare_for_bulk_load(&mut self) -> &mut Self {
        // SAFETY: as above.
        unsafe { sys::emberkv_options_prepare_for_bulk_load(self.handle.as_ptr()) };
        self
    }

    getters! {
        create_if_missing -> bool => emberkv_options_get_create_if_missing, uchar_to_bool;
        paranoid_checks -> bool => emberkv_options_get_paranoid_checks, uchar_to_bool;
        write_buffer_size -> usize => emberkv_options_get_write_buffer_size;
        max_write_buffer_number -> i32 => emberkv_options_get_max_write_buffer_number;
        max_open_files -> i32 => emberkv_options_get_max_open_files;
        block_size -> usize => emberkv_options_get_block_size;
        num_levels -> i32 => emberkv_options_get_num_levels;
        level0_file_num_compaction_trigger -> i32 => emberkv_options_get_level0_file_num_compaction_trigger;
        source_compaction_factor -> i32 => emberkv_options_get_source_compaction_factor;
        disable_data_sync -> bool => emberkv_options_get_disable_data_sync, itob;
        disable_auto_compactions -> bool => emberkv_options_get_disable_auto_compactions, itob;
        soft_rate_limit -> f64 => emberkv_options_get_soft_rate_limit;
        statistics -> bool => emberkv_options_get_statistics, uchar_to_bool;
    }

    pub fn compression(&self) -> Result<Compression> {
        // SAFETY: the handle is live for as long as `self`.
        Compression::try_from(unsafe { sys::emberkv_options_get_compression(self.handle.as_const()) })
    }

    pub fn compaction_style(&self) -> Result<CompactionStyle> {
        // SAFETY: as above.
        CompactionStyle::try_from(unsafe {
            sys::emberkv_options_get_compaction_style(self.handle.as_const())
        })
    }

    pub fn access_hint_on_compaction_start(&self) -> Result<AccessHint> {
        // SAFETY: as above.
        AccessHint::try_from(unsafe {
            sys::emberkv_options_get_access_hint_on_compaction_start(self.handle.as_const())
        })
    }

    pub fn info_log_level(&self) -> Result<InfoLogLevel> {
        // SAFETY: as above.
        InfoLogLevel::try_from(unsafe {
            sys::emberkv_options_get_info_log_level(self.handle.as_const())
        })
    }

    /// Per-level compression; empty when every level uses
    /// [`Options::compression`].
    pub fn compression_per_level(&self) -> Result<Vec<Compression>> {
        let opt = self.handle.as_const();
        // SAFETY: a zero capacity only asks for the length; the second call
        // writes at most `raw.len()` values.
        let raw = unsafe {
            let len = sys::emberkv_options_get_compression_per_level(opt, std::ptr::null_mut(), 0);
            let mut raw: Vec<c_int> = vec![0; len];
            sys::emberkv_options_get_compression_per_level(opt, raw.as_mut_ptr(), len);
            raw
        };
        raw.into_iter().map(Compression::try_from).collect()
    }

    /// `name=value` lines for every tunable, in the format
    /// [`Options::set_from_string`] reads.
    pub fn dump(&self) -> String {
        // SAFETY: the handle is live; the returned string is ours to free.
        unsafe { take_engine_string(sys::emberkv_options_dump(self.handle.as_const())) }
            .unwrap_or_default()
    }
}

impl Default for Options<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Options<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("create_if_missing", &self.create_if_missing())
            .field("write_buffer_size", &self.write_buffer_size())
            .field("compression", &self.compression())
            .finish_non_exhaustive()
    }
}
