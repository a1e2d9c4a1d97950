//! Option objects: database options, read options, write options and the
//! universal compaction settings.
//!
//! Every setter stores its argument verbatim. Legality of combinations is
//! checked once, when the options are used to open a database
//! (see [`NativeOptions::sanitize`]).

use std::fmt::Write as _;
use std::slice;
use std::sync::Arc;

use libc::{c_char, c_double, c_int, c_uchar, c_uint, size_t};

use super::cache::{emberkv_cache_t, BlockCache};
use super::db::emberkv_snapshot_t;
use super::env::{emberkv_env_t, EnvInner};
use super::filter::{emberkv_filterpolicy_t, BloomPolicy};
use super::{drop_raw, into_raw, ObjectKind};
use crate::{Error, Result};

pub const EMBERKV_NO_COMPRESSION: c_int = 0;
pub const EMBERKV_SNAPPY_COMPRESSION: c_int = 1;
pub const EMBERKV_ZLIB_COMPRESSION: c_int = 2;
pub const EMBERKV_BZIP2_COMPRESSION: c_int = 3;

pub const EMBERKV_LEVEL_COMPACTION: c_int = 0;
pub const EMBERKV_UNIVERSAL_COMPACTION: c_int = 1;

pub const EMBERKV_ACCESS_NONE: c_int = 0;
pub const EMBERKV_ACCESS_NORMAL: c_int = 1;
pub const EMBERKV_ACCESS_SEQUENTIAL: c_int = 2;
pub const EMBERKV_ACCESS_WILLNEED: c_int = 3;

pub const EMBERKV_DEBUG_LEVEL: c_int = 0;
pub const EMBERKV_INFO_LEVEL: c_int = 1;
pub const EMBERKV_WARN_LEVEL: c_int = 2;
pub const EMBERKV_ERROR_LEVEL: c_int = 3;
pub const EMBERKV_FATAL_LEVEL: c_int = 4;

pub const EMBERKV_STOP_STYLE_SIMILAR_SIZE: c_int = 0;
pub const EMBERKV_STOP_STYLE_TOTAL_SIZE: c_int = 1;

/// In-memory representation selected for the memtable. The last selector
/// called wins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum MemtableRepKind {
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

impl MemtableRepKind {
    fn describe(&self) -> String {
        match *self {
            MemtableRepKind::SkipList => "skip_list".to_string(),
            MemtableRepKind::Vector => "vector".to_string(),
            MemtableRepKind::HashSkipList {
                bucket_count,
                height,
                branching_factor,
            } => format!("hash_skip_list({},{},{})", bucket_count, height, branching_factor),
            MemtableRepKind::HashLinkList { bucket_count } => {
                format!("hash_link_list({})", bucket_count)
            }
            MemtableRepKind::PlainTable {
                key_len,
                bloom_bits_per_key,
                hash_table_ratio,
                index_sparseness,
            } => format!(
                "plain_table({},{},{},{})",
                key_len, bloom_bits_per_key, hash_table_ratio, index_sparseness
            ),
        }
    }
}

/// Settings used when `compaction_style` is universal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UniversalCompaction {
    pub size_ratio: c_int,
    pub min_merge_width: c_int,
    pub max_merge_width: c_int,
    pub max_size_amplification_percent: c_int,
    pub compression_size_percent: c_int,
    pub stop_style: c_int,
}

impl Default for UniversalCompaction {
    fn default() -> Self {
        Self {
            size_ratio: 1,
            min_merge_width: 2,
            max_merge_width: c_int::MAX,
            max_size_amplification_percent: 200,
            compression_size_percent: -1,
            stop_style: EMBERKV_STOP_STYLE_TOTAL_SIZE,
        }
    }
}

/// Every tunable the engine accepts, with the engine's defaults.
#[derive(Clone)]
pub(crate) struct NativeOptions {
    pub create_if_missing: bool,
    pub error_if_exists: bool,
    pub paranoid_checks: bool,
    pub info_log_level: c_int,
    pub write_buffer_size: usize,
    pub max_write_buffer_number: c_int,
    pub min_write_buffer_number_to_merge: c_int,
    pub max_open_files: c_int,
    pub block_size: usize,
    pub block_restart_interval: c_int,
    pub compression: c_int,
    pub compression_per_level: Vec<c_int>,
    pub whole_key_filtering: bool,
    pub num_levels: c_int,
    pub level0_file_num_compaction_trigger: c_int,
    pub level0_slowdown_writes_trigger: c_int,
    pub level0_stop_writes_trigger: c_int,
    pub max_mem_compaction_level: c_int,
    pub target_file_size_base: u64,
    pub target_file_size_multiplier: c_int,
    pub max_bytes_for_level_base: u64,
    pub max_bytes_for_level_multiplier: c_int,
    pub max_bytes_for_level_multiplier_additional: Vec<c_int>,
    pub expanded_compaction_factor: c_int,
    pub source_compaction_factor: c_int,
    pub max_grandparent_overlap_factor: c_int,
    pub disable_data_sync: bool,
    pub use_fsync: bool,
    pub db_stats_log_interval: c_int,
    pub db_log_dir: String,
    pub wal_dir: String,
    pub disable_seek_compaction: bool,
    pub delete_obsolete_files_period_micros: u64,
    pub max_background_compactions: c_int,
    pub max_background_flushes: c_int,
    pub max_log_file_size: usize,
    pub log_file_time_to_roll: usize,
    pub keep_log_file_num: usize,
    pub soft_rate_limit: f64,
    pub hard_rate_limit: f64,
    pub rate_limit_delay_max_milliseconds: c_uint,
    pub max_manifest_file_size: usize,
    pub no_block_cache: bool,
    pub table_cache_numshardbits: c_int,
    pub table_cache_remove_scan_count_limit: c_int,
    pub arena_block_size: usize,
    pub disable_auto_compactions: bool,
    pub wal_ttl_seconds: u64,
    pub wal_size_limit_mb: u64,
    pub manifest_preallocation_size: usize,
    pub purge_redundant_kvs_while_flush: bool,
    pub allow_os_buffer: bool,
    pub allow_mmap_reads: bool,
    pub allow_mmap_writes: bool,
    pub is_fd_close_on_exec: bool,
    pub skip_log_error_on_recovery: bool,
    pub stats_dump_period_sec: c_uint,
    pub block_size_deviation: c_int,
    pub advise_random_on_open: bool,
    pub access_hint_on_compaction_start: c_int,
    pub use_adaptive_mutex: bool,
    pub bytes_per_sync: u64,
    pub compaction_style: c_int,
    pub universal: UniversalCompaction,
    pub verify_checksums_in_compaction: bool,
    pub filter_deletes: bool,
    pub max_sequential_skip_in_iterations: u64,
    pub inplace_update_support: bool,
    pub inplace_update_num_locks: usize,
    pub memtable_prefix_bloom_bits: u32,
    pub memtable_prefix_bloom_probes: u32,
    pub bloom_locality: u32,
    pub max_successive_merges: usize,
    pub min_partial_merge_operands: u32,
    pub allow_thread_local: bool,
    pub statistics: bool,
    pub memtable_rep: MemtableRepKind,
    pub cache: Option<Arc<BlockCache>>,
    pub cache_compressed: Option<Arc<BlockCache>>,
    pub filter_policy: Option<Arc<BloomPolicy>>,
    pub env: Option<Arc<EnvInner>>,
}

impl Default for NativeOptions {
    fn default() -> Self {
        Self {
            create_if_missing: false,
            error_if_exists: false,
            paranoid_checks: false,
            info_log_level: EMBERKV_INFO_LEVEL,
            write_buffer_size: 4 << 20,
            max_write_buffer_number: 2,
            min_write_buffer_number_to_merge: 1,
            max_open_files: 1000,
            block_size: 4096,
            block_restart_interval: 16,
            compression: EMBERKV_SNAPPY_COMPRESSION,
            compression_per_level: Vec::new(),
            whole_key_filtering: true,
            num_levels: 7,
            level0_file_num_compaction_trigger: 4,
            level0_slowdown_writes_trigger: 8,
            level0_stop_writes_trigger: 12,
            max_mem_compaction_level: 2,
            target_file_size_base: 2 << 20,
            target_file_size_multiplier: 1,
            max_bytes_for_level_base: 10 << 20,
            max_bytes_for_level_multiplier: 10,
            max_bytes_for_level_multiplier_additional: vec![1; 7],
            expanded_compaction_factor: 25,
            source_compaction_factor: 1,
            max_grandparent_overlap_factor: 10,
            disable_data_sync: false,
            use_fsync: false,
            db_stats_log_interval: 1800,
            db_log_dir: String::new(),
            wal_dir: String::new(),
            disable_seek_compaction: false,
            delete_obsolete_files_period_micros: 6 * 60 * 60 * 1_000_000,
            max_background_compactions: 1,
            max_background_flushes: 0,
            max_log_file_size: 0,
            log_file_time_to_roll: 0,
            keep_log_file_num: 1000,
            soft_rate_limit: 0.0,
            hard_rate_limit: 0.0,
            rate_limit_delay_max_milliseconds: 1000,
            max_manifest_file_size: usize::MAX,
            no_block_cache: false,
            table_cache_numshardbits: 4,
            table_cache_remove_scan_count_limit: 16,
            arena_block_size: 0,
            disable_auto_compactions: false,
            wal_ttl_seconds: 0,
            wal_size_limit_mb: 0,
            manifest_preallocation_size: 4 << 20,
            purge_redundant_kvs_while_flush: true,
            allow_os_buffer: true,
            allow_mmap_reads: false,
            allow_mmap_writes: true,
            is_fd_close_on_exec: true,
            skip_log_error_on_recovery: false,
            stats_dump_period_sec: 3600,
            block_size_deviation: 10,
            advise_random_on_open: true,
            access_hint_on_compaction_start: EMBERKV_ACCESS_NORMAL,
            use_adaptive_mutex: false,
            bytes_per_sync: 0,
            compaction_style: EMBERKV_LEVEL_COMPACTION,
            universal: UniversalCompaction::default(),
            verify_checksums_in_compaction: true,
            filter_deletes: false,
            max_sequential_skip_in_iterations: 8,
            inplace_update_support: false,
            inplace_update_num_locks: 10000,
            memtable_prefix_bloom_bits: 0,
            memtable_prefix_bloom_probes: 6,
            bloom_locality: 0,
            max_successive_merges: 0,
            min_partial_merge_operands: 2,
            allow_thread_local: true,
            statistics: false,
            memtable_rep: MemtableRepKind::SkipList,
            cache: None,
            cache_compressed: None,
            filter_policy: None,
            env: None,
        }
    }
}

impl NativeOptions {
    /// Reject illegal values and clamp out-of-range ones, the way the
    /// engine does when a database is opened.
    pub fn sanitize(&mut self) -> Result<()> {
        let compression_ok = |c: &c_int| (EMBERKV_NO_COMPRESSION..=EMBERKV_BZIP2_COMPRESSION).contains(c);
        if let Some(bad) = std::iter::once(&self.compression)
            .chain(&self.compression_per_level)
            .find(|c| !compression_ok(c))
        {
            return Err(Error::config(format!("unknown compression type {}", bad)));
        }
        if !(EMBERKV_LEVEL_COMPACTION..=EMBERKV_UNIVERSAL_COMPACTION).contains(&self.compaction_style)
        {
            return Err(Error::config(format!(
                "unknown compaction style {}",
                self.compaction_style
            )));
        }
        if !(EMBERKV_ACCESS_NONE..=EMBERKV_ACCESS_WILLNEED)
            .contains(&self.access_hint_on_compaction_start)
        {
            return Err(Error::config(format!(
                "unknown access hint {}",
                self.access_hint_on_compaction_start
            )));
        }
        if !(EMBERKV_DEBUG_LEVEL..=EMBERKV_FATAL_LEVEL).contains(&self.info_log_level) {
            return Err(Error::config(format!(
                "unknown info log level {}",
                self.info_log_level
            )));
        }
        if self.block_size == 0 {
            return Err(Error::config("block_size must be positive"));
        }

        self.write_buffer_size = self.write_buffer_size.clamp(64 << 10, 64 << 30);
        self.max_write_buffer_number = self.max_write_buffer_number.max(2);
        if self.max_open_files != -1 {
            self.max_open_files = self.max_open_files.clamp(20, 1_000_000);
        }
        self.num_levels = self.num_levels.max(1);
        if self.level0_slowdown_writes_trigger < self.level0_file_num_compaction_trigger {
            self.level0_slowdown_writes_trigger = self.level0_file_num_compaction_trigger;
        }
        if self.level0_stop_writes_trigger < self.level0_slowdown_writes_trigger {
            self.level0_stop_writes_trigger = self.level0_slowdown_writes_trigger;
        }
        if self.hard_rate_limit > 0.0 && self.soft_rate_limit > self.hard_rate_limit {
            self.soft_rate_limit = self.hard_rate_limit;
        }
        Ok(())
    }

    /// Compression for a table written at `level`.
    pub fn compression_for_level(&self, level: usize) -> c_int {
        match self.compression_per_level.len() {
            0 => self.compression,
            n => self.compression_per_level[level.min(n - 1)],
        }
    }

    /// Level at which the single table lives.
    pub fn table_level(&self) -> usize {
        usize::try_from(self.num_levels - 1).unwrap_or(0)
    }

    /// `name=value` lines for every tunable. Shared resources are written as
    /// comments since they cannot be recreated from text.
    pub fn dump(&self) -> String {
        fn join(values: &[c_int]) -> String {
            values
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(":")
        }

        let mut out = String::new();
        macro_rules! entries {
            ($($name:ident),* $(,)?) => {
                $( let _ = writeln!(out, "{}={}", stringify!($name), self.$name); )*
            };
        }

        entries!(
            create_if_missing,
            error_if_exists,
            paranoid_checks,
            info_log_level,
            write_buffer_size,
            max_write_buffer_number,
            min_write_buffer_number_to_merge,
            max_open_files,
            block_size,
            block_restart_interval,
            compression,
        );
        let _ = writeln!(out, "compression_per_level={}", join(&self.compression_per_level));
        entries!(
            whole_key_filtering,
            num_levels,
            level0_file_num_compaction_trigger,
            level0_slowdown_writes_trigger,
            level0_stop_writes_trigger,
            max_mem_compaction_level,
            target_file_size_base,
            target_file_size_multiplier,
            max_bytes_for_level_base,
            max_bytes_for_level_multiplier,
        );
        let _ = writeln!(
            out,
            "max_bytes_for_level_multiplier_additional={}",
            join(&self.max_bytes_for_level_multiplier_additional)
        );
        entries!(
            expanded_compaction_factor,
            source_compaction_factor,
            max_grandparent_overlap_factor,
            disable_data_sync,
            use_fsync,
            db_stats_log_interval,
            db_log_dir,
            wal_dir,
            disable_seek_compaction,
            delete_obsolete_files_period_micros,
            max_background_compactions,
            max_background_flushes,
            max_log_file_size,
            log_file_time_to_roll,
            keep_log_file_num,
            soft_rate_limit,
            hard_rate_limit,
            rate_limit_delay_max_milliseconds,
            max_manifest_file_size,
            no_block_cache,
            table_cache_numshardbits,
            table_cache_remove_scan_count_limit,
            arena_block_size,
            disable_auto_compactions,
            wal_ttl_seconds,
            wal_size_limit_mb,
            manifest_preallocation_size,
            purge_redundant_kvs_while_flush,
            allow_os_buffer,
            allow_mmap_reads,
            allow_mmap_writes,
            is_fd_close_on_exec,
            skip_log_error_on_recovery,
            stats_dump_period_sec,
            block_size_deviation,
            advise_random_on_open,
            access_hint_on_compaction_start,
            use_adaptive_mutex,
            bytes_per_sync,
            compaction_style,
            verify_checksums_in_compaction,
            filter_deletes,
            max_sequential_skip_in_iterations,
            inplace_update_support,
            inplace_update_num_locks,
            memtable_prefix_bloom_bits,
            memtable_prefix_bloom_probes,
            bloom_locality,
            max_successive_merges,
            min_partial_merge_operands,
            allow_thread_local,
            statistics,
        );
        let _ = writeln!(out, "memtable_rep={}", self.memtable_rep.describe());

        let u = &self.universal;
        let _ = writeln!(
            out,
            "# universal_compaction=size_ratio:{},min_merge_width:{},max_merge_width:{},\
             max_size_amplification_percent:{},compression_size_percent:{},stop_style:{}",
            u.size_ratio,
            u.min_merge_width,
            u.max_merge_width,
            u.max_size_amplification_percent,
            u.compression_size_percent,
            u.stop_style
        );
        match &self.cache {
            Some(cache) => {
                let _ = writeln!(out, "# cache=lru({})", cache.capacity());
            }
            None => {
                let _ = writeln!(out, "# cache=internal");
            }
        }
        if let Some(cache) = &self.cache_compressed {
            let _ = writeln!(out, "# cache_compressed=lru({})", cache.capacity());
        }
        if let Some(policy) = &self.filter_policy {
            let _ = writeln!(out, "# filter_policy=bloom({})", policy.bits_per_key());
        }
        let _ = writeln!(
            out,
            "# env={}",
            if self.env.is_some() { "custom" } else { "default" }
        );
        out
    }
}

/// Engine handle for database options.
pub struct emberkv_options_t {
    pub(crate) inner: NativeOptions,
}

pub fn emberkv_options_create() -> *mut emberkv_options_t {
    into_raw(
        ObjectKind::Options,
        emberkv_options_t {
            inner: NativeOptions::default(),
        },
    )
}

/// # Safety
///
/// `opt` must come from [`emberkv_options_create`] and not be destroyed twice.
pub unsafe fn emberkv_options_destroy(opt: *mut emberkv_options_t) {
    drop_raw(ObjectKind::Options, opt);
}

macro_rules! option_setters {
    ($( $name:ident($field:ident: $ty:ty) $(=> $conv:expr)?; )*) => {
        $(
            /// # Safety
            ///
            /// `opt` must be a live options handle not in use by another thread.
            pub unsafe fn $name(opt: *mut emberkv_options_t, value: $ty) {
                (*opt).inner.$field = option_setters!(@conv value $(, $conv)?);
            }
        )*
    };
    (@conv $v:ident) => { $v };
    (@conv $v:ident, $conv:expr) => { ($conv)($v) };
}

fn uchar_flag(v: c_uchar) -> bool {
    v != 0
}

fn int_flag(v: c_int) -> bool {
    v != 0
}

option_setters! {
    emberkv_options_set_create_if_missing(create_if_missing: c_uchar) => uchar_flag;
    emberkv_options_set_error_if_exists(error_if_exists: c_uchar) => uchar_flag;
    emberkv_options_set_paranoid_checks(paranoid_checks: c_uchar) => uchar_flag;
    emberkv_options_set_info_log_level(info_log_level: c_int);
    emberkv_options_set_write_buffer_size(write_buffer_size: size_t);
    emberkv_options_set_max_write_buffer_number(max_write_buffer_number: c_int);
    emberkv_options_set_min_write_buffer_number_to_merge(min_write_buffer_number_to_merge: c_int);
    emberkv_options_set_max_open_files(max_open_files: c_int);
    emberkv_options_set_block_size(block_size: size_t);
    emberkv_options_set_block_restart_interval(block_restart_interval: c_int);
    emberkv_options_set_compression(compression: c_int);
    emberkv_options_set_whole_key_filtering(whole_key_filtering: c_uchar) => uchar_flag;
    emberkv_options_set_num_levels(num_levels: c_int);
    emberkv_options_set_level0_file_num_compaction_trigger(level0_file_num_compaction_trigger: c_int);
    emberkv_options_set_level0_slowdown_writes_trigger(level0_slowdown_writes_trigger: c_int);
    emberkv_options_set_level0_stop_writes_trigger(level0_stop_writes_trigger: c_int);
    emberkv_options_set_max_mem_compaction_level(max_mem_compaction_level: c_int);
    emberkv_options_set_target_file_size_base(target_file_size_base: u64);
    emberkv_options_set_target_file_size_multiplier(target_file_size_multiplier: c_int);
    emberkv_options_set_max_bytes_for_level_base(max_bytes_for_level_base: u64);
    emberkv_options_set_max_bytes_for_level_multiplier(max_bytes_for_level_multiplier: c_int);
    emberkv_options_set_expanded_compaction_factor(expanded_compaction_factor: c_int);
    emberkv_options_set_source_compaction_factor(source_compaction_factor: c_int);
    emberkv_options_set_max_grandparent_overlap_factor(max_grandparent_overlap_factor: c_int);
    emberkv_options_set_disable_data_sync(disable_data_sync: c_int) => int_flag;
    emberkv_options_set_use_fsync(use_fsync: c_int) => int_flag;
    emberkv_options_set_db_stats_log_interval(db_stats_log_interval: c_int);
    emberkv_options_set_disable_seek_compaction(disable_seek_compaction: c_int) => int_flag;
    emberkv_options_set_delete_obsolete_files_period_micros(delete_obsolete_files_period_micros: u64);
    emberkv_options_set_max_background_compactions(max_background_compactions: c_int);
    emberkv_options_set_max_background_flushes(max_background_flushes: c_int);
    emberkv_options_set_max_log_file_size(max_log_file_size: size_t);
    emberkv_options_set_log_file_time_to_roll(log_file_time_to_roll: size_t);
    emberkv_options_set_keep_log_file_num(keep_log_file_num: size_t);
    emberkv_options_set_soft_rate_limit(soft_rate_limit: c_double);
    emberkv_options_set_hard_rate_limit(hard_rate_limit: c_double);
    emberkv_options_set_rate_limit_delay_max_milliseconds(rate_limit_delay_max_milliseconds: c_uint);
    emberkv_options_set_max_manifest_file_size(max_manifest_file_size: size_t);
    emberkv_options_set_no_block_cache(no_block_cache: c_uchar) => uchar_flag;
    emberkv_options_set_table_cache_numshardbits(table_cache_numshardbits: c_int);
    emberkv_options_set_table_cache_remove_scan_count_limit(table_cache_remove_scan_count_limit: c_int);
    emberkv_options_set_arena_block_size(arena_block_size: size_t);
    emberkv_options_set_disable_auto_compactions(disable_auto_compactions: c_int) => int_flag;
    emberkv_options_set_wal_ttl_seconds(wal_ttl_seconds: u64);
    emberkv_options_set_wal_size_limit_mb(wal_size_limit_mb: u64);
    emberkv_options_set_manifest_preallocation_size(manifest_preallocation_size: size_t);
    emberkv_options_set_purge_redundant_kvs_while_flush(purge_redundant_kvs_while_flush: c_uchar) => uchar_flag;
    emberkv_options_set_allow_os_buffer(allow_os_buffer: c_uchar) => uchar_flag;
    emberkv_options_set_allow_mmap_reads(allow_mmap_reads: c_uchar) => uchar_flag;
    emberkv_options_set_allow_mmap_writes(allow_mmap_writes: c_uchar) => uchar_flag;
    emberkv_options_set_is_fd_close_on_exec(is_fd_close_on_exec: c_uchar) => uchar_flag;
    emberkv_options_set_skip_log_error_on_recovery(skip_log_error_on_recovery: c_uchar) => uchar_flag;
    emberkv_options_set_stats_dump_period_sec(stats_dump_period_sec: c_uint);
    emberkv_options_set_block_size_deviation(block_size_deviation: c_int);
    emberkv_options_set_advise_random_on_open(advise_random_on_open: c_uchar) => uchar_flag;
    emberkv_options_set_access_hint_on_compaction_start(access_hint_on_compaction_start: c_int);
    emberkv_options_set_use_adaptive_mutex(use_adaptive_mutex: c_uchar) => uchar_flag;
    emberkv_options_set_bytes_per_sync(bytes_per_sync: u64);
    emberkv_options_set_compaction_style(compaction_style: c_int);
    emberkv_options_set_verify_checksums_in_compaction(verify_checksums_in_compaction: c_uchar) => uchar_flag;
    emberkv_options_set_filter_deletes(filter_deletes: c_uchar) => uchar_flag;
    emberkv_options_set_max_sequential_skip_in_iterations(max_sequential_skip_in_iterations: u64);
    emberkv_options_set_inplace_update_support(inplace_update_support: c_uchar) => uchar_flag;
    emberkv_options_set_inplace_update_num_locks(inplace_update_num_locks: size_t);
    emberkv_options_set_memtable_prefix_bloom_bits(memtable_prefix_bloom_bits: u32);
    emberkv_options_set_memtable_prefix_bloom_probes(memtable_prefix_bloom_probes: u32);
    emberkv_options_set_bloom_locality(bloom_locality: u32);
    emberkv_options_set_max_successive_merges(max_successive_merges: size_t);
    emberkv_options_set_min_partial_merge_operands(min_partial_merge_operands: u32);
    emberkv_options_set_allow_thread_local(allow_thread_local: c_uchar) => uchar_flag;
}

macro_rules! option_getters {
    ($( $name:ident($field:ident) -> $ty:ty $(=> $conv:expr)?; )*) => {
        $(
            /// # Safety
            ///
            /// `opt` must be a live options handle.
            pub unsafe fn $name(opt: *const emberkv_options_t) -> $ty {
                let value = (*opt).inner.$field;
                option_getters!(@conv value $(, $conv)?)
            }
        )*
    };
    (@conv $v:ident) => { $v };
    (@conv $v:ident, $conv:expr) => { ($conv)($v) };
}

fn to_uchar(b: bool) -> c_uchar {
    c_uchar::from(b)
}

fn to_int(b: bool) -> c_int {
    c_int::from(b)
}

option_getters! {
    emberkv_options_get_create_if_missing(create_if_missing) -> c_uchar => to_uchar;
    emberkv_options_get_paranoid_checks(paranoid_checks) -> c_uchar => to_uchar;
    emberkv_options_get_info_log_level(info_log_level) -> c_int;
    emberkv_options_get_write_buffer_size(write_buffer_size) -> size_t;
    emberkv_options_get_max_write_buffer_number(max_write_buffer_number) -> c_int;
    emberkv_options_get_max_open_files(max_open_files) -> c_int;
    emberkv_options_get_block_size(block_size) -> size_t;
    emberkv_options_get_compression(compression) -> c_int;
    emberkv_options_get_num_levels(num_levels) -> c_int;
    emberkv_options_get_level0_file_num_compaction_trigger(level0_file_num_compaction_trigger) -> c_int;
    emberkv_options_get_source_compaction_factor(source_compaction_factor) -> c_int;
    emberkv_options_get_disable_data_sync(disable_data_sync) -> c_int => to_int;
    emberkv_options_get_disable_auto_compactions(disable_auto_compactions) -> c_int => to_int;
    emberkv_options_get_soft_rate_limit(soft_rate_limit) -> c_double;
    emberkv_options_get_access_hint_on_compaction_start(access_hint_on_compaction_start) -> c_int;
    emberkv_options_get_compaction_style(compaction_style) -> c_int;
    emberkv_options_get_statistics(statistics) -> c_uchar => to_uchar;
}

/// # Safety
///
/// `opt` must be a live options handle and `levels` must point to `n`
/// readable values.
pub unsafe fn emberkv_options_set_compression_per_level(
    opt: *mut emberkv_options_t,
    levels: *const c_int,
    n: size_t,
) {
    (*opt).inner.compression_per_level = slice::from_raw_parts(levels, n).to_vec();
}

/// Copies the per-level compression into `out`, up to `capacity` values,
/// and returns the total number of levels configured. `out` may be null
/// when `capacity` is 0.
///
/// # Safety
///
/// `opt` must be a live options handle and `out` must have room for
/// `capacity` values.
pub unsafe fn emberkv_options_get_compression_per_level(
    opt: *const emberkv_options_t,
    out: *mut c_int,
    capacity: size_t,
) -> size_t {
    let levels = &(*opt).inner.compression_per_level;
    let n = levels.len().min(capacity);
    if n > 0 {
        std::ptr::copy_nonoverlapping(levels.as_ptr(), out, n);
    }
    levels.len()
}

/// # Safety
///
/// `opt` must be a live options handle and `levels` must point to `n`
/// readable values.
pub unsafe fn emberkv_options_set_max_bytes_for_level_multiplier_additional(
    opt: *mut emberkv_options_t,
    levels: *const c_int,
    n: size_t,
) {
    (*opt).inner.max_bytes_for_level_multiplier_additional =
        slice::from_raw_parts(levels, n).to_vec();
}

/// Levels below `level` are stored uncompressed, the rest with snappy.
/// A negative level clears the per-level setting.
///
/// # Safety
///
/// `opt` must be a live options handle.
pub unsafe fn emberkv_options_set_min_level_to_compress(opt: *mut emberkv_options_t, level: c_int) {
    let inner = &mut (*opt).inner;
    if level < 0 {
        inner.compression_per_level.clear();
        return;
    }
    inner.compression_per_level = (0..inner.num_levels.max(1))
        .map(|l| {
            if l < level {
                EMBERKV_NO_COMPRESSION
            } else {
                EMBERKV_SNAPPY_COMPRESSION
            }
        })
        .collect();
}

/// # Safety
///
/// `opt` must be a live options handle; `path` must be NUL-terminated and
/// is copied before returning.
pub unsafe fn emberkv_options_set_db_log_dir(opt: *mut emberkv_options_t, path: *const c_char) {
    (*opt).inner.db_log_dir = std::ffi::CStr::from_ptr(path).to_string_lossy().into_owned();
}

/// # Safety
///
/// `opt` must be a live options handle; `path` must be NUL-terminated and
/// is copied before returning.
pub unsafe fn emberkv_options_set_wal_dir(opt: *mut emberkv_options_t, path: *const c_char) {
    (*opt).inner.wal_dir = std::ffi::CStr::from_ptr(path).to_string_lossy().into_owned();
}

/// # Safety
///
/// `opt` must be a live options handle; `cache` must be null or live.
pub unsafe fn emberkv_options_set_cache(opt: *mut emberkv_options_t, cache: *const emberkv_cache_t) {
    (*opt).inner.cache = cache.as_ref().map(|c| Arc::clone(&c.inner));
}

/// # Safety
///
/// `opt` must be a live options handle; `cache` must be null or live.
pub unsafe fn emberkv_options_set_cache_compressed(
    opt: *mut emberkv_options_t,
    cache: *const emberkv_cache_t,
) {
    (*opt).inner.cache_compressed = cache.as_ref().map(|c| Arc::clone(&c.inner));
}

/// # Safety
///
/// `opt` must be a live options handle; `policy` must be null or live.
pub unsafe fn emberkv_options_set_filter_policy(
    opt: *mut emberkv_options_t,
    policy: *const emberkv_filterpolicy_t,
) {
    (*opt).inner.filter_policy = policy.as_ref().map(|p| Arc::clone(&p.inner));
}

/// # Safety
///
/// `opt` must be a live options handle; `env` must be null or live.
pub unsafe fn emberkv_options_set_env(opt: *mut emberkv_options_t, env: *const emberkv_env_t) {
    (*opt).inner.env = env.as_ref().map(|e| Arc::clone(&e.inner));
}

/// The settings are copied; `uco` may be destroyed afterwards.
///
/// # Safety
///
/// `opt` and `uco` must be live handles.
pub unsafe fn emberkv_options_set_universal_compaction_options(
    opt: *mut emberkv_options_t,
    uco: *const emberkv_universal_compaction_options_t,
) {
    (*opt).inner.universal = (*uco).inner;
}

/// # Safety
///
/// `opt` must be a live options handle.
pub unsafe fn emberkv_options_enable_statistics(opt: *mut emberkv_options_t) {
    (*opt).inner.statistics = true;
}

/// Tune for loading a large amount of data before the first compaction.
///
/// # Safety
///
/// `opt` must be a live options handle.
pub unsafe fn emberkv_options_prepare_for_bulk_load(opt: *mut emberkv_options_t) {
    let inner = &mut (*opt).inner;
    inner.level0_file_num_compaction_trigger = 1 << 30;
    inner.level0_slowdown_writes_trigger = 1 << 30;
    inner.level0_stop_writes_trigger = 1 << 30;
    inner.disable_auto_compactions = true;
    inner.disable_seek_compaction = true;
    inner.disable_data_sync = true;
    inner.source_compaction_factor = 1 << 30;
    inner.num_levels = 2;
    inner.max_background_compactions = 2;
    inner.target_file_size_base = 256 << 20;
}

/// # Safety
///
/// `opt` must be a live options handle.
pub unsafe fn emberkv_options_set_memtable_vector_rep(opt: *mut emberkv_options_t) {
    (*opt).inner.memtable_rep = MemtableRepKind::Vector;
}

/// # Safety
///
/// `opt` must be a live options handle.
pub unsafe fn emberkv_options_set_memtable_skip_list_rep(opt: *mut emberkv_options_t) {
    (*opt).inner.memtable_rep = MemtableRepKind::SkipList;
}

/// # Safety
///
/// `opt` must be a live options handle.
pub unsafe fn emberkv_options_set_hash_skip_list_rep(
    opt: *mut emberkv_options_t,
    bucket_count: size_t,
    skiplist_height: i32,
    skiplist_branching_factor: i32,
) {
    (*opt).inner.memtable_rep = MemtableRepKind::HashSkipList {
        bucket_count,
        height: skiplist_height,
        branching_factor: skiplist_branching_factor,
    };
}

/// # Safety
///
/// `opt` must be a live options handle.
pub unsafe fn emberkv_options_set_hash_link_list_rep(
    opt: *mut emberkv_options_t,
    bucket_count: size_t,
) {
    (*opt).inner.memtable_rep = MemtableRepKind::HashLinkList { bucket_count };
}

/// # Safety
///
/// `opt` must be a live options handle.
pub unsafe fn emberkv_options_set_plain_table_factory(
    opt: *mut emberkv_options_t,
    key_len: u32,
    bloom_bits_per_key: c_int,
    hash_table_ratio: c_double,
    index_sparseness: size_t,
) {
    (*opt).inner.memtable_rep = MemtableRepKind::PlainTable {
        key_len,
        bloom_bits_per_key,
        hash_table_ratio,
        index_sparseness,
    };
}

/// The `name=value` dump of every tunable, released with `emberkv_free`.
///
/// # Safety
///
/// `opt` must be a live options handle.
pub unsafe fn emberkv_options_dump(opt: *const emberkv_options_t) -> *mut c_char {
    super::engine_string(&(*opt).inner.dump())
}

/// Engine handle for per-read options.
pub struct emberkv_readoptions_t {
    pub(crate) verify_checksums: bool,
    pub(crate) fill_cache: bool,
    pub(crate) snapshot: Option<emberkv_snapshot_t>,
}

pub fn emberkv_readoptions_create() -> *mut emberkv_readoptions_t {
    into_raw(
        ObjectKind::ReadOptions,
        emberkv_readoptions_t {
            verify_checksums: false,
            fill_cache: true,
            snapshot: None,
        },
    )
}

/// # Safety
///
/// `opt` must come from [`emberkv_readoptions_create`] and not be destroyed
/// twice.
pub unsafe fn emberkv_readoptions_destroy(opt: *mut emberkv_readoptions_t) {
    drop_raw(ObjectKind::ReadOptions, opt);
}

/// # Safety
///
/// `opt` must be a live read options handle.
pub unsafe fn emberkv_readoptions_set_verify_checksums(opt: *mut emberkv_readoptions_t, v: c_uchar) {
    (*opt).verify_checksums = v != 0;
}

/// # Safety
///
/// `opt` must be a live read options handle.
pub unsafe fn emberkv_readoptions_set_fill_cache(opt: *mut emberkv_readoptions_t, v: c_uchar) {
    (*opt).fill_cache = v != 0;
}

/// A null `snap` clears the snapshot so reads see the latest state.
///
/// # Safety
///
/// `opt` must be a live read options handle; `snap` must be null or a
/// snapshot that outlives every read made with these options.
pub unsafe fn emberkv_readoptions_set_snapshot(
    opt: *mut emberkv_readoptions_t,
    snap: *const emberkv_snapshot_t,
) {
    (*opt).snapshot = snap.as_ref().copied();
}

/// Engine handle for per-write options.
pub struct emberkv_writeoptions_t {
    pub(crate) sync: bool,
}

pub fn emberkv_writeoptions_create() -> *mut emberkv_writeoptions_t {
    into_raw(ObjectKind::WriteOptions, emberkv_writeoptions_t { sync: false })
}

/// # Safety
///
/// `opt` must come from [`emberkv_writeoptions_create`] and not be destroyed
/// twice.
pub unsafe fn emberkv_writeoptions_destroy(opt: *mut emberkv_writeoptions_t) {
    drop_raw(ObjectKind::WriteOptions, opt);
}

/// # Safety
///
/// `opt` must be a live write options handle.
pub unsafe fn emberkv_writeoptions_set_sync(opt: *mut emberkv_writeoptions_t, v: c_uchar) {
    (*opt).sync = v != 0;
}

/// # Safety
///
/// `opt` must be a live write options handle.
pub unsafe fn emberkv_writeoptions_get_sync(opt: *const emberkv_writeoptions_t) -> c_uchar {
    c_uchar::from((*opt).sync)
}

/// Engine handle for universal compaction settings.
pub struct emberkv_universal_compaction_options_t {
    pub(crate) inner: UniversalCompaction,
}

pub fn emberkv_universal_compaction_options_create() -> *mut emberkv_universal_compaction_options_t
{
    into_raw(
        ObjectKind::UniversalCompactionOptions,
        emberkv_universal_compaction_options_t {
            inner: UniversalCompaction::default(),
        },
    )
}

/// # Safety
///
/// `uco` must come from [`emberkv_universal_compaction_options_create`] and
/// not be destroyed twice.
pub unsafe fn emberkv_universal_compaction_options_destroy(
    uco: *mut emberkv_universal_compaction_options_t,
) {
    drop_raw(ObjectKind::UniversalCompactionOptions, uco);
}

macro_rules! universal_setters {
    ($( $name:ident($field:ident); )*) => {
        $(
            /// # Safety
            ///
            /// `uco` must be a live universal compaction options handle.
            pub unsafe fn $name(uco: *mut emberkv_universal_compaction_options_t, value: c_int) {
                (*uco).inner.$field = value;
            }
        )*
    };
}

universal_setters! {
    emberkv_universal_compaction_options_set_size_ratio(size_ratio);
    emberkv_universal_compaction_options_set_min_merge_width(min_merge_width);
    emberkv_universal_compaction_options_set_max_merge_width(max_merge_width);
    emberkv_universal_compaction_options_set_max_size_amplification_percent(max_size_amplification_percent);
    emberkv_universal_compaction_options_set_compression_size_percent(compression_size_percent);
    emberkv_universal_compaction_options_set_stop_style(stop_style);
}
