//! Textual configuration.
//!
//! `name=value` pairs separated by `;` or newlines, using the names and
//! value formats of [`Options::dump`]. Lines starting with `#` are
//! comments. Booleans are `true`/`false` or `1`/`0`; enums take their name
//! or ordinal; lists are `:`-separated.

use std::str::FromStr;

use super::{Compression, EngineEnum, MemtableRep, Options};
use crate::{Error, Result};

fn invalid(name: &str, value: &str) -> Error {
    Error::config(format!("invalid value for {}: {:?}", name, value))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(invalid(name, value)),
    }
}

fn parse_num<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| invalid(name, value))
}

fn parse_enum<E: EngineEnum>(name: &str, value: &str) -> Result<E> {
    E::from_name(&value.to_ascii_lowercase())
        .or_else(|| value.parse().ok().and_then(E::from_raw))
        .ok_or_else(|| Error::config(format!("unknown {} for {}: {:?}", E::KIND, name, value)))
}

fn parse_list<T, F>(name: &str, value: &str, item: F) -> Result<Vec<T>>
where
    F: Fn(&str, &str) -> Result<T>,
{
    value.split(':').map(|v| item(name, v.trim())).collect()
}

/// `kind(a,b,...)` or a bare `kind`.
fn split_call(value: &str) -> Option<(&str, Vec<&str>)> {
    match value.split_once('(') {
        None => Some((value, Vec::new())),
        Some((kind, rest)) => {
            let args = rest.strip_suffix(')')?;
            Some((kind.trim(), args.split(',').map(str::trim).collect()))
        }
    }
}

fn parse_memtable_rep(name: &str, value: &str) -> Result<MemtableRep> {
    let (kind, args) = split_call(value).ok_or_else(|| invalid(name, value))?;
    let arg = |i: usize| args.get(i).copied().ok_or_else(|| invalid(name, value));

    let rep = match (kind, args.len()) {
        ("skip_list", 0) => MemtableRep::SkipList,
        ("vector", 0) => MemtableRep::Vector,
        ("hash_skip_list", 3) => MemtableRep::HashSkipList {
            bucket_count: parse_num(name, arg(0)?)?,
            height: parse_num(name, arg(1)?)?,
            branching_factor: parse_num(name, arg(2)?)?,
        },
        ("hash_link_list", 1) => MemtableRep::HashLinkList {
            bucket_count: parse_num(name, arg(0)?)?,
        },
        ("plain_table", 4) => MemtableRep::PlainTable {
            key_len: parse_num(name, arg(0)?)?,
            bloom_bits_per_key: parse_num(name, arg(1)?)?,
            hash_table_ratio: parse_num(name, arg(2)?)?,
            index_sparseness: parse_num(name, arg(3)?)?,
        },
        _ => return Err(invalid(name, value)),
    };
    Ok(rep)
}

macro_rules! scalar_options {
    ($opts:ident, $name:ident, $value:ident; $( $key:literal => $setter:ident($parser:ident); )*) => {
        match $name {
            $(
                $key => {
                    $opts.$setter($parser($name, $value)?);
                }
            )*
            _ => return Ok(false),
        }
    };
}

impl Options<'_> {
    /// Apply `name=value` settings from text, in order.
    ///
    /// Every pair goes through the typed setter of the same name, so the
    /// output of [`Options::dump`] can be read back. An empty
    /// `compression_per_level` clears the per-level setting;
    /// `statistics=true` enables statistics and `statistics=false` leaves
    /// them as they are. Shared resources (cache, filter policy,
    /// environment) cannot be set from text.
    pub fn set_from_string(&mut self, text: &str) -> Result<&mut Self> {
        for entry in text.split(|c: char| c == ';' || c == '\n') {
            let entry = entry.trim();
            if entry.is_empty() || entry.starts_with('#') {
                continue;
            }
            let (name, value) = entry
                .split_once('=')
                .ok_or_else(|| Error::config(format!("expected name=value, got {:?}", entry)))?;
            self.set_option(name.trim(), value.trim())?;
        }
        Ok(self)
    }

    fn set_option(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "compression_per_level" if value.is_empty() => {
                self.set_min_level_to_compress(-1);
            }
            "compression_per_level" => {
                let levels: Vec<Compression> = parse_list(name, value, parse_enum::<Compression>)?;
                self.set_compression_per_level(&levels)?;
            }
            "max_bytes_for_level_multiplier_additional" => {
                let levels: Vec<i32> = parse_list(name, value, parse_num::<i32>)?;
                self.set_max_bytes_for_level_multiplier_additional(&levels)?;
            }
            "min_level_to_compress" => {
                self.set_min_level_to_compress(parse_num(name, value)?);
            }
            "db_log_dir" => {
                self.set_db_log_dir(value)?;
            }
            "wal_dir" => {
                self.set_wal_dir(value)?;
            }
            "memtable_rep" => {
                self.set_memtable_rep(parse_memtable_rep(name, value)?);
            }
            "statistics" => {
                if parse_bool(name, value)? {
                    self.enable_statistics();
                }
            }
            _ => {
                if !self.set_scalar(name, value)? {
                    return Err(Error::config(format!("unknown option {:?}", name)));
                }
            }
        }
        Ok(())
    }

    /// Returns false when `name` is not a scalar option.
    fn set_scalar(&mut self, name: &str, value: &str) -> Result<bool> {
        scalar_options! { self, name, value;
            "create_if_missing" => set_create_if_missing(parse_bool);
            "error_if_exists" => set_error_if_exists(parse_bool);
            "paranoid_checks" => set_paranoid_checks(parse_bool);
            "info_log_level" => set_info_log_level(parse_enum);
            "write_buffer_size" => set_write_buffer_size(parse_num);
            "max_write_buffer_number" => set_max_write_buffer_number(parse_num);
            "min_write_buffer_number_to_merge" => set_min_write_buffer_number_to_merge(parse_num);
            "max_open_files" => set_max_open_files(parse_num);
            "block_size" => set_block_size(parse_num);
            "block_restart_interval" => set_block_restart_interval(parse_num);
            "compression" => set_compression(parse_enum);
            "whole_key_filtering" => set_whole_key_filtering(parse_bool);
            "num_levels" => set_num_levels(parse_num);
            "level0_file_num_compaction_trigger" => set_level0_file_num_compaction_trigger(parse_num);
            "level0_slowdown_writes_trigger" => set_level0_slowdown_writes_trigger(parse_num);
            "level0_stop_writes_trigger" => set_level0_stop_writes_trigger(parse_num);
            "max_mem_compaction_level" => set_max_mem_compaction_level(parse_num);
            "target_file_size_base" => set_target_file_size_base(parse_num);
            "target_file_size_multiplier" => set_target_file_size_multiplier(parse_num);
            "max_bytes_for_level_base" => set_max_bytes_for_level_base(parse_num);
            "max_bytes_for_level_multiplier" => set_max_bytes_for_level_multiplier(parse_num);
            "expanded_compaction_factor" => set_expanded_compaction_factor(parse_num);
            "source_compaction_factor" => set_source_compaction_factor(parse_num);
            "max_grandparent_overlap_factor" => set_max_grandparent_overlap_factor(parse_num);
            "disable_data_sync" => set_disable_data_sync(parse_bool);
            "use_fsync" => set_use_fsync(parse_bool);
            "db_stats_log_interval" => set_db_stats_log_interval(parse_num);
            "disable_seek_compaction" => set_disable_seek_compaction(parse_bool);
            "delete_obsolete_files_period_micros" => set_delete_obsolete_files_period_micros(parse_num);
            "max_background_compactions" => set_max_background_compactions(parse_num);
            "max_background_flushes" => set_max_background_flushes(parse_num);
            "max_log_file_size" => set_max_log_file_size(parse_num);
            "log_file_time_to_roll" => set_log_file_time_to_roll(parse_num);
            "keep_log_file_num" => set_keep_log_file_num(parse_num);
            "soft_rate_limit" => set_soft_rate_limit(parse_num);
            "hard_rate_limit" => set_hard_rate_limit(parse_num);
            "rate_limit_delay_max_milliseconds" => set_rate_limit_delay_max_milliseconds(parse_num);
            "max_manifest_file_size" => set_max_manifest_file_size(parse_num);
            "no_block_cache" => set_no_block_cache(parse_bool);
            "table_cache_numshardbits" => set_table_cache_numshardbits(parse_num);
            "table_cache_remove_scan_count_limit" => set_table_cache_remove_scan_count_limit(parse_num);
            "arena_block_size" => set_arena_block_size(parse_num);
            "disable_auto_compactions" => set_disable_auto_compactions(parse_bool);
            "wal_ttl_seconds" => set_wal_ttl_seconds(parse_num);
            "wal_size_limit_mb" => set_wal_size_limit_mb(parse_num);
            "manifest_preallocation_size" => set_manifest_preallocation_size(parse_num);
            "purge_redundant_kvs_while_flush" => set_purge_redundant_kvs_while_flush(parse_bool);
            "allow_os_buffer" => set_allow_os_buffer(parse_bool);
            "allow_mmap_reads" => set_allow_mmap_reads(parse_bool);
            "allow_mmap_writes" => set_allow_mmap_writes(parse_bool);
            "is_fd_close_on_exec" => set_is_fd_close_on_exec(parse_bool);
            "skip_log_error_on_recovery" => set_skip_log_error_on_recovery(parse_bool);
            "stats_dump_period_sec" => set_stats_dump_period_sec(parse_num);
            "block_size_deviation" => set_block_size_deviation(parse_num);
            "advise_random_on_open" => set_advise_random_on_open(parse_bool);
            "access_hint_on_compaction_start" => set_access_hint_on_compaction_start(parse_enum);
            "use_adaptive_mutex" => set_use_adaptive_mutex(parse_bool);
            "bytes_per_sync" => set_bytes_per_sync(parse_num);
            "compaction_style" => set_compaction_style(parse_enum);
            "verify_checksums_in_compaction" => set_verify_checksums_in_compaction(parse_bool);
            "filter_deletes" => set_filter_deletes(parse_bool);
            "max_sequential_skip_in_iterations" => set_max_sequential_skip_in_iterations(parse_num);
            "inplace_update_support" => set_inplace_update_support(parse_bool);
            "inplace_update_num_locks" => set_inplace_update_num_locks(parse_num);
            "memtable_prefix_bloom_bits" => set_memtable_prefix_bloom_bits(parse_num);
            "memtable_prefix_bloom_probes" => set_memtable_prefix_bloom_probes(parse_num);
            "bloom_locality" => set_bloom_locality(parse_num);
            "max_successive_merges" => set_max_successive_merges(parse_num);
            "min_partial_merge_operands" => set_min_partial_merge_operands(parse_num);
            "allow_thread_local" => set_allow_thread_local(parse_bool);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{AccessHint, CompactionStyle, InfoLogLevel};

    #[test]
    fn test_basic_pairs() {
        let mut opts = Options::new();
        opts.set_from_string(
            "create_if_missing=true; write_buffer_size=1048576;\n\
             # comment line\n\
             compression=none;compaction_style=1",
        )
        .unwrap();

        assert!(opts.create_if_missing());
        assert_eq!(opts.write_buffer_size(), 1 << 20);
        assert_eq!(opts.compression().unwrap(), Compression::None);
        assert_eq!(opts.compaction_style().unwrap(), CompactionStyle::Universal);
    }

    #[test]
    fn test_enum_names_and_ordinals() {
        let mut opts = Options::new();
        opts.set_from_string("info_log_level=WARN;access_hint_on_compaction_start=3")
            .unwrap();
        assert_eq!(opts.info_log_level().unwrap(), InfoLogLevel::Warn);
        assert_eq!(
            opts.access_hint_on_compaction_start().unwrap(),
            AccessHint::WillNeed
        );

        let err = opts.set_from_string("compression=lz4").unwrap_err();
        assert!(err.is_configuration());
        assert!(err.message().contains("compression type"));
        assert!(opts.set_from_string("compression=9").is_err());
    }

    #[test]
    fn test_lists() {
        let mut opts = Options::new();
        opts.set_from_string("compression_per_level=none:snappy:2").unwrap();
        assert_eq!(
            opts.compression_per_level().unwrap(),
            vec![Compression::None, Compression::Snappy, Compression::Zlib]
        );

        opts.set_from_string("compression_per_level=").unwrap();
        assert!(opts.compression_per_level().unwrap().is_empty());

        opts.set_from_string("max_bytes_for_level_multiplier_additional=1:2:3")
            .unwrap();
        assert!(opts
            .dump()
            .contains("max_bytes_for_level_multiplier_additional=1:2:3"));
    }

    #[test]
    fn test_memtable_rep_forms() {
        let mut opts = Options::new();
        for form in [
            "vector",
            "hash_skip_list(1000,4,4)",
            "hash_link_list(50000)",
            "plain_table(16,10,0.75,16)",
            "skip_list",
        ] {
            opts.set_from_string(&format!("memtable_rep={}", form)).unwrap();
            assert!(opts.dump().contains(&format!("memtable_rep={}\n", form)));
        }
        assert!(opts.set_from_string("memtable_rep=hash_link_list").is_err());
        assert!(opts.set_from_string("memtable_rep=hash_link_list(1").is_err());
    }

    #[test]
    fn test_errors() {
        let mut opts = Options::new();
        assert!(opts.set_from_string("no_such_option=1").unwrap_err().is_configuration());
        assert!(opts.set_from_string("create_if_missing").unwrap_err().is_configuration());
        assert!(opts.set_from_string("create_if_missing=yes").is_err());
        assert!(opts.set_from_string("block_size=-4").is_err());
    }

    #[test]
    fn test_dump_reads_back() {
        let mut source = Options::new();
        source
            .set_create_if_missing(true)
            .set_compression(Compression::Bzip2)
            .set_compaction_style(CompactionStyle::Universal)
            .set_info_log_level(InfoLogLevel::Debug)
            .set_soft_rate_limit(0.5)
            .set_memtable_rep(MemtableRep::HashSkipList {
                bucket_count: 10,
                height: 4,
                branching_factor: 4,
            })
            .enable_statistics();
        source.set_wal_dir("/tmp/wal").unwrap();
        source.set_compression_per_level(&[Compression::None, Compression::Snappy]).unwrap();

        let dump = source.dump();
        let mut copy = Options::new();
        copy.set_from_string(&dump).unwrap();
        assert_eq!(copy.dump(), dump);
    }
}
