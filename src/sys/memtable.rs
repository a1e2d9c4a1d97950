//! In-memory sorted buffer of recent writes.
//!
//! Entries are keyed by [`InternalKey`], so several versions of one user key
//! coexist and reads pick the newest version visible at their sequence.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bytes::Bytes;
use crossbeam_skiplist::SkipMap;

use crate::types::{InternalKey, LookupResult};

/// Per-entry bookkeeping charged on top of key and value bytes.
const ENTRY_OVERHEAD: usize = 32;

#[derive(Debug)]
pub(crate) struct MemTable {
    table: SkipMap<InternalKey, Bytes>,
    approximate_memory_usage: AtomicUsize,
    max_sequence: AtomicU64,
}

impl MemTable {
    pub fn new() -> Self {
        Self {
            table: SkipMap::new(),
            approximate_memory_usage: AtomicUsize::new(0),
            max_sequence: AtomicU64::new(0),
        }
    }

    /// Insert a value, or a tombstone when `value` is `None`.
    pub fn add(&self, key: InternalKey, value: Option<Bytes>) {
        let value = value.unwrap_or_default();
        let charge = key.encoded_len() + value.len() + ENTRY_OVERHEAD;
        self.approximate_memory_usage
            .fetch_add(charge, Ordering::Relaxed);
        self.max_sequence
            .fetch_max(key.sequence(), Ordering::Relaxed);
        self.table.insert(key, value);
    }

    /// Newest version of `user_key` with a sequence at or below `sequence`.
    pub fn get(&self, user_key: &[u8], sequence: u64) -> LookupResult {
        let probe = InternalKey::lookup(user_key, sequence);
        match self.table.range(probe..).next() {
            Some(entry) if entry.key().user_key() == user_key => {
                if entry.key().is_deletion() {
                    LookupResult::Deleted
                } else {
                    LookupResult::Found(entry.value().clone())
                }
            }
            _ => LookupResult::NotFound,
        }
    }

    /// Entries in internal key order. Writes racing with the scan may or
    /// may not be observed.
    pub fn iter(&self) -> impl Iterator<Item = (InternalKey, Bytes)> + '_ {
        self.table
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
    }

    pub fn approximate_memory_usage(&self) -> usize {
        self.approximate_memory_usage.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn max_sequence(&self) -> u64 {
        self.max_sequence.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueType;

    fn put(mem: &MemTable, key: &str, seq: u64, value: &str) {
        mem.add(
            InternalKey::new(Bytes::copy_from_slice(key.as_bytes()), seq, ValueType::Value),
            Some(Bytes::copy_from_slice(value.as_bytes())),
        );
    }

    fn delete(mem: &MemTable, key: &str, seq: u64) {
        mem.add(
            InternalKey::new(Bytes::copy_from_slice(key.as_bytes()), seq, ValueType::Deletion),
            None,
        );
    }

    #[test]
    fn test_get_newest_visible_version() {
        let mem = MemTable::new();
        put(&mem, "key", 1, "v1");
        put(&mem, "key", 5, "v5");

        assert_eq!(mem.get(b"key", 10), LookupResult::Found(Bytes::from("v5")));
        assert_eq!(mem.get(b"key", 4), LookupResult::Found(Bytes::from("v1")));
        assert_eq!(mem.get(b"key", 0), LookupResult::NotFound);
    }

    #[test]
    fn test_tombstone_hides_value() {
        let mem = MemTable::new();
        put(&mem, "key", 1, "v1");
        delete(&mem, "key", 2);

        assert_eq!(mem.get(b"key", 2), LookupResult::Deleted);
        assert_eq!(mem.get(b"key", 1), LookupResult::Found(Bytes::from("v1")));
    }

    #[test]
    fn test_get_does_not_leak_into_neighbours() {
        let mem = MemTable::new();
        put(&mem, "key1", 1, "a");
        put(&mem, "key10", 2, "b");

        assert_eq!(mem.get(b"key", 9), LookupResult::NotFound);
        assert_eq!(mem.get(b"key1", 9), LookupResult::Found(Bytes::from("a")));
    }

    #[test]
    fn test_usage_and_order() {
        let mem = MemTable::new();
        assert!(mem.is_empty());
        put(&mem, "b", 2, "x");
        put(&mem, "a", 3, "y");
        delete(&mem, "b", 4);

        assert_eq!(mem.len(), 3);
        assert_eq!(mem.max_sequence(), 4);
        assert!(mem.approximate_memory_usage() >= 3 * ENTRY_OVERHEAD);

        let order: Vec<(Vec<u8>, u64)> = mem
            .iter()
            .map(|(k, _)| (k.user_key().to_vec(), k.sequence()))
            .collect();
        assert_eq!(
            order,
            vec![(b"a".to_vec(), 3), (b"b".to_vec(), 4), (b"b".to_vec(), 2)]
        );
    }
}
