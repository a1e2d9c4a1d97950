//! Block cache.
//!
//! A sharded LRU keyed by `(table cache id, block offset)` whose capacity is
//! measured in bytes of cached block data. One cache may be shared by any
//! number of databases; the table cache id keeps their entries apart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use libc::size_t;
use parking_lot::Mutex;

use super::{drop_raw, into_raw, ObjectKind};

/// Key of one cached block.
pub(crate) type BlockKey = (u64, u64);

const NUM_SHARD_BITS: usize = 4;
const NUM_SHARDS: usize = 1 << NUM_SHARD_BITS;

/// Hit/miss counters for one cache.
#[derive(Debug, Default)]
pub(crate) struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub inserts: AtomicU64,
    pub evictions: AtomicU64,
}

struct LruNode {
    key: BlockKey,
    value: Bytes,
    prev: Option<usize>,
    next: Option<usize>,
}

/// One shard: an index-linked LRU list plus a map into it.
struct LruShard {
    capacity: usize,
    usage: usize,
    map: HashMap<BlockKey, usize>,
    nodes: Vec<Option<LruNode>>,
    free_list: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl LruShard {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            usage: 0,
            map: HashMap::new(),
            nodes: Vec::new(),
            free_list: Vec::new(),
            head: None,
            tail: None,
        }
    }

    fn get(&mut self, key: &BlockKey) -> Option<Bytes> {
        let idx = *self.map.get(key)?;
        self.unlink(idx);
        self.push_front(idx);
        self.nodes[idx].as_ref().map(|n| n.value.clone())
    }

    /// Insert and return how many entries were evicted to make room.
    fn insert(&mut self, key: BlockKey, value: Bytes) -> u64 {
        let charge = value.len();
        if charge > self.capacity {
            // Never cache something that would evict the whole shard.
            return 0;
        }

        if let Some(idx) = self.map.remove(&key) {
            self.remove_node(idx);
        }

        let mut evicted = 0;
        while self.usage + charge > self.capacity {
            match self.tail {
                Some(tail) => {
                    if let Some(node) = self.nodes[tail].as_ref() {
                        let old_key = node.key;
                        self.map.remove(&old_key);
                    }
                    self.remove_node(tail);
                    evicted += 1;
                }
                None => break,
            }
        }

        let idx = match self.free_list.pop() {
            Some(idx) => idx,
            None => {
                self.nodes.push(None);
                self.nodes.len() - 1
            }
        };
        self.nodes[idx] = Some(LruNode {
            key,
            value,
            prev: None,
            next: None,
        });
        self.push_front(idx);
        self.map.insert(key, idx);
        self.usage += charge;
        evicted
    }

    fn remove_node(&mut self, idx: usize) {
        self.unlink(idx);
        if let Some(node) = self.nodes[idx].take() {
            self.usage -= node.value.len();
        }
        self.free_list.push(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match self.nodes[idx].as_ref() {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.nodes[p].as_mut() {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.nodes[n].as_mut() {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(node) = self.nodes[idx].as_mut() {
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            if let Some(node) = self.nodes[h].as_mut() {
                node.prev = Some(idx);
            }
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }
}

/// Sharded, byte-charged LRU cache of table blocks.
pub(crate) struct BlockCache {
    capacity: usize,
    shards: Vec<Mutex<LruShard>>,
    stats: CacheStats,
}

impl BlockCache {
    pub fn new(capacity: usize) -> Self {
        let per_shard = capacity / NUM_SHARDS + usize::from(capacity % NUM_SHARDS != 0);
        Self {
            capacity,
            shards: (0..NUM_SHARDS)
                .map(|_| Mutex::new(LruShard::new(per_shard)))
                .collect(),
            stats: CacheStats::default(),
        }
    }

    pub fn get(&self, key: &BlockKey) -> Option<Bytes> {
        let found = self.shard(key).lock().get(key);
        let counter = if found.is_some() {
            &self.stats.hits
        } else {
            &self.stats.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn insert(&self, key: BlockKey, value: Bytes) {
        let evicted = self.shard(&key).lock().insert(key, value);
        self.stats.inserts.fetch_add(1, Ordering::Relaxed);
        self.stats.evictions.fetch_add(evicted, Ordering::Relaxed);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently charged against the capacity.
    pub fn usage(&self) -> usize {
        self.shards.iter().map(|s| s.lock().usage).sum()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn shard(&self, key: &BlockKey) -> &Mutex<LruShard> {
        // Offsets are block aligned, so mix in the high bits too.
        let h = key.0.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ (key.1 >> 12) ^ key.1;
        &self.shards[(h as usize) & (NUM_SHARDS - 1)]
    }
}

/// Source of process-unique ids used to namespace cache keys per table.
static NEXT_CACHE_ID: AtomicUsize = AtomicUsize::new(1);

pub(crate) fn new_cache_id() -> u64 {
    NEXT_CACHE_ID.fetch_add(1, Ordering::Relaxed) as u64
}

/// Engine handle for a block cache.
pub struct emberkv_cache_t {
    pub(crate) inner: Arc<BlockCache>,
}

/// Create an LRU block cache holding up to `capacity` bytes.
pub fn emberkv_cache_create_lru(capacity: size_t) -> *mut emberkv_cache_t {
    into_raw(
        ObjectKind::Cache,
        emberkv_cache_t {
            inner: Arc::new(BlockCache::new(capacity)),
        },
    )
}

/// # Safety
///
/// `cache` must come from [`emberkv_cache_create_lru`] and not be destroyed twice.
pub unsafe fn emberkv_cache_destroy(cache: *mut emberkv_cache_t) {
    drop_raw(ObjectKind::Cache, cache);
}

/// # Safety
///
/// `cache` must be a live cache handle.
pub unsafe fn emberkv_cache_get_usage(cache: *const emberkv_cache_t) -> size_t {
    (*cache).inner.usage()
}

/// # Safety
///
/// `cache` must be a live cache handle.
pub unsafe fn emberkv_cache_get_capacity(cache: *const emberkv_cache_t) -> size_t {
    (*cache).inner.capacity()
}
