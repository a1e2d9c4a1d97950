//! Bloom filter policy.
//!
//! A table built with a filter policy carries one filter block covering
//! every user key in the table; point lookups consult it before touching
//! the index, so a miss on an absent key usually costs no block read.

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use libc::c_int;

use super::{drop_raw, into_raw, ObjectKind};

/// Filter policy shared by the options and tables that use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BloomPolicy {
    bits_per_key: usize,
    k: u32,
}

impl BloomPolicy {
    pub fn new(bits_per_key: usize) -> Self {
        // k = bits_per_key * ln(2), clamped to what the encoding allows.
        let k = ((bits_per_key as f64 * 0.69) as u32).clamp(1, 30);
        Self { bits_per_key, k }
    }

    pub fn bits_per_key(&self) -> usize {
        self.bits_per_key
    }

    /// Build the encoded filter for `keys`: the bit array followed by one
    /// byte holding the probe count.
    pub fn create_filter<'a, I>(&self, keys: I, count: usize) -> Bytes
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let bits_count = (count * self.bits_per_key).max(64);
        let bytes_count = (bits_count + 7) / 8;
        let bits_count = bytes_count * 8;
        let mut bits = vec![0u8; bytes_count];

        for key in keys {
            let mut h = bloom_hash(key);
            let delta = h.rotate_right(17);
            for _ in 0..self.k {
                let bit_pos = (h as usize) % bits_count;
                bits[bit_pos / 8] |= 1 << (bit_pos % 8);
                h = h.wrapping_add(delta);
            }
        }

        let mut out = BytesMut::with_capacity(bytes_count + 1);
        out.put_slice(&bits);
        out.put_u8(self.k as u8);
        out.freeze()
    }
}

/// Test `key` against an encoded filter.
///
/// Returns false only if the key is certainly absent. Malformed filters
/// match everything so they can never hide data.
pub(crate) fn key_may_match(filter: &[u8], key: &[u8]) -> bool {
    if filter.len() < 2 {
        return true;
    }
    let k = filter[filter.len() - 1] as u32;
    if k > 30 {
        return true;
    }
    let bits = &filter[..filter.len() - 1];
    let bits_count = bits.len() * 8;

    let mut h = bloom_hash(key);
    let delta = h.rotate_right(17);
    for _ in 0..k {
        let bit_pos = (h as usize) % bits_count;
        if bits[bit_pos / 8] & (1 << (bit_pos % 8)) == 0 {
            return false;
        }
        h = h.wrapping_add(delta);
    }
    true
}

/// Murmur-style hash used for filter probes.
fn bloom_hash(key: &[u8]) -> u32 {
    const SEED: u32 = 0xbc9f_1d34;
    const M: u32 = 0xc6a4_a793;

    let mut h = SEED ^ (key.len() as u32).wrapping_mul(M);

    let mut chunks = key.chunks_exact(4);
    for chunk in &mut chunks {
        let w = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        h = h.wrapping_add(w).wrapping_mul(M);
        h ^= h >> 16;
    }

    let rest = chunks.remainder();
    if rest.len() >= 3 {
        h = h.wrapping_add((rest[2] as u32) << 16);
    }
    if rest.len() >= 2 {
        h = h.wrapping_add((rest[1] as u32) << 8);
    }
    if !rest.is_empty() {
        h = h.wrapping_add(rest[0] as u32).wrapping_mul(M);
        h ^= h >> 24;
    }
    h
}

/// Engine handle for a filter policy.
pub struct emberkv_filterpolicy_t {
    pub(crate) inner: Arc<BloomPolicy>,
}

/// Create a bloom filter policy using `bits_per_key` bits for each key.
pub fn emberkv_filterpolicy_create_bloom(bits_per_key: c_int) -> *mut emberkv_filterpolicy_t {
    let bits = usize::try_from(bits_per_key).unwrap_or(0);
    into_raw(
        ObjectKind::FilterPolicy,
        emberkv_filterpolicy_t {
            inner: Arc::new(BloomPolicy::new(bits)),
        },
    )
}

/// # Safety
///
/// `policy` must come from [`emberkv_filterpolicy_create_bloom`] and not be
/// destroyed twice.
pub unsafe fn emberkv_filterpolicy_destroy(policy: *mut emberkv_filterpolicy_t) {
    drop_raw(ObjectKind::FilterPolicy, policy);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(policy: &BloomPolicy, keys: &[String]) -> Bytes {
        policy.create_filter(keys.iter().map(|k| k.as_bytes()), keys.len())
    }

    #[test]
    fn test_empty_filter_rejects() {
        let policy = BloomPolicy::new(10);
        let filter = policy.create_filter(std::iter::empty(), 0);
        assert!(!key_may_match(&filter, b"hello"));
    }

    #[test]
    fn test_added_keys_always_match() {
        let policy = BloomPolicy::new(10);
        let keys: Vec<String> = (0..100).map(|i| format!("key{}", i)).collect();
        let filter = build(&policy, &keys);

        for key in &keys {
            assert!(key_may_match(&filter, key.as_bytes()), "{} not found", key);
        }
    }

    #[test]
    fn test_false_positive_rate() {
        let policy = BloomPolicy::new(10);
        let keys: Vec<String> = (0..1000).map(|i| format!("key{:06}", i)).collect();
        let filter = build(&policy, &keys);

        let false_positives = (1000..11000)
            .filter(|i| key_may_match(&filter, format!("key{:06}", i).as_bytes()))
            .count();

        // About 1% expected with 10 bits per key.
        assert!(false_positives < 200, "{} false positives", false_positives);
    }

    #[test]
    fn test_malformed_filter_matches_everything() {
        assert!(key_may_match(&[], b"k"));
        assert!(key_may_match(&[0xFF, 99], b"k"));
    }

    #[test]
    fn test_bloom_hash_is_stable() {
        assert_eq!(bloom_hash(b"key1"), bloom_hash(b"key1"));
        assert_ne!(bloom_hash(b"key1"), bloom_hash(b"key2"));
    }

    #[test]
    fn test_negative_bits_per_key_is_clamped() {
        let raw = emberkv_filterpolicy_create_bloom(-5);
        unsafe {
            assert_eq!((*raw).inner.bits_per_key(), 0);
            emberkv_filterpolicy_destroy(raw);
        }
    }
}
