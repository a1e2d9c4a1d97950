//! Merging and garbage collection of sorted runs.
//!
//! A compaction merges the frozen memtables and the current table into one
//! sorted stream, then drops versions no reader can observe any more:
//!
//! - Sequence numbers are split into stripes by the live snapshots. Within
//!   one user key only the newest version of each stripe is kept.
//! - A tombstone that is the oldest surviving version of its key hides
//!   nothing and is dropped.
//!
//! Collection only applies to user keys inside the requested range; keys
//! outside it are copied through untouched.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use bytes::Bytes;

use crate::types::InternalKey;
use crate::Result;

/// A sorted source of entries.
pub(crate) type Source<'a> = Box<dyn Iterator<Item = Result<(InternalKey, Bytes)>> + 'a>;

struct HeapEntry {
    key: InternalKey,
    value: Bytes,
    source: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the smallest key pops first.
        // Lower source index wins ties (newer data).
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.source.cmp(&self.source))
    }
}

/// K-way merge of sorted sources into one sorted stream.
pub(crate) struct MergingIter<'a> {
    sources: Vec<Source<'a>>,
    heap: BinaryHeap<HeapEntry>,
    primed: bool,
}

impl<'a> MergingIter<'a> {
    /// Sources are ordered newest first.
    pub fn new(sources: Vec<Source<'a>>) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(sources.len()),
            sources,
            primed: false,
        }
    }

    fn advance(&mut self, source: usize) -> Result<()> {
        if let Some(next) = self.sources[source].next() {
            let (key, value) = next?;
            self.heap.push(HeapEntry { key, value, source });
        }
        Ok(())
    }
}

impl Iterator for MergingIter<'_> {
    type Item = Result<(InternalKey, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.primed {
            self.primed = true;
            for source in 0..self.sources.len() {
                if let Err(e) = self.advance(source) {
                    return Some(Err(e));
                }
            }
        }

        let top = self.heap.pop()?;
        if let Err(e) = self.advance(top.source) {
            return Some(Err(e));
        }
        Some(Ok((top.key, top.value)))
    }
}

/// Counters reported after a compaction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GcStats {
    pub input: u64,
    pub output: u64,
    pub shadowed: u64,
    pub tombstones: u64,
}

/// Streaming filter deciding which merged entries survive.
pub(crate) struct GarbageFilter<'a> {
    /// Live snapshot sequences, ascending.
    snapshots: &'a [u64],
    start: Option<&'a [u8]>,
    limit: Option<&'a [u8]>,
    current_key: Option<Bytes>,
    in_range: bool,
    last_stripe: Option<usize>,
    pending_tombstones: Vec<InternalKey>,
    stats: GcStats,
}

impl<'a> GarbageFilter<'a> {
    /// `start` and `limit` bound the collected user keys, both inclusive;
    /// `None` leaves that side open.
    pub fn new(snapshots: &'a [u64], start: Option<&'a [u8]>, limit: Option<&'a [u8]>) -> Self {
        Self {
            snapshots,
            start,
            limit,
            current_key: None,
            in_range: false,
            last_stripe: None,
            pending_tombstones: Vec::new(),
            stats: GcStats::default(),
        }
    }

    fn stripe(&self, sequence: u64) -> usize {
        self.snapshots.partition_point(|&s| s < sequence)
    }

    fn contains(&self, user_key: &[u8]) -> bool {
        self.start.map_or(true, |s| user_key >= s) && self.limit.map_or(true, |l| user_key <= l)
    }

    fn end_key(&mut self) {
        self.stats.tombstones += self.pending_tombstones.len() as u64;
        self.pending_tombstones.clear();
    }

    /// Feed the next merged entry; survivors are passed to `emit` in order.
    pub fn feed<F>(&mut self, key: InternalKey, value: Bytes, emit: &mut F) -> Result<()>
    where
        F: FnMut(&InternalKey, &[u8]) -> Result<()>,
    {
        self.stats.input += 1;

        if self.current_key.as_deref() != Some(key.user_key()) {
            self.end_key();
            self.current_key = Some(key.user_key_bytes().clone());
            self.in_range = self.contains(key.user_key());
            self.last_stripe = None;
        }

        if !self.in_range {
            self.stats.output += 1;
            return emit(&key, &value);
        }

        let stripe = self.stripe(key.sequence());
        if self.last_stripe == Some(stripe) {
            self.stats.shadowed += 1;
            return Ok(());
        }
        self.last_stripe = Some(stripe);

        if key.is_deletion() {
            self.pending_tombstones.push(key);
            return Ok(());
        }

        // An older value survives, so the tombstones above it still matter.
        for tombstone in self.pending_tombstones.drain(..) {
            self.stats.output += 1;
            emit(&tombstone, &[])?;
        }
        self.stats.output += 1;
        emit(&key, &value)
    }

    /// Close the stream and return the counters.
    pub fn finish(mut self) -> GcStats {
        self.end_key();
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueType;

    fn put(key: &str, seq: u64, value: &str) -> (InternalKey, Bytes) {
        (
            InternalKey::new(Bytes::copy_from_slice(key.as_bytes()), seq, ValueType::Value),
            Bytes::copy_from_slice(value.as_bytes()),
        )
    }

    fn del(key: &str, seq: u64) -> (InternalKey, Bytes) {
        (
            InternalKey::new(Bytes::copy_from_slice(key.as_bytes()), seq, ValueType::Deletion),
            Bytes::new(),
        )
    }

    fn source(entries: Vec<(InternalKey, Bytes)>) -> Source<'static> {
        Box::new(entries.into_iter().map(Ok))
    }

    fn run(
        input: Vec<(InternalKey, Bytes)>,
        snapshots: &[u64],
        start: Option<&[u8]>,
        limit: Option<&[u8]>,
    ) -> (Vec<(String, u64, bool)>, GcStats) {
        let mut filter = GarbageFilter::new(snapshots, start, limit);
        let mut out = Vec::new();
        for (key, value) in input {
            filter
                .feed(key, value, &mut |k: &InternalKey, _v: &[u8]| {
                    out.push((
                        String::from_utf8_lossy(k.user_key()).into_owned(),
                        k.sequence(),
                        k.is_deletion(),
                    ));
                    Ok(())
                })
                .unwrap();
        }
        (out, filter.finish())
    }

    #[test]
    fn test_merge_orders_across_sources() {
        let newer = source(vec![put("a", 5, "a5"), put("c", 6, "c6")]);
        let older = source(vec![put("a", 1, "a1"), put("b", 2, "b2")]);
        let merged: Vec<_> = MergingIter::new(vec![newer, older])
            .map(|e| {
                let (k, v) = e.unwrap();
                (k.user_key().to_vec(), k.sequence(), v)
            })
            .collect();

        assert_eq!(
            merged,
            vec![
                (b"a".to_vec(), 5, Bytes::from("a5")),
                (b"a".to_vec(), 1, Bytes::from("a1")),
                (b"b".to_vec(), 2, Bytes::from("b2")),
                (b"c".to_vec(), 6, Bytes::from("c6")),
            ]
        );
    }

    #[test]
    fn test_merge_surfaces_source_errors() {
        let broken: Source<'static> =
            Box::new(vec![Err::<(InternalKey, Bytes), _>(crate::Error::corruption("bad block"))].into_iter());
        let mut merged = MergingIter::new(vec![source(vec![put("a", 1, "x")]), broken]);
        assert!(merged.next().unwrap().is_err());
    }

    #[test]
    fn test_keeps_newest_without_snapshots() {
        let (out, stats) = run(
            vec![put("a", 9, "new"), put("a", 4, "old"), put("b", 3, "b")],
            &[],
            None,
            None,
        );
        assert_eq!(out, vec![("a".into(), 9, false), ("b".into(), 3, false)]);
        assert_eq!(stats.shadowed, 1);
        assert_eq!(stats.input, 3);
        assert_eq!(stats.output, 2);
    }

    #[test]
    fn test_snapshot_keeps_visible_version() {
        let (out, _) = run(
            vec![put("a", 9, "new"), put("a", 6, "mid"), put("a", 4, "old")],
            &[5],
            None,
            None,
        );
        assert_eq!(out, vec![("a".into(), 9, false), ("a".into(), 4, false)]);
    }

    #[test]
    fn test_oldest_tombstone_dropped() {
        let (out, stats) = run(
            vec![del("a", 8), put("a", 2, "x"), put("b", 3, "y")],
            &[],
            None,
            None,
        );
        assert_eq!(out, vec![("b".into(), 3, false)]);
        assert_eq!(stats.tombstones, 1);
        assert_eq!(stats.shadowed, 1);
    }

    #[test]
    fn test_tombstone_kept_above_snapshot_value() {
        let (out, _) = run(vec![del("a", 8), put("a", 2, "x")], &[5], None, None);
        assert_eq!(out, vec![("a".into(), 8, true), ("a".into(), 2, false)]);
    }

    #[test]
    fn test_keys_outside_range_untouched() {
        let (out, _) = run(
            vec![
                put("a", 9, "x"),
                put("a", 1, "y"),
                del("m", 7),
                put("z", 5, "p"),
                put("z", 2, "q"),
            ],
            &[],
            Some(&b"b"[..]),
            Some(&b"n"[..]),
        );
        assert_eq!(
            out,
            vec![
                ("a".into(), 9, false),
                ("a".into(), 1, false),
                ("z".into(), 5, false),
                ("z".into(), 2, false),
            ]
        );
    }

    #[test]
    fn test_range_limit_is_inclusive() {
        let (out, _) = run(vec![del("m", 7), put("m", 3, "x")], &[], None, Some(&b"m"[..]));
        assert!(out.is_empty());
    }
}
