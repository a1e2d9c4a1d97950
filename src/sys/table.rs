//! Sorted table files.
//!
//! ```text
//! [data block 0] ... [data block N] [filter block]? [index block] [footer]
//! ```
//!
//! Every block is followed by a 5 byte trailer, `crc32 (LE) | compression`,
//! where the checksum covers the stored content plus the compression byte.
//! Block content is a run of prefix-compressed entries with a restart point
//! every `block_restart_interval` entries:
//!
//! ```text
//! entry:   [shared (varint)] [unshared (varint)] [value_len (varint)] [key delta] [value]
//! trailer: [restart offsets (u32 LE)...] [restart count (u32 LE)]
//! ```
//!
//! Keys are encoded internal keys. The index block maps the last key of
//! each data block to `offset (u64 LE) | size (u64 LE)`. The footer is
//! 48 bytes: index offset and size, filter offset and size, entry count and
//! the magic number, all u64 LE.

use std::cmp::Ordering;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use libc::c_int;
use parking_lot::Mutex;

use crate::types::{decode_varint, encode_varint, InternalKey, LookupResult};
use crate::util::crc::crc32_multi;
use crate::{Error, Result};

use super::cache::{new_cache_id, BlockCache};
use super::filter::{key_may_match, BloomPolicy};
use super::options::EMBERKV_SNAPPY_COMPRESSION;

const BLOCK_TRAILER_SIZE: usize = 5;
const FOOTER_SIZE: usize = 48;
const TABLE_MAGIC: u64 = 0x656d_6265_726b_7631;

const NO_COMPRESSION: u8 = 0;
const SNAPPY_COMPRESSION: u8 = 1;

/// Location of a block's content (trailer excluded) in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockHandle {
    offset: u64,
    size: u64,
}

struct BlockBuilder {
    buffer: BytesMut,
    restarts: Vec<u32>,
    counter: usize,
    restart_interval: usize,
    last_key: Vec<u8>,
    entries: usize,
}

impl BlockBuilder {
    fn new(restart_interval: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            restarts: vec![0],
            counter: 0,
            restart_interval: restart_interval.max(1),
            last_key: Vec::new(),
            entries: 0,
        }
    }

    fn add(&mut self, key: &[u8], value: &[u8]) {
        let shared = if self.counter < self.restart_interval {
            self.last_key
                .iter()
                .zip(key)
                .take_while(|(a, b)| a == b)
                .count()
        } else {
            self.restarts.push(self.buffer.len() as u32);
            self.counter = 0;
            0
        };

        encode_varint(&mut self.buffer, shared as u64);
        encode_varint(&mut self.buffer, (key.len() - shared) as u64);
        encode_varint(&mut self.buffer, value.len() as u64);
        self.buffer.put_slice(&key[shared..]);
        self.buffer.put_slice(value);

        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.counter += 1;
        self.entries += 1;
    }

    fn is_empty(&self) -> bool {
        self.entries == 0
    }

    fn estimated_size(&self) -> usize {
        self.buffer.len() + self.restarts.len() * 4 + 4
    }

    /// Finish the block and reset the builder for the next one.
    fn finish(&mut self) -> Bytes {
        for &restart in &self.restarts {
            self.buffer.put_u32_le(restart);
        }
        self.buffer.put_u32_le(self.restarts.len() as u32);

        let content = self.buffer.split().freeze();
        self.restarts.clear();
        self.restarts.push(0);
        self.counter = 0;
        self.last_key.clear();
        self.entries = 0;
        content
    }
}

/// A decoded block.
pub(crate) struct Block {
    data: Bytes,
    restart_offset: usize,
    num_restarts: usize,
}

impl Block {
    fn new(data: Bytes) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::corruption("block too short"));
        }
        let num_restarts = read_u32(&data[data.len() - 4..]) as usize;
        let restart_bytes = num_restarts
            .checked_mul(4)
            .filter(|n| n + 4 <= data.len())
            .ok_or_else(|| Error::corruption("bad restart array"))?;
        let restart_offset = data.len() - 4 - restart_bytes;
        Ok(Self {
            data,
            restart_offset,
            num_restarts,
        })
    }

    fn restart_point(&self, index: usize) -> usize {
        let at = self.restart_offset + index * 4;
        read_u32(&self.data[at..at + 4]) as usize
    }

    /// Decode the entry at `offset` given the previous key, returning the
    /// full key, the value and the offset of the next entry.
    fn entry_at(&self, offset: usize, prev_key: &[u8]) -> Result<(Vec<u8>, Bytes, usize)> {
        let corrupt = || Error::corruption("bad block entry");
        let mut cursor = &self.data[offset..self.restart_offset];
        let before = cursor.len();
        let shared = decode_varint(&mut cursor).ok_or_else(corrupt)? as usize;
        let unshared = decode_varint(&mut cursor).ok_or_else(corrupt)? as usize;
        let value_len = decode_varint(&mut cursor).ok_or_else(corrupt)? as usize;
        if shared > prev_key.len() || cursor.len() < unshared + value_len {
            return Err(corrupt());
        }

        let mut key = Vec::with_capacity(shared + unshared);
        key.extend_from_slice(&prev_key[..shared]);
        key.extend_from_slice(&cursor[..unshared]);

        let value_start = offset + (before - cursor.len()) + unshared;
        let value = self.data.slice(value_start..value_start + value_len);
        Ok((key, value, value_start + value_len))
    }

    fn decode_key(raw: &[u8]) -> Result<InternalKey> {
        InternalKey::decode(raw).ok_or_else(|| Error::corruption("bad internal key"))
    }

    /// First entry whose key is at or after `target`.
    fn seek(&self, target: &InternalKey) -> Result<Option<(InternalKey, Bytes)>> {
        // Last restart point whose key sorts before the target.
        let (mut left, mut right) = (0, self.num_restarts);
        while right - left > 1 {
            let mid = (left + right) / 2;
            let (key, _, _) = self.entry_at(self.restart_point(mid), &[])?;
            if Self::decode_key(&key)? < *target {
                left = mid;
            } else {
                right = mid;
            }
        }

        let mut offset = if self.num_restarts == 0 {
            self.restart_offset
        } else {
            self.restart_point(left)
        };
        let mut prev = Vec::new();
        while offset < self.restart_offset {
            let (key, value, next) = self.entry_at(offset, &prev)?;
            let ikey = Self::decode_key(&key)?;
            if ikey.cmp(target) != Ordering::Less {
                return Ok(Some((ikey, value)));
            }
            prev = key;
            offset = next;
        }
        Ok(None)
    }

    fn raw_entries(&self) -> Result<Vec<(Vec<u8>, Bytes)>> {
        let mut out = Vec::new();
        let mut offset = 0;
        let mut prev = Vec::new();
        while offset < self.restart_offset {
            let (key, value, next) = self.entry_at(offset, &prev)?;
            prev.clone_from(&key);
            out.push((key, value));
            offset = next;
        }
        Ok(out)
    }

    fn entries(&self) -> Result<Vec<(InternalKey, Bytes)>> {
        self.raw_entries()?
            .into_iter()
            .map(|(k, v)| Ok((Self::decode_key(&k)?, v)))
            .collect()
    }
}

fn read_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

fn read_u64(b: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&b[..8]);
    u64::from_le_bytes(buf)
}

/// Check a block's trailer and return its decompressed content.
fn decode_block(raw: &[u8], verify_checksum: bool) -> Result<Bytes> {
    if raw.len() < BLOCK_TRAILER_SIZE {
        return Err(Error::corruption("block too short for trailer"));
    }
    let content_len = raw.len() - BLOCK_TRAILER_SIZE;
    let (content, trailer) = raw.split_at(content_len);
    let compression = trailer[4];

    if verify_checksum {
        let expected = read_u32(&trailer[..4]);
        if crc32_multi(&[content, &[compression]]) != expected {
            return Err(Error::corruption("block checksum mismatch"));
        }
    }

    match compression {
        NO_COMPRESSION => Ok(Bytes::copy_from_slice(content)),
        SNAPPY_COMPRESSION => snap::raw::Decoder::new()
            .decompress_vec(content)
            .map(Bytes::from)
            .map_err(|e| Error::corruption(format!("snappy decompress failed: {}", e))),
        other => Err(Error::corruption(format!("unknown block compression {}", other))),
    }
}

/// Settings a table is written with.
#[derive(Clone)]
pub(crate) struct TableOptions {
    pub block_size: usize,
    pub restart_interval: usize,
    pub compression: c_int,
    pub filter: Option<Arc<BloomPolicy>>,
}

pub(crate) struct TableBuilder {
    writer: BufWriter<File>,
    offset: u64,
    options: TableOptions,
    data_block: BlockBuilder,
    index_block: BlockBuilder,
    last_key: Vec<u8>,
    filter_keys: Vec<Bytes>,
    entries: u64,
}

impl TableBuilder {
    pub fn create(path: &Path, options: TableOptions) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            writer: BufWriter::with_capacity(64 * 1024, file),
            offset: 0,
            data_block: BlockBuilder::new(options.restart_interval),
            index_block: BlockBuilder::new(1),
            options,
            last_key: Vec::new(),
            filter_keys: Vec::new(),
            entries: 0,
        })
    }

    /// Entries must arrive in internal key order.
    pub fn add(&mut self, key: &InternalKey, value: &[u8]) -> io::Result<()> {
        let encoded = key.encode();
        if self.options.filter.is_some()
            && self.filter_keys.last().map(|k| &k[..]) != Some(key.user_key())
        {
            self.filter_keys.push(key.user_key_bytes().clone());
        }

        self.data_block.add(&encoded, value);
        self.last_key.clear();
        self.last_key.extend_from_slice(&encoded);
        self.entries += 1;

        if self.data_block.estimated_size() >= self.options.block_size {
            self.flush_data_block()?;
        }
        Ok(())
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    fn flush_data_block(&mut self) -> io::Result<()> {
        if self.data_block.is_empty() {
            return Ok(());
        }
        let content = self.data_block.finish();
        let handle = self.write_block(&content, self.options.compression)?;

        let mut value = BytesMut::with_capacity(16);
        value.put_u64_le(handle.offset);
        value.put_u64_le(handle.size);
        self.index_block.add(&self.last_key, &value);
        Ok(())
    }

    fn write_block(&mut self, content: &[u8], compression: c_int) -> io::Result<BlockHandle> {
        let compressed = if compression == EMBERKV_SNAPPY_COMPRESSION {
            snap::raw::Encoder::new()
                .compress_vec(content)
                .ok()
                .filter(|c| c.len() < content.len() - content.len() / 8)
        } else {
            None
        };
        let (stored, ctype): (&[u8], u8) = match compressed.as_deref() {
            Some(c) => (c, SNAPPY_COMPRESSION),
            None => (content, NO_COMPRESSION),
        };

        let crc = crc32_multi(&[stored, &[ctype]]);
        self.writer.write_all(stored)?;
        self.writer.write_all(&crc.to_le_bytes())?;
        self.writer.write_all(&[ctype])?;

        let handle = BlockHandle {
            offset: self.offset,
            size: stored.len() as u64,
        };
        self.offset += (stored.len() + BLOCK_TRAILER_SIZE) as u64;
        Ok(handle)
    }

    /// Write the remaining blocks and footer, sync, and return the file size.
    pub fn finish(mut self) -> io::Result<u64> {
        self.flush_data_block()?;

        let filter = match &self.options.filter {
            Some(policy) => {
                let filter =
                    policy.create_filter(self.filter_keys.iter().map(|k| &k[..]), self.filter_keys.len());
                Some(self.write_block(&filter, 0)?)
            }
            None => None,
        };

        let index_content = self.index_block.finish();
        let index = self.write_block(&index_content, 0)?;

        let mut footer = BytesMut::with_capacity(FOOTER_SIZE);
        footer.put_u64_le(index.offset);
        footer.put_u64_le(index.size);
        footer.put_u64_le(filter.map_or(0, |h| h.offset));
        footer.put_u64_le(filter.map_or(0, |h| h.size));
        footer.put_u64_le(self.entries);
        footer.put_u64_le(TABLE_MAGIC);
        self.writer.write_all(&footer)?;
        self.offset += FOOTER_SIZE as u64;

        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(self.offset)
    }
}

struct IndexEntry {
    last_key: InternalKey,
    handle: BlockHandle,
}

/// How a read treats checksums and caches.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReadPolicy {
    pub verify_checksums: bool,
    pub fill_cache: bool,
}

/// Caches consulted by table reads.
#[derive(Clone, Copy, Default)]
pub(crate) struct BlockCaches<'a> {
    pub uncompressed: Option<&'a BlockCache>,
    pub compressed: Option<&'a BlockCache>,
}

/// An open, immutable table.
pub(crate) struct Table {
    file: Mutex<File>,
    number: u64,
    cache_id: u64,
    file_size: u64,
    index: Vec<IndexEntry>,
    filter: Option<Bytes>,
    entries: u64,
}

impl Table {
    pub fn open(path: &Path, number: u64) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();
        if file_size < FOOTER_SIZE as u64 {
            return Err(Error::corruption(format!(
                "table {} is too short ({} bytes)",
                number, file_size
            )));
        }

        let mut footer = [0u8; FOOTER_SIZE];
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        file.read_exact(&mut footer)?;
        if read_u64(&footer[40..]) != TABLE_MAGIC {
            return Err(Error::corruption(format!("table {} has a bad magic number", number)));
        }

        let index_handle = BlockHandle {
            offset: read_u64(&footer[0..]),
            size: read_u64(&footer[8..]),
        };
        let filter_handle = BlockHandle {
            offset: read_u64(&footer[16..]),
            size: read_u64(&footer[24..]),
        };
        let entries = read_u64(&footer[32..]);

        let index_block = Block::new(decode_block(&read_raw(&mut file, index_handle)?, true)?)?;
        let index = index_block
            .raw_entries()?
            .into_iter()
            .map(|(key, value)| {
                if value.len() != 16 {
                    return Err(Error::corruption("bad index entry"));
                }
                Ok(IndexEntry {
                    last_key: Block::decode_key(&key)?,
                    handle: BlockHandle {
                        offset: read_u64(&value[0..]),
                        size: read_u64(&value[8..]),
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let filter = if filter_handle.size > 0 {
            Some(decode_block(&read_raw(&mut file, filter_handle)?, true)?)
        } else {
            None
        };

        Ok(Self {
            file: Mutex::new(file),
            number,
            cache_id: new_cache_id(),
            file_size,
            index,
            filter,
            entries,
        })
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn num_entries(&self) -> u64 {
        self.entries
    }

    /// False only when the filter proves `user_key` is absent.
    pub fn may_contain(&self, user_key: &[u8]) -> bool {
        self.filter
            .as_ref()
            .map_or(true, |filter| key_may_match(filter, user_key))
    }

    pub fn get(
        &self,
        user_key: &[u8],
        sequence: u64,
        caches: BlockCaches<'_>,
        policy: ReadPolicy,
    ) -> Result<LookupResult> {
        if !self.may_contain(user_key) {
            return Ok(LookupResult::NotFound);
        }

        let probe = InternalKey::lookup(user_key, sequence);
        let idx = self.index.partition_point(|e| e.last_key < probe);
        let Some(entry) = self.index.get(idx) else {
            return Ok(LookupResult::NotFound);
        };

        let block = self.read_block(entry.handle, caches, policy)?;
        match block.seek(&probe)? {
            Some((key, value)) if key.user_key() == user_key => Ok(if key.is_deletion() {
                LookupResult::Deleted
            } else {
                LookupResult::Found(value)
            }),
            _ => Ok(LookupResult::NotFound),
        }
    }

    /// Every entry in order, one block at a time. Bypasses the caches.
    pub fn iter(&self, verify_checksums: bool) -> TableIter<'_> {
        TableIter {
            table: self,
            policy: ReadPolicy {
                verify_checksums,
                fill_cache: false,
            },
            next_block: 0,
            current: Vec::new().into_iter(),
        }
    }

    /// Entries from every block that still decodes, plus the number of
    /// blocks that did not.
    pub fn salvage(&self) -> (Vec<(InternalKey, Bytes)>, usize) {
        let policy = ReadPolicy {
            verify_checksums: true,
            fill_cache: false,
        };
        let mut entries = Vec::new();
        let mut bad_blocks = 0;
        for entry in &self.index {
            match self
                .read_block(entry.handle, BlockCaches::default(), policy)
                .and_then(|block| block.entries())
            {
                Ok(block_entries) => entries.extend(block_entries),
                Err(_) => bad_blocks += 1,
            }
        }
        (entries, bad_blocks)
    }

    /// Read and checksum every block.
    pub fn verify(&self) -> Result<()> {
        let policy = ReadPolicy {
            verify_checksums: true,
            fill_cache: false,
        };
        for entry in &self.index {
            self.read_block(entry.handle, BlockCaches::default(), policy)?
                .raw_entries()?;
        }
        Ok(())
    }

    fn read_block(
        &self,
        handle: BlockHandle,
        caches: BlockCaches<'_>,
        policy: ReadPolicy,
    ) -> Result<Block> {
        let key = (self.cache_id, handle.offset);
        if let Some(data) = caches.uncompressed.and_then(|c| c.get(&key)) {
            return Block::new(data);
        }

        let raw = match caches.compressed.and_then(|c| c.get(&key)) {
            Some(raw) => raw,
            None => {
                let raw = Bytes::from(read_raw(&mut self.file.lock(), handle)?);
                if policy.fill_cache && raw.last() == Some(&SNAPPY_COMPRESSION) {
                    if let Some(cache) = caches.compressed {
                        cache.insert(key, raw.clone());
                    }
                }
                raw
            }
        };

        let content = decode_block(&raw, policy.verify_checksums)?;
        if policy.fill_cache {
            if let Some(cache) = caches.uncompressed {
                cache.insert(key, content.clone());
            }
        }
        Block::new(content)
    }
}

/// Streaming scan over a table's entries.
pub(crate) struct TableIter<'a> {
    table: &'a Table,
    policy: ReadPolicy,
    next_block: usize,
    current: std::vec::IntoIter<(InternalKey, Bytes)>,
}

impl Iterator for TableIter<'_> {
    type Item = Result<(InternalKey, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.current.next() {
                return Some(Ok(entry));
            }
            let handle = self.table.index.get(self.next_block)?.handle;
            self.next_block += 1;
            let block = self
                .table
                .read_block(handle, BlockCaches::default(), self.policy)
                .and_then(|block| block.entries());
            match block {
                Ok(entries) => self.current = entries.into_iter(),
                Err(e) => {
                    self.next_block = self.table.index.len();
                    return Some(Err(e));
                }
            }
        }
    }
}

fn read_raw(file: &mut File, handle: BlockHandle) -> Result<Vec<u8>> {
    let len = usize::try_from(handle.size)
        .ok()
        .and_then(|n| n.checked_add(BLOCK_TRAILER_SIZE))
        .ok_or_else(|| Error::corruption("block handle out of range"))?;
    let mut buf = vec![0u8; len];
    file.seek(SeekFrom::Start(handle.offset))?;
    file.read_exact(&mut buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::corruption("truncated block read")
        } else {
            e.into()
        }
    })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueType;
    use std::fs;
    use tempfile::tempdir;

    fn options(compression: c_int, filter: bool) -> TableOptions {
        TableOptions {
            block_size: 256,
            restart_interval: 4,
            compression,
            filter: filter.then(|| Arc::new(BloomPolicy::new(10))),
        }
    }

    fn ikey(key: &str, seq: u64, value_type: ValueType) -> InternalKey {
        InternalKey::new(Bytes::copy_from_slice(key.as_bytes()), seq, value_type)
    }

    fn build(path: &Path, opts: TableOptions, n: usize) -> u64 {
        let mut builder = TableBuilder::create(path, opts).unwrap();
        for i in 0..n {
            let key = format!("key{:05}", i);
            builder
                .add(&ikey(&key, i as u64 + 1, ValueType::Value), format!("value{}", i).as_bytes())
                .unwrap();
        }
        builder.finish().unwrap()
    }

    fn no_cache() -> ReadPolicy {
        ReadPolicy {
            verify_checksums: true,
            fill_cache: false,
        }
    }

    #[test]
    fn test_build_and_get() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000001.tbl");
        let size = build(&path, options(0, false), 500);

        let table = Table::open(&path, 1).unwrap();
        assert_eq!(table.file_size(), size);
        assert_eq!(table.num_entries(), 500);
        assert!(table.index.len() > 1);

        for i in [0usize, 1, 250, 499] {
            let key = format!("key{:05}", i);
            let found = table
                .get(key.as_bytes(), u64::MAX >> 8, BlockCaches::default(), no_cache())
                .unwrap();
            assert_eq!(found, LookupResult::Found(Bytes::from(format!("value{}", i))));
        }
        let missing = table
            .get(b"key99999", u64::MAX >> 8, BlockCaches::default(), no_cache())
            .unwrap();
        assert_eq!(missing, LookupResult::NotFound);
    }

    #[test]
    fn test_sequence_visibility_and_tombstones() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000002.tbl");
        let mut builder = TableBuilder::create(&path, options(0, false)).unwrap();
        builder.add(&ikey("a", 9, ValueType::Deletion), b"").unwrap();
        builder.add(&ikey("a", 3, ValueType::Value), b"old").unwrap();
        builder.add(&ikey("b", 4, ValueType::Value), b"bee").unwrap();
        builder.finish().unwrap();

        let table = Table::open(&path, 2).unwrap();
        let get = |k: &[u8], seq| table.get(k, seq, BlockCaches::default(), no_cache()).unwrap();
        assert_eq!(get(b"a", 10), LookupResult::Deleted);
        assert_eq!(get(b"a", 5), LookupResult::Found(Bytes::from("old")));
        assert_eq!(get(b"a", 2), LookupResult::NotFound);
        assert_eq!(get(b"b", 3), LookupResult::NotFound);
    }

    #[test]
    fn test_snappy_blocks_and_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000003.tbl");
        build(&path, options(EMBERKV_SNAPPY_COMPRESSION, false), 300);

        let table = Table::open(&path, 3).unwrap();
        let all: Vec<_> = table.iter(true).collect::<Result<_>>().unwrap();
        assert_eq!(all.len(), 300);
        assert!(all.windows(2).all(|w| w[0].0 < w[1].0));
        table.verify().unwrap();
    }

    #[test]
    fn test_filter_skips_absent_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000004.tbl");
        build(&path, options(0, true), 200);

        let table = Table::open(&path, 4).unwrap();
        assert!(table.may_contain(b"key00007"));
        let rejected = (0..1000)
            .filter(|i| !table.may_contain(format!("absent{}", i).as_bytes()))
            .count();
        assert!(rejected > 900);
    }

    #[test]
    fn test_cache_fill_policy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000005.tbl");
        build(&path, options(EMBERKV_SNAPPY_COMPRESSION, false), 100);

        let table = Table::open(&path, 5).unwrap();
        let cache = BlockCache::new(1 << 20);
        let caches = BlockCaches {
            uncompressed: Some(&cache),
            compressed: None,
        };

        table.get(b"key00001", 1 << 40, caches, no_cache()).unwrap();
        assert_eq!(cache.usage(), 0);

        let fill = ReadPolicy {
            verify_checksums: false,
            fill_cache: true,
        };
        table.get(b"key00001", 1 << 40, caches, fill).unwrap();
        assert!(cache.usage() > 0);
    }

    #[test]
    fn test_corrupt_block_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000006.tbl");
        build(&path, options(0, false), 50);

        let mut bytes = fs::read(&path).unwrap();
        bytes[10] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        let table = Table::open(&path, 6).unwrap();
        assert!(table.verify().unwrap_err().is_corruption());
        assert!(table.iter(true).any(|e| e.is_err()));

        let (survivors, bad_blocks) = table.salvage();
        assert_eq!(bad_blocks, 1);
        assert!(!survivors.is_empty() && survivors.len() < 50);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000007.tbl");
        fs::write(&path, vec![0u8; 100]).unwrap();
        assert!(Table::open(&path, 7).err().unwrap().is_corruption());
    }
}
