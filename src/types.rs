//! Core key and record types used by the bundled engine.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::cmp::Ordering;

/// Value type indicator in internal keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum ValueType {
    /// Normal value.
    Value = 1,
    /// Deletion marker (tombstone).
    Deletion = 2,
}

impl ValueType {
    /// Create from byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(ValueType::Value),
            2 => Some(ValueType::Deletion),
            _ => None,
        }
    }

    /// Convert to byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Internal key format used for storage.
///
/// An internal key combines the user key with the sequence number that
/// wrote it and whether the write was a value or a tombstone. Ordering is
/// by user key ascending, then sequence descending, so the newest version
/// of a key is met first.
///
/// Encoded format:
/// ```text
/// [user_key][packed (8 bytes, big endian): sequence << 8 | value_type]
/// ```
#[derive(Debug, Clone)]
pub(crate) struct InternalKey {
    user_key: Bytes,
    sequence: u64,
    value_type: ValueType,
}

impl InternalKey {
    /// Maximum sequence number (56 bits).
    pub const MAX_SEQUENCE: u64 = (1 << 56) - 1;

    /// Create a new internal key.
    pub fn new(user_key: impl Into<Bytes>, sequence: u64, value_type: ValueType) -> Self {
        debug_assert!(sequence <= Self::MAX_SEQUENCE);
        Self {
            user_key: user_key.into(),
            sequence,
            value_type,
        }
    }

    /// Key used to seek to the newest version of `user_key` visible at `sequence`.
    pub fn lookup(user_key: &[u8], sequence: u64) -> Self {
        Self::new(Bytes::copy_from_slice(user_key), sequence, ValueType::Value)
    }

    pub fn user_key(&self) -> &[u8] {
        &self.user_key
    }

    pub fn user_key_bytes(&self) -> &Bytes {
        &self.user_key
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn is_deletion(&self) -> bool {
        self.value_type == ValueType::Deletion
    }

    /// Encode into an existing buffer.
    pub fn encode_to(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.user_key);
        buf.put_u64((self.sequence << 8) | self.value_type.to_byte() as u64);
    }

    /// Encode the internal key to bytes.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_to(&mut buf);
        buf.freeze()
    }

    /// Decode an internal key from bytes.
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < 8 {
            return None;
        }

        let user_key_len = data.len() - 8;
        let mut packed_bytes = &data[user_key_len..];
        let packed = packed_bytes.get_u64();

        Some(Self {
            user_key: Bytes::copy_from_slice(&data[..user_key_len]),
            sequence: packed >> 8,
            value_type: ValueType::from_byte((packed & 0xFF) as u8)?,
        })
    }

    pub fn encoded_len(&self) -> usize {
        self.user_key.len() + 8
    }
}

impl PartialEq for InternalKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for InternalKey {}

impl Ord for InternalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.user_key.cmp(&other.user_key) {
            // Newer sequence first within one user key.
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            ord => ord,
        }
    }
}

impl PartialOrd for InternalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One logged mutation: a put (with value) or a delete (without).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LogRecord {
    pub sequence: u64,
    pub key: Bytes,
    pub value: Option<Bytes>,
}

impl LogRecord {
    /// Encode the record for the write-ahead log.
    ///
    /// Format:
    /// ```text
    /// [sequence (8)] [type (1)] [key_len (varint)] [key] [value_len (varint)] [value]
    /// ```
    /// Deletions carry no value section.
    pub fn encode(&self) -> Bytes {
        let value_len = self.value.as_ref().map_or(0, |v| v.len());
        let mut buf = BytesMut::with_capacity(self.key.len() + value_len + 24);

        buf.put_u64(self.sequence);
        match self.value {
            Some(ref value) => {
                buf.put_u8(ValueType::Value.to_byte());
                encode_varint(&mut buf, self.key.len() as u64);
                buf.put_slice(&self.key);
                encode_varint(&mut buf, value.len() as u64);
                buf.put_slice(value);
            }
            None => {
                buf.put_u8(ValueType::Deletion.to_byte());
                encode_varint(&mut buf, self.key.len() as u64);
                buf.put_slice(&self.key);
            }
        }

        buf.freeze()
    }

    /// Decode a record from WAL data.
    pub fn decode(mut data: &[u8]) -> crate::Result<Self> {
        if data.len() < 9 {
            return Err(crate::Error::corruption("log record too short"));
        }

        let sequence = data.get_u64();
        let value_type = ValueType::from_byte(data.get_u8())
            .ok_or_else(|| crate::Error::corruption("invalid value type"))?;

        let key = take_length_prefixed(&mut data)
            .ok_or_else(|| crate::Error::corruption("key truncated"))?;

        let value = match value_type {
            ValueType::Value => Some(
                take_length_prefixed(&mut data)
                    .ok_or_else(|| crate::Error::corruption("value truncated"))?,
            ),
            ValueType::Deletion => None,
        };

        Ok(Self {
            sequence,
            key,
            value,
        })
    }

    /// The internal key this record is stored under.
    pub fn internal_key(&self) -> InternalKey {
        let value_type = if self.value.is_some() {
            ValueType::Value
        } else {
            ValueType::Deletion
        };
        InternalKey::new(self.key.clone(), self.sequence, value_type)
    }
}

/// Result of a point lookup against one storage layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LookupResult {
    /// Value found.
    Found(Bytes),
    /// Key was deleted (tombstone found).
    Deleted,
    /// This layer holds no version of the key.
    NotFound,
}

pub(crate) fn encode_varint(buf: &mut BytesMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

pub(crate) fn decode_varint(buf: &mut &[u8]) -> Option<u64> {
    let mut result = 0u64;
    let mut shift = 0;

    loop {
        if buf.is_empty() {
            return None;
        }

        let byte = buf.get_u8();
        result |= ((byte & 0x7F) as u64) << shift;

        if byte & 0x80 == 0 {
            return Some(result);
        }

        shift += 7;
        if shift >= 64 {
            return None;
        }
    }
}

/// Read a varint length followed by that many bytes.
pub(crate) fn take_length_prefixed(buf: &mut &[u8]) -> Option<Bytes> {
    let len = decode_varint(buf)? as usize;
    if buf.len() < len {
        return None;
    }
    let out = Bytes::copy_from_slice(&buf[..len]);
    buf.advance(len);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_key_encode_decode() {
        let key = InternalKey::new(Bytes::from("hello"), 12345, ValueType::Deletion);
        let decoded = InternalKey::decode(&key.encode()).unwrap();

        assert_eq!(decoded.user_key(), b"hello");
        assert_eq!(decoded.sequence(), 12345);
        assert!(decoded.is_deletion());
    }

    #[test]
    fn test_internal_key_ordering() {
        let key1 = InternalKey::new(Bytes::from("aaa"), 100, ValueType::Value);
        let key2 = InternalKey::new(Bytes::from("aaa"), 200, ValueType::Value);
        let key3 = InternalKey::new(Bytes::from("bbb"), 100, ValueType::Value);

        assert!(key2 < key1);
        assert!(key1 < key3);
        assert!(key2 < key3);
    }

    #[test]
    fn test_lookup_key_sorts_before_visible_versions() {
        let visible = InternalKey::new(Bytes::from("k"), 5, ValueType::Value);
        let newer = InternalKey::new(Bytes::from("k"), 9, ValueType::Value);
        let probe = InternalKey::lookup(b"k", 7);

        assert!(newer < probe);
        assert!(probe < visible);
    }

    #[test]
    fn test_log_record_delete_has_no_value() {
        let record = LogRecord {
            sequence: 7,
            key: Bytes::from("gone"),
            value: None,
        };
        let decoded = LogRecord::decode(&record.encode()).unwrap();
        assert_eq!(decoded, record);
        assert!(decoded.internal_key().is_deletion());
    }

    #[test]
    fn test_log_record_truncated() {
        let record = LogRecord {
            sequence: 1,
            key: Bytes::from("key"),
            value: Some(Bytes::from("value")),
        };
        let encoded = record.encode();
        assert!(LogRecord::decode(&encoded[..encoded.len() - 2]).is_err());
    }

    #[test]
    fn test_empty_key_and_value() {
        let record = LogRecord {
            sequence: 3,
            key: Bytes::new(),
            value: Some(Bytes::new()),
        };
        assert_eq!(LogRecord::decode(&record.encode()).unwrap(), record);
    }

    #[test]
    fn test_varint() {
        for &val in &[0u64, 1, 127, 128, 16383, 16384, u64::MAX >> 1] {
            let mut buf = BytesMut::new();
            encode_varint(&mut buf, val);
            let mut slice: &[u8] = &buf;
            assert_eq!(decode_varint(&mut slice), Some(val));
        }
    }
}
