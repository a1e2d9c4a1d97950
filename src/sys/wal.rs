//! Write-ahead log.
//!
//! The log is a sequence of 32KB blocks. Each physical record has a 7 byte
//! header followed by its payload:
//!
//! ```text
//! [crc32 of type+payload (4, LE)] [length (2, LE)] [type (1)] [payload]
//! ```
//!
//! Records that do not fit in the rest of a block are split into FIRST,
//! MIDDLE and LAST fragments. A block tail shorter than a header is zero
//! filled.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use bytes::Bytes;

use crate::util::crc::crc32_multi;
use crate::{Error, Result};

pub(crate) const BLOCK_SIZE: usize = 32 * 1024;
pub(crate) const HEADER_SIZE: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum RecordType {
    Zero = 0,
    Full = 1,
    First = 2,
    Middle = 3,
    Last = 4,
}

impl RecordType {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(RecordType::Zero),
            1 => Some(RecordType::Full),
            2 => Some(RecordType::First),
            3 => Some(RecordType::Middle),
            4 => Some(RecordType::Last),
            _ => None,
        }
    }
}

/// When the log is forced to stable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct SyncPolicy {
    /// Never sync, even when a write asks for it.
    pub disable_data_sync: bool,
    /// Use `sync_all` instead of `sync_data`.
    pub use_fsync: bool,
    /// Sync in the background of writes every this many bytes (0 = off).
    pub bytes_per_sync: u64,
}

pub(crate) struct LogWriter {
    writer: BufWriter<File>,
    block_offset: usize,
    policy: SyncPolicy,
    bytes_since_sync: u64,
    number: u64,
}

impl LogWriter {
    pub fn create(path: &Path, number: u64, policy: SyncPolicy) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            writer: BufWriter::with_capacity(BLOCK_SIZE, file),
            block_offset: 0,
            policy,
            bytes_since_sync: 0,
            number,
        })
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    /// Append one record. The bytes reach the OS before this returns; with
    /// `sync` they also reach stable storage unless syncing is disabled.
    pub fn add_record(&mut self, data: &[u8], sync: bool) -> io::Result<()> {
        let mut rest = data;
        let mut begin = true;

        // An empty record still emits one FULL fragment.
        loop {
            let leftover = BLOCK_SIZE - self.block_offset;
            if leftover < HEADER_SIZE {
                if leftover > 0 {
                    self.writer.write_all(&[0u8; HEADER_SIZE][..leftover])?;
                    self.bytes_since_sync += leftover as u64;
                }
                self.block_offset = 0;
            }

            let avail = BLOCK_SIZE - self.block_offset - HEADER_SIZE;
            let fragment_len = rest.len().min(avail);
            let end = fragment_len == rest.len();

            let record_type = match (begin, end) {
                (true, true) => RecordType::Full,
                (true, false) => RecordType::First,
                (false, true) => RecordType::Last,
                (false, false) => RecordType::Middle,
            };
            self.emit_physical_record(record_type, &rest[..fragment_len])?;

            rest = &rest[fragment_len..];
            begin = false;
            if end {
                break;
            }
        }

        self.writer.flush()?;
        if sync {
            self.sync()?;
        } else if self.policy.bytes_per_sync > 0 && self.bytes_since_sync >= self.policy.bytes_per_sync
        {
            self.sync()?;
        }
        Ok(())
    }

    fn emit_physical_record(&mut self, record_type: RecordType, data: &[u8]) -> io::Result<()> {
        debug_assert!(self.block_offset + HEADER_SIZE + data.len() <= BLOCK_SIZE);

        let type_byte = record_type as u8;
        let crc = crc32_multi(&[&[type_byte], data]);

        let mut header = [0u8; HEADER_SIZE];
        header[0..4].copy_from_slice(&crc.to_le_bytes());
        header[4..6].copy_from_slice(&(data.len() as u16).to_le_bytes());
        header[6] = type_byte;

        self.writer.write_all(&header)?;
        self.writer.write_all(data)?;

        self.block_offset += HEADER_SIZE + data.len();
        self.bytes_since_sync += (HEADER_SIZE + data.len()) as u64;
        Ok(())
    }

    pub fn sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        if !self.policy.disable_data_sync {
            let file = self.writer.get_ref();
            if self.policy.use_fsync {
                file.sync_all()?;
            } else {
                file.sync_data()?;
            }
        }
        self.bytes_since_sync = 0;
        Ok(())
    }
}

/// Outcome of reading a whole log.
#[derive(Debug, Default)]
pub(crate) struct LogContents {
    pub records: Vec<Bytes>,
    /// Fragments dropped because they were corrupt.
    pub dropped: usize,
}

pub(crate) struct LogReader<R> {
    reader: R,
    buffer: Vec<u8>,
    buffer_offset: usize,
    buffer_size: usize,
    eof: bool,
    checksum_errors_fatal: bool,
    dropped: usize,
}

impl LogReader<File> {
    pub fn open(path: &Path, checksum_errors_fatal: bool) -> io::Result<Self> {
        Ok(Self::new(File::open(path)?, checksum_errors_fatal))
    }
}

impl<R: Read> LogReader<R> {
    pub fn new(reader: R, checksum_errors_fatal: bool) -> Self {
        Self {
            reader,
            buffer: vec![0u8; BLOCK_SIZE],
            buffer_offset: 0,
            buffer_size: 0,
            eof: false,
            checksum_errors_fatal,
            dropped: 0,
        }
    }

    /// Read every remaining record.
    pub fn read_all(mut self) -> Result<LogContents> {
        let mut records = Vec::new();
        while let Some(record) = self.read_record()? {
            records.push(record);
        }
        Ok(LogContents {
            records,
            dropped: self.dropped,
        })
    }

    pub fn read_record(&mut self) -> Result<Option<Bytes>> {
        let mut scratch = Vec::new();
        let mut in_fragmented_record = false;

        loop {
            let Some((record_type, data)) = self.read_physical_record()? else {
                // A record cut short by the end of the log was never acknowledged.
                return Ok(None);
            };

            match record_type {
                RecordType::Full => {
                    if in_fragmented_record {
                        self.report("partial record without end")?;
                    }
                    return Ok(Some(Bytes::from(data)));
                }
                RecordType::First => {
                    if in_fragmented_record {
                        self.report("partial record without end")?;
                    }
                    scratch = data;
                    in_fragmented_record = true;
                }
                RecordType::Middle => {
                    if !in_fragmented_record {
                        self.report("missing start of fragmented record")?;
                        continue;
                    }
                    scratch.extend_from_slice(&data);
                }
                RecordType::Last => {
                    if !in_fragmented_record {
                        self.report("missing start of fragmented record")?;
                        continue;
                    }
                    scratch.extend_from_slice(&data);
                    return Ok(Some(Bytes::from(scratch)));
                }
                RecordType::Zero => continue,
            }
        }
    }

    fn report(&mut self, reason: &str) -> Result<()> {
        if self.checksum_errors_fatal {
            return Err(Error::corruption(format!("log record: {}", reason)));
        }
        self.dropped += 1;
        tracing::warn!(reason, "dropping corrupt log fragment");
        Ok(())
    }

    fn read_physical_record(&mut self) -> Result<Option<(RecordType, Vec<u8>)>> {
        loop {
            if self.buffer_offset + HEADER_SIZE > self.buffer_size {
                if !self.read_block()? {
                    return Ok(None);
                }
                continue;
            }

            let header = &self.buffer[self.buffer_offset..self.buffer_offset + HEADER_SIZE];
            let crc_expected = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let length = u16::from_le_bytes([header[4], header[5]]) as usize;
            let type_byte = header[6];

            if type_byte == RecordType::Zero as u8 && length == 0 {
                // Zero padding: the rest of the block is unused.
                self.buffer_offset = self.buffer_size;
                continue;
            }

            if self.buffer_offset + HEADER_SIZE + length > self.buffer_size {
                if self.eof {
                    return Ok(None);
                }
                self.buffer_offset = self.buffer_size;
                self.report("record extends beyond block")?;
                continue;
            }

            let data_start = self.buffer_offset + HEADER_SIZE;
            let data = &self.buffer[data_start..data_start + length];
            let crc_actual = crc32_multi(&[&[type_byte], data]);

            let record_type = match RecordType::from_byte(type_byte) {
                Some(rt) if crc_actual == crc_expected => rt,
                Some(_) => {
                    self.buffer_offset = self.buffer_size;
                    self.report("checksum mismatch")?;
                    continue;
                }
                None => {
                    self.buffer_offset = self.buffer_size;
                    self.report("unknown record type")?;
                    continue;
                }
            };

            let data = data.to_vec();
            self.buffer_offset = data_start + length;
            return Ok(Some((record_type, data)));
        }
    }

    /// Fill the buffer with the next block. Only the last block is short.
    fn read_block(&mut self) -> Result<bool> {
        if self.eof {
            return Ok(false);
        }

        let mut filled = 0;
        while filled < BLOCK_SIZE {
            match self.reader.read(&mut self.buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        self.buffer_offset = 0;
        self.buffer_size = filled;
        if filled < BLOCK_SIZE {
            self.eof = true;
        }
        Ok(filled > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_log(path: &Path, records: &[Vec<u8>]) {
        let mut writer = LogWriter::create(path, 1, SyncPolicy::default()).unwrap();
        for record in records {
            writer.add_record(record, false).unwrap();
        }
        writer.sync().unwrap();
    }

    fn read_log(path: &Path, fatal: bool) -> Result<LogContents> {
        LogReader::open(path, fatal).unwrap().read_all()
    }

    #[test]
    fn test_small_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000001.log");
        let records: Vec<Vec<u8>> = (0..100).map(|i| format!("record {}", i).into_bytes()).collect();
        write_log(&path, &records);

        let contents = read_log(&path, true).unwrap();
        assert_eq!(contents.dropped, 0);
        assert_eq!(contents.records.len(), 100);
        assert_eq!(&contents.records[42][..], b"record 42");
    }

    #[test]
    fn test_fragmented_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000001.log");
        let big = vec![b'x'; BLOCK_SIZE * 2 + 100];
        write_log(&path, &[b"before".to_vec(), big.clone(), b"after".to_vec()]);

        let contents = read_log(&path, true).unwrap();
        assert_eq!(contents.records.len(), 3);
        assert_eq!(contents.records[1].len(), big.len());
        assert_eq!(&contents.records[2][..], b"after");
    }

    #[test]
    fn test_empty_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000001.log");
        write_log(&path, &[Vec::new(), b"x".to_vec()]);

        let contents = read_log(&path, true).unwrap();
        assert_eq!(contents.records.len(), 2);
        assert!(contents.records[0].is_empty());
    }

    #[test]
    fn test_block_tail_padding() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000001.log");
        // Leaves fewer than HEADER_SIZE bytes at the end of the first block.
        let first = vec![b'a'; BLOCK_SIZE - HEADER_SIZE - 3];
        write_log(&path, &[first, b"second".to_vec()]);

        let contents = read_log(&path, true).unwrap();
        assert_eq!(contents.records.len(), 2);
        assert_eq!(&contents.records[1][..], b"second");
    }

    #[test]
    fn test_corruption_fatal_or_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000001.log");
        write_log(&path, &[b"good".to_vec(), b"damaged".to_vec()]);

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        let err = read_log(&path, true).unwrap_err();
        assert!(err.is_corruption());

        let contents = read_log(&path, false).unwrap();
        assert_eq!(contents.records.len(), 1);
        assert_eq!(contents.dropped, 1);
    }

    #[test]
    fn test_truncated_tail_is_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000001.log");
        write_log(&path, &[b"complete".to_vec(), b"cut short".to_vec()]);

        let len = fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 3).unwrap();

        let contents = read_log(&path, true).unwrap();
        assert_eq!(contents.records.len(), 1);
    }

    #[test]
    fn test_sync_policies() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000001.log");
        let policy = SyncPolicy {
            disable_data_sync: false,
            use_fsync: true,
            bytes_per_sync: 64,
        };
        let mut writer = LogWriter::create(&path, 9, policy).unwrap();
        assert_eq!(writer.number(), 9);
        for _ in 0..10 {
            writer.add_record(&[7u8; 40], false).unwrap();
            assert!(writer.bytes_since_sync < 64 + 40 + HEADER_SIZE as u64);
        }
        writer.add_record(b"durable", true).unwrap();
        assert_eq!(writer.bytes_since_sync, 0);
    }
}
