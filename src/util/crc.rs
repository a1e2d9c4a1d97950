//! CRC32 checksums for log fragments and table blocks.

use crc32fast::Hasher;

/// Checksum of a single slice.
pub fn crc32(data: &[u8]) -> u32 {
    crc32_multi(&[data])
}

/// Checksum over several slices as if they were concatenated.
///
/// Log fragments cover `type || payload` and table blocks cover
/// `content || compression`, so neither has to be copied into one buffer.
pub fn crc32_multi(slices: &[&[u8]]) -> u32 {
    let mut hasher = Hasher::new();
    for slice in slices {
        hasher.update(slice);
    }
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_empty() {
        assert_eq!(crc32(&[]), 0);
    }

    #[test]
    fn test_crc32_multi_matches_concatenation() {
        assert_eq!(crc32(b"\x01payload"), crc32_multi(&[&[1u8], b"payload"]));
    }

    #[test]
    fn test_crc32_detects_single_bit_flip() {
        let mut data = b"block contents".to_vec();
        let before = crc32(&data);
        data[3] ^= 0x01;
        assert_ne!(before, crc32(&data));
    }
}
