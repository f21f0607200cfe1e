// Checksum primitives used to derive block hashes

use sha2::{Digest, Sha256};

/// A 32-bit checksum over a block's identifying bytes.
///
/// The coordinator and every miner share one implementation; the coordinator
/// recomputes it independently when validating a submission.
pub trait Checksum: Send + Sync {
    fn checksum(&self, bytes: &[u8]) -> u32;
}

/// CRC-32 (IEEE), the same polynomial zlib uses
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32;

impl Checksum for Crc32 {
    #[inline]
    fn checksum(&self, bytes: &[u8]) -> u32 {
        crc32fast::hash(bytes)
    }
}

/// First four bytes of SHA-256, read big-endian
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Prefix;

impl Checksum for Sha256Prefix {
    fn checksum(&self, bytes: &[u8]) -> u32 {
        let digest = Sha256::digest(bytes);
        u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
    }
}

/// Number of leading zero bits in a checksum
#[inline]
pub fn leading_zero_bits(hash: u32) -> u32 {
    hash.leading_zeros()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_known_vector() {
        // Standard check value for CRC-32/ISO-HDLC
        assert_eq!(Crc32.checksum(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_sha256_prefix() {
        // SHA-256("abc") = ba7816bf...
        assert_eq!(Sha256Prefix.checksum(b"abc"), 0xBA78_16BF);
    }

    #[test]
    fn test_leading_zero_bits() {
        assert_eq!(leading_zero_bits(0), 32);
        assert_eq!(leading_zero_bits(1), 31);
        assert_eq!(leading_zero_bits(0x8000_0000), 0);
        assert_eq!(leading_zero_bits(0x00FF_FFFF), 8);
    }
}
