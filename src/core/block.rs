// Block data structure

use crate::core::Checksum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Hash assigned to the genesis block
pub const GENESIS_HASH: u32 = 0xAAAA_AAAA;

/// `mined_by` value for blocks no miner produced
pub const NO_MINER: i32 = -1;

/// Miner identifier
pub type MinerId = i32;

/// A proposed or committed chain entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain, 0 = genesis
    pub height: i64,
    /// Seconds since the Unix epoch when `hash` was computed
    pub timestamp: i64,
    /// Checksum of the identifying fields
    pub hash: u32,
    /// Hash of the block at `height - 1`
    pub prev_hash: u32,
    /// Required number of leading zero bits in `hash`
    pub difficulty: u32,
    /// Search counter
    pub nonce: u64,
    /// Miner that produced this block
    pub mined_by: MinerId,
}

impl Block {
    /// Create the genesis block
    pub fn genesis(difficulty: u32, timestamp: i64) -> Self {
        Self {
            height: 0,
            timestamp,
            hash: GENESIS_HASH,
            prev_hash: 0,
            difficulty,
            nonce: 0,
            mined_by: NO_MINER,
        }
    }

    /// Create a round template extending a block with the given hash.
    /// Hash, nonce and miner are left unset.
    pub fn template(height: i64, prev_hash: u32, difficulty: u32) -> Self {
        Self {
            height,
            timestamp: 0,
            hash: 0,
            prev_hash,
            difficulty,
            nonce: 0,
            mined_by: NO_MINER,
        }
    }

    /// Bytes covered by the checksum: height, timestamp, prev_hash, nonce
    /// and mined_by, little-endian. Difficulty and hash are excluded.
    pub fn checksum_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + 8 + 4 + 8 + 4);
        buf.extend_from_slice(&self.height.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&self.prev_hash.to_le_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        buf.extend_from_slice(&self.mined_by.to_le_bytes());
        buf
    }

    /// Compute the checksum of this block's identifying fields
    pub fn compute_hash(&self, checksum: &dyn Checksum) -> u32 {
        checksum.checksum(&self.checksum_bytes())
    }

    /// Recompute and store `hash`
    pub fn rehash(&mut self, checksum: &dyn Checksum) {
        self.hash = self.compute_hash(checksum);
    }

    /// Check if this is the genesis block
    pub fn is_genesis(&self) -> bool {
        self.height == 0 && self.mined_by == NO_MINER
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "height({}), timestamp ({}), hash(0x{:x}), prev_hash(0x{:x}), difficulty({}), nonce({})",
            self.height, self.timestamp, self.hash, self.prev_hash, self.difficulty, self.nonce
        )
    }
}

/// Current time in seconds since the Unix epoch
pub fn unix_time() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Crc32;

    #[test]
    fn test_genesis_block() {
        let genesis = Block::genesis(4, 1_700_000_000);
        assert!(genesis.is_genesis());
        assert_eq!(genesis.height, 0);
        assert_eq!(genesis.hash, GENESIS_HASH);
        assert_eq!(genesis.prev_hash, 0);
        assert_eq!(genesis.mined_by, NO_MINER);
    }

    #[test]
    fn test_checksum_ignores_difficulty_and_hash() {
        let mut a = Block::template(3, 0x1234, 0);
        a.mined_by = 2;
        let mut b = a;
        b.difficulty = 17;
        b.hash = 0xDEAD_BEEF;

        assert_eq!(a.checksum_bytes(), b.checksum_bytes());
        assert_eq!(a.compute_hash(&Crc32), b.compute_hash(&Crc32));
    }

    #[test]
    fn test_checksum_covers_nonce() {
        let a = Block::template(1, GENESIS_HASH, 0);
        let mut b = a;
        b.nonce += 1;
        assert_ne!(a.compute_hash(&Crc32), b.compute_hash(&Crc32));
    }

    #[test]
    fn test_rehash() {
        let mut block = Block::template(1, GENESIS_HASH, 0);
        block.rehash(&Crc32);
        assert_eq!(block.hash, block.compute_hash(&Crc32));
    }

    #[test]
    fn test_display_dump() {
        let block = Block::genesis(2, 10);
        assert_eq!(
            block.to_string(),
            "height(0), timestamp (10), hash(0xaaaaaaaa), prev_hash(0x0), difficulty(2), nonce(0)"
        );
    }

    #[test]
    fn test_json_fields() {
        let json = serde_json::to_value(Block::genesis(1, 5)).unwrap();
        assert_eq!(json["height"], 0);
        assert_eq!(json["mined_by"], -1);
        assert_eq!(json["hash"], GENESIS_HASH);
    }
}
