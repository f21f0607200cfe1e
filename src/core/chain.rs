// Append-only in-memory chain

use crate::core::{Block, Checksum, leading_zero_bits};
use thiserror::Error;

/// Chain integrity violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("block at height {got} does not extend chain of length {expected}")]
    WrongHeight { expected: i64, got: i64 },
    #[error("block at height {height} links to 0x{prev_hash:x}, head is 0x{head_hash:x}")]
    BrokenLink { height: i64, prev_hash: u32, head_hash: u32 },
    #[error("block at height {height} has {zeros} leading zero bits, needs {difficulty}")]
    InsufficientWork { height: i64, zeros: u32, difficulty: u32 },
    #[error("block at height {height} carries hash 0x{stored:x}, checksum is 0x{computed:x}")]
    HashMismatch { height: i64, stored: u32, computed: u32 },
}

/// Ordered sequence of committed blocks, genesis first
#[derive(Debug, Clone)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    /// Create a chain holding only the genesis block
    pub fn new(genesis: Block) -> Self {
        Self { blocks: vec![genesis] }
    }

    /// Most recently committed block
    pub fn head(&self) -> &Block {
        // Never empty: constructed with genesis and only ever appended to
        &self.blocks[self.blocks.len() - 1]
    }

    /// Number of committed blocks, genesis included
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Height the next block must carry
    pub fn next_height(&self) -> i64 {
        self.blocks.len() as i64
    }

    /// Block at the given height
    pub fn get(&self, height: i64) -> Option<&Block> {
        usize::try_from(height).ok().and_then(|h| self.blocks.get(h))
    }

    /// Append a block that extends the current head
    pub fn push(&mut self, block: Block) -> Result<(), ChainError> {
        let expected = self.next_height();
        if block.height != expected {
            return Err(ChainError::WrongHeight { expected, got: block.height });
        }

        let head_hash = self.head().hash;
        if block.prev_hash != head_hash {
            return Err(ChainError::BrokenLink {
                height: block.height,
                prev_hash: block.prev_hash,
                head_hash,
            });
        }

        self.blocks.push(block);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    /// Re-check linkage, proof of work and stored hashes of every
    /// non-genesis block
    pub fn verify(&self, checksum: &dyn Checksum) -> Result<(), ChainError> {
        for pair in self.blocks.windows(2) {
            let (parent, block) = (&pair[0], &pair[1]);

            if block.prev_hash != parent.hash {
                return Err(ChainError::BrokenLink {
                    height: block.height,
                    prev_hash: block.prev_hash,
                    head_hash: parent.hash,
                });
            }

            let computed = block.compute_hash(checksum);
            let zeros = leading_zero_bits(computed);
            if zeros < block.difficulty {
                return Err(ChainError::InsufficientWork {
                    height: block.height,
                    zeros,
                    difficulty: block.difficulty,
                });
            }

            if computed != block.hash {
                return Err(ChainError::HashMismatch {
                    height: block.height,
                    stored: block.hash,
                    computed,
                });
            }
        }

        Ok(())
    }
}
