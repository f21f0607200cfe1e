// Proof of Work: difficulty target and nonce search

use crate::core::{Block, Checksum, leading_zero_bits, unix_time};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Upper bound for a 32-bit checksum; only a zero hash meets it
pub const MAX_DIFFICULTY: u32 = 32;

/// How many attempts pass between checks of the abandon condition
pub const ABANDON_CHECK_INTERVAL: u64 = 1024;

const PROGRESS_INTERVAL: u64 = 100_000;

/// Required number of leading zero bits in a block hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Difficulty {
    bits: u32,
}

impl Difficulty {
    /// Create a difficulty, `None` above `MAX_DIFFICULTY`
    pub fn new(bits: u32) -> Option<Self> {
        (bits <= MAX_DIFFICULTY).then_some(Self { bits })
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Check if a hash has at least `bits` leading zero bits
    #[inline]
    pub fn is_met_by(&self, hash: u32) -> bool {
        leading_zero_bits(hash) >= self.bits
    }
}

/// Nonce searcher for a fixed difficulty
pub struct Miner {
    pub difficulty: Difficulty,
    checksum: Arc<dyn Checksum>,
}

impl Miner {
    pub fn new(difficulty: Difficulty, checksum: Arc<dyn Checksum>) -> Self {
        Self { difficulty, checksum }
    }

    /// Search for a nonce whose hash meets the difficulty.
    ///
    /// Each attempt increments `block.nonce`, refreshes the timestamp and
    /// recomputes the hash, so on success `block` holds the qualifying
    /// candidate. `keep_going` is polled every `ABANDON_CHECK_INTERVAL`
    /// attempts; it must not block. Returning `false` abandons the search.
    pub fn mine(&self, block: &mut Block, mut keep_going: impl FnMut() -> bool) -> MiningResult {
        let start_time = Instant::now();
        let mut attempts = 0u64;

        loop {
            if attempts % ABANDON_CHECK_INTERVAL == 0 && !keep_going() {
                return MiningResult {
                    success: false,
                    attempts,
                    duration: start_time.elapsed(),
                };
            }

            block.nonce = block.nonce.wrapping_add(1);
            block.timestamp = unix_time();
            block.rehash(self.checksum.as_ref());
            attempts += 1;

            if self.difficulty.is_met_by(block.hash) {
                return MiningResult {
                    success: true,
                    attempts,
                    duration: start_time.elapsed(),
                };
            }

            if attempts % PROGRESS_INTERVAL == 0 {
                let elapsed = start_time.elapsed();
                log::debug!(
                    "Miner #{}: {} attempts on block #{} ({:.1} KH/s)",
                    block.mined_by,
                    attempts,
                    block.height,
                    attempts as f64 / elapsed.as_secs_f64() / 1000.0
                );
            }
        }
    }
}

/// Mining result
#[derive(Debug)]
pub struct MiningResult {
    /// Whether a qualifying nonce was found
    pub success: bool,
    /// Number of attempts
    pub attempts: u64,
    /// Time taken
    pub duration: Duration,
}

impl MiningResult {
    /// Calculate hash rate (hashes per second)
    pub fn hash_rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 { 0.0 } else { self.attempts as f64 / secs }
    }
}
