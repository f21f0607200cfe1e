// Faulty miner that feeds the coordinator's rejection paths

use crate::consensus::Difficulty;
use crate::core::{Block, Checksum, MinerId, unix_time};
use crate::error::SyncError;
use crate::round::{RoundMonitor, SubmitOutcome};
use std::sync::Arc;
use std::time::Duration;

/// Height the dummy miner claims; never matches a real round
pub const DUMMY_HEIGHT: i64 = -1;

pub const DUMMY_PREV_HASH: u32 = 0xFFFF_FFFF;

/// Submits a block for a nonexistent round once per interval. Every other
/// submission carries a hash computed before its timestamp was refreshed.
pub struct DummyMiner {
    id: MinerId,
    monitor: Arc<RoundMonitor>,
    checksum: Arc<dyn Checksum>,
    interval: Duration,
    block: Block,
    tick: u64,
}

impl DummyMiner {
    pub fn new(
        id: MinerId,
        monitor: Arc<RoundMonitor>,
        difficulty: Difficulty,
        checksum: Arc<dyn Checksum>,
        interval: Duration,
    ) -> Self {
        let mut block = Block::template(DUMMY_HEIGHT, DUMMY_PREV_HASH, difficulty.bits());
        block.mined_by = id;
        block.rehash(checksum.as_ref());

        Self {
            id,
            monitor,
            checksum,
            interval,
            block,
            tick: 0,
        }
    }

    /// Produce the next candidate: odd ticks get a fresh nonce and hash,
    /// even ticks only a new timestamp.
    pub fn next_candidate(&mut self) -> Block {
        self.block.timestamp = unix_time();
        if self.tick % 2 == 1 {
            self.block.nonce += 1;
            self.block.rehash(self.checksum.as_ref());
        }
        self.tick += 1;
        self.block
    }

    pub fn run(mut self) -> Result<(), SyncError> {
        loop {
            let candidate = self.next_candidate();
            log::info!(
                "Miner #{}: Mined a new block #{}, with the hash 0x{:x}",
                self.id,
                candidate.height,
                candidate.hash
            );

            match self.monitor.try_submit(candidate)? {
                SubmitOutcome::Closed => break,
                SubmitOutcome::Dropped => {
                    log::debug!("Miner #{}: Mailbox busy, block dropped", self.id)
                }
                SubmitOutcome::Delivered => {}
            }

            if !self.monitor.pause(self.interval)? {
                break;
            }
        }

        log::debug!("Miner #{}: Stopped", self.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Crc32;
    use std::thread;

    fn dummy(monitor: Arc<RoundMonitor>) -> DummyMiner {
        DummyMiner::new(
            5,
            monitor,
            Difficulty::new(0).unwrap(),
            Arc::new(Crc32),
            Duration::from_millis(1),
        )
    }

    #[test]
    fn test_candidates_claim_no_real_round() {
        let mut miner = dummy(Arc::new(RoundMonitor::new()));
        for _ in 0..4 {
            let block = miner.next_candidate();
            assert_eq!(block.height, DUMMY_HEIGHT);
            assert_eq!(block.prev_hash, DUMMY_PREV_HASH);
            assert_eq!(block.mined_by, 5);
        }
    }

    #[test]
    fn test_alternates_stale_and_fresh_hash() {
        let mut miner = dummy(Arc::new(RoundMonitor::new()));

        // Initial hash was computed with timestamp 0
        let first = miner.next_candidate();
        assert_ne!(first.hash, first.compute_hash(&Crc32));

        let second = miner.next_candidate();
        assert_eq!(second.nonce, 1);
        assert_eq!(second.hash, second.compute_hash(&Crc32));

        let third = miner.next_candidate();
        assert_eq!(third.nonce, 1);
        assert_eq!(third.hash, second.hash);
    }

    #[test]
    fn test_run_submits_and_stops_on_close() {
        let monitor = Arc::new(RoundMonitor::new());
        monitor.publish(Block::template(1, 0, 0)).unwrap();

        let handle = {
            let miner = dummy(Arc::clone(&monitor));
            thread::spawn(move || miner.run())
        };

        let submitted = monitor.await_submission().unwrap().unwrap();
        assert_eq!(submitted.height, DUMMY_HEIGHT);

        monitor.close();
        assert!(handle.join().unwrap().is_ok());
    }
}
