// Honest miner: waits for a round, searches without the lock, submits

use crate::consensus::{Difficulty, Miner};
use crate::core::{Block, Checksum, MinerId};
use crate::error::SyncError;
use crate::round::{RoundMonitor, RoundTicket, SubmitOutcome};
use std::sync::Arc;

pub struct HonestMiner {
    id: MinerId,
    monitor: Arc<RoundMonitor>,
    miner: Miner,
}

impl HonestMiner {
    pub fn new(
        id: MinerId,
        monitor: Arc<RoundMonitor>,
        difficulty: Difficulty,
        checksum: Arc<dyn Checksum>,
    ) -> Self {
        Self {
            id,
            monitor,
            miner: Miner::new(difficulty, checksum),
        }
    }

    pub fn id(&self) -> MinerId {
        self.id
    }

    /// Search a private copy of the round's template. Gives up with `None`
    /// as soon as a newer round is published or the monitor closes.
    pub fn search(&self, ticket: &RoundTicket) -> Option<Block> {
        let mut block = ticket.template;
        block.mined_by = self.id;
        block.nonce = 0;

        let result = self
            .miner
            .mine(&mut block, || self.monitor.is_current(ticket.epoch));

        if result.success {
            log::debug!(
                "Miner #{}: Found nonce {} after {} attempts ({:.1} KH/s)",
                self.id,
                block.nonce,
                result.attempts,
                result.hash_rate() / 1000.0
            );
            Some(block)
        } else {
            log::debug!(
                "Miner #{}: Round {} moved on after {} attempts ({:.1} KH/s)",
                self.id,
                ticket.epoch,
                result.attempts,
                result.hash_rate() / 1000.0
            );
            None
        }
    }

    /// Offer a candidate to the coordinator
    pub fn submit(&self, candidate: Block) -> Result<SubmitOutcome, SyncError> {
        log::info!(
            "Miner #{}: Mined a new block #{}, with the hash 0x{:x}",
            self.id,
            candidate.height,
            candidate.hash
        );

        let outcome = self.monitor.try_submit(candidate)?;
        if outcome == SubmitOutcome::Dropped {
            log::debug!("Miner #{}: Round already taken, block #{} dropped", self.id, candidate.height);
        }
        Ok(outcome)
    }

    /// Race every round until the monitor closes
    pub fn run(&self) -> Result<(), SyncError> {
        let mut last_epoch = None;

        while let Some(ticket) = self.monitor.wait_for_template(last_epoch)? {
            last_epoch = Some(ticket.epoch);

            if let Some(candidate) = self.search(&ticket) {
                if self.submit(candidate)? == SubmitOutcome::Closed {
                    break;
                }
            }
        }

        log::debug!("Miner #{}: Stopped", self.id);
        Ok(())
    }
}
