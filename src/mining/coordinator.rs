// Coordinator: owns the chain, validates submissions, advances rounds

use crate::config::{ReportFormat, StopLimits};
use crate::consensus::{BlockValidator, Difficulty, Rejection, RejectionKind};
use crate::core::{Block, Chain, ChainError, Checksum, unix_time};
use crate::error::SyncError;
use crate::round::RoundMonitor;
use serde_json::json;
use std::sync::Arc;

/// Per-outcome counters for processed submissions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundTally {
    pub submissions: usize,
    pub accepted: usize,
    pub difficulty_not_met: usize,
    pub hash_mismatch: usize,
    pub stale_round: usize,
    pub wrong_difficulty: usize,
}

impl RoundTally {
    fn record(&mut self, outcome: &Result<(), Rejection>) {
        self.submissions += 1;
        match outcome {
            Ok(()) => self.accepted += 1,
            Err(rejection) => match rejection.kind() {
                RejectionKind::DifficultyNotMet => self.difficulty_not_met += 1,
                RejectionKind::HashMismatch => self.hash_mismatch += 1,
                RejectionKind::StaleRound => self.stale_round += 1,
                RejectionKind::WrongDifficulty => self.wrong_difficulty += 1,
            },
        }
    }

    pub fn rejected(&self) -> usize {
        self.difficulty_not_met + self.hash_mismatch + self.stale_round + self.wrong_difficulty
    }
}

/// What the coordinator hands back when it stops
#[derive(Debug, Clone)]
pub struct CoordinatorReport {
    pub chain: Chain,
    pub tally: RoundTally,
}

/// Single writer of the chain and arbiter of every round
pub struct Coordinator {
    monitor: Arc<RoundMonitor>,
    validator: BlockValidator,
    chain: Chain,
    /// Template of the round currently (or last) published
    template: Block,
    format: ReportFormat,
    limits: StopLimits,
    tally: RoundTally,
}

impl Coordinator {
    /// Create a coordinator whose chain holds only genesis
    pub fn new(
        monitor: Arc<RoundMonitor>,
        difficulty: Difficulty,
        checksum: Arc<dyn Checksum>,
        format: ReportFormat,
        limits: StopLimits,
    ) -> Self {
        let genesis = Block::genesis(difficulty.bits(), unix_time());
        let chain = Chain::new(genesis);
        let template = Block::template(chain.next_height(), genesis.hash, difficulty.bits());

        Self {
            monitor,
            validator: BlockValidator::new(difficulty, checksum),
            chain,
            template,
            format,
            limits,
            tally: RoundTally::default(),
        }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn current_template(&self) -> &Block {
        &self.template
    }

    pub fn tally(&self) -> RoundTally {
        self.tally
    }

    /// Build the next template from the chain head, publish it and wake
    /// every miner. Returns the round's epoch.
    pub fn publish_round(&mut self) -> Result<u64, SyncError> {
        let head = self.chain.head();
        self.template = Block::template(
            self.chain.next_height(),
            head.hash,
            self.validator.difficulty().bits(),
        );

        let epoch = self.monitor.publish(self.template)?;
        log::debug!(
            "Server: Round {} open for block #{} on 0x{:x}",
            epoch,
            self.template.height,
            self.template.prev_hash
        );
        Ok(epoch)
    }

    /// Check a candidate against the open round and the chain head
    pub fn validate(&self, candidate: &Block) -> Result<(), Rejection> {
        self.validator.validate(candidate, &self.template, self.chain.head())
    }

    /// Append a validated candidate to the chain
    pub fn commit(&mut self, candidate: Block) -> Result<(), ChainError> {
        self.chain.push(candidate)
    }

    /// Validate, commit on success, report and count the outcome
    pub fn process(&mut self, candidate: Block) -> Result<(), Rejection> {
        let mut outcome = self.validate(&candidate);

        if outcome.is_ok() {
            if let Err(e) = self.commit(candidate) {
                log::error!("Server: Validated block #{} failed to extend the chain: {}", candidate.height, e);
                outcome = Err(Rejection::StaleRound {
                    miner: candidate.mined_by,
                    prev_hash: candidate.prev_hash,
                    head_hash: self.chain.head().hash,
                    height: candidate.height,
                    expected_height: self.template.height,
                });
            }
        }

        self.report(&candidate, &outcome);
        self.tally.record(&outcome);
        outcome
    }

    fn report(&self, candidate: &Block, outcome: &Result<(), Rejection>) {
        match (self.format, outcome) {
            (ReportFormat::Text, Ok(())) => log::info!(
                "Server: New block added by {}, attributes: {}",
                candidate.mined_by,
                candidate
            ),
            (ReportFormat::Text, Err(rejection)) => log::info!("Server: {}", rejection),
            (ReportFormat::Json, _) => log::info!("{}", json_report(candidate, outcome)),
        }
    }

    fn limit_reached(&self) -> bool {
        let blocks = self.chain.len() - 1;
        self.limits.blocks.is_some_and(|max| blocks >= max)
            || self.limits.submissions.is_some_and(|max| self.tally.submissions >= max)
    }

    /// Run rounds until a stop limit is reached or the monitor is closed.
    ///
    /// A round is republished after every submission, accepted or not, so a
    /// rejection reissues the same template under a new epoch.
    pub fn run(mut self) -> Result<CoordinatorReport, SyncError> {
        match request_priority_boost() {
            Ok(()) => log::debug!("Server: Running at maximum round-robin priority"),
            Err(e) => log::warn!("Server: Could not raise thread priority: {}", e),
        }

        self.publish_round()?;
        while !self.limit_reached() {
            let Some(candidate) = self.monitor.await_submission()? else {
                break;
            };

            // Rejections are routine; already reported and counted
            let _ = self.process(candidate);

            if self.limit_reached() {
                break;
            }
            self.publish_round()?;
        }

        self.monitor.close();
        log::info!(
            "Server: Stopped with {} blocks after {} submissions ({} rejected)",
            self.chain.len(),
            self.tally.submissions,
            self.tally.rejected()
        );

        Ok(CoordinatorReport {
            chain: self.chain,
            tally: self.tally,
        })
    }
}

/// One JSON line per processed submission
pub fn json_report(candidate: &Block, outcome: &Result<(), Rejection>) -> serde_json::Value {
    match outcome {
        Ok(()) => json!({ "event": "accepted", "block": candidate }),
        Err(rejection) => json!({
            "event": "rejected",
            "reason": rejection.kind().as_str(),
            "miner": rejection.miner(),
            "message": rejection.to_string(),
        }),
    }
}

/// Ask the OS to schedule the calling thread ahead of the miners
/// (round-robin at maximum priority). Usually needs elevated privileges.
#[cfg(unix)]
fn request_priority_boost() -> std::io::Result<()> {
    // SAFETY: plain libc calls on the current thread with a fully initialised param
    unsafe {
        let max = libc::sched_get_priority_max(libc::SCHED_RR);
        if max == -1 {
            return Err(std::io::Error::last_os_error());
        }

        let mut param: libc::sched_param = std::mem::zeroed();
        param.sched_priority = max;
        match libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_RR, &param) {
            0 => Ok(()),
            rc => Err(std::io::Error::from_raw_os_error(rc)),
        }
    }
}

#[cfg(not(unix))]
fn request_priority_boost() -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "thread scheduling policy is not supported on this platform",
    ))
}
