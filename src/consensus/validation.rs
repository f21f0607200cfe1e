// Submission validation

use crate::consensus::pow::Difficulty;
use crate::core::{Block, Checksum, MinerId, leading_zero_bits};
use std::sync::Arc;
use thiserror::Error;

/// Reasons the coordinator refuses a submitted block
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Recomputed hash has too few leading zero bits
    #[error("Miner #{miner} provided bad hash (0x{reported:x}) for block.")]
    DifficultyNotMet {
        miner: MinerId,
        reported: u32,
        zeros: u32,
        difficulty: u32,
    },
    /// Reported hash disagrees with the coordinator's recomputation
    #[error("Miner #{miner} provided hash (0x{reported:x}) but server calculated (0x{computed:x}).")]
    HashMismatch {
        miner: MinerId,
        reported: u32,
        computed: u32,
    },
    /// Candidate targets a superseded or unknown round
    #[error(
        "Miner #{miner} provided incorrect prev_hash (0x{prev_hash:x}), does not reference most recent block in blockchain (0x{head_hash:x}) (height {height}, open round {expected_height})."
    )]
    StaleRound {
        miner: MinerId,
        prev_hash: u32,
        head_hash: u32,
        height: i64,
        expected_height: i64,
    },
    /// Candidate claims a difficulty other than the open round's
    #[error("Miner #{miner} claimed difficulty {claimed} for a round at difficulty {expected}.")]
    WrongDifficulty {
        miner: MinerId,
        claimed: u32,
        expected: u32,
    },
}

/// Which check a rejection came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionKind {
    DifficultyNotMet,
    HashMismatch,
    StaleRound,
    WrongDifficulty,
}

impl RejectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionKind::DifficultyNotMet => "difficulty_not_met",
            RejectionKind::HashMismatch => "hash_mismatch",
            RejectionKind::StaleRound => "stale_round",
            RejectionKind::WrongDifficulty => "wrong_difficulty",
        }
    }
}

impl Rejection {
    pub fn kind(&self) -> RejectionKind {
        match self {
            Rejection::DifficultyNotMet { .. } => RejectionKind::DifficultyNotMet,
            Rejection::HashMismatch { .. } => RejectionKind::HashMismatch,
            Rejection::StaleRound { .. } => RejectionKind::StaleRound,
            Rejection::WrongDifficulty { .. } => RejectionKind::WrongDifficulty,
        }
    }

    pub fn miner(&self) -> MinerId {
        match self {
            Rejection::DifficultyNotMet { miner, .. }
            | Rejection::HashMismatch { miner, .. }
            | Rejection::StaleRound { miner, .. }
            | Rejection::WrongDifficulty { miner, .. } => *miner,
        }
    }
}

/// Block validator
pub struct BlockValidator {
    difficulty: Difficulty,
    checksum: Arc<dyn Checksum>,
}

impl BlockValidator {
    pub fn new(difficulty: Difficulty, checksum: Arc<dyn Checksum>) -> Self {
        Self { difficulty, checksum }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Validate a candidate against the open round's template and the chain
    /// head. Checks run in a fixed order (difficulty, hash, round, claimed
    /// difficulty) and the first failure is returned.
    pub fn validate(&self, candidate: &Block, template: &Block, head: &Block) -> Result<(), Rejection> {
        let computed = candidate.compute_hash(self.checksum.as_ref());

        if !self.difficulty.is_met_by(computed) {
            return Err(Rejection::DifficultyNotMet {
                miner: candidate.mined_by,
                reported: candidate.hash,
                zeros: leading_zero_bits(computed),
                difficulty: self.difficulty.bits(),
            });
        }

        if computed != candidate.hash {
            return Err(Rejection::HashMismatch {
                miner: candidate.mined_by,
                reported: candidate.hash,
                computed,
            });
        }

        if candidate.prev_hash != head.hash || candidate.height != template.height {
            return Err(Rejection::StaleRound {
                miner: candidate.mined_by,
                prev_hash: candidate.prev_hash,
                head_hash: head.hash,
                height: candidate.height,
                expected_height: template.height,
            });
        }

        // Not covered by the hash; a larger claim would break chain integrity
        if candidate.difficulty != template.difficulty {
            return Err(Rejection::WrongDifficulty {
                miner: candidate.mined_by,
                claimed: candidate.difficulty,
                expected: template.difficulty,
            });
        }

        Ok(())
    }
}
