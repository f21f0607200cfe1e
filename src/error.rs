// Error types for startup and thread coordination

use crate::core::MinerId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Input parameter out of range (must be between 0 and {max}), got {got}")]
    DifficultyOutOfRange { got: u32, max: u32 },

    #[error("at least one honest miner is required")]
    NoMiners,

    #[error("{0} honest miners exceed the miner id range")]
    TooManyMiners(usize),

    #[error("dummy miner id {0} collides with an honest miner id")]
    MinerIdCollision(MinerId),

    #[error("miner id {0} is reserved for genesis")]
    ReservedMinerId(MinerId),
}

/// Failures of the coordination machinery. All of them are fatal.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("{primitive} poisoned by a panicking thread")]
    Poisoned { primitive: &'static str },

    #[error("failed to spawn thread {thread}: {source}")]
    Spawn { thread: String, source: std::io::Error },

    #[error("thread {thread} panicked")]
    Panicked { thread: String },
}
