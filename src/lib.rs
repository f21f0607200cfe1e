// Proof-of-work mining race
// One coordinator thread owns the chain; miner threads race for each round.

pub mod cli;
pub mod config;
pub mod consensus;
pub mod core;
pub mod error;
pub mod mining;
pub mod round;

// Re-exports for convenience
pub use cli::{Cli, CliHandler};
pub use config::{ChecksumKind, DummyConfig, MiningConfig, ReportFormat, StopLimits};
pub use consensus::{BlockValidator, Difficulty, Miner, Rejection, RejectionKind};
pub use crate::core::{Block, Chain, Checksum, Crc32, Sha256Prefix};
pub use error::{ConfigError, SyncError};
pub use mining::{Coordinator, CoordinatorReport, DummyMiner, HonestMiner, MiningPool};
pub use round::{RoundMonitor, RoundTicket, SubmitOutcome};
