// Mining pool configuration

use crate::consensus::{Difficulty, MAX_DIFFICULTY};
use crate::core::{Checksum, Crc32, MinerId, NO_MINER, Sha256Prefix};
use crate::error::ConfigError;
use clap::ValueEnum;
use std::sync::Arc;
use std::time::Duration;

/// Number of honest miners, ids 1..=N
pub const DEFAULT_MINERS: usize = 4;

pub const DEFAULT_DUMMY_ID: MinerId = 5;

/// Time between dummy submissions
pub const DEFAULT_DUMMY_INTERVAL: Duration = Duration::from_secs(1);

/// Highest difficulty accepted from the command line
pub const MAX_INPUT_DIFFICULTY: u32 = 31;

/// Checksum used for block hashes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ChecksumKind {
    /// CRC-32 (IEEE)
    #[default]
    Crc32,
    /// First four bytes of SHA-256
    Sha256,
}

impl ChecksumKind {
    pub fn build(self) -> Arc<dyn Checksum> {
        match self {
            ChecksumKind::Crc32 => Arc::new(Crc32),
            ChecksumKind::Sha256 => Arc::new(Sha256Prefix),
        }
    }
}

/// How accepted blocks are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable attribute dump
    #[default]
    Text,
    /// One JSON object per block
    Json,
}

/// Faulty miner settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DummyConfig {
    pub id: MinerId,
    pub interval: Duration,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            id: DEFAULT_DUMMY_ID,
            interval: DEFAULT_DUMMY_INTERVAL,
        }
    }
}

/// When the coordinator stops. Both `None` means run forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StopLimits {
    /// Stop once this many blocks were committed after genesis
    pub blocks: Option<usize>,
    /// Stop once this many submissions were processed
    pub submissions: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiningConfig {
    pub difficulty: u32,
    pub miners: usize,
    pub dummy: Option<DummyConfig>,
    pub checksum: ChecksumKind,
    pub format: ReportFormat,
    pub limits: StopLimits,
}

impl MiningConfig {
    pub fn new(difficulty: u32) -> Self {
        Self {
            difficulty,
            miners: DEFAULT_MINERS,
            dummy: Some(DummyConfig::default()),
            checksum: ChecksumKind::default(),
            format: ReportFormat::default(),
            limits: StopLimits::default(),
        }
    }

    /// Ids of the honest miners. Counts beyond `MinerId::MAX` are refused by
    /// `validate`.
    pub fn miner_ids(&self) -> impl Iterator<Item = MinerId> {
        1..=MinerId::try_from(self.miners).unwrap_or(MinerId::MAX)
    }

    /// Check the configuration before any thread is started
    pub fn validate(&self) -> Result<Difficulty, ConfigError> {
        let difficulty = Difficulty::new(self.difficulty).ok_or(ConfigError::DifficultyOutOfRange {
            got: self.difficulty,
            max: MAX_DIFFICULTY,
        })?;

        if self.miners == 0 {
            return Err(ConfigError::NoMiners);
        }
        let last_id = MinerId::try_from(self.miners).map_err(|_| ConfigError::TooManyMiners(self.miners))?;

        if let Some(dummy) = self.dummy {
            if dummy.id == NO_MINER {
                return Err(ConfigError::ReservedMinerId(dummy.id));
            }
            if (1..=last_id).contains(&dummy.id) {
                return Err(ConfigError::MinerIdCollision(dummy.id));
            }
        }

        Ok(difficulty)
    }
}
