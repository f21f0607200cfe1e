// CLI arguments and handler

use crate::config::{
    ChecksumKind, DEFAULT_DUMMY_ID, DEFAULT_MINERS, DummyConfig, MAX_INPUT_DIFFICULTY, MiningConfig,
    ReportFormat, StopLimits,
};
use crate::core::{Block, MinerId};
use crate::error::{ConfigError, SyncError};
use crate::mining::{CoordinatorReport, MiningPool};
use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "block-race")]
#[command(about = "Threads racing to mine blocks for a single coordinator", long_about = None)]
pub struct Cli {
    /// Required leading zero bits in a block hash (0-31)
    pub difficulty: u32,

    /// Number of honest miners
    #[arg(short, long, default_value_t = DEFAULT_MINERS)]
    pub miners: usize,

    /// Id of the faulty miner
    #[arg(long, default_value_t = DEFAULT_DUMMY_ID)]
    pub dummy_id: MinerId,

    /// Run without the faulty miner
    #[arg(long)]
    pub no_dummy: bool,

    /// Milliseconds between faulty submissions
    #[arg(long, default_value_t = 1000)]
    pub dummy_interval_ms: u64,

    /// Checksum used for block hashes
    #[arg(long, value_enum, default_value_t = ChecksumKind::Crc32)]
    pub checksum: ChecksumKind,

    /// Report format for coordinator outcomes
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Stop after this many blocks past genesis
    #[arg(long)]
    pub blocks: Option<usize>,

    /// Stop after this many processed submissions
    #[arg(long)]
    pub submissions: Option<usize>,
}

impl Cli {
    /// Turn arguments into a pool configuration. The command line accepts a
    /// narrower difficulty range than the library.
    pub fn into_config(self) -> Result<MiningConfig, ConfigError> {
        if self.difficulty > MAX_INPUT_DIFFICULTY {
            return Err(ConfigError::DifficultyOutOfRange {
                got: self.difficulty,
                max: MAX_INPUT_DIFFICULTY,
            });
        }

        let dummy = (!self.no_dummy).then(|| DummyConfig {
            id: self.dummy_id,
            interval: Duration::from_millis(self.dummy_interval_ms),
        });

        let config = MiningConfig {
            difficulty: self.difficulty,
            miners: self.miners,
            dummy,
            checksum: self.checksum,
            format: self.format,
            limits: StopLimits {
                blocks: self.blocks,
                submissions: self.submissions,
            },
        };
        config.validate()?;
        Ok(config)
    }
}

/// CLI handler
pub struct CliHandler {
    pool: MiningPool,
}

impl CliHandler {
    /// Validate arguments and prepare the pool. Starts no threads.
    pub fn new(cli: Cli) -> Result<Self, ConfigError> {
        let pool = MiningPool::new(cli.into_config()?)?;
        Ok(Self { pool })
    }

    /// Run the race until a stop limit is reached
    pub fn run(self) -> Result<(), SyncError> {
        let report = self.pool.run()?;
        print_summary(&report);
        Ok(())
    }
}

fn print_summary(report: &CoordinatorReport) {
    let tally = &report.tally;

    println!("Chain:");
    for block in report.chain.iter() {
        print_block(block);
    }
    println!(
        "Submissions: {} ({} accepted, {} bad difficulty, {} hash mismatch, {} stale, {} wrong difficulty)",
        tally.submissions,
        tally.accepted,
        tally.difficulty_not_met,
        tally.hash_mismatch,
        tally.stale_round,
        tally.wrong_difficulty
    );
}

fn print_block(block: &Block) {
    println!("  #{} by {}: {}", block.height, block.mined_by, block);
}
