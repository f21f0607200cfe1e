// Thread pool: one coordinator, honest miners and an optional dummy miner

use crate::config::MiningConfig;
use crate::consensus::Difficulty;
use crate::core::Checksum;
use crate::error::{ConfigError, SyncError};
use crate::mining::{Coordinator, CoordinatorReport, DummyMiner, HonestMiner};
use crate::round::RoundMonitor;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type WorkerHandle = (String, JoinHandle<Result<(), SyncError>>);

/// Closes the monitor if the owning thread unwinds, so nobody waits on a
/// round that will never be published.
struct CloseOnPanic(Arc<RoundMonitor>);

impl Drop for CloseOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.close();
        }
    }
}

pub struct MiningPool {
    config: MiningConfig,
    difficulty: Difficulty,
    checksum: Arc<dyn Checksum>,
    monitor: Arc<RoundMonitor>,
}

impl MiningPool {
    /// Validate the configuration; no thread is started yet
    pub fn new(config: MiningConfig) -> Result<Self, ConfigError> {
        let checksum = config.checksum.build();
        Self::with_checksum(config, checksum)
    }

    /// Same as `new` with an explicit checksum implementation
    pub fn with_checksum(config: MiningConfig, checksum: Arc<dyn Checksum>) -> Result<Self, ConfigError> {
        let difficulty = config.validate()?;
        Ok(Self {
            config,
            difficulty,
            checksum,
            monitor: Arc::new(RoundMonitor::new()),
        })
    }

    /// Shared monitor; closing it stops the whole pool
    pub fn monitor(&self) -> Arc<RoundMonitor> {
        Arc::clone(&self.monitor)
    }

    /// Start every thread and block until the coordinator stops.
    ///
    /// Any thread failure closes the monitor and surfaces here as the first
    /// `SyncError` observed.
    pub fn run(self) -> Result<CoordinatorReport, SyncError> {
        log::info!(
            "Starting pool: {} miners, dummy {}, difficulty {}",
            self.config.miners,
            self.config
                .dummy
                .map_or_else(|| "disabled".to_string(), |d| format!("#{}", d.id)),
            self.difficulty.bits()
        );

        let coordinator = Coordinator::new(
            self.monitor(),
            self.difficulty,
            Arc::clone(&self.checksum),
            self.config.format,
            self.config.limits,
        );
        let coordinator_handle = spawn("coordinator".to_string(), &self.monitor, move || coordinator.run())?;

        let workers = match self.spawn_workers() {
            Ok(workers) => workers,
            Err(e) => {
                self.monitor.close();
                // Already failing; the coordinator's own result is secondary
                let _ = join("coordinator", coordinator_handle);
                return Err(e);
            }
        };

        let report = join("coordinator", coordinator_handle);
        // The coordinator closes the monitor on a clean stop; make sure the
        // workers also see a close when it failed
        self.monitor.close();

        let mut first_error = None;
        for (name, handle) in workers {
            if let Err(e) = join(&name, handle) {
                first_error.get_or_insert(e);
            }
        }

        match (report, first_error) {
            (Err(e), _) => Err(e),
            (Ok(_), Some(e)) => Err(e),
            (Ok(report), None) => Ok(report),
        }
    }

    /// Spawn every miner thread. On failure the monitor is closed and the
    /// threads already started are joined before the error is returned.
    fn spawn_workers(&self) -> Result<Vec<WorkerHandle>, SyncError> {
        let mut workers = Vec::new();

        match self.spawn_into(&mut workers) {
            Ok(()) => Ok(workers),
            Err(e) => {
                self.monitor.close();
                for (name, handle) in workers {
                    let _ = join(&name, handle);
                }
                Err(e)
            }
        }
    }

    fn spawn_into(&self, workers: &mut Vec<WorkerHandle>) -> Result<(), SyncError> {
        for id in self.config.miner_ids() {
            let miner = HonestMiner::new(id, self.monitor(), self.difficulty, Arc::clone(&self.checksum));
            let name = format!("miner-{}", id);
            let handle = spawn(name.clone(), &self.monitor, move || miner.run())?;
            workers.push((name, handle));
        }

        if let Some(dummy) = self.config.dummy {
            let miner = DummyMiner::new(
                dummy.id,
                self.monitor(),
                self.difficulty,
                Arc::clone(&self.checksum),
                dummy.interval,
            );
            let name = format!("dummy-{}", dummy.id);
            let handle = spawn(name.clone(), &self.monitor, move || miner.run())?;
            workers.push((name, handle));
        }

        Ok(())
    }
}

/// Spawn a named thread whose failure, returned or panicking, closes the
/// monitor
fn spawn<T, F>(name: String, monitor: &Arc<RoundMonitor>, work: F) -> Result<JoinHandle<Result<T, SyncError>>, SyncError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, SyncError> + Send + 'static,
{
    let monitor = Arc::clone(monitor);
    let thread_name = name.clone();

    thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            let _guard = CloseOnPanic(Arc::clone(&monitor));
            let result = work();
            if let Err(e) = &result {
                log::error!("{}: {}", thread_name, e);
                monitor.close();
            }
            result
        })
        .map_err(|source| SyncError::Spawn { thread: name, source })
}

fn join<T>(name: &str, handle: JoinHandle<Result<T, SyncError>>) -> Result<T, SyncError> {
    handle
        .join()
        .map_err(|_| SyncError::Panicked { thread: name.to_string() })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DummyConfig, StopLimits};
    use crate::core::{Crc32, NO_MINER};
    use crate::mining::DUMMY_HEIGHT;
    use std::time::Duration;

    struct Constant(u32);

    impl Checksum for Constant {
        fn checksum(&self, _bytes: &[u8]) -> u32 {
            self.0
        }
    }

    /// Zero for blocks claiming the dummy height, all ones otherwise: honest
    /// miners never qualify, dummy blocks always carry a valid hash
    struct OnlyDummyQualifies;

    impl Checksum for OnlyDummyQualifies {
        fn checksum(&self, bytes: &[u8]) -> u32 {
            if bytes[..8] == DUMMY_HEIGHT.to_le_bytes() { 0 } else { u32::MAX }
        }
    }

    fn fast_dummy() -> Option<DummyConfig> {
        Some(DummyConfig { id: 5, interval: Duration::from_millis(1) })
    }

    #[test]
    fn test_invalid_config_starts_nothing() {
        let mut config = MiningConfig::new(0);
        config.miners = 0;
        assert!(matches!(MiningPool::new(config), Err(ConfigError::NoMiners)));
    }

    #[test]
    fn test_difficulty_zero_grows_one_block_per_race() {
        let mut config = MiningConfig::new(0);
        config.dummy = None;
        config.limits = StopLimits { blocks: Some(5), submissions: None };

        let report = MiningPool::new(config).unwrap().run().unwrap();

        assert_eq!(report.chain.len(), 6);
        assert_eq!(report.tally.accepted, 5);
        assert!(report.chain.verify(&Crc32).is_ok());

        let genesis = report.chain.get(0).unwrap();
        assert!(genesis.is_genesis());
        for (height, block) in report.chain.iter().enumerate().skip(1) {
            assert_eq!(block.height, height as i64);
            assert!((1..=4).contains(&block.mined_by));
        }
    }

    #[test]
    fn test_difficulty_32_never_grows() {
        let mut config = MiningConfig::new(32);
        config.dummy = fast_dummy();
        config.limits = StopLimits { blocks: None, submissions: Some(6) };

        let report = MiningPool::with_checksum(config, Arc::new(Constant(1)))
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.chain.len(), 1);
        assert_eq!(report.tally.submissions, 6);
        assert_eq!(report.tally.difficulty_not_met, 6);
        assert_eq!(report.tally.hash_mismatch, 0);
        assert_eq!(report.tally.stale_round, 0);
    }

    #[test]
    fn test_dummy_rejected_even_with_valid_hash() {
        let mut config = MiningConfig::new(1);
        config.miners = 2;
        config.dummy = fast_dummy();
        config.limits = StopLimits { blocks: None, submissions: Some(5) };

        let report = MiningPool::with_checksum(config, Arc::new(OnlyDummyQualifies))
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.chain.len(), 1);
        assert_eq!(report.tally.accepted, 0);
        assert_eq!(report.tally.stale_round, 5);
    }

    #[test]
    fn test_race_with_dummy_keeps_chain_intact() {
        let mut config = MiningConfig::new(8);
        config.dummy = fast_dummy();
        config.limits = StopLimits { blocks: Some(4), submissions: None };

        let report = MiningPool::new(config).unwrap().run().unwrap();

        assert_eq!(report.chain.len(), 5);
        assert!(report.chain.verify(&Crc32).is_ok());
        assert_eq!(report.tally.accepted, 4);
        assert_eq!(report.tally.submissions, report.tally.accepted + report.tally.rejected());
        assert!(report.chain.iter().skip(1).all(|b| b.mined_by != 5 && b.mined_by != NO_MINER));
    }

    #[test]
    fn test_external_close_stops_pool() {
        let mut config = MiningConfig::new(32);
        config.dummy = None;

        let pool = MiningPool::with_checksum(config, Arc::new(Constant(1))).unwrap();
        let monitor = pool.monitor();
        let handle = thread::spawn(move || pool.run());

        thread::sleep(Duration::from_millis(20));
        monitor.close();

        let report = handle.join().unwrap().unwrap();
        assert_eq!(report.chain.len(), 1);
        assert_eq!(report.tally.submissions, 0);
    }
}
