// Coordinator and miner threads

pub mod coordinator;
pub mod dummy;
pub mod pool;
pub mod worker;

pub use coordinator::{Coordinator, CoordinatorReport, RoundTally};
pub use dummy::{DUMMY_HEIGHT, DUMMY_PREV_HASH, DummyMiner};
pub use pool::MiningPool;
pub use worker::HonestMiner;
