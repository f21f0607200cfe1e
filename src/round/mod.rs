// Shared round state between the coordinator and the miners

mod monitor;

pub use monitor::{RoundMonitor, RoundSnapshot, RoundTicket, SubmitOutcome};
