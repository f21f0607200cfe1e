// Core chain data structures

mod block;
mod chain;
mod checksum;

pub use block::*;
pub use chain::*;
pub use checksum::*;
