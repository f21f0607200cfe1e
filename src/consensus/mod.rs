// Proof of work and submission validation

pub mod pow;
pub mod validation;

pub use pow::{Difficulty, MAX_DIFFICULTY, Miner, MiningResult};
pub use validation::{BlockValidator, Rejection, RejectionKind};
