pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use models::{Challenge, NewChallenge, TxState};
pub use store::ChallengeStore;
