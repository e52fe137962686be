//! Mining module: block assembly and proof-of-work search

pub mod miner;
pub mod pow;

pub use miner::{BlockCandidate, MinedBlock, Miner, MiningError, MiningStats, SEARCH_BATCH};
pub use pow::{NonceSearch, SearchStep};
