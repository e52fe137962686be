//! Mining engine for the ledger
//!
//! Assembles a block candidate from the pool, then searches for a nonce.
//! The miner never writes: a sealed block is handed to the validator.

use crate::config::LedgerConfig;
use crate::core::{Block, Transaction};
use crate::crypto::{derive_receive_root, ExtendedKey, KeyError, TxId, WalletSeed};
use crate::error::ErrorKind;
use crate::mining::pow::{NonceSearch, SearchStep};
use crate::storage::{LedgerStore, SortOrder, StoreError};
use crate::wallet::{select_next_unused, ChildAddress, WalletError};
use chrono::Utc;
use log::{debug, info};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Nonces tried between cancellation checks
pub const SEARCH_BATCH: u64 = 10_000;

#[derive(Error, Debug)]
pub enum MiningError {
    #[error("Mining cancelled")]
    Cancelled,
    #[error("Nonce space exhausted")]
    NonceSpaceExhausted,
    #[error("Key error: {0}")]
    Key(#[from] KeyError),
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl MiningError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MiningError::Cancelled => ErrorKind::Cancelled,
            MiningError::NonceSpaceExhausted => ErrorKind::Exhausted,
            MiningError::Key(e) => e.kind(),
            MiningError::Wallet(e) => e.kind(),
            MiningError::Store(e) => e.kind(),
        }
    }
}

/// Mining statistics
#[derive(Debug, Clone)]
pub struct MiningStats {
    /// Number of hash attempts
    pub hash_attempts: u64,
    /// Time taken in milliseconds
    pub time_ms: u128,
    /// Hash rate (hashes per second)
    pub hash_rate: f64,
}

/// An unsealed block together with what it commits to
#[derive(Debug, Clone)]
pub struct BlockCandidate {
    pub block: Block,
    pub coinbase: Transaction,
    pub transaction_ids: Vec<TxId>,
    pub reward_address: ChildAddress,
}

/// A sealed block ready for [`crate::core::Validator::add_block`]
#[derive(Debug, Clone)]
pub struct MinedBlock {
    pub block: Block,
    pub coinbase: Transaction,
    pub transaction_ids: Vec<TxId>,
    pub stats: MiningStats,
}

/// Miner for creating new blocks
pub struct Miner<S: LedgerStore> {
    store: Arc<S>,
    config: LedgerConfig,
}

impl<S: LedgerStore> Miner<S> {
    pub fn new(store: Arc<S>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    /// Candidate paying the reward to the account's next receive address
    pub fn assemble(&self, seed: &WalletSeed, account: u32) -> Result<BlockCandidate, MiningError> {
        let receive = derive_receive_root(seed, self.config.coin_type, account)?;
        self.assemble_to(&receive)
    }

    /// Candidate paying the reward under `reward_root`, which may be public
    pub fn assemble_to(&self, reward_root: &ExtendedKey) -> Result<BlockCandidate, MiningError> {
        let reward_address = select_next_unused(reward_root, self.store.as_ref())?;
        let coinbase = Transaction::coinbase(&reward_address.address, self.config.coinbase_amount);

        let pool = self.store.get_transactions(
            0,
            self.config.max_pooled_per_block(),
            SortOrder::OldestFirst,
            true,
        )?;
        let root = Block::commitment_root(&coinbase, &pool);
        let previous = self.store.latest_block()?.map(|block| block.id);

        debug!(
            "Assembled candidate on {:?} with {} pooled transactions",
            previous,
            pool.len()
        );

        Ok(BlockCandidate {
            block: Block::new(previous, root, Utc::now()),
            coinbase,
            transaction_ids: pool.iter().map(|tx| tx.id).collect(),
            reward_address,
        })
    }

    /// Search nonces until the block meets the difficulty or `cancel` fires
    pub fn seal(&self, candidate: BlockCandidate, cancel: &CancellationToken) -> Result<MinedBlock, MiningError> {
        let start = Instant::now();
        let difficulty = self.config.difficulty;

        info!("Mining block with difficulty {}...", difficulty);

        let mut search = NonceSearch::new(candidate.block, difficulty);
        let block = loop {
            if cancel.is_cancelled() {
                info!("Mining cancelled after {} attempts", search.attempts());
                return Err(MiningError::Cancelled);
            }
            match search.step(SEARCH_BATCH) {
                SearchStep::Found(block) => break block,
                SearchStep::Pending { .. } => continue,
                SearchStep::Exhausted => return Err(MiningError::NonceSpaceExhausted),
            }
        };

        let attempts = search.attempts();
        let elapsed = start.elapsed().as_millis();
        let hash_rate = if elapsed > 0 {
            (attempts as f64) / (elapsed as f64 / 1000.0)
        } else {
            attempts as f64
        };

        info!(
            "Block {} mined in {}ms ({} attempts, {:.2} H/s)",
            block.id, elapsed, attempts, hash_rate
        );

        Ok(MinedBlock {
            block,
            coinbase: candidate.coinbase,
            transaction_ids: candidate.transaction_ids,
            stats: MiningStats {
                hash_attempts: attempts,
                time_ms: elapsed,
                hash_rate,
            },
        })
    }

    /// Assemble and seal in one call
    pub fn mine(
        &self,
        seed: &WalletSeed,
        account: u32,
        cancel: &CancellationToken,
    ) -> Result<MinedBlock, MiningError> {
        let candidate = self.assemble(seed, account)?;
        self.seal(candidate, cancel)
    }
}
