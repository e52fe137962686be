//! Block implementation for the ledger
//!
//! A block is a header only: it commits to its transactions through the
//! merkle root over `[coinbase, pooled...]` and the transactions themselves
//! are confirmed in the store by reference.

use crate::core::transaction::{SignatureMode, Transaction};
use crate::crypto::{calculate_merkle_root, meets_difficulty, BlockId, Hash256, HashWriter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A block in the ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    /// Block hash; must meet the difficulty target
    pub id: BlockId,
    /// Parent block, `None` only for genesis
    pub previous: Option<BlockId>,
    /// Merkle root of `[coinbase, transactions...]`
    pub root: Hash256,
    /// Nonce used for proof of work
    pub nonce: u64,
    /// Block creation timestamp
    pub timestamp: DateTime<Utc>,
}

impl Block {
    /// Create a new block (unmined)
    pub fn new(previous: Option<BlockId>, root: Hash256, timestamp: DateTime<Utc>) -> Self {
        let mut block = Self {
            id: Hash256::ZERO,
            previous,
            root,
            nonce: 0,
            timestamp,
        };
        block.id = block.calculate_hash();
        block
    }

    /// Calculate the hash of the block header. `id` never takes part.
    pub fn calculate_hash(&self) -> BlockId {
        let mut writer = HashWriter::new("block");
        writer
            .put_optional_hash(self.previous.as_ref())
            .put_hash(&self.root)
            .put_u64(self.nonce)
            .put_i64(self.timestamp.timestamp());
        writer.finish()
    }

    /// Set the nonce and refresh the cached hash
    pub fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
        self.id = self.calculate_hash();
    }

    /// Merkle root over the coinbase followed by the pooled transactions,
    /// each hashed from its content rather than its claimed ID
    pub fn commitment_root(coinbase: &Transaction, transactions: &[Transaction]) -> Hash256 {
        let hashes: Vec<Hash256> = std::iter::once(coinbase)
            .chain(transactions)
            .map(|tx| tx.calculate_hash(SignatureMode::Included))
            .collect();
        calculate_merkle_root(&hashes)
    }

    /// Check if the proof of work is valid
    pub fn is_valid_pow(&self, difficulty: u32) -> bool {
        meets_difficulty(&self.id, difficulty)
    }

    /// Verify the block hash
    pub fn verify_hash(&self) -> bool {
        self.id == self.calculate_hash()
    }

    pub fn is_genesis(&self) -> bool {
        self.previous.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Block {
        let coinbase = Transaction::coinbase("miner", 50);
        Block::new(None, Block::commitment_root(&coinbase, &[]), Utc::now())
    }

    #[test]
    fn test_new_block_hash() {
        let block = sample_block();
        assert!(block.is_genesis());
        assert!(block.verify_hash());
    }

    #[test]
    fn test_block_hash_verification() {
        let mut block = sample_block();

        // Tamper with nonce
        block.nonce += 1;
        assert!(!block.verify_hash());

        block.set_nonce(block.nonce);
        assert!(block.verify_hash());
    }

    #[test]
    fn test_commitment_root_single_coinbase() {
        let coinbase = Transaction::coinbase("miner", 50);
        assert_eq!(Block::commitment_root(&coinbase, &[]), coinbase.id);
    }

    #[test]
    fn test_commitment_root_order() {
        let coinbase = Transaction::coinbase("miner", 50);
        let a = Transaction::coinbase("a", 1);
        let b = Transaction::coinbase("b", 2);
        assert_ne!(
            Block::commitment_root(&coinbase, &[a.clone(), b.clone()]),
            Block::commitment_root(&coinbase, &[b, a])
        );
    }

    #[test]
    fn test_previous_changes_hash() {
        let genesis = sample_block();
        let child = Block::new(Some(genesis.id), genesis.root, genesis.timestamp);
        assert_ne!(genesis.id, child.id);
    }
}
