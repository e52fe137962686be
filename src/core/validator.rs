//! Consensus validator
//!
//! The only component that writes ledger state. A transaction or block is
//! checked in full against the store and then committed as one
//! [`WriteBatch`]; a rejection leaves the ledger untouched.

use crate::config::LedgerConfig;
use crate::core::block::Block;
use crate::core::transaction::{SignatureMode, Transaction, Utxo};
use crate::crypto::{
    address_to_public_key, meets_difficulty, verify_signature, Address, BlockId, Hash256, TxId,
};
use crate::error::ErrorKind;
use crate::storage::{LedgerStore, SortOrder, StoreError, WriteBatch};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// Errors
// =============================================================================

/// Reasons a transaction or block is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Signature count {signatures} does not match input count {inputs}")]
    SignatureCountMismatch { inputs: usize, signatures: usize },
    #[error("Transaction has no inputs")]
    NoInputs,
    #[error("Transaction ID {claimed} does not match its content hash {actual}")]
    TransactionIdMismatch { claimed: TxId, actual: TxId },
    #[error("Transaction {0} already exists")]
    DuplicateTransaction(TxId),
    #[error("Input {0} is listed twice")]
    DuplicateInput(Address),
    #[error("Input {0} does not exist")]
    MissingInput(Address),
    #[error("Input {address} already spent by {spender}")]
    InputAlreadySpent { address: Address, spender: TxId },
    #[error("Invalid signature for input {index}")]
    InvalidSignature { index: usize },
    #[error("Output address {0} is not a public key")]
    InvalidAddress(Address),
    #[error("Output address {0} is listed twice")]
    DuplicateOutput(Address),
    #[error("Output to {0} has zero amount")]
    ZeroAmount(Address),
    #[error("Address {0} has already been used")]
    AddressReused(Address),
    #[error("Amount overflow")]
    AmountOverflow,
    #[error("Insufficient inputs: inputs {inputs}, outputs {outputs}")]
    InsufficientInputs { inputs: u64, outputs: u64 },
    #[error("Block ID {claimed} does not match its header hash {actual}")]
    BlockHashMismatch { claimed: BlockId, actual: BlockId },
    #[error("Block {id} does not meet difficulty {difficulty}")]
    InvalidProofOfWork { id: BlockId, difficulty: u32 },
    #[error("Block {0} already exists")]
    DuplicateBlock(BlockId),
    #[error("Previous block {0} not found")]
    MissingAncestor(BlockId),
    #[error("Genesis block already exists")]
    DuplicateGenesis,
    #[error("Too many transactions: {count} (max: {limit})")]
    TooManyTransactions { count: usize, limit: usize },
    #[error("Transaction {0} is referenced twice")]
    DuplicateReference(TxId),
    #[error("Transaction {0} is not in the pool")]
    UnknownTransaction(TxId),
    #[error("Transaction {tx} is already confirmed in block {block}")]
    AlreadyConfirmed { tx: TxId, block: BlockId },
    #[error("Merkle root mismatch: block has {claimed}, transactions give {actual}")]
    MerkleRootMismatch { claimed: Hash256, actual: Hash256 },
    #[error("Invalid coinbase: {0}")]
    InvalidCoinbase(String),
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// Validator failure: either a rejection or a store failure passed through
#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ConsensusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConsensusError::Validation(e) => e.kind(),
            ConsensusError::Store(e) => e.kind(),
        }
    }

    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            ConsensusError::Validation(e) => Some(e),
            ConsensusError::Store(_) => None,
        }
    }
}

// =============================================================================
// Validator
// =============================================================================

/// Sole writer of ledger state
pub struct Validator<S: LedgerStore> {
    store: Arc<S>,
    config: LedgerConfig,
    /// Serializes check-then-commit
    write_lock: Mutex<()>,
}

impl<S: LedgerStore> Validator<S> {
    pub fn new(store: Arc<S>, config: LedgerConfig) -> Self {
        Self {
            store,
            config,
            write_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Accept a signed transaction into the pool.
    ///
    /// Consumes every input UTXO and records the transaction unconfirmed.
    pub fn add_transaction(&self, tx: &Transaction) -> Result<TxId, ConsensusError> {
        let _guard = self.write_lock.lock();

        if let Err(e) = self.check_transaction(tx) {
            warn!("Rejected transaction {}: {}", tx.id, e);
            return Err(e);
        }

        let mut pooled = tx.clone();
        pooled.block = None;

        let mut batch = WriteBatch::new();
        batch
            .spend(tx.id, tx.inputs.clone())
            .add_transaction(pooled);
        self.store.commit(batch)?;

        info!(
            "Accepted transaction {} ({} inputs, {} outputs)",
            tx.id,
            tx.inputs.len(),
            tx.outputs.len()
        );
        Ok(tx.id)
    }

    fn check_transaction(&self, tx: &Transaction) -> Result<(), ConsensusError> {
        if tx.inputs.len() != tx.signatures.len() {
            return Err(ValidationError::SignatureCountMismatch {
                inputs: tx.inputs.len(),
                signatures: tx.signatures.len(),
            }
            .into());
        }
        if tx.inputs.is_empty() {
            return Err(ValidationError::NoInputs.into());
        }

        let actual = tx.calculate_hash(SignatureMode::Included);
        if actual != tx.id {
            return Err(ValidationError::TransactionIdMismatch {
                claimed: tx.id,
                actual,
            }
            .into());
        }
        if self.store.get_transaction(&tx.id)?.is_some() {
            return Err(ValidationError::DuplicateTransaction(tx.id).into());
        }

        let message = tx.signing_hash();
        let mut seen = HashSet::new();
        let mut input_total = 0u64;

        for (index, (address, signature)) in tx.inputs.iter().zip(&tx.signatures).enumerate() {
            if !seen.insert(address) {
                return Err(ValidationError::DuplicateInput(address.clone()).into());
            }

            let utxo = self.unspent_utxo(address)?;

            if !verify_signature(&message, &utxo.address, signature) {
                return Err(ValidationError::InvalidSignature { index }.into());
            }

            input_total = input_total
                .checked_add(utxo.amount)
                .ok_or(ValidationError::AmountOverflow)?;
        }

        let mut output_addresses = HashSet::new();
        let mut output_total = 0u64;
        for output in &tx.outputs {
            if address_to_public_key(&output.address).is_err() {
                return Err(ValidationError::InvalidAddress(output.address.clone()).into());
            }
            if !output_addresses.insert(&output.address) {
                return Err(ValidationError::DuplicateOutput(output.address.clone()).into());
            }
            if output.amount == 0 {
                return Err(ValidationError::ZeroAmount(output.address.clone()).into());
            }
            if self.store.get_utxo(&output.address)?.is_some() {
                return Err(ValidationError::AddressReused(output.address.clone()).into());
            }
            output_total = output_total
                .checked_add(output.amount)
                .ok_or(ValidationError::AmountOverflow)?;
        }

        // Any surplus is accepted and has no recipient
        if input_total < output_total {
            return Err(ValidationError::InsufficientInputs {
                inputs: input_total,
                outputs: output_total,
            }
            .into());
        }

        Ok(())
    }

    fn unspent_utxo(&self, address: &str) -> Result<Utxo, ConsensusError> {
        let utxo = self
            .store
            .get_utxo(address)?
            .ok_or_else(|| ValidationError::MissingInput(address.to_string()))?;
        if let Some(spender) = utxo.spending_tx {
            return Err(ValidationError::InputAlreadySpent {
                address: address.to_string(),
                spender,
            }
            .into());
        }
        Ok(utxo)
    }

    /// Accept a mined block, confirming the referenced pooled transactions
    /// and recording the coinbase as confirmed.
    pub fn add_block(
        &self,
        block: &Block,
        coinbase: &Transaction,
        transaction_refs: &[TxId],
    ) -> Result<BlockId, ConsensusError> {
        let _guard = self.write_lock.lock();

        if let Err(e) = self.check_block(block, coinbase, transaction_refs) {
            warn!("Rejected block {}: {}", block.id, e);
            return Err(e);
        }

        let mut confirmed_coinbase = coinbase.clone();
        confirmed_coinbase.block = Some(block.id);

        let mut batch = WriteBatch::new();
        batch
            .add_block(block.clone())
            .confirm_transactions(block.id, transaction_refs.to_vec())
            .add_transaction(confirmed_coinbase);
        self.store.commit(batch)?;

        info!(
            "Accepted block {} ({} transactions, reward {} to {})",
            block.id,
            transaction_refs.len() + 1,
            self.config.coinbase_amount,
            coinbase.outputs[0].address
        );
        Ok(block.id)
    }

    fn check_block(
        &self,
        block: &Block,
        coinbase: &Transaction,
        transaction_refs: &[TxId],
    ) -> Result<(), ConsensusError> {
        // Proof of work
        let actual = block.calculate_hash();
        if actual != block.id {
            return Err(ValidationError::BlockHashMismatch {
                claimed: block.id,
                actual,
            }
            .into());
        }
        if !meets_difficulty(&actual, self.config.difficulty) {
            return Err(ValidationError::InvalidProofOfWork {
                id: actual,
                difficulty: self.config.difficulty,
            }
            .into());
        }
        if self.store.get_block(&block.id)?.is_some() {
            return Err(ValidationError::DuplicateBlock(block.id).into());
        }

        // Ancestry
        match &block.previous {
            Some(previous) => {
                let parent = self.store.get_block(previous)?;
                if parent.map(|p| p.id) != Some(*previous) {
                    return Err(ValidationError::MissingAncestor(*previous).into());
                }
            }
            None => {
                if self.store.latest_block()?.is_some() {
                    return Err(ValidationError::DuplicateGenesis.into());
                }
            }
        }

        // Referenced transactions
        let limit = self.config.max_pooled_per_block();
        if transaction_refs.len() > limit {
            return Err(ValidationError::TooManyTransactions {
                count: transaction_refs.len() + 1,
                limit: self.config.pool_limit,
            }
            .into());
        }

        let mut seen = HashSet::new();
        let mut transactions = Vec::with_capacity(transaction_refs.len());
        for tx_id in transaction_refs {
            if !seen.insert(tx_id) {
                return Err(ValidationError::DuplicateReference(*tx_id).into());
            }
            let tx = self
                .store
                .get_transaction(tx_id)?
                .ok_or(ValidationError::UnknownTransaction(*tx_id))?;
            if let Some(block_id) = tx.block {
                return Err(ValidationError::AlreadyConfirmed {
                    tx: *tx_id,
                    block: block_id,
                }
                .into());
            }
            transactions.push(tx);
        }

        // Merkle commitment
        let root = Block::commitment_root(coinbase, &transactions);
        if root != block.root {
            return Err(ValidationError::MerkleRootMismatch {
                claimed: block.root,
                actual: root,
            }
            .into());
        }

        self.check_coinbase(coinbase)?;
        debug!("Block {} passed validation", block.id);
        Ok(())
    }

    fn check_coinbase(&self, coinbase: &Transaction) -> Result<(), ConsensusError> {
        let invalid = |reason: String| ConsensusError::from(ValidationError::InvalidCoinbase(reason));

        if !coinbase.inputs.is_empty() {
            return Err(invalid(format!("has {} inputs", coinbase.inputs.len())));
        }
        if !coinbase.signatures.is_empty() {
            return Err(invalid(format!("has {} signatures", coinbase.signatures.len())));
        }
        let [output] = coinbase.outputs.as_slice() else {
            return Err(invalid(format!("has {} outputs", coinbase.outputs.len())));
        };
        if address_to_public_key(&output.address).is_err() {
            return Err(ValidationError::InvalidAddress(output.address.clone()).into());
        }
        if output.amount != self.config.coinbase_amount {
            return Err(invalid(format!(
                "reward {} != {}",
                output.amount, self.config.coinbase_amount
            )));
        }
        if !coinbase.verify_id() {
            return Err(invalid("ID does not match content".to_string()));
        }
        if self.store.get_transaction(&coinbase.id)?.is_some() {
            return Err(ValidationError::DuplicateTransaction(coinbase.id).into());
        }
        if self.store.get_utxo(&output.address)?.is_some() {
            return Err(ValidationError::AddressReused(output.address.clone()).into());
        }
        Ok(())
    }

    // =========================================================================
    // Read accessors
    // =========================================================================

    pub fn get_blocks(&self, page: usize, page_size: usize, sort: SortOrder) -> Result<Vec<Block>, StoreError> {
        self.store.get_blocks(page, page_size, sort)
    }

    pub fn get_block(&self, id: &BlockId) -> Result<Option<Block>, StoreError> {
        self.store.get_block(id)
    }

    pub fn get_transactions(
        &self,
        page: usize,
        page_size: usize,
        sort: SortOrder,
        unconfirmed_only: bool,
    ) -> Result<Vec<Transaction>, StoreError> {
        self.store.get_transactions(page, page_size, sort, unconfirmed_only)
    }

    pub fn get_transaction(&self, id: &TxId) -> Result<Option<Transaction>, StoreError> {
        self.store.get_transaction(id)
    }

    pub fn get_utxo(&self, address: &str) -> Result<Option<Utxo>, StoreError> {
        self.store.get_utxo(address)
    }

    pub fn chain_tip(&self) -> Result<Option<Block>, StoreError> {
        self.store.latest_block()
    }
}
