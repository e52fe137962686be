//! Ledger store interface
//!
//! Reads are point lookups and paged scans. Every mutation goes through a
//! [`WriteBatch`] that the store applies all-or-nothing.

use crate::core::{Block, Transaction, Utxo};
use crate::crypto::{Address, BlockId, TxId};
use crate::error::ErrorKind;
use std::io;
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Write conflict: {0}")]
    Conflict(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Store
    }
}

/// Listing order, by insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    OldestFirst,
    NewestFirst,
}

/// A single mutation primitive
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Mark each address's UTXO as consumed by `tx_id`
    Spend { tx_id: TxId, addresses: Vec<Address> },
    /// Store a transaction and create UTXO records for its outputs
    AddTransaction(Transaction),
    /// Attach transactions (and their outputs) to a block
    ConfirmTransactions { block_id: BlockId, tx_ids: Vec<TxId> },
    AddBlock(Block),
}

/// Ordered group of mutations committed as one unit
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spend(&mut self, tx_id: TxId, addresses: Vec<Address>) -> &mut Self {
        self.ops.push(WriteOp::Spend { tx_id, addresses });
        self
    }

    pub fn add_transaction(&mut self, tx: Transaction) -> &mut Self {
        self.ops.push(WriteOp::AddTransaction(tx));
        self
    }

    pub fn confirm_transactions(&mut self, block_id: BlockId, tx_ids: Vec<TxId>) -> &mut Self {
        self.ops.push(WriteOp::ConfirmTransactions { block_id, tx_ids });
        self
    }

    pub fn add_block(&mut self, block: Block) -> &mut Self {
        self.ops.push(WriteOp::AddBlock(block));
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Durable ledger state: UTXOs by address, transactions and blocks by ID
pub trait LedgerStore: Send + Sync {
    fn get_utxo(&self, address: &str) -> Result<Option<Utxo>, StoreError>;

    fn get_block(&self, id: &BlockId) -> Result<Option<Block>, StoreError>;

    /// Zero-based page of blocks
    fn get_blocks(&self, page: usize, page_size: usize, sort: SortOrder) -> Result<Vec<Block>, StoreError>;

    fn get_transaction(&self, id: &TxId) -> Result<Option<Transaction>, StoreError>;

    /// Zero-based page of transactions, optionally only those without a block
    fn get_transactions(
        &self,
        page: usize,
        page_size: usize,
        sort: SortOrder,
        unconfirmed_only: bool,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// Most recently stored block (the chain tip)
    fn latest_block(&self) -> Result<Option<Block>, StoreError>;

    /// Apply every op or none of them
    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}
