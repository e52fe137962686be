//! In-memory ledger store
//!
//! Batches are applied in place with an undo journal: when an op fails, the
//! ops before it are rolled back, so a failing batch leaves nothing behind.

use crate::core::{Block, Transaction, Utxo};
use crate::crypto::{Address, BlockId, Hash256, TxId};
use crate::storage::store::{LedgerStore, SortOrder, StoreError, WriteBatch, WriteOp};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Complete ledger contents, serializable as one snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerState {
    utxos: HashMap<Address, Utxo>,
    transactions: HashMap<TxId, Transaction>,
    transaction_order: Vec<TxId>,
    blocks: HashMap<BlockId, Block>,
    block_order: Vec<BlockId>,
}

impl LedgerState {
    pub fn utxo(&self, address: &str) -> Option<&Utxo> {
        self.utxos.get(address)
    }

    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn transaction(&self, id: &TxId) -> Option<&Transaction> {
        self.transactions.get(id)
    }

    pub fn latest_block(&self) -> Option<&Block> {
        self.block_order.last().and_then(|id| self.blocks.get(id))
    }

    pub fn block_count(&self) -> usize {
        self.block_order.len()
    }

    pub fn transaction_count(&self) -> usize {
        self.transaction_order.len()
    }

    pub fn blocks_page(&self, page: usize, page_size: usize, sort: SortOrder) -> Vec<Block> {
        paginate(&self.block_order, page, page_size, sort, |id| self.blocks.get(id).cloned())
    }

    pub fn transactions_page(
        &self,
        page: usize,
        page_size: usize,
        sort: SortOrder,
        unconfirmed_only: bool,
    ) -> Vec<Transaction> {
        paginate(&self.transaction_order, page, page_size, sort, |id| {
            self.transactions
                .get(id)
                .filter(|tx| !unconfirmed_only || !tx.is_confirmed())
                .cloned()
        })
    }

    /// Apply a batch in place, all-or-nothing.
    ///
    /// Each op is checked before it mutates anything. If a later op fails,
    /// the ops before it are rolled back and the error returned. On success
    /// the journal can undo the whole batch.
    pub fn apply(&mut self, batch: WriteBatch) -> Result<Journal, StoreError> {
        let mut journal = Journal::default();
        for op in batch.into_ops() {
            let applied = match op {
                WriteOp::Spend { tx_id, addresses } => self.spend(tx_id, addresses),
                WriteOp::AddTransaction(tx) => self.add_transaction(tx),
                WriteOp::ConfirmTransactions { block_id, tx_ids } => {
                    self.confirm_transactions(block_id, tx_ids)
                }
                WriteOp::AddBlock(block) => self.add_block(block),
            };
            match applied {
                Ok(undo) => journal.0.push(undo),
                Err(e) => {
                    self.rollback(journal);
                    return Err(e);
                }
            }
        }
        Ok(journal)
    }

    /// Undo an applied batch, newest op first
    pub fn rollback(&mut self, journal: Journal) {
        for undo in journal.0.into_iter().rev() {
            match undo {
                Undo::Spend(addresses) => {
                    for address in &addresses {
                        if let Some(utxo) = self.utxos.get_mut(address) {
                            utxo.spending_tx = None;
                        }
                    }
                }
                Undo::AddTransaction(tx_id) => {
                    if let Some(tx) = self.transactions.remove(&tx_id) {
                        for output in &tx.outputs {
                            self.utxos.remove(&output.address);
                        }
                    }
                    self.transaction_order.pop();
                }
                Undo::ConfirmTransactions(tx_ids) => {
                    for tx_id in &tx_ids {
                        if let Some(tx) = self.transactions.get_mut(tx_id) {
                            tx.block = None;
                            for output in &tx.outputs {
                                if let Some(utxo) = self.utxos.get_mut(&output.address) {
                                    utxo.block = None;
                                }
                            }
                        }
                    }
                }
                Undo::AddBlock(block_id) => {
                    self.blocks.remove(&block_id);
                    self.block_order.pop();
                }
            }
        }
    }

    fn spend(&mut self, tx_id: TxId, addresses: Vec<Address>) -> Result<Undo, StoreError> {
        let mut seen = HashSet::new();
        for address in &addresses {
            let utxo = self
                .utxos
                .get(address)
                .ok_or_else(|| StoreError::Conflict(format!("no output at {}", address)))?;
            if let Some(spender) = utxo.spending_tx {
                return Err(StoreError::Conflict(format!(
                    "output at {} already spent by {}",
                    address, spender
                )));
            }
            if !seen.insert(address) {
                return Err(StoreError::Conflict(format!("output at {} spent twice", address)));
            }
        }

        for address in &addresses {
            if let Some(utxo) = self.utxos.get_mut(address) {
                utxo.spending_tx = Some(tx_id);
            }
        }
        Ok(Undo::Spend(addresses))
    }

    fn add_transaction(&mut self, tx: Transaction) -> Result<Undo, StoreError> {
        if self.transactions.contains_key(&tx.id) {
            return Err(StoreError::Conflict(format!("transaction {} exists", tx.id)));
        }
        let mut seen = HashSet::new();
        for output in &tx.outputs {
            if self.utxos.contains_key(&output.address) || !seen.insert(&output.address) {
                return Err(StoreError::Conflict(format!(
                    "address {} already holds an output",
                    output.address
                )));
            }
        }

        for output in &tx.outputs {
            self.utxos.insert(
                output.address.clone(),
                Utxo {
                    address: output.address.clone(),
                    amount: output.amount,
                    transaction: tx.id,
                    block: tx.block,
                    spending_tx: None,
                },
            );
        }

        let tx_id = tx.id;
        self.transaction_order.push(tx_id);
        self.transactions.insert(tx_id, tx);
        Ok(Undo::AddTransaction(tx_id))
    }

    fn confirm_transactions(&mut self, block_id: BlockId, tx_ids: Vec<TxId>) -> Result<Undo, StoreError> {
        let mut seen = HashSet::new();
        for tx_id in &tx_ids {
            let tx = self
                .transactions
                .get(tx_id)
                .ok_or_else(|| StoreError::Conflict(format!("unknown transaction {}", tx_id)))?;
            if let Some(existing) = tx.block {
                return Err(StoreError::Conflict(format!(
                    "transaction {} already confirmed in {}",
                    tx_id, existing
                )));
            }
            if !seen.insert(tx_id) {
                return Err(StoreError::Conflict(format!("transaction {} listed twice", tx_id)));
            }
        }

        for tx_id in &tx_ids {
            if let Some(tx) = self.transactions.get_mut(tx_id) {
                tx.block = Some(block_id);
                for output in &tx.outputs {
                    if let Some(utxo) = self.utxos.get_mut(&output.address) {
                        utxo.block = Some(block_id);
                    }
                }
            }
        }
        Ok(Undo::ConfirmTransactions(tx_ids))
    }

    fn add_block(&mut self, block: Block) -> Result<Undo, StoreError> {
        if self.blocks.contains_key(&block.id) {
            return Err(StoreError::Conflict(format!("block {} exists", block.id)));
        }
        let block_id = block.id;
        self.block_order.push(block_id);
        self.blocks.insert(block_id, block);
        Ok(Undo::AddBlock(block_id))
    }
}

/// Inverse of one applied op
#[derive(Debug)]
enum Undo {
    Spend(Vec<Address>),
    AddTransaction(TxId),
    ConfirmTransactions(Vec<TxId>),
    AddBlock(BlockId),
}

/// Record of an applied batch, enough to roll it back
#[derive(Debug, Default)]
pub struct Journal(Vec<Undo>);

fn paginate<T>(
    order: &[Hash256],
    page: usize,
    page_size: usize,
    sort: SortOrder,
    fetch: impl FnMut(&Hash256) -> Option<T>,
) -> Vec<T> {
    if page_size == 0 {
        return Vec::new();
    }
    let skip = page.saturating_mul(page_size);
    match sort {
        SortOrder::OldestFirst => order.iter().filter_map(fetch).skip(skip).take(page_size).collect(),
        SortOrder::NewestFirst => order
            .iter()
            .rev()
            .filter_map(fetch)
            .skip(skip)
            .take(page_size)
            .collect(),
    }
}

/// Ledger store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<LedgerState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: LedgerState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> LedgerState {
        self.state.read().clone()
    }
}

impl LedgerStore for MemoryStore {
    fn get_utxo(&self, address: &str) -> Result<Option<Utxo>, StoreError> {
        Ok(self.state.read().utxo(address).cloned())
    }

    fn get_block(&self, id: &BlockId) -> Result<Option<Block>, StoreError> {
        Ok(self.state.read().block(id).cloned())
    }

    fn get_blocks(&self, page: usize, page_size: usize, sort: SortOrder) -> Result<Vec<Block>, StoreError> {
        Ok(self.state.read().blocks_page(page, page_size, sort))
    }

    fn get_transaction(&self, id: &TxId) -> Result<Option<Transaction>, StoreError> {
        Ok(self.state.read().transaction(id).cloned())
    }

    fn get_transactions(
        &self,
        page: usize,
        page_size: usize,
        sort: SortOrder,
        unconfirmed_only: bool,
    ) -> Result<Vec<Transaction>, StoreError> {
        Ok(self
            .state
            .read()
            .transactions_page(page, page_size, sort, unconfirmed_only))
    }

    fn latest_block(&self) -> Result<Option<Block>, StoreError> {
        Ok(self.state.read().latest_block().cloned())
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        self.state.write().apply(batch)?;
        Ok(())
    }
}
