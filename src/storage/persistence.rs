//! JSON-file backed ledger store
//!
//! Each commit applies the batch in memory, then writes the snapshot to a
//! temporary file and atomically renames it over the ledger file. If the
//! write fails the batch is rolled back in memory. A crash mid-commit leaves
//! the previous file intact.

use crate::core::{Block, Transaction, Utxo};
use crate::crypto::{BlockId, TxId};
use crate::storage::memory::LedgerState;
use crate::storage::store::{LedgerStore, SortOrder, StoreError, WriteBatch};
use log::{debug, info};
use parking_lot::RwLock;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub ledger_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".ledger_data"),
            ledger_file: "ledger.json".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(&self.ledger_file)
    }

    fn temp_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.tmp", self.ledger_file))
    }
}

/// Ledger store persisted as a single JSON snapshot
#[derive(Debug)]
pub struct JsonStore {
    config: StorageConfig,
    state: RwLock<LedgerState>,
}

impl JsonStore {
    /// Open the store, loading the ledger file when it exists
    pub fn open(config: StorageConfig) -> Result<Self, StoreError> {
        fs::create_dir_all(&config.data_dir)?;

        let path = config.ledger_path();
        let state = if path.exists() {
            let reader = BufReader::new(fs::File::open(&path)?);
            let state: LedgerState = serde_json::from_reader(reader)?;
            info!(
                "Loaded ledger from {:?} ({} blocks, {} transactions)",
                path,
                state.block_count(),
                state.transaction_count()
            );
            state
        } else {
            LedgerState::default()
        };

        Ok(Self {
            config,
            state: RwLock::new(state),
        })
    }

    /// Check if a saved ledger exists
    pub fn exists(&self) -> bool {
        self.config.ledger_path().exists()
    }

    /// Write the current state to disk (creates the file for a fresh ledger)
    pub fn flush(&self) -> Result<(), StoreError> {
        let state = self.state.read();
        self.persist(&state)
    }

    fn persist(&self, state: &LedgerState) -> Result<(), StoreError> {
        let temp_path = self.config.temp_path();
        let mut writer = BufWriter::new(fs::File::create(&temp_path)?);
        serde_json::to_writer(&mut writer, state)?;
        writer.flush()?;
        writer
            .into_inner()
            .map_err(|e| StoreError::IoError(e.into_error()))?
            .sync_all()?;

        // Atomic rename
        fs::rename(&temp_path, self.config.ledger_path())?;
        debug!("Persisted ledger to {:?}", self.config.ledger_path());
        Ok(())
    }
}

impl LedgerStore for JsonStore {
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
        let mut state = self.state.write();
        let journal = state.apply(batch)?;
        if let Err(e) = self.persist(&state) {
            state.rollback(journal);
            return Err(e);
        }
        Ok(())
    }
}
