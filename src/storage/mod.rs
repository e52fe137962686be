//! Storage module for ledger state

pub mod memory;
pub mod persistence;
pub mod store;

pub use memory::{Journal, LedgerState, MemoryStore};
pub use persistence::{JsonStore, StorageConfig};
pub use store::{LedgerStore, SortOrder, StoreError, WriteBatch, WriteOp};
