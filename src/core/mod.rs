//! Core ledger components
//!
//! - Transactions and unspent outputs (one output per address)
//! - Blocks (header-only, committing to transactions by merkle root)
//! - The consensus validator, sole writer of ledger state

pub mod block;
pub mod transaction;
pub mod validator;

pub use block::Block;
pub use transaction::{SignatureMode, Transaction, TransactionOutput, Utxo};
pub use validator::{ConsensusError, ValidationError, Validator};
