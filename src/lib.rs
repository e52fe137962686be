//! One-Time Ledger: a single-node UTXO ledger in Rust
//!
//! This crate provides:
//! - A UTXO model where every address receives exactly one output
//! - HD wallets (BIP-32/39/44) that derive a fresh address per payment
//! - ECDSA digital signatures (secp256k1)
//! - Proof of Work mining with a cancellable, resumable nonce search
//! - A consensus validator that commits each accepted change atomically
//! - In-memory and JSON-file ledger stores
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use one_time_ledger::{LedgerConfig, MemoryStore, Miner, Validator, Wallet, WalletSeed};
//! use tokio_util::sync::CancellationToken;
//!
//! let store = Arc::new(MemoryStore::new());
//! let config = LedgerConfig::with_difficulty(1);
//! let validator = Validator::new(store.clone(), config.clone());
//!
//! // Mine the genesis block to a fresh wallet
//! let seed = WalletSeed::generate().unwrap();
//! let miner = Miner::new(store.clone(), config.clone());
//! let mined = miner.mine(&seed, 0, &CancellationToken::new()).unwrap();
//! validator
//!     .add_block(&mined.block, &mined.coinbase, &mined.transaction_ids)
//!     .unwrap();
//!
//! // Check balance
//! let wallet = Wallet::new(store.clone(), config.coin_type);
//! let balance = wallet.balance(&seed, 0).unwrap();
//! println!("Balance: {} coins", balance.confirmed);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod crypto;
pub mod error;
pub mod mining;
pub mod storage;
pub mod wallet;

// Re-export commonly used types
pub use config::{LedgerConfig, BLOCK_REWARD, DEFAULT_DIFFICULTY};
pub use core::{Block, ConsensusError, Transaction, TransactionOutput, Utxo, ValidationError, Validator};
pub use crypto::{ExtendedKey, Hash256, KeyPair, WalletSeed};
pub use error::ErrorKind;
pub use mining::{Miner, MiningError};
pub use storage::{JsonStore, LedgerStore, MemoryStore, SortOrder};
pub use wallet::{Wallet, WalletError};
