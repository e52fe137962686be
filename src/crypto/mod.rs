//! Cryptographic utilities for the ledger
//!
//! This module provides:
//! - SHA-256 hashing and the canonical hash writer
//! - ECDSA key management (secp256k1) and addresses
//! - Hierarchical deterministic keys (BIP-32/39/44)
//! - Merkle root calculation

pub mod hash;
pub mod hd;
pub mod keys;
pub mod merkle;

pub use hash::{
    double_sha256, meets_difficulty, sha256, BlockId, Hash256, HashParseError, HashWriter, TxId,
    DIFFICULTY_CHAR,
};
pub use hd::{
    derive_account_root, derive_change_root, derive_receive_root, Chain, ExtendedKey, WalletSeed,
    HARDENED,
};
pub use keys::{
    address_to_public_key, public_key_to_address, sign_message, verify_signature, Address,
    KeyError, KeyPair, Signature,
};
pub use merkle::calculate_merkle_root;
