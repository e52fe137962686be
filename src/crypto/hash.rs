//! Cryptographic hashing utilities for the ledger
//!
//! Provides the SHA-256 based digests used for transaction IDs, block IDs
//! and merkle roots, plus the canonical byte writer every hashed structure
//! goes through.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Character a block ID must repeat `difficulty` times at its start.
/// In Base58 a leading `1` encodes a leading zero byte.
pub const DIFFICULTY_CHAR: char = '1';

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes double SHA-256 hash (SHA-256 of SHA-256)
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Error returned when a string is not a Base58 encoded 32-byte hash
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashParseError {
    #[error("Invalid base58: {0}")]
    InvalidEncoding(String),
    #[error("Invalid hash length: {0} bytes (expected 32)")]
    InvalidLength(usize),
}

/// A 32-byte digest, rendered as Base58 text
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256([u8; 32]);

/// Transaction identifier
pub type TxId = Hash256;

/// Block identifier
pub type BlockId = Hash256;

impl Hash256 {
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Double SHA-256 of `data`
    pub fn digest(data: &[u8]) -> Self {
        Self(double_sha256(data))
    }

    /// Number of leading zero bytes (leading `1`s in the Base58 form)
    pub fn leading_zero_bytes(&self) -> usize {
        self.0.iter().take_while(|b| **b == 0).count()
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self)
    }
}

impl FromStr for Hash256 {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| HashParseError::InvalidEncoding(e.to_string()))?;
        let array: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| HashParseError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Checks the proof-of-work predicate: the Base58 form of `hash` must start
/// with `difficulty` copies of [`DIFFICULTY_CHAR`]
pub fn meets_difficulty(hash: &Hash256, difficulty: u32) -> bool {
    let required = difficulty as usize;
    let text = hash.to_string();
    text.len() >= required && text.chars().take(required).all(|c| c == DIFFICULTY_CHAR)
}

/// Length-prefixed canonical encoder feeding a double SHA-256.
///
/// Every field is written with an explicit tag or length so two different
/// structures can never produce the same byte stream.
pub struct HashWriter {
    buf: Vec<u8>,
}

impl HashWriter {
    /// Start a new encoding under a domain tag (`"tx"`, `"block"`, ...)
    pub fn new(domain: &str) -> Self {
        let mut writer = Self { buf: Vec::with_capacity(256) };
        writer.put_str(domain);
        writer
    }

    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn put_u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn put_i64(&mut self, value: i64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.put_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn put_str(&mut self, value: &str) -> &mut Self {
        self.put_bytes(value.as_bytes())
    }

    pub fn put_hash(&mut self, hash: &Hash256) -> &mut Self {
        self.buf.extend_from_slice(hash.as_bytes());
        self
    }

    pub fn put_optional_hash(&mut self, hash: Option<&Hash256>) -> &mut Self {
        match hash {
            Some(h) => {
                self.buf.push(1);
                self.put_hash(h)
            }
            None => {
                self.buf.push(0);
                self
            }
        }
    }

    pub fn finish(&self) -> Hash256 {
        Hash256::digest(&self.buf)
    }
}
