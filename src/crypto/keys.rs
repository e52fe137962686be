//! ECDSA key management for the ledger
//!
//! Addresses are compressed secp256k1 public keys in Base58, so the owner of
//! a UTXO is recoverable from the UTXO's own lookup key.

use rand::rngs::OsRng;
use secp256k1::{ecdsa, Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::hash::Hash256;
use crate::error::ErrorKind;

/// Base58 encoded compressed public key
pub type Address = String;

/// Hex encoded 64-byte compact ECDSA signature
pub type Signature = String;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Invalid extended key: {0}")]
    InvalidExtendedKey(String),
    #[error("Cannot derive hardened child {0} from a public key")]
    HardenedFromPublic(u32),
    #[error("Derived key at index {0} is invalid")]
    InvalidChild(u32),
    #[error("Child index space exhausted")]
    IndexOverflow,
    #[error("BIP-32 error: {0}")]
    Bip32(#[from] bip32::Error),
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

impl KeyError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::KeyDerivation
    }
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::signing_only();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// The one-time address of this key
    pub fn address(&self) -> Address {
        public_key_to_address(&self.public_key)
    }

    /// Sign a message hash with the private key
    pub fn sign(&self, message_hash: &Hash256) -> Result<Signature, KeyError> {
        sign_message(&self.secret_key, message_hash)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Convert a public key to a ledger address
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    bs58::encode(public_key.serialize()).into_string()
}

/// Parse the public key behind an address
pub fn address_to_public_key(address: &str) -> Result<PublicKey, KeyError> {
    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| KeyError::InvalidAddress(e.to_string()))?;
    PublicKey::from_slice(&bytes).map_err(|_| KeyError::InvalidAddress(address.to_string()))
}

/// Sign a message hash with a secret key (RFC 6979, deterministic)
pub fn sign_message(secret_key: &SecretKey, message_hash: &Hash256) -> Result<Signature, KeyError> {
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest_slice(message_hash.as_bytes())?;
    let signature = secp.sign_ecdsa(&message, secret_key);
    Ok(hex::encode(signature.serialize_compact()))
}

/// Verify a signature against the public key behind `address`.
///
/// Never errors: malformed addresses or signatures simply fail verification.
/// Only the lowercase hex form is accepted, since signature text is part of
/// the transaction ID.
pub fn verify_signature(message_hash: &Hash256, address: &str, signature: &str) -> bool {
    let Ok(public_key) = address_to_public_key(address) else {
        return false;
    };
    let Ok(bytes) = hex::decode(signature) else {
        return false;
    };
    if hex::encode(&bytes) != signature {
        return false;
    }
    let Ok(sig) = ecdsa::Signature::from_compact(&bytes) else {
        return false;
    };
    let Ok(message) = Message::from_digest_slice(message_hash.as_bytes()) else {
        return false;
    };

    Secp256k1::verification_only()
        .verify_ecdsa(&message, &sig, &public_key)
        .is_ok()
}
