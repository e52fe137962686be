//! Hierarchical deterministic keys (BIP-32 derivation, BIP-39 seeds)
//!
//! A wallet is a mnemonic phrase. Each account owns two chains under the
//! BIP-44 layout `m/44'/coin'/account'/{0,1}`: receive (0) and change (1).
//! Children of those chains are non-hardened, so anyone holding the public
//! chain root can derive fresh receiving addresses without being able to
//! sign for them.

use bip32::{ChildNumber, DerivationPath, Prefix, XPrv, XPub};
use bip39::Mnemonic;
use secp256k1::{PublicKey, SecretKey};
use std::fmt;
use std::str::FromStr;

use super::keys::{public_key_to_address, Address, KeyError, KeyPair};

/// Offset marking a hardened child index
pub const HARDENED: u32 = 0x8000_0000;

/// BIP-44 purpose field
pub const BIP44_PURPOSE: u32 = 44;

/// Branch of an account: where incoming payments land vs. where change goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chain {
    Receive,
    Change,
}

impl Chain {
    pub fn index(self) -> u32 {
        match self {
            Chain::Receive => 0,
            Chain::Change => 1,
        }
    }
}

// =============================================================================
// Wallet Seed
// =============================================================================

/// The wallet secret. Owned by the caller and passed into every derivation;
/// the library never stores it.
pub struct WalletSeed {
    mnemonic: Mnemonic,
    seed: [u8; 64],
}

impl WalletSeed {
    /// Generate a fresh 12-word mnemonic from OS entropy
    pub fn generate() -> Result<Self, KeyError> {
        let entropy: [u8; 16] = rand::random();
        let mnemonic =
            Mnemonic::from_entropy(&entropy).map_err(|e| KeyError::InvalidMnemonic(e.to_string()))?;
        Ok(Self::from_parsed(mnemonic, ""))
    }

    /// Parse an existing mnemonic phrase
    pub fn from_mnemonic(phrase: &str) -> Result<Self, KeyError> {
        Self::from_mnemonic_with_passphrase(phrase, "")
    }

    pub fn from_mnemonic_with_passphrase(phrase: &str, passphrase: &str) -> Result<Self, KeyError> {
        let mnemonic = Mnemonic::parse_normalized(phrase)
            .map_err(|e| KeyError::InvalidMnemonic(e.to_string()))?;
        Ok(Self::from_parsed(mnemonic, passphrase))
    }

    fn from_parsed(mnemonic: Mnemonic, passphrase: &str) -> Self {
        let seed = mnemonic.to_seed(passphrase);
        Self { mnemonic, seed }
    }

    /// The mnemonic phrase, for display to the wallet owner only
    pub fn phrase(&self) -> String {
        self.mnemonic.to_string()
    }

    pub fn master_key(&self) -> Result<ExtendedKey, KeyError> {
        ExtendedKey::master(&self.seed)
    }

    /// Private key at `path` below the master key
    pub fn derive(&self, path: &DerivationPath) -> Result<ExtendedKey, KeyError> {
        ExtendedKey::from_private(XPrv::derive_from_path(self.seed.as_slice(), path)?)
    }
}

impl fmt::Debug for WalletSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WalletSeed(<redacted>)")
    }
}

/// Root of an account chain: `m/44'/coin'/account'/chain`
pub fn derive_account_root(
    seed: &WalletSeed,
    coin_type: u32,
    account: u32,
    chain: Chain,
) -> Result<ExtendedKey, KeyError> {
    if account >= HARDENED || coin_type >= HARDENED {
        return Err(KeyError::IndexOverflow);
    }
    let path: DerivationPath =
        format!("m/{}'/{}'/{}'/{}", BIP44_PURPOSE, coin_type, account, chain.index()).parse()?;
    seed.derive(&path)
}

pub fn derive_receive_root(seed: &WalletSeed, coin_type: u32, account: u32) -> Result<ExtendedKey, KeyError> {
    derive_account_root(seed, coin_type, account, Chain::Receive)
}

pub fn derive_change_root(seed: &WalletSeed, coin_type: u32, account: u32) -> Result<ExtendedKey, KeyError> {
    derive_account_root(seed, coin_type, account, Chain::Change)
}

// =============================================================================
// Extended Key
// =============================================================================

/// A BIP-32 extended key. Holds the private half when it was derived from
/// the seed, and only the public half after [`ExtendedKey::neuter`] or
/// parsing an xpub.
#[derive(Clone)]
pub struct ExtendedKey {
    xpub: XPub,
    xprv: Option<XPrv>,
    /// `xpub` as a secp256k1 key, for addresses and signing
    public_key: PublicKey,
}

impl ExtendedKey {
    /// Master key from a BIP-39 seed
    pub fn master(seed: &[u8]) -> Result<Self, KeyError> {
        let xprv = XPrv::new(seed).map_err(|e| KeyError::InvalidExtendedKey(e.to_string()))?;
        Self::from_private(xprv)
    }

    fn from_private(xprv: XPrv) -> Result<Self, KeyError> {
        let mut key = Self::from_public(xprv.public_key())?;
        key.xprv = Some(xprv);
        Ok(key)
    }

    fn from_public(xpub: XPub) -> Result<Self, KeyError> {
        let public_key = PublicKey::from_slice(&xpub.to_bytes()).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self {
            xpub,
            xprv: None,
            public_key,
        })
    }

    /// CKD: derive child `index`.
    ///
    /// A private parent yields a private child. A public parent yields a
    /// public child and refuses hardened indices.
    pub fn derive_child(&self, index: u32) -> Result<Self, KeyError> {
        let child_number = ChildNumber(index);
        match &self.xprv {
            Some(xprv) => {
                let child = xprv
                    .derive_child(child_number)
                    .map_err(|_| KeyError::InvalidChild(index))?;
                Self::from_private(child)
            }
            None if child_number.is_hardened() => Err(KeyError::HardenedFromPublic(index)),
            None => {
                let child = self
                    .xpub
                    .derive_child(child_number)
                    .map_err(|_| KeyError::InvalidChild(index))?;
                Self::from_public(child)
            }
        }
    }

    pub fn derive_path(&self, path: &[u32]) -> Result<Self, KeyError> {
        path.iter()
            .try_fold(self.clone(), |key, index| key.derive_child(*index))
    }

    /// Drop the private half
    pub fn neuter(&self) -> Self {
        Self {
            xprv: None,
            ..self.clone()
        }
    }

    pub fn is_private(&self) -> bool {
        self.xprv.is_some()
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn secret_key(&self) -> Option<SecretKey> {
        self.xprv
            .as_ref()
            .and_then(|xprv| SecretKey::from_slice(&xprv.to_bytes()).ok())
    }

    pub fn key_pair(&self) -> Option<KeyPair> {
        self.secret_key().map(|secret_key| KeyPair {
            secret_key,
            public_key: self.public_key,
        })
    }

    pub fn address(&self) -> Address {
        public_key_to_address(&self.public_key)
    }

    pub fn depth(&self) -> u8 {
        self.xpub.attrs().depth
    }

    pub fn child_number(&self) -> u32 {
        self.xpub.attrs().child_number.0
    }

    /// First four bytes of HASH160 of the public key
    pub fn fingerprint(&self) -> [u8; 4] {
        self.xpub.fingerprint()
    }
}

/// Base58Check of the extended *public* key. Secrets are never serialized.
impl fmt::Display for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.xpub.to_string(Prefix::XPUB))
    }
}

impl fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedKey")
            .field("depth", &self.depth())
            .field("child_number", &self.child_number())
            .field("address", &self.address())
            .field("private", &self.is_private())
            .finish()
    }
}

impl FromStr for ExtendedKey {
    type Err = KeyError;

    /// Parses an xpub into a public-only extended key
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let xpub = XPub::from_str(s).map_err(|e| KeyError::InvalidExtendedKey(e.to_string()))?;
        Self::from_public(xpub)
    }
}
