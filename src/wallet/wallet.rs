//! HD wallet for the ledger
//!
//! Derives one-time addresses from a caller-owned [`WalletSeed`], selects
//! coins from the account's receive and change chains, and builds signed
//! transactions. Nothing here writes to the store.

use crate::core::{Transaction, TransactionOutput, Utxo};
use crate::crypto::{
    derive_change_root, derive_receive_root, ExtendedKey, KeyError, KeyPair, WalletSeed, HARDENED,
};
use crate::error::ErrorKind;
use crate::storage::{LedgerStore, StoreError};
use crate::wallet::addresses::{select_next_unused, ChildAddress};
use log::{debug, info};
use std::sync::Arc;
use thiserror::Error;

/// Wallet-related errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },
    #[error("Invalid amount: {0}")]
    InvalidAmount(u64),
    #[error("Key error: {0}")]
    Key(#[from] KeyError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletError::InsufficientFunds { .. } | WalletError::InvalidAmount(_) => ErrorKind::Client,
            WalletError::Key(e) => e.kind(),
            WalletError::Store(e) => e.kind(),
        }
    }
}

/// Receive and change chain roots of one account
#[derive(Debug, Clone)]
pub struct AccountKeys {
    pub receive: ExtendedKey,
    pub change: ExtendedKey,
}

/// Account balance split by confirmation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balance {
    /// Confirmed, unspent
    pub confirmed: u64,
    /// Unspent but not yet in a block
    pub pending: u64,
}

impl Balance {
    pub fn total(&self) -> u64 {
        self.confirmed.saturating_add(self.pending)
    }
}

/// An output record at one of the account's derived addresses
#[derive(Debug, Clone)]
struct OwnedOutput {
    key: ExtendedKey,
    utxo: Utxo,
}

/// Wallet bound to a ledger store
pub struct Wallet<S: LedgerStore> {
    store: Arc<S>,
    coin_type: u32,
}

impl<S: LedgerStore> Wallet<S> {
    pub fn new(store: Arc<S>, coin_type: u32) -> Self {
        Self { store, coin_type }
    }

    pub fn account_keys(&self, seed: &WalletSeed, account: u32) -> Result<AccountKeys, WalletError> {
        Ok(AccountKeys {
            receive: derive_receive_root(seed, self.coin_type, account)?,
            change: derive_change_root(seed, self.coin_type, account)?,
        })
    }

    /// Public receive root, shared with payers so they can derive fresh
    /// addresses for this account
    pub fn receive_public_key(&self, seed: &WalletSeed, account: u32) -> Result<ExtendedKey, WalletError> {
        Ok(derive_receive_root(seed, self.coin_type, account)?.neuter())
    }

    /// Issue the next unused receive address
    pub fn next_receive_address(&self, seed: &WalletSeed, account: u32) -> Result<ChildAddress, WalletError> {
        let receive = derive_receive_root(seed, self.coin_type, account)?;
        select_next_unused(&receive, self.store.as_ref())
    }

    pub fn balance(&self, seed: &WalletSeed, account: u32) -> Result<Balance, WalletError> {
        let keys = self.account_keys(seed, account)?;
        let mut balance = Balance::default();

        for owned in self.owned_outputs(&keys)? {
            if owned.utxo.is_spent() {
                continue;
            }
            let bucket = if owned.utxo.is_confirmed() {
                &mut balance.confirmed
            } else {
                &mut balance.pending
            };
            *bucket = bucket.saturating_add(owned.utxo.amount);
        }

        Ok(balance)
    }

    /// Build and sign a payment of `amount` to the owner of `recipient`.
    ///
    /// `recipient` is the payee's receive root (public is enough). The
    /// returned transaction still has to be submitted to the validator.
    pub fn create_transaction(
        &self,
        seed: &WalletSeed,
        account: u32,
        recipient: &ExtendedKey,
        amount: u64,
    ) -> Result<Transaction, WalletError> {
        if amount == 0 {
            return Err(WalletError::InvalidAmount(amount));
        }

        let keys = self.account_keys(seed, account)?;

        // Select confirmed, unspent outputs until the amount is covered
        let mut inputs = Vec::new();
        let mut signers: Vec<KeyPair> = Vec::new();
        let mut total = 0u64;

        for owned in self.owned_outputs(&keys)? {
            if total >= amount {
                break;
            }
            if !owned.utxo.is_spendable() {
                continue;
            }
            let key_pair = owned.key.key_pair().ok_or(KeyError::InvalidPrivateKey)?;
            total = total
                .checked_add(owned.utxo.amount)
                .ok_or(WalletError::InvalidAmount(amount))?;
            inputs.push(owned.utxo.address);
            signers.push(key_pair);
        }

        if total < amount {
            return Err(WalletError::InsufficientFunds {
                have: total,
                need: amount,
            });
        }

        let payee = select_next_unused(recipient, self.store.as_ref())?;
        let mut outputs = vec![TransactionOutput::new(payee.address, amount)];

        let change = total - amount;
        if change > 0 {
            let change_address = select_next_unused(&keys.change, self.store.as_ref())?;
            debug!("Change {} to index {}", change, change_address.index);
            outputs.push(TransactionOutput::new(change_address.address, change));
        }

        let mut tx = Transaction::new(inputs, outputs);
        tx.sign(&signers)?;

        info!(
            "Built transaction {} paying {} ({} inputs, change {})",
            tx.id,
            amount,
            tx.inputs.len(),
            change
        );
        Ok(tx)
    }

    /// Every output record at the account's addresses, scanning the receive
    /// and change chains in lockstep until an index is empty on both.
    fn owned_outputs(&self, keys: &AccountKeys) -> Result<Vec<OwnedOutput>, WalletError> {
        let mut owned = Vec::new();

        for index in 0..HARDENED {
            let mut found = false;
            for root in [&keys.receive, &keys.change] {
                let key = root.derive_child(index)?;
                if let Some(utxo) = self.store.get_utxo(&key.address())? {
                    found = true;
                    owned.push(OwnedOutput { key, utxo });
                }
            }
            if !found && index > 0 {
                break;
            }
        }

        Ok(owned)
    }
}
