//! One-time address selection
//!
//! An address may hold at most one output over the life of the ledger, so
//! a fresh address is the first child of a chain root whose address the
//! store has never seen.

use crate::crypto::{Address, ExtendedKey, KeyError, HARDENED};
use crate::storage::LedgerStore;
use crate::wallet::wallet::WalletError;
use log::debug;

/// A derived child address and its index under the parent key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildAddress {
    pub index: u32,
    pub address: Address,
}

/// First non-hardened child of `parent` with no UTXO record, spent or not.
///
/// Works on public-only keys, so a payer can call it with the recipient's
/// published receive root.
pub fn select_next_unused<S: LedgerStore + ?Sized>(
    parent: &ExtendedKey,
    store: &S,
) -> Result<ChildAddress, WalletError> {
    for index in 0..HARDENED {
        let address = parent.derive_child(index)?.address();
        if store.get_utxo(&address)?.is_none() {
            debug!("Next unused address at index {}: {}", index, address);
            return Ok(ChildAddress { index, address });
        }
    }
    Err(KeyError::IndexOverflow.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transaction;
    use crate::crypto::{derive_receive_root, WalletSeed};
    use crate::storage::{MemoryStore, WriteBatch};

    const PHRASE: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn fund(store: &MemoryStore, address: &str) {
        let mut batch = WriteBatch::new();
        batch.add_transaction(Transaction::coinbase(address, 10));
        store.commit(batch).unwrap();
    }

    #[test]
    fn test_first_index_on_empty_store() {
        let seed = WalletSeed::from_mnemonic(PHRASE).unwrap();
        let root = derive_receive_root(&seed, 0, 0).unwrap();
        let store = MemoryStore::new();

        let next = select_next_unused(&root, &store).unwrap();
        assert_eq!(next.index, 0);
        assert_eq!(next.address, root.derive_child(0).unwrap().address());
    }

    #[test]
    fn test_skips_used_addresses_from_public_root() {
        let seed = WalletSeed::from_mnemonic(PHRASE).unwrap();
        let root = derive_receive_root(&seed, 0, 0).unwrap();
        let public = root.neuter();
        let store = MemoryStore::new();

        fund(&store, &root.derive_child(0).unwrap().address());
        fund(&store, &root.derive_child(1).unwrap().address());

        let next = select_next_unused(&public, &store).unwrap();
        assert_eq!(next.index, 2);
        assert_eq!(next.address, root.derive_child(2).unwrap().address());
    }
}
