//! Transaction handling for the ledger
//!
//! Inputs are addresses: every address holds at most one output ever, so the
//! address alone identifies the coin being spent. Each input carries a
//! positional signature over the transaction hashed with its signatures
//! cleared; the transaction ID is the hash of the signed structure.

use crate::crypto::{Address, BlockId, Hash256, HashWriter, KeyError, KeyPair, Signature, TxId};
use serde::{Deserialize, Serialize};

// =============================================================================
// Transaction Output
// =============================================================================

/// Transaction output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionOutput {
    /// One-time destination address
    pub address: Address,
    /// Amount of coins
    pub amount: u64,
}

impl TransactionOutput {
    pub fn new(address: impl Into<Address>, amount: u64) -> Self {
        Self {
            address: address.into(),
            amount,
        }
    }
}

// =============================================================================
// UTXO
// =============================================================================

/// Output record kept by the ledger, keyed by its address.
///
/// Records are never deleted: spending sets `spending_tx`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Utxo {
    pub address: Address,
    pub amount: u64,
    /// Transaction that created this output
    pub transaction: TxId,
    /// Block that confirmed the creating transaction
    #[serde(default)]
    pub block: Option<BlockId>,
    /// Transaction that consumed this output
    #[serde(default)]
    pub spending_tx: Option<TxId>,
}

impl Utxo {
    pub fn is_spent(&self) -> bool {
        self.spending_tx.is_some()
    }

    pub fn is_confirmed(&self) -> bool {
        self.block.is_some()
    }

    /// Confirmed and unspent: what the wallet is willing to select
    pub fn is_spendable(&self) -> bool {
        self.is_confirmed() && !self.is_spent()
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// Whether the signature list takes part in a transaction hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureMode {
    /// Final form: the transaction ID
    Included,
    /// Signatures cleared: the message every input signs
    Cleared,
}

/// A ledger transaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    /// Hash of the signed transaction
    pub id: TxId,
    /// Addresses being spent, in signing order
    pub inputs: Vec<Address>,
    pub outputs: Vec<TransactionOutput>,
    /// One signature per input, same position
    pub signatures: Vec<Signature>,
    /// Confirming block, set by the ledger when mined
    #[serde(default)]
    pub block: Option<BlockId>,
}

impl Transaction {
    /// Create an unsigned transaction
    pub fn new(inputs: Vec<Address>, outputs: Vec<TransactionOutput>) -> Self {
        let mut tx = Self {
            id: Hash256::ZERO,
            inputs,
            outputs,
            signatures: Vec::new(),
            block: None,
        };
        tx.id = tx.calculate_hash(SignatureMode::Included);
        tx
    }

    /// Create a coinbase (mining reward) transaction: no inputs, one output
    pub fn coinbase(recipient: &str, amount: u64) -> Self {
        Self::new(Vec::new(), vec![TransactionOutput::new(recipient, amount)])
    }

    /// Canonical transaction hash. `id` and `block` never take part.
    pub fn calculate_hash(&self, mode: SignatureMode) -> Hash256 {
        let mut writer = HashWriter::new("tx");

        writer.put_u32(self.inputs.len() as u32);
        for input in &self.inputs {
            writer.put_str(input);
        }

        writer.put_u32(self.outputs.len() as u32);
        for output in &self.outputs {
            writer.put_str(&output.address).put_u64(output.amount);
        }

        match mode {
            SignatureMode::Included => {
                writer.put_u32(self.signatures.len() as u32);
                for signature in &self.signatures {
                    writer.put_str(signature);
                }
            }
            SignatureMode::Cleared => {
                writer.put_u32(0);
            }
        }

        writer.finish()
    }

    /// The message each input signature commits to
    pub fn signing_hash(&self) -> Hash256 {
        self.calculate_hash(SignatureMode::Cleared)
    }

    /// Sign every input with the matching key (positional) and seal the ID
    pub fn sign(&mut self, keys: &[KeyPair]) -> Result<(), KeyError> {
        let message = self.signing_hash();
        self.signatures = keys
            .iter()
            .map(|key| key.sign(&message))
            .collect::<Result<Vec<_>, _>>()?;
        self.id = self.calculate_hash(SignatureMode::Included);
        Ok(())
    }

    /// True when `id` matches the recomputed hash of the signed structure
    pub fn verify_id(&self) -> bool {
        self.id == self.calculate_hash(SignatureMode::Included)
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn is_confirmed(&self) -> bool {
        self.block.is_some()
    }

    /// Sum of output amounts, `None` on overflow
    pub fn total_output(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, output| acc.checked_add(output.amount))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::verify_signature;

    #[test]
    fn test_coinbase_transaction() {
        let tx = Transaction::coinbase("recipient_address", 50);
        assert!(tx.is_coinbase());
        assert_eq!(tx.total_output(), Some(50));
        assert!(tx.signatures.is_empty());
        assert!(tx.verify_id());
    }

    #[test]
    fn test_transaction_signing() {
        let owner = KeyPair::generate();
        let mut tx = Transaction::new(
            vec![owner.address()],
            vec![TransactionOutput::new("recipient", 40)],
        );
        let unsigned_id = tx.id;

        tx.sign(&[owner.clone()]).unwrap();

        assert_eq!(tx.signatures.len(), 1);
        assert_ne!(tx.id, unsigned_id);
        assert!(tx.verify_id());
        assert!(verify_signature(&tx.signing_hash(), &owner.address(), &tx.signatures[0]));
    }

    #[test]
    fn test_signing_hash_ignores_signatures() {
        let owner = KeyPair::generate();
        let mut tx = Transaction::new(
            vec![owner.address()],
            vec![TransactionOutput::new("recipient", 40)],
        );
        let before = tx.signing_hash();
        tx.sign(&[owner]).unwrap();
        assert_eq!(tx.signing_hash(), before);
        assert_ne!(tx.calculate_hash(SignatureMode::Included), before);
    }

    #[test]
    fn test_block_field_is_not_hashed() {
        let mut tx = Transaction::coinbase("miner", 50);
        let id = tx.id;
        tx.block = Some(Hash256::digest(b"block"));
        assert_eq!(tx.calculate_hash(SignatureMode::Included), id);
    }

    #[test]
    fn test_transaction_hash() {
        let tx1 = Transaction::coinbase("addr1", 50);
        let tx2 = Transaction::coinbase("addr2", 50);
        assert_ne!(tx1.id, tx2.id);
    }

    #[test]
    fn test_total_output_overflow() {
        let tx = Transaction::new(
            vec![],
            vec![
                TransactionOutput::new("a", u64::MAX),
                TransactionOutput::new("b", 1),
            ],
        );
        assert_eq!(tx.total_output(), None);
    }
}
