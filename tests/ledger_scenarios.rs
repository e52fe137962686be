//! End-to-end scenarios across wallet, miner, validator and store

use one_time_ledger::crypto::{derive_change_root, derive_receive_root, meets_difficulty};
use one_time_ledger::mining::MiningError;
use one_time_ledger::storage::{JsonStore, StorageConfig};
use one_time_ledger::{
    Block, ErrorKind, LedgerConfig, LedgerStore, MemoryStore, Miner, Transaction, ValidationError,
    Validator, Wallet, WalletSeed,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const ALICE: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
const BOB: &str = "legal winner thank year wave sausage worth useful legal winner thank yellow";

struct Ledger<S: LedgerStore> {
    store: Arc<S>,
    validator: Validator<S>,
    miner: Miner<S>,
    wallet: Wallet<S>,
}

impl<S: LedgerStore> Ledger<S> {
    fn new(store: Arc<S>, config: LedgerConfig) -> Self {
        Self {
            validator: Validator::new(store.clone(), config.clone()),
            miner: Miner::new(store.clone(), config.clone()),
            wallet: Wallet::new(store.clone(), config.coin_type),
            store,
        }
    }

    fn mine(&self, seed: &WalletSeed) -> Block {
        let mined = self.miner.mine(seed, 0, &CancellationToken::new()).unwrap();
        self.validator
            .add_block(&mined.block, &mined.coinbase, &mined.transaction_ids)
            .unwrap();
        mined.block
    }
}

fn memory_ledger(coinbase_amount: u64) -> Ledger<MemoryStore> {
    let config = LedgerConfig {
        difficulty: 1,
        coinbase_amount,
        ..Default::default()
    };
    Ledger::new(Arc::new(MemoryStore::new()), config)
}

#[test]
fn test_spend_150_as_100_plus_change() {
    let ledger = memory_ledger(150);
    let alice = WalletSeed::from_mnemonic(ALICE).unwrap();
    let bob = WalletSeed::from_mnemonic(BOB).unwrap();

    ledger.mine(&alice);
    let source = derive_receive_root(&alice, 0, 0).unwrap().derive_child(0).unwrap().address();
    assert_eq!(ledger.store.get_utxo(&source).unwrap().unwrap().amount, 150);

    let bob_root = ledger.wallet.receive_public_key(&bob, 0).unwrap();
    let tx = ledger.wallet.create_transaction(&alice, 0, &bob_root, 100).unwrap();

    assert_eq!(tx.inputs, vec![source.clone()]);
    assert_eq!(tx.signatures.len(), 1);
    assert_eq!(tx.outputs.len(), 2);
    assert_eq!(tx.outputs[0].address, bob_root.derive_child(0).unwrap().address());
    assert_eq!(tx.outputs[0].amount, 100);
    let change = derive_change_root(&alice, 0, 0).unwrap().derive_child(0).unwrap().address();
    assert_eq!(tx.outputs[1].address, change);
    assert_eq!(tx.outputs[1].amount, 50);

    ledger.validator.add_transaction(&tx).unwrap();
    let spent = ledger.store.get_utxo(&source).unwrap().unwrap();
    assert_eq!(spent.spending_tx, Some(tx.id));

    // Confirm it and check both sides
    ledger.mine(&alice);
    assert_eq!(ledger.wallet.balance(&bob, 0).unwrap().confirmed, 100);
    // Change plus the second block's reward
    assert_eq!(ledger.wallet.balance(&alice, 0).unwrap().confirmed, 50 + 150);
}

#[test]
fn test_double_spend_leaves_ledger_unchanged() {
    let ledger = memory_ledger(50);
    let alice = WalletSeed::from_mnemonic(ALICE).unwrap();
    let bob = WalletSeed::from_mnemonic(BOB).unwrap();
    ledger.mine(&alice);

    let bob_root = ledger.wallet.receive_public_key(&bob, 0).unwrap();
    // Two builds before either is submitted pick the same coin
    let first = ledger.wallet.create_transaction(&alice, 0, &bob_root, 20).unwrap();
    let second = ledger.wallet.create_transaction(&alice, 0, &bob_root, 30).unwrap();
    assert_eq!(first.inputs, second.inputs);

    ledger.validator.add_transaction(&first).unwrap();
    let pooled_before = ledger
        .store
        .get_transactions(0, 100, Default::default(), true)
        .unwrap();

    let err = ledger.validator.add_transaction(&second).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let pooled_after = ledger
        .store
        .get_transactions(0, 100, Default::default(), true)
        .unwrap();
    assert_eq!(pooled_before, pooled_after);
    assert!(ledger.store.get_transaction(&second.id).unwrap().is_none());
}

#[test]
fn test_addresses_are_never_reused() {
    let ledger = memory_ledger(50);
    let alice = WalletSeed::from_mnemonic(ALICE).unwrap();
    let bob = WalletSeed::from_mnemonic(BOB).unwrap();
    let bob_root = ledger.wallet.receive_public_key(&bob, 0).unwrap();

    for _ in 0..3 {
        ledger.mine(&alice);
    }
    let mut seen = std::collections::HashSet::new();
    for _ in 0..3 {
        let tx = ledger.wallet.create_transaction(&alice, 0, &bob_root, 10).unwrap();
        ledger.validator.add_transaction(&tx).unwrap();
        for output in &tx.outputs {
            assert!(seen.insert(output.address.clone()));
        }
        ledger.mine(&alice);
    }

    assert_eq!(ledger.wallet.balance(&bob, 0).unwrap().confirmed, 30);
}

#[test]
fn test_difficulty_two_requires_double_prefix() {
    let config = LedgerConfig::with_difficulty(2);
    let ledger = Ledger::new(Arc::new(MemoryStore::new()), config);
    let alice = WalletSeed::from_mnemonic(ALICE).unwrap();

    let candidate = ledger.miner.assemble(&alice, 0).unwrap();

    // A nonce giving a single leading '1' is not enough
    let mut weak = candidate.block.clone();
    while !(meets_difficulty(&weak.id, 1) && !meets_difficulty(&weak.id, 2)) {
        weak.set_nonce(weak.nonce + 1);
    }
    assert!(weak.id.to_string().starts_with('1'));
    let err = ledger
        .validator
        .add_block(&weak, &candidate.coinbase, &candidate.transaction_ids)
        .unwrap_err();
    assert!(matches!(err.validation(), Some(ValidationError::InvalidProofOfWork { .. })));

    let mined = ledger.miner.seal(candidate, &CancellationToken::new()).unwrap();
    assert!(mined.block.id.to_string().starts_with("11"));
    ledger
        .validator
        .add_block(&mined.block, &mined.coinbase, &mined.transaction_ids)
        .unwrap();
}

#[test]
fn test_duplicate_confirmation_rejected() {
    let ledger = memory_ledger(50);
    let alice = WalletSeed::from_mnemonic(ALICE).unwrap();
    let bob = WalletSeed::from_mnemonic(BOB).unwrap();
    ledger.mine(&alice);

    let bob_root = ledger.wallet.receive_public_key(&bob, 0).unwrap();
    let tx = ledger.wallet.create_transaction(&alice, 0, &bob_root, 10).unwrap();
    ledger.validator.add_transaction(&tx).unwrap();
    let confirming = ledger.mine(&alice);

    // A second block that claims the same transaction
    let coinbase = Transaction::coinbase(&bob_root.derive_child(1).unwrap().address(), 50);
    let mut block = Block::new(
        Some(confirming.id),
        Block::commitment_root(&coinbase, &[tx.clone()]),
        chrono::Utc::now(),
    );
    while !block.is_valid_pow(1) {
        block.set_nonce(block.nonce + 1);
    }

    let err = ledger.validator.add_block(&block, &coinbase, &[tx.id]).unwrap_err();
    assert_eq!(
        err.validation(),
        Some(&ValidationError::AlreadyConfirmed {
            tx: tx.id,
            block: confirming.id
        })
    );
}

#[test]
fn test_cancelled_mining_returns_cancelled() {
    let config = LedgerConfig::with_difficulty(32);
    let ledger = Ledger::new(Arc::new(MemoryStore::new()), config);
    let alice = WalletSeed::from_mnemonic(ALICE).unwrap();

    let cancel = CancellationToken::new();
    let candidate = ledger.miner.assemble(&alice, 0).unwrap();
    let token = cancel.clone();
    let handle = std::thread::spawn(move || ledger.miner.seal(candidate, &token));
    cancel.cancel();

    let result = handle.join().unwrap();
    assert!(matches!(result, Err(MiningError::Cancelled)));
}

#[test]
fn test_json_store_survives_restart() {
    let temp_dir = tempfile::tempdir().unwrap();
    let storage = StorageConfig {
        data_dir: temp_dir.path().to_path_buf(),
        ..Default::default()
    };
    let config = LedgerConfig::with_difficulty(1);
    let alice = WalletSeed::from_mnemonic(ALICE).unwrap();

    let tip = {
        let ledger = Ledger::new(Arc::new(JsonStore::open(storage.clone()).unwrap()), config.clone());
        ledger.mine(&alice);
        ledger.mine(&alice)
    };

    let reopened = Ledger::new(Arc::new(JsonStore::open(storage).unwrap()), config);
    assert_eq!(reopened.validator.chain_tip().unwrap(), Some(tip));
    assert_eq!(reopened.wallet.balance(&alice, 0).unwrap().confirmed, 100);
    assert_eq!(reopened.miner.assemble(&alice, 0).unwrap().reward_address.index, 2);
}
