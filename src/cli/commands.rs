//! CLI commands for the ledger
//!
//! Implements all command handlers for the CLI interface. The mnemonic is
//! passed in on every call and never written to the data directory.

use crate::config::LedgerConfig;
use crate::core::Validator;
use crate::crypto::{ExtendedKey, Hash256, WalletSeed};
use crate::mining::{Miner, MiningError};
use crate::storage::{JsonStore, LedgerStore, SortOrder, StorageConfig};
use crate::wallet::Wallet;
use log::warn;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Config file name inside the data directory
pub const CONFIG_FILE: &str = "config.json";

pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

/// Application state
pub struct AppState {
    pub store: Arc<JsonStore>,
    pub validator: Validator<JsonStore>,
    pub config: LedgerConfig,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Open the ledger in `data_dir`, creating an empty one if needed
    pub fn new(data_dir: PathBuf) -> CliResult<Self> {
        let config = LedgerConfig::load_or_default(&config_path(&data_dir))?;
        let store = Arc::new(JsonStore::open(StorageConfig {
            data_dir: data_dir.clone(),
            ..Default::default()
        })?);
        let validator = Validator::new(store.clone(), config.clone());

        Ok(Self {
            store,
            validator,
            config,
            data_dir,
        })
    }

    pub fn wallet(&self) -> Wallet<JsonStore> {
        Wallet::new(self.store.clone(), self.config.coin_type)
    }

    pub fn miner(&self) -> Miner<JsonStore> {
        Miner::new(self.store.clone(), self.config.clone())
    }
}

/// Initialize a new ledger
pub fn cmd_init(data_dir: &Path, difficulty: Option<u32>, pool_limit: Option<usize>) -> CliResult<()> {
    let store = JsonStore::open(StorageConfig {
        data_dir: data_dir.to_path_buf(),
        ..Default::default()
    })?;

    if store.exists() {
        println!("⚠️  Ledger already exists at {:?}", data_dir);
        return Ok(());
    }

    let mut config = LedgerConfig::default();
    if let Some(d) = difficulty {
        config.difficulty = d;
    }
    if let Some(limit) = pool_limit {
        config.pool_limit = limit;
    }
    config.save(&config_path(data_dir))?;
    store.flush()?;

    println!("✅ Ledger initialized!");
    println!("   📁 Data directory: {:?}", data_dir);
    println!("   🔧 Difficulty: {}", config.difficulty);
    println!("   📦 Pool limit: {}", config.pool_limit);
    println!("   💰 Block reward: {}", config.coinbase_amount);

    Ok(())
}

/// Generate a new mnemonic and show its first receive key
pub fn cmd_wallet_new(coin_type: u32) -> CliResult<()> {
    let seed = WalletSeed::generate()?;
    let receive = crate::crypto::derive_receive_root(&seed, coin_type, 0)?;

    println!("🔐 New wallet created!");
    println!("   📝 Mnemonic: {}", seed.phrase());
    println!("   📍 Receive key (account 0): {}", receive.neuter());
    println!("\n   ⚠️  IMPORTANT: The mnemonic is not stored anywhere.");
    println!("   Write it down; it is the only way to spend your funds.");

    Ok(())
}

/// Print the public receive root other wallets pay to
pub fn cmd_wallet_xpub(state: &AppState, mnemonic: &str, account: u32) -> CliResult<()> {
    let seed = WalletSeed::from_mnemonic(mnemonic)?;
    let xpub = state.wallet().receive_public_key(&seed, account)?;
    println!("{}", xpub);
    Ok(())
}

/// Show the next unused receive address
pub fn cmd_wallet_address(state: &AppState, mnemonic: &str, account: u32) -> CliResult<()> {
    let seed = WalletSeed::from_mnemonic(mnemonic)?;
    let next = state.wallet().next_receive_address(&seed, account)?;
    println!("📍 Next receive address (index {}): {}", next.index, next.address);
    Ok(())
}

/// Get wallet balance
pub fn cmd_wallet_balance(state: &AppState, mnemonic: &str, account: u32) -> CliResult<()> {
    let seed = WalletSeed::from_mnemonic(mnemonic)?;
    let balance = state.wallet().balance(&seed, account)?;

    println!("💰 Balance for account {}", account);
    println!("   ├─ Confirmed: {} coins", balance.confirmed);
    println!("   └─ Pending: {} coins", balance.pending);

    Ok(())
}

/// Send coins to the owner of a receive key
pub fn cmd_send(state: &AppState, mnemonic: &str, account: u32, to: &str, amount: u64) -> CliResult<()> {
    let seed = WalletSeed::from_mnemonic(mnemonic)?;
    let recipient: ExtendedKey = to.parse()?;

    let tx = state.wallet().create_transaction(&seed, account, &recipient, amount)?;
    state.validator.add_transaction(&tx)?;

    println!("📤 Transaction accepted:");
    println!("   ID: {}", tx.id);
    println!("   Inputs: {}", tx.inputs.len());
    for output in &tx.outputs {
        println!("   └─ {} coins to {}", output.amount, output.address);
    }
    println!("\n   It will be included in the next mined block.");

    Ok(())
}

/// Mine blocks, paying rewards to the account's fresh receive addresses.
///
/// Sealing runs on a blocking thread and stops on Ctrl-C.
pub async fn cmd_mine(state: &AppState, mnemonic: &str, account: u32, count: u32) -> CliResult<()> {
    let seed = WalletSeed::from_mnemonic(mnemonic)?;
    let cancel = CancellationToken::new();

    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    println!("⛏️  Mining {} block(s) for account {}", count, account);
    println!("   Current difficulty: {}", state.config.difficulty);

    for _ in 0..count {
        let miner = state.miner();
        let candidate = miner.assemble(&seed, account)?;
        let reward_address = candidate.reward_address.address.clone();

        let token = cancel.clone();
        let sealed = tokio::task::spawn_blocking(move || miner.seal(candidate, &token)).await?;
        let mined = match sealed {
            Ok(mined) => mined,
            Err(MiningError::Cancelled) => {
                println!("\n📴 Mining cancelled");
                break;
            }
            Err(e) => return Err(e.into()),
        };

        state
            .validator
            .add_block(&mined.block, &mined.coinbase, &mined.transaction_ids)?;

        println!("\n   Block mined!");
        println!("   ├─ ID: {}", mined.block.id);
        println!("   ├─ Transactions: {}", mined.transaction_ids.len() + 1);
        println!("   ├─ Reward to: {}", reward_address);
        println!("   ├─ Time: {}ms", mined.stats.time_ms);
        println!("   ├─ Attempts: {}", mined.stats.hash_attempts);
        println!("   └─ Hash rate: {:.2} H/s", mined.stats.hash_rate);
    }

    watcher.abort();

    let balance = state.wallet().balance(&seed, account)?;
    println!("\n💰 Confirmed balance for miner: {} coins", balance.confirmed);

    Ok(())
}

/// Display ledger info
pub fn cmd_chain_info(state: &AppState) -> CliResult<()> {
    let tip = state.validator.chain_tip()?;
    let pooled = state.store.get_transactions(0, usize::MAX, SortOrder::OldestFirst, true)?;

    println!("⛓️  Ledger Info");
    println!("   ├─ Difficulty: {}", state.config.difficulty);
    println!("   ├─ Pool limit: {}", state.config.pool_limit);
    println!("   ├─ Pooled transactions: {}", pooled.len());
    match tip {
        Some(block) => println!("   └─ Latest block: {}", block.id),
        None => println!("   └─ Latest block: none (mine the genesis block)"),
    }

    Ok(())
}

/// List blocks, newest first
pub fn cmd_chain_blocks(state: &AppState, page: usize, count: usize) -> CliResult<()> {
    let blocks = state.validator.get_blocks(page, count, SortOrder::NewestFirst)?;

    println!("🧱 Blocks (page {}):", page);
    for block in &blocks {
        println!(
            "   {} | nonce {} | {}",
            block.id,
            block.nonce,
            block.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

/// List transactions, newest first
pub fn cmd_chain_transactions(state: &AppState, page: usize, count: usize, unconfirmed: bool) -> CliResult<()> {
    let transactions = state
        .validator
        .get_transactions(page, count, SortOrder::NewestFirst, unconfirmed)?;

    println!("📬 Transactions (page {}):", page);
    for tx in &transactions {
        let status = match &tx.block {
            Some(block) => format!("in {}", block),
            None => "pooled".to_string(),
        };
        println!(
            "   {} | {} in / {} out | {}",
            tx.id,
            tx.inputs.len(),
            tx.outputs.len(),
            status
        );
    }

    Ok(())
}

pub fn cmd_show_transaction(state: &AppState, id: &str) -> CliResult<()> {
    let id: Hash256 = id.parse()?;
    match state.validator.get_transaction(&id)? {
        Some(tx) => println!("{}", serde_json::to_string_pretty(&tx)?),
        None => warn!("Transaction {} not found", id),
    }
    Ok(())
}

pub fn cmd_show_block(state: &AppState, id: &str) -> CliResult<()> {
    let id: Hash256 = id.parse()?;
    match state.validator.get_block(&id)? {
        Some(block) => println!("{}", serde_json::to_string_pretty(&block)?),
        None => warn!("Block {} not found", id),
    }
    Ok(())
}

pub fn cmd_show_utxo(state: &AppState, address: &str) -> CliResult<()> {
    match state.validator.get_utxo(address)? {
        Some(utxo) => println!("{}", serde_json::to_string_pretty(&utxo)?),
        None => warn!("No output at {}", address),
    }
    Ok(())
}
