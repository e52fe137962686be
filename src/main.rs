//! One-Time Ledger CLI Application
//!
//! A command-line interface for interacting with the ledger.

use clap::{Args, Parser, Subcommand};
use one_time_ledger::cli::{self, AppState};
use one_time_ledger::config::LedgerConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ledger")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "A single-node UTXO ledger with one-time addresses", long_about = None)]
struct Cli {
    /// Data directory for ledger storage
    #[arg(short, long, default_value = ".ledger_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Wallet secret and account, read from the environment when not given
#[derive(Args)]
struct SeedArgs {
    /// BIP-39 mnemonic phrase
    #[arg(long, env = "LEDGER_MNEMONIC", hide_env_values = true)]
    mnemonic: String,

    /// BIP-44 account index
    #[arg(long, default_value = "0")]
    account: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new ledger
    Init {
        /// Mining difficulty (leading '1' characters of the block ID)
        #[arg(short, long)]
        difficulty: Option<u32>,

        /// Maximum transactions per block, coinbase included
        #[arg(long)]
        pool_limit: Option<usize>,
    },

    /// Mine new blocks
    Mine {
        #[command(flatten)]
        seed: SeedArgs,

        /// Number of blocks to mine
        #[arg(short, long, default_value = "1")]
        count: u32,
    },

    /// Wallet operations
    Wallet {
        #[command(subcommand)]
        action: WalletCommands,
    },

    /// Send coins to the owner of a receive key
    Send {
        #[command(flatten)]
        seed: SeedArgs,

        /// Recipient's extended public receive key (xpub)
        #[arg(short, long)]
        to: String,

        /// Amount to send
        #[arg(short, long)]
        amount: u64,
    },

    /// Display ledger information
    Chain {
        #[command(subcommand)]
        action: Option<ChainCommands>,
    },

    /// Show a transaction by ID
    Tx { id: String },

    /// Show a block by ID
    Block { id: String },

    /// Show the output record at an address
    Utxo { address: String },
}

#[derive(Subcommand)]
enum WalletCommands {
    /// Generate a new mnemonic
    New,

    /// Print the extended public receive key to share with payers
    Xpub {
        #[command(flatten)]
        seed: SeedArgs,
    },

    /// Show the next unused receive address
    Address {
        #[command(flatten)]
        seed: SeedArgs,
    },

    /// Show wallet balance
    Balance {
        #[command(flatten)]
        seed: SeedArgs,
    },
}

#[derive(Subcommand)]
enum ChainCommands {
    /// Show summary info
    Info,

    /// List blocks, newest first
    Blocks {
        /// Zero-based page
        #[arg(short, long, default_value = "0")]
        page: usize,

        /// Number of blocks to show
        #[arg(short, long, default_value = "10")]
        count: usize,
    },

    /// List transactions, newest first
    Txs {
        /// Zero-based page
        #[arg(short, long, default_value = "0")]
        page: usize,

        /// Number of transactions to show
        #[arg(short, long, default_value = "10")]
        count: usize,

        /// Only show pooled (unconfirmed) transactions
        #[arg(long)]
        pooled: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Commands that don't need an open ledger
    match &cli.command {
        Commands::Init {
            difficulty,
            pool_limit,
        } => return cli::cmd_init(&cli.data_dir, *difficulty, *pool_limit),
        Commands::Wallet {
            action: WalletCommands::New,
        } => {
            let config = LedgerConfig::load_or_default(&cli::config_path(&cli.data_dir))?;
            return cli::cmd_wallet_new(config.coin_type);
        }
        _ => {}
    }

    let state = AppState::new(cli.data_dir.clone())?;

    match cli.command {
        Commands::Init { .. } => unreachable!(),

        Commands::Mine { seed, count } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cli::cmd_mine(&state, &seed.mnemonic, seed.account, count))?;
        }

        Commands::Wallet { action } => match action {
            WalletCommands::New => unreachable!(),
            WalletCommands::Xpub { seed } => {
                cli::cmd_wallet_xpub(&state, &seed.mnemonic, seed.account)?;
            }
            WalletCommands::Address { seed } => {
                cli::cmd_wallet_address(&state, &seed.mnemonic, seed.account)?;
            }
            WalletCommands::Balance { seed } => {
                cli::cmd_wallet_balance(&state, &seed.mnemonic, seed.account)?;
            }
        },

        Commands::Send { seed, to, amount } => {
            cli::cmd_send(&state, &seed.mnemonic, seed.account, &to, amount)?;
        }

        Commands::Chain { action } => match action {
            None | Some(ChainCommands::Info) => {
                cli::cmd_chain_info(&state)?;
            }
            Some(ChainCommands::Blocks { page, count }) => {
                cli::cmd_chain_blocks(&state, page, count)?;
            }
            Some(ChainCommands::Txs { page, count, pooled }) => {
                cli::cmd_chain_transactions(&state, page, count, pooled)?;
            }
        },

        Commands::Tx { id } => cli::cmd_show_transaction(&state, &id)?,
        Commands::Block { id } => cli::cmd_show_block(&state, &id)?,
        Commands::Utxo { address } => cli::cmd_show_utxo(&state, &address)?,
    }

    Ok(())
}
