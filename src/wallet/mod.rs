//! Wallet module: one-time addresses and transaction building

pub mod addresses;
pub mod wallet;

pub use addresses::{select_next_unused, ChildAddress};
pub use wallet::{AccountKeys, Balance, Wallet, WalletError};
