//! Ledger configuration
//!
//! Consensus parameters are injected into the validator and the miner, never
//! computed by them. The CLI keeps them in `<data_dir>/config.json`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::error::ErrorKind;

/// Default proof-of-work difficulty (leading `1` characters of the block ID)
pub const DEFAULT_DIFFICULTY: u32 = 2;

/// Default maximum transactions per block, coinbase included
pub const DEFAULT_POOL_LIMIT: usize = 100;

/// Block reward in coins
pub const BLOCK_REWARD: u64 = 50;

/// BIP-44 coin type used in account paths
pub const DEFAULT_COIN_TYPE: u32 = 0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Config
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
    #[serde(default = "default_pool_limit")]
    pub pool_limit: usize,
    #[serde(default = "default_coinbase_amount")]
    pub coinbase_amount: u64,
    #[serde(default = "default_coin_type")]
    pub coin_type: u32,
}

fn default_difficulty() -> u32 {
    DEFAULT_DIFFICULTY
}

fn default_pool_limit() -> usize {
    DEFAULT_POOL_LIMIT
}

fn default_coinbase_amount() -> u64 {
    BLOCK_REWARD
}

fn default_coin_type() -> u32 {
    DEFAULT_COIN_TYPE
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            pool_limit: DEFAULT_POOL_LIMIT,
            coinbase_amount: BLOCK_REWARD,
            coin_type: DEFAULT_COIN_TYPE,
        }
    }
}

impl LedgerConfig {
    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            difficulty,
            ..Self::default()
        }
    }

    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty == 0 {
            return Err(ConfigError::Invalid("difficulty must be positive".to_string()));
        }
        if self.pool_limit == 0 {
            return Err(ConfigError::Invalid(
                "pool_limit must leave room for the coinbase".to_string(),
            ));
        }
        if self.coinbase_amount == 0 {
            return Err(ConfigError::Invalid("coinbase_amount must be positive".to_string()));
        }
        Ok(())
    }

    /// Pooled transactions a block may carry besides its coinbase
    pub fn max_pooled_per_block(&self) -> usize {
        self.pool_limit.saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_pooled_per_block(), DEFAULT_POOL_LIMIT - 1);
    }

    #[test]
    fn test_rejects_zero_values() {
        for config in [
            LedgerConfig { difficulty: 0, ..Default::default() },
            LedgerConfig { pool_limit: 0, ..Default::default() },
            LedgerConfig { coinbase_amount: 0, ..Default::default() },
        ] {
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        }
    }

    #[test]
    fn test_save_load_and_partial_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");

        let config = LedgerConfig {
            difficulty: 3,
            pool_limit: 10,
            coinbase_amount: 25,
            coin_type: 1,
        };
        config.save(&path).unwrap();
        assert_eq!(LedgerConfig::load(&path).unwrap(), config);

        fs::write(&path, r#"{ "difficulty": 1 }"#).unwrap();
        let partial = LedgerConfig::load(&path).unwrap();
        assert_eq!(partial.difficulty, 1);
        assert_eq!(partial.coinbase_amount, BLOCK_REWARD);
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = LedgerConfig::load_or_default(&temp_dir.path().join("absent.json")).unwrap();
        assert_eq!(config, LedgerConfig::default());
    }
}
