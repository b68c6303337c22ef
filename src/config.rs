//! Runtime configuration for the chain forest and block authoring

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{CUT_OFF_AGE, DEFAULT_BLOCK_REWARD};
use crate::mining::SelectionPolicy;
use crate::validation::Amount;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cut_off_age must be at least 1")]
    InvalidCutOffAge,
    #[error("block_reward must not be negative, got {0}")]
    NegativeReward(Amount),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// How far behind the tip a branch may still be extended
    #[serde(default = "default_cut_off_age")]
    pub cut_off_age: u64,
    /// Policy used when authoring blocks from the pending pool
    #[serde(default)]
    pub selection_policy: SelectionPolicy,
    /// Coinbase value of authored blocks
    #[serde(default = "default_block_reward")]
    pub block_reward: Amount,
}

fn default_cut_off_age() -> u64 {
    CUT_OFF_AGE
}

fn default_block_reward() -> Amount {
    DEFAULT_BLOCK_REWARD
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            cut_off_age: CUT_OFF_AGE,
            selection_policy: SelectionPolicy::default(),
            block_reward: DEFAULT_BLOCK_REWARD,
        }
    }
}

impl ForestConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cut_off_age == 0 {
            return Err(ConfigError::InvalidCutOffAge);
        }
        if self.block_reward < 0 {
            return Err(ConfigError::NegativeReward(self.block_reward));
        }
        Ok(())
    }
}
