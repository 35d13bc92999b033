use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD, HASH_HEX_SIZE};
use crate::{LedgerError, MiningStrategy};

/// Construction parameters for a [`crate::Ledger`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Number of leading `'0'` hex digits a sealed block hash must carry.
    pub difficulty: usize,
    /// Base units paid to the miner of each block.
    pub mining_reward: u64,
    pub mining: MiningStrategy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: DEFAULT_MINING_REWARD,
            mining: MiningStrategy::default(),
        }
    }
}

impl LedgerConfig {
    pub fn new(difficulty: usize, mining_reward: u64) -> Self {
        Self {
            difficulty,
            mining_reward,
            ..Self::default()
        }
    }

    /// Load a JSON config file. Missing keys fall back to the defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading ledger config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing ledger config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.difficulty > HASH_HEX_SIZE {
            return Err(LedgerError::InvalidDifficulty(self.difficulty));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = LedgerConfig::default();
        assert_eq!(config.difficulty, DEFAULT_DIFFICULTY);
        assert_eq!(config.mining_reward, DEFAULT_MINING_REWARD);
        assert_eq!(config.mining, MiningStrategy::Sequential);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_difficulty_longer_than_hash() {
        assert_eq!(
            LedgerConfig::new(65, 10).validate(),
            Err(LedgerError::InvalidDifficulty(65))
        );
        assert!(LedgerConfig::new(64, 10).validate().is_ok());
    }

    #[test]
    fn loads_partial_file_over_defaults() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, r#"{{"difficulty": 2, "mining": "parallel"}}"#)?;
        let config = LedgerConfig::from_file(file.path())?;
        assert_eq!(config.difficulty, 2);
        assert_eq!(config.mining, MiningStrategy::Parallel);
        assert_eq!(config.mining_reward, DEFAULT_MINING_REWARD);
        Ok(())
    }

    #[test]
    fn invalid_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"difficulty": 99}}"#).unwrap();
        let err = LedgerConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("99"));

        let missing = LedgerConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(missing.to_string().contains("reading ledger config"));
    }
}
