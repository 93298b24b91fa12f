//! Engine configuration

use crate::Result;
use dexsync_params::NetworkType;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Reconciliation engine configuration
///
/// Every field is defaulted so partial JSON documents are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Transactions requested per history reload
    pub history_page_size: usize,
    /// Capacity of the state-change broadcast channel
    pub event_channel_capacity: usize,
    /// Token addresses whose balances are reloaded on every refresh
    pub reward_tokens: Vec<String>,
    /// Network bound when no extension reports one
    pub default_network: NetworkType,
    /// Deadline for a single token refresh
    pub refresh_timeout_secs: u64,
    /// Number of reconciliation events retained by the logger
    pub log_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_page_size: 50,
            event_channel_capacity: 256,
            reward_tokens: Vec::new(),
            default_network: NetworkType::Mainnet,
            refresh_timeout_secs: 30,
            log_capacity: 512,
        }
    }
}

impl EngineConfig {
    /// Parse from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.history_page_size == 0 {
            return Err(crate::Error::Config(
                "history_page_size must be positive".to_string(),
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::Config(
                "event_channel_capacity must be positive".to_string(),
            ));
        }
        if self.refresh_timeout_secs == 0 {
            return Err(crate::Error::Config(
                "refresh_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Refresh deadline
    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    /// Whether a token address is configured as a reward token
    pub fn is_reward_token(&self, address: &str) -> bool {
        self.reward_tokens
            .iter()
            .any(|reward| reward.eq_ignore_ascii_case(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_uses_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{"default_network":"testnet","reward_tokens":["0xRW"]}"#)
                .unwrap();
        assert_eq!(config.default_network, NetworkType::Testnet);
        assert_eq!(config.history_page_size, 50);
        assert_eq!(config.refresh_timeout(), Duration::from_secs(30));
        assert!(config.is_reward_token("0xrw"));
        assert!(!config.is_reward_token("0xother"));
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let err = EngineConfig::from_json_str(r#"{"history_page_size":0}"#).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"log_capacity": 8}"#).unwrap();
        let config = EngineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.log_capacity, 8);

        let missing = EngineConfig::from_json_file(dir.path().join("missing.json"));
        assert!(missing.is_err());
    }
}
