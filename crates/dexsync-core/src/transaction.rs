//! Tracked transactions

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transaction status as reported by the ledger client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// Submitted, not yet included
    Pending,
    /// Included and successful
    Confirmed,
    /// Rejected before inclusion
    Rejected,
    /// Included but reverted
    Failed,
    /// Status could not be determined
    Unknown,
}

impl TxStatus {
    /// Whether the status will not change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Rejected | Self::Failed)
    }

    /// Lower-case name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TxStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "confirmed" | "success" => Ok(Self::Confirmed),
            "rejected" => Ok(Self::Rejected),
            "failed" | "error" => Ok(Self::Failed),
            "unknown" => Ok(Self::Unknown),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }
}

/// A submitted operation watched to completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedTransaction {
    /// Transaction hash (unique key, lower-case)
    pub hash: String,
    /// Current status
    pub status: TxStatus,
    /// Receipt payload from the ledger client
    pub receipt: Option<serde_json::Value>,
    /// Sender, when known from history
    pub from: Option<String>,
    /// Unix timestamp (seconds), when known from history
    pub timestamp: Option<i64>,
}

impl TrackedTransaction {
    /// New record in the given status
    pub fn new(hash: &str, status: TxStatus) -> Self {
        Self {
            hash: normalize_hash(hash),
            status,
            receipt: None,
            from: None,
            timestamp: None,
        }
    }

    /// Whether this record has the given hash
    pub fn matches(&self, hash: &str) -> bool {
        self.hash == normalize_hash(hash)
    }
}

/// Normalize a transaction hash for keying
pub fn normalize_hash(hash: &str) -> String {
    hash.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(TxStatus::Confirmed.is_terminal());
        assert!(TxStatus::Rejected.is_terminal());
        assert!(TxStatus::Failed.is_terminal());
        assert!(!TxStatus::Pending.is_terminal());
        assert!(!TxStatus::Unknown.is_terminal());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("Confirmed".parse::<TxStatus>().unwrap(), TxStatus::Confirmed);
        assert_eq!("success".parse::<TxStatus>().unwrap(), TxStatus::Confirmed);
        assert!("bogus".parse::<TxStatus>().is_err());
    }

    #[test]
    fn test_hash_is_case_insensitive() {
        let tx = TrackedTransaction::new("0xHASH1", TxStatus::Pending);
        assert_eq!(tx.hash, "0xhash1");
        assert!(tx.matches("0xHash1"));
    }
}
