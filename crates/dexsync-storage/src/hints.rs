//! Session hint model and storage contract

use crate::Result;
use dexsync_core::RawCredential;

/// Hints read at startup to resume the previous wallet session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionHints {
    /// Stored raw credential
    pub raw_credential: Option<RawCredential>,
    /// The previous session used a browser-extension wallet
    pub extension_connected: bool,
}

impl SessionHints {
    /// Stored credential, ignoring blank values
    pub fn credential(&self) -> Option<&RawCredential> {
        self.raw_credential.as_ref().filter(|c| !c.is_empty())
    }

    /// Whether nothing was stored
    pub fn is_empty(&self) -> bool {
        self.credential().is_none() && !self.extension_connected
    }
}

/// Read/write access to persisted session hints
pub trait SessionStore: Send + Sync {
    /// Load current hints
    fn load(&self) -> Result<SessionHints>;

    /// Store or clear the raw credential
    fn set_credential(&self, credential: Option<&RawCredential>) -> Result<()>;

    /// Store the extension-connected flag
    fn set_extension_connected(&self, connected: bool) -> Result<()>;

    /// Clear every stored wallet field
    fn clear(&self) -> Result<()> {
        self.set_credential(None)?;
        self.set_extension_connected(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_credential_is_ignored() {
        let hints = SessionHints {
            raw_credential: Some(RawCredential::new("  ")),
            extension_connected: false,
        };
        assert!(hints.credential().is_none());
        assert!(hints.is_empty());
    }

    #[test]
    fn test_extension_flag_alone_is_not_empty() {
        let hints = SessionHints {
            raw_credential: None,
            extension_connected: true,
        };
        assert!(!hints.is_empty());
    }
}
