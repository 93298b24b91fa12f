//! In-memory session hints.
//!
//! Hints are held only for the lifetime of the process and are never persisted.

use crate::hints::{SessionHints, SessionStore};
use crate::Result;
use dexsync_core::RawCredential;
use parking_lot::RwLock;

/// Process-lifetime session hint store
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    hints: RwLock<SessionHints>,
}

impl MemorySessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with hints
    pub fn with_hints(hints: SessionHints) -> Self {
        Self {
            hints: RwLock::new(hints),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<SessionHints> {
        Ok(self.hints.read().clone())
    }

    fn set_credential(&self, credential: Option<&RawCredential>) -> Result<()> {
        self.hints.write().raw_credential = credential.cloned();
        Ok(())
    }

    fn set_extension_connected(&self, connected: bool) -> Result<()> {
        self.hints.write().extension_connected = connected;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_clear() {
        let store = MemorySessionStore::new();
        assert!(store.load().unwrap().is_empty());

        store
            .set_credential(Some(&RawCredential::new("0x01")))
            .unwrap();
        store.set_extension_connected(true).unwrap();
        let hints = store.load().unwrap();
        assert_eq!(hints.credential().map(|c| c.expose()), Some("0x01"));
        assert!(hints.extension_connected);

        store.clear().unwrap();
        assert!(store.load().unwrap().is_empty());
    }
}
