//! Connection strategy resolution
//!
//! Stored session hints select exactly one connection strategy, in priority
//! order raw key, extension, no wallet.

use crate::session::SessionManager;
use dexsync_core::{ConnectionMode, RawCredential};
use dexsync_storage::{SessionHints, SessionStore};
use std::sync::Arc;
use tracing::{debug, warn};

/// Strategy picked from the stored hints
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStrategy {
    /// Reconnect with the stored raw credential
    RawKey(RawCredential),
    /// Reconnect through the browser extension
    Extension,
    /// Read-only, no wallet
    NoWallet,
}

impl ConnectionStrategy {
    /// Connection mode this strategy aims for
    pub fn mode(&self) -> ConnectionMode {
        match self {
            ConnectionStrategy::RawKey(_) => ConnectionMode::RawKey,
            ConnectionStrategy::Extension => ConnectionMode::Extension,
            ConnectionStrategy::NoWallet => ConnectionMode::None,
        }
    }
}

/// Pick the strategy for a set of hints
pub fn resolve(hints: &SessionHints) -> ConnectionStrategy {
    if let Some(credential) = hints.credential() {
        ConnectionStrategy::RawKey(credential.clone())
    } else if hints.extension_connected {
        ConnectionStrategy::Extension
    } else {
        ConnectionStrategy::NoWallet
    }
}

/// Run the initializer for a strategy exactly once
pub async fn establish(
    strategy: ConnectionStrategy,
    session: &Arc<SessionManager>,
) -> ConnectionMode {
    debug!(strategy = %strategy.mode().name(), "Establishing connection");
    match strategy {
        ConnectionStrategy::RawKey(credential) => session.connect_with_key(credential).await,
        ConnectionStrategy::Extension => session.connect_with_extension().await,
        ConnectionStrategy::NoWallet => session.connect_without_wallet().await,
    }
}

/// Load hints, resolve and establish
///
/// Unreadable hints are treated as empty.
pub async fn resolve_and_establish(
    hints: &dyn SessionStore,
    session: &Arc<SessionManager>,
) -> ConnectionMode {
    let hints = hints.load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load session hints; connecting without wallet");
        SessionHints::default()
    });
    establish(resolve(&hints), session).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_key_wins() {
        let hints = SessionHints {
            raw_credential: Some(RawCredential::new("0x01")),
            extension_connected: true,
        };
        assert_eq!(
            resolve(&hints),
            ConnectionStrategy::RawKey(RawCredential::new("0x01"))
        );
    }

    #[test]
    fn test_extension_flag() {
        let hints = SessionHints {
            raw_credential: None,
            extension_connected: true,
        };
        assert_eq!(resolve(&hints), ConnectionStrategy::Extension);
        assert_eq!(resolve(&hints).mode(), ConnectionMode::Extension);
    }

    #[test]
    fn test_blank_credential_falls_through() {
        let hints = SessionHints {
            raw_credential: Some(RawCredential::new("")),
            extension_connected: false,
        };
        assert_eq!(resolve(&hints), ConnectionStrategy::NoWallet);
        assert_eq!(resolve(&SessionHints::default()), ConnectionStrategy::NoWallet);
    }
}
