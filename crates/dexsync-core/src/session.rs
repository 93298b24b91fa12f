//! Wallet session management

use crate::address::WalletAddress;
use crate::keys::RawCredential;
use dexsync_params::NetworkType;
use serde::{Deserialize, Serialize};

/// How the active wallet is connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionMode {
    /// Read-only, no wallet bound
    None,
    /// Raw secret key held by the application
    RawKey,
    /// Browser-extension wallet
    Extension,
}

impl ConnectionMode {
    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::RawKey => "raw-key",
            Self::Extension => "extension",
        }
    }
}

/// The currently active wallet binding.
///
/// Sessions are replaced wholesale; a mode change never mutates an existing
/// session field by field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletSession {
    mode: ConnectionMode,
    address: Option<WalletAddress>,
    network: NetworkType,
    credential: Option<RawCredential>,
}

impl WalletSession {
    /// Session with no wallet bound
    pub fn empty(network: NetworkType) -> Self {
        Self {
            mode: ConnectionMode::None,
            address: None,
            network,
            credential: None,
        }
    }

    /// Session backed by a raw credential
    pub fn raw_key(address: WalletAddress, network: NetworkType, credential: RawCredential) -> Self {
        Self {
            mode: ConnectionMode::RawKey,
            address: Some(address),
            network,
            credential: Some(credential),
        }
    }

    /// Session backed by a browser-extension wallet
    pub fn extension(address: WalletAddress, network: NetworkType) -> Self {
        Self {
            mode: ConnectionMode::Extension,
            address: Some(address),
            network,
            credential: None,
        }
    }

    /// Connection mode
    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    /// Bound account, if any
    pub fn address(&self) -> Option<&WalletAddress> {
        self.address.as_ref()
    }

    /// Network the ledger client is bound to
    pub fn network(&self) -> NetworkType {
        self.network
    }

    /// Raw credential (raw-key mode only)
    pub fn credential(&self) -> Option<&RawCredential> {
        self.credential.as_ref()
    }

    /// Whether a wallet is bound
    pub fn is_bound(&self) -> bool {
        self.address.is_some()
    }

    /// Whether the session came from an extension wallet
    pub fn is_extension(&self) -> bool {
        self.mode == ConnectionMode::Extension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> WalletAddress {
        WalletAddress::from_bytes([1u8; 20]).unwrap()
    }

    #[test]
    fn test_empty_session() {
        let session = WalletSession::empty(NetworkType::Mainnet);
        assert_eq!(session.mode(), ConnectionMode::None);
        assert!(!session.is_bound());
        assert!(session.credential().is_none());
    }

    #[test]
    fn test_extension_session_has_no_credential() {
        let session = WalletSession::extension(address(), NetworkType::Testnet);
        assert!(session.is_extension());
        assert!(session.is_bound());
        assert!(session.credential().is_none());
        assert_eq!(session.network(), NetworkType::Testnet);
    }

    #[test]
    fn test_raw_key_session() {
        let session = WalletSession::raw_key(
            address(),
            NetworkType::Mainnet,
            RawCredential::new("0xabc"),
        );
        assert_eq!(session.mode(), ConnectionMode::RawKey);
        assert_eq!(session.mode().name(), "raw-key");
        assert!(session.credential().is_some());
    }

    #[test]
    fn test_sessions_compare_by_value() {
        let a = WalletSession::extension(address(), NetworkType::Mainnet);
        let b = WalletSession::extension(address(), NetworkType::Mainnet);
        let c = WalletSession::extension(address(), NetworkType::Testnet);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
