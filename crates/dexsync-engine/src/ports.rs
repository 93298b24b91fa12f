//! Capability traits for the engine's external collaborators
//!
//! The ledger RPC client, the browser-extension wallet and the transaction
//! history service are injected as `Send + Sync` trait objects. Implementations
//! live outside this crate; deterministic fakes are in [`crate::testing`].

use crate::Result;
use async_trait::async_trait;
use dexsync_core::{
    AllowanceMap, Amount, AssetDescriptor, BalanceMap, PoolRef, RawCredential, TxStatus,
    WalletAddress,
};
use dexsync_params::NetworkType;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Wallet identity handed to the ledger client on bind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletBinding {
    /// Application-held secret key
    RawKey {
        /// Derived account
        address: WalletAddress,
        /// Secret used for signing
        credential: RawCredential,
    },
    /// Signing delegated to the extension
    Extension {
        /// Extension-reported account
        address: WalletAddress,
    },
}

impl WalletBinding {
    /// Bound account
    pub fn address(&self) -> &WalletAddress {
        match self {
            WalletBinding::RawKey { address, .. } | WalletBinding::Extension { address } => address,
        }
    }
}

/// Status update for a watched transaction
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionEvent {
    /// Transaction hash
    pub hash: String,
    /// New status
    pub status: TxStatus,
    /// Receipt payload, if the ledger produced one
    pub receipt: Option<serde_json::Value>,
}

/// Callback invoked by the ledger client for every transaction update
pub type TransactionCallback = Arc<dyn Fn(TransactionEvent) + Send + Sync>;

/// Ledger RPC / DEX client
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Bind signing to a wallet on the given network
    async fn bind_wallet(
        &self,
        wallet: &WalletBinding,
        network: NetworkType,
        watched_tokens: &[String],
    ) -> Result<()>;

    /// Bind without a wallet; never fails
    async fn bind_readonly(&self, network: NetworkType, watched_tokens: &[String]);

    /// Native balance of an account
    async fn get_balance(&self, address: &WalletAddress) -> Result<Amount>;

    /// Live token list for a network
    async fn token_list(&self, network: NetworkType) -> Result<Vec<AssetDescriptor>>;

    /// Holder balances for a token
    async fn balance_mapping(&self, token: &str) -> Result<BalanceMap>;

    /// Holder/spender allowances for a token
    async fn allowance_mapping(&self, token: &str) -> Result<AllowanceMap>;

    /// Liquidity pool for a token, if any
    async fn pool(&self, token: &str) -> Result<Option<PoolRef>>;

    /// Token name recovered from its constructor parameters
    async fn constructor_name(&self, token: &str) -> Result<Option<String>>;

    /// Install the single transaction callback; `None` clears it
    fn register_transaction_observer(&self, callback: Option<TransactionCallback>);

    /// Start reporting updates for a submitted transaction
    async fn watch_transaction(&self, hash: &str) -> Result<()>;
}

/// Account reported by the extension after authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionAccount {
    /// Authorized account
    pub address: WalletAddress,
    /// Network name as reported by the extension
    pub network: String,
}

/// Account switched inside the extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountChanged {
    /// New account, in whatever form the extension reports it
    pub address: String,
}

/// Network switched inside the extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkChanged {
    /// Network name as reported by the extension
    pub network: String,
}

/// Browser-extension wallet
#[async_trait]
pub trait ExtensionWallet: Send + Sync {
    /// Request authorization
    async fn connect(&self) -> Result<ExtensionAccount>;

    /// Account change stream; `None` when the extension has no such primitive
    fn observe_account_changes(&self) -> Option<mpsc::UnboundedReceiver<AccountChanged>>;

    /// Network change stream; `None` when the extension has no such primitive
    fn observe_network_changes(&self) -> Option<mpsc::UnboundedReceiver<NetworkChanged>>;
}

/// Optional extension capability
#[derive(Clone)]
pub enum Extension {
    /// Extension installed in the host
    Present(Arc<dyn ExtensionWallet>),
    /// No extension
    Absent,
}

impl Extension {
    /// Wallet handle if installed
    pub fn wallet(&self) -> Option<&Arc<dyn ExtensionWallet>> {
        match self {
            Extension::Present(wallet) => Some(wallet),
            Extension::Absent => None,
        }
    }
}

impl std::fmt::Debug for Extension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Extension::Present(_) => f.write_str("Extension::Present"),
            Extension::Absent => f.write_str("Extension::Absent"),
        }
    }
}

/// Transaction history query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Network to query
    pub network: NetworkType,
    /// Account (lower-case hex)
    pub address: String,
    /// Maximum number of entries
    pub page_size: usize,
}

/// One entry of an account's transaction history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Transaction hash
    pub hash: String,
    /// Status at the time of the query
    pub status: TxStatus,
    /// Sender
    pub from: Option<String>,
    /// Unix timestamp (seconds)
    pub timestamp: Option<i64>,
}

/// Transaction history service
#[async_trait]
pub trait TransactionHistory: Send + Sync {
    /// Most recent transactions of an account
    async fn list_transactions(&self, query: &HistoryQuery) -> Result<Vec<HistoryEntry>>;
}
