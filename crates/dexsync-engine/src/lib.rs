//! DEX wallet state-reconciliation engine
//!
//! Keeps a local view of wallet identity, token balances and transaction
//! status consistent with the ledger:
//!
//! - [`resolver`] picks one connection mode from stored session hints
//! - [`session`] binds the ledger client and follows extension account and
//!   network switches
//! - [`observer`] turns transaction status updates into token invalidation
//! - [`refresh`] refreshes stale tokens with keyed single-flight fetches
//! - [`reconcile`] is the level-triggered supervisor tying them together

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cancel;
pub mod config;
pub mod error;
pub mod inflight;
pub mod logger;
pub mod observer;
pub mod ports;
pub mod reconcile;
pub mod refresh;
pub mod resolver;
pub mod session;
pub mod store;
#[cfg(feature = "test-helpers")]
pub mod testing;

pub use cancel::Lifecycle;
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use inflight::InflightRegistry;
pub use logger::{init_logging, ReconcileEvent, ReconcileLogger};
pub use observer::TransactionObserver;
pub use ports::{
    AccountChanged, Extension, ExtensionAccount, ExtensionWallet, HistoryEntry, HistoryQuery,
    LedgerClient, NetworkChanged, TransactionCallback, TransactionEvent, TransactionHistory,
    WalletBinding,
};
pub use reconcile::{EngineDeps, Reconciler, Signal};
pub use refresh::{RefreshScheduler, TokenBalances};
pub use resolver::{resolve, ConnectionStrategy};
pub use session::{SessionManager, WatchState};
pub use store::{
    MemoryStore, Notification, NotificationLevel, StateStore, StoreAction, StoreChange,
};
