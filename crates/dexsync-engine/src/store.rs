//! Global state container contract and the in-memory store
//!
//! The engine never mutates state directly. It reads snapshots and publishes
//! [`StoreAction`]s; the store applies them as whole-entity replacements and
//! broadcasts a [`StoreChange`] for every action that changed something.

use chrono::{DateTime, Utc};
use dexsync_core::{TrackedToken, TrackedTransaction, TxStatus, WalletSession};
use dexsync_params::NetworkType;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Severity of a user-visible notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    /// Informational
    Info,
    /// Degraded but usable
    Warning,
    /// Operation failed
    Error,
}

/// User-visible notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique id
    pub id: Uuid,
    /// Severity
    pub level: NotificationLevel,
    /// Message text
    pub message: String,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// New notification stamped now
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Warning notification
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Warning, message)
    }

    /// Error notification
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, message)
    }
}

/// Mutation request
#[derive(Debug, Clone)]
pub enum StoreAction {
    /// Set the active network
    SetNetwork(NetworkType),
    /// Set whether the connection is established
    SetConnectionReady(bool),
    /// Replace the wallet session
    SetWallet(WalletSession),
    /// Replace the whole token set
    InitTokens(Vec<TrackedToken>),
    /// Replace one token; dropped if the token is no longer tracked
    UpdateToken(TrackedToken),
    /// Mark every token dirty
    InvalidateTokens,
    /// Replace the whole transaction set
    InitTransactions(Vec<TrackedTransaction>),
    /// Track a transaction unless it is already tracked
    AddTransaction(TrackedTransaction),
    /// Update status and receipt of a tracked transaction
    UpdateTransaction {
        /// Transaction hash
        hash: String,
        /// New status
        status: TxStatus,
        /// Receipt payload
        receipt: Option<serde_json::Value>,
    },
    /// Emit a user-visible notification
    Notify(Notification),
}

/// Change broadcast after an action was applied
#[derive(Debug, Clone, PartialEq)]
pub enum StoreChange {
    /// Active network changed
    Network(NetworkType),
    /// Connection readiness changed
    ConnectionReady(bool),
    /// Wallet session replaced
    Wallet,
    /// Token set or a token changed
    Tokens,
    /// Transaction set or a transaction changed
    Transactions,
    /// Notification emitted
    Notification(Notification),
}

/// State container used by the engine
pub trait StateStore: Send + Sync {
    /// Active network
    fn network(&self) -> NetworkType;

    /// Whether the connection is established
    fn connection_ready(&self) -> bool;

    /// Current wallet session; `None` before the first connect
    fn wallet(&self) -> Option<WalletSession>;

    /// Snapshot of all tracked tokens
    fn tokens(&self) -> Vec<TrackedToken>;

    /// Snapshot of one token
    fn token(&self, address: &str) -> Option<TrackedToken> {
        self.tokens().into_iter().find(|t| t.same_key(address))
    }

    /// Snapshot of all tracked transactions
    fn transactions(&self) -> Vec<TrackedTransaction>;

    /// Snapshot of one transaction
    fn transaction(&self, hash: &str) -> Option<TrackedTransaction> {
        self.transactions().into_iter().find(|t| t.matches(hash))
    }

    /// Notifications emitted so far
    fn notifications(&self) -> Vec<Notification>;

    /// Apply a mutation
    fn publish(&self, action: StoreAction);

    /// Subscribe to changes
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

#[derive(Debug)]
struct State {
    network: NetworkType,
    connection_ready: bool,
    wallet: Option<WalletSession>,
    tokens: Vec<TrackedToken>,
    transactions: Vec<TrackedTransaction>,
    notifications: Vec<Notification>,
}

const MAX_NOTIFICATIONS: usize = 64;

/// In-memory [`StateStore`]
pub struct MemoryStore {
    state: RwLock<State>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    /// Empty store on the given network
    pub fn new(network: NetworkType, capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            state: RwLock::new(State {
                network,
                connection_ready: false,
                wallet: None,
                tokens: Vec::new(),
                transactions: Vec::new(),
                notifications: Vec::new(),
            }),
            changes,
        }
    }

    fn apply(state: &mut State, action: StoreAction) -> Option<StoreChange> {
        match action {
            StoreAction::SetNetwork(network) => {
                if state.network == network {
                    return None;
                }
                state.network = network;
                Some(StoreChange::Network(network))
            }
            StoreAction::SetConnectionReady(ready) => {
                if state.connection_ready == ready {
                    return None;
                }
                state.connection_ready = ready;
                Some(StoreChange::ConnectionReady(ready))
            }
            StoreAction::SetWallet(session) => {
                if state.wallet.as_ref() == Some(&session) {
                    return None;
                }
                state.wallet = Some(session);
                Some(StoreChange::Wallet)
            }
            StoreAction::InitTokens(tokens) => {
                state.tokens = tokens;
                Some(StoreChange::Tokens)
            }
            StoreAction::UpdateToken(token) => {
                let slot = state.tokens.iter_mut().find(|t| t.same_key(&token.address))?;
                if *slot == token {
                    return None;
                }
                *slot = token;
                Some(StoreChange::Tokens)
            }
            StoreAction::InvalidateTokens => {
                let mut changed = false;
                for token in state.tokens.iter_mut() {
                    let before = (token.dirty, token.balances_fetched);
                    token.invalidate();
                    changed |= before != (token.dirty, token.balances_fetched);
                }
                changed.then_some(StoreChange::Tokens)
            }
            StoreAction::InitTransactions(transactions) => {
                state.transactions = transactions;
                Some(StoreChange::Transactions)
            }
            StoreAction::AddTransaction(transaction) => {
                if state
                    .transactions
                    .iter()
                    .any(|t| t.matches(&transaction.hash))
                {
                    return None;
                }
                state.transactions.insert(0, transaction);
                Some(StoreChange::Transactions)
            }
            StoreAction::UpdateTransaction {
                hash,
                status,
                receipt,
            } => {
                let slot = state.transactions.iter_mut().find(|t| t.matches(&hash))?;
                slot.status = status;
                if receipt.is_some() {
                    slot.receipt = receipt;
                }
                Some(StoreChange::Transactions)
            }
            StoreAction::Notify(notification) => {
                if state.notifications.len() == MAX_NOTIFICATIONS {
                    state.notifications.remove(0);
                }
                state.notifications.push(notification.clone());
                Some(StoreChange::Notification(notification))
            }
        }
    }
}

impl StateStore for MemoryStore {
    fn network(&self) -> NetworkType {
        self.state.read().network
    }

    fn connection_ready(&self) -> bool {
        self.state.read().connection_ready
    }

    fn wallet(&self) -> Option<WalletSession> {
        self.state.read().wallet.clone()
    }

    fn tokens(&self) -> Vec<TrackedToken> {
        self.state.read().tokens.clone()
    }

    fn token(&self, address: &str) -> Option<TrackedToken> {
        self.state
            .read()
            .tokens
            .iter()
            .find(|t| t.same_key(address))
            .cloned()
    }

    fn transactions(&self) -> Vec<TrackedTransaction> {
        self.state.read().transactions.clone()
    }

    fn notifications(&self) -> Vec<Notification> {
        self.state.read().notifications.clone()
    }

    fn publish(&self, action: StoreAction) {
        let change = {
            let mut state = self.state.write();
            Self::apply(&mut state, action)
        };
        if let Some(change) = change {
            // No receivers is fine: nobody is watching yet.
            let _ = self.changes.send(change);
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new(NetworkType::Mainnet, 16)
    }

    #[test]
    fn test_identical_values_emit_nothing() {
        let store = store();
        let mut rx = store.subscribe();
        store.publish(StoreAction::SetNetwork(NetworkType::Mainnet));
        store.publish(StoreAction::SetConnectionReady(false));
        assert!(rx.try_recv().is_err());

        store.publish(StoreAction::SetNetwork(NetworkType::Testnet));
        assert_eq!(
            rx.try_recv().unwrap(),
            StoreChange::Network(NetworkType::Testnet)
        );
    }

    #[test]
    fn test_update_of_untracked_token_is_dropped() {
        let store = store();
        store.publish(StoreAction::InitTokens(vec![TrackedToken::native()]));
        let mut rx = store.subscribe();

        let mut stranger = TrackedToken::native();
        stranger.address = "0xgone".to_string();
        store.publish(StoreAction::UpdateToken(stranger));

        assert!(rx.try_recv().is_err());
        assert_eq!(store.tokens().len(), 1);
    }

    #[test]
    fn test_invalidate_marks_every_token() {
        let store = store();
        let mut native = TrackedToken::native();
        native.claim();
        native.loading = false;
        store.publish(StoreAction::InitTokens(vec![native]));

        store.publish(StoreAction::InvalidateTokens);
        assert!(store.tokens().iter().all(|t| t.dirty));

        let mut rx = store.subscribe();
        store.publish(StoreAction::InvalidateTokens);
        assert!(rx.try_recv().is_err(), "already dirty");
    }

    #[test]
    fn test_transaction_update_requires_tracking() {
        let store = store();
        store.publish(StoreAction::UpdateTransaction {
            hash: "0xabc".to_string(),
            status: TxStatus::Confirmed,
            receipt: None,
        });
        assert!(store.transactions().is_empty());

        store.publish(StoreAction::AddTransaction(TrackedTransaction::new(
            "0xABC",
            TxStatus::Pending,
        )));
        store.publish(StoreAction::UpdateTransaction {
            hash: "0xAbc".to_string(),
            status: TxStatus::Confirmed,
            receipt: Some(serde_json::json!({"gasUsed": 21000})),
        });
        let tx = store.transaction("0xabc").unwrap();
        assert_eq!(tx.status, TxStatus::Confirmed);
        assert!(tx.receipt.is_some());
    }

    #[test]
    fn test_notifications_are_bounded() {
        let store = store();
        for i in 0..(MAX_NOTIFICATIONS + 5) {
            store.publish(StoreAction::Notify(Notification::warning(format!("n{i}"))));
        }
        let notifications = store.notifications();
        assert_eq!(notifications.len(), MAX_NOTIFICATIONS);
        assert_eq!(notifications[0].message, "n5");
    }
}
