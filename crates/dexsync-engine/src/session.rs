//! Wallet session manager
//!
//! Owns the three connection modes, the extension watchers and the
//! read-only fallback. Every connect path ends with the ledger client bound,
//! either to a wallet or read-only, and with the connection marked ready.

use crate::cancel::Lifecycle;
use crate::logger::ReconcileLogger;
use crate::ports::{
    AccountChanged, Extension, LedgerClient, NetworkChanged, WalletBinding,
};
use crate::store::{Notification, StateStore, StoreAction};
use crate::Error;
use dexsync_core::{derive_address, ConnectionMode, RawCredential, WalletAddress, WalletSession};
use dexsync_params::NetworkType;
use dexsync_storage::SessionStore;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Whether the extension change streams are being watched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// No watchers registered
    Unwatched,
    /// Watchers registered for this engine's lifetime
    Watching,
}

/// Wallet session manager
pub struct SessionManager {
    store: Arc<dyn StateStore>,
    ledger: Arc<dyn LedgerClient>,
    extension: Extension,
    hints: Arc<dyn SessionStore>,
    lifecycle: Lifecycle,
    logger: Arc<ReconcileLogger>,
    configured_network: RwLock<NetworkType>,
    connect_lock: tokio::sync::Mutex<()>,
    watch_state: Mutex<WatchState>,
    // Unmapped network name a reconnect was already issued for.
    unmapped_network: Mutex<Option<String>>,
}

impl SessionManager {
    /// Create a manager bound to the given collaborators
    pub fn new(
        store: Arc<dyn StateStore>,
        ledger: Arc<dyn LedgerClient>,
        extension: Extension,
        hints: Arc<dyn SessionStore>,
        network: NetworkType,
        lifecycle: Lifecycle,
        logger: Arc<ReconcileLogger>,
    ) -> Self {
        Self {
            store,
            ledger,
            extension,
            hints,
            lifecycle,
            logger,
            configured_network: RwLock::new(network),
            connect_lock: tokio::sync::Mutex::new(()),
            watch_state: Mutex::new(WatchState::Unwatched),
            unmapped_network: Mutex::new(None),
        }
    }

    /// Network used when no extension reports one
    pub fn configured_network(&self) -> NetworkType {
        *self.configured_network.read()
    }

    /// Change the configured network; takes effect on the next connect
    pub fn set_configured_network(&self, network: NetworkType) {
        *self.configured_network.write() = network;
    }

    /// Current watch state
    pub fn watch_state(&self) -> WatchState {
        *self.watch_state.lock()
    }

    /// Connect with a raw secret key.
    ///
    /// An invalid key or a failed bind falls back to a read-only connection
    /// and clears the stored hints.
    pub async fn connect_with_key(&self, credential: RawCredential) -> ConnectionMode {
        let _guard = self.connect_lock.lock().await;
        if self.lifecycle.is_torn_down() {
            return ConnectionMode::None;
        }
        let network = self.configured_network();

        let address = match derive_address(&credential) {
            Ok(address) => address,
            Err(e) => {
                debug!(error = %e, "Raw key rejected");
                self.fallback(network, "invalid raw key").await;
                return ConnectionMode::None;
            }
        };

        let binding = WalletBinding::RawKey {
            address: address.clone(),
            credential: credential.clone(),
        };
        if let Err(e) = self
            .ledger
            .bind_wallet(&binding, network, &self.watched_tokens())
            .await
        {
            self.notify(Notification::error(e.user_message()));
            self.fallback(network, &e.to_string()).await;
            return ConnectionMode::None;
        }

        if let Err(e) = self
            .hints
            .set_credential(Some(&credential))
            .and_then(|_| self.hints.set_extension_connected(false))
        {
            warn!(error = %e, "Failed to persist raw key hint");
        }

        self.publish_session(WalletSession::raw_key(address, network, credential));
        ConnectionMode::RawKey
    }

    /// Connect through the browser extension.
    ///
    /// The session is bound to the network the extension reports, or to the
    /// configured network when the reported name is not recognised.
    pub async fn connect_with_extension(self: &Arc<Self>) -> ConnectionMode {
        let mode = self.connect_extension_locked().await;
        if mode == ConnectionMode::Extension {
            self.watch_external_changes();
        }
        mode
    }

    async fn connect_extension_locked(&self) -> ConnectionMode {
        let _guard = self.connect_lock.lock().await;
        if self.lifecycle.is_torn_down() {
            return ConnectionMode::None;
        }
        let configured = self.configured_network();

        let Some(wallet) = self.extension.wallet() else {
            let e = Error::ExtensionUnavailable;
            self.notify(Notification::error(e.user_message()));
            self.fallback(configured, &e.to_string()).await;
            return ConnectionMode::None;
        };

        let account = match wallet.connect().await {
            Ok(account) => account,
            Err(e) => {
                self.notify(Notification::error(e.user_message()));
                self.fallback(configured, &e.to_string()).await;
                return ConnectionMode::None;
            }
        };

        let network = match NetworkType::from_extension_name(&account.network) {
            Some(network) => network,
            None => {
                warn!(
                    reported = %account.network,
                    using = %configured,
                    "Extension reported an unknown network"
                );
                self.notify(Notification::warning(format!(
                    "The wallet is on an unsupported network ({}); showing {} instead.",
                    account.network, configured
                )));
                configured
            }
        };

        let binding = WalletBinding::Extension {
            address: account.address.clone(),
        };
        if let Err(e) = self
            .ledger
            .bind_wallet(&binding, network, &self.watched_tokens())
            .await
        {
            self.notify(Notification::error(e.user_message()));
            self.fallback(configured, &e.to_string()).await;
            return ConnectionMode::None;
        }

        if let Err(e) = self
            .hints
            .set_extension_connected(true)
            .and_then(|_| self.hints.set_credential(None))
        {
            warn!(error = %e, "Failed to persist extension hint");
        }

        self.publish_session(WalletSession::extension(account.address, network));
        ConnectionMode::Extension
    }

    /// Read-only connection at the configured network
    pub async fn connect_without_wallet(&self) -> ConnectionMode {
        let _guard = self.connect_lock.lock().await;
        if self.lifecycle.is_torn_down() {
            return ConnectionMode::None;
        }
        let network = self.configured_network();
        self.ledger
            .bind_readonly(network, &self.watched_tokens())
            .await;
        self.publish_empty(network);
        info!(network = %network, "Connected without wallet");
        ConnectionMode::None
    }

    /// Forget the wallet: clear hints, rebind read-only, publish an empty
    /// session. Extension watchers stay registered and ignore events.
    pub async fn disconnect(&self) {
        let _guard = self.connect_lock.lock().await;
        if self.lifecycle.is_torn_down() {
            return;
        }
        if let Err(e) = self.hints.clear() {
            warn!(error = %e, "Failed to clear session hints");
        }
        let network = self.configured_network();
        self.ledger
            .bind_readonly(network, &self.watched_tokens())
            .await;
        self.publish_empty(network);
        info!("Wallet disconnected");
    }

    /// Subscribe to extension account and network changes once.
    ///
    /// Further calls are no-ops. A missing change primitive is skipped.
    pub fn watch_external_changes(self: &Arc<Self>) {
        let Some(wallet) = self.extension.wallet() else {
            return;
        };
        {
            let mut state = self.watch_state.lock();
            if *state == WatchState::Watching {
                return;
            }
            *state = WatchState::Watching;
        }

        match wallet.observe_account_changes() {
            Some(changes) => self.spawn_account_watcher(changes),
            None => debug!("Extension has no account change stream"),
        }
        match wallet.observe_network_changes() {
            Some(changes) => self.spawn_network_watcher(changes),
            None => debug!("Extension has no network change stream"),
        }
    }

    fn spawn_account_watcher(self: &Arc<Self>, mut changes: mpsc::UnboundedReceiver<AccountChanged>) {
        let manager = Arc::clone(self);
        let lifecycle = self.lifecycle.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = lifecycle.torn_down() => break,
                    change = changes.recv() => match change {
                        Some(change) => manager.on_account_changed(change).await,
                        None => break,
                    },
                }
            }
            debug!("Account watcher stopped");
        });
    }

    fn spawn_network_watcher(self: &Arc<Self>, mut changes: mpsc::UnboundedReceiver<NetworkChanged>) {
        let manager = Arc::clone(self);
        let lifecycle = self.lifecycle.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = lifecycle.torn_down() => break,
                    change = changes.recv() => match change {
                        Some(change) => manager.on_network_changed(change).await,
                        None => break,
                    },
                }
            }
            debug!("Network watcher stopped");
        });
    }

    fn extension_session(&self) -> Option<WalletSession> {
        self.store
            .wallet()
            .filter(|session| session.is_bound() && session.is_extension())
    }

    async fn on_account_changed(self: &Arc<Self>, change: AccountChanged) {
        let Some(session) = self.extension_session() else {
            debug!("Account change ignored: no extension session");
            return;
        };
        let same = WalletAddress::parse(&change.address)
            .map(|address| Some(&address) == session.address())
            .unwrap_or(false);
        if same {
            return;
        }
        info!(account = %change.address, "Extension account changed; reconnecting");
        self.connect_with_extension().await;
    }

    async fn on_network_changed(self: &Arc<Self>, change: NetworkChanged) {
        let Some(session) = self.extension_session() else {
            debug!("Network change ignored: no extension session");
            return;
        };

        match NetworkType::from_extension_name(&change.network) {
            Some(network) => {
                self.unmapped_network.lock().take();
                if network == session.network() {
                    return;
                }
                info!(network = %network, "Extension network changed; reconnecting");
            }
            None => {
                {
                    let mut pending = self.unmapped_network.lock();
                    if pending.as_deref() == Some(change.network.as_str()) {
                        debug!(network = %change.network, "Repeated unknown network ignored");
                        return;
                    }
                    *pending = Some(change.network.clone());
                }
                info!(network = %change.network, "Extension switched to an unknown network; reconnecting");
            }
        }
        self.connect_with_extension().await;
    }

    /// Stop watchers and clear the transaction observer registration
    pub fn teardown(&self) {
        if self.lifecycle.teardown() {
            self.ledger.register_transaction_observer(None);
            info!("Session manager torn down");
        }
    }

    async fn fallback(&self, network: NetworkType, reason: &str) {
        self.logger.log_session_fallback(reason);
        self.ledger
            .bind_readonly(network, &self.watched_tokens())
            .await;
        if let Err(e) = self.hints.clear() {
            warn!(error = %e, "Failed to clear session hints");
        }
        self.publish_empty(network);
    }

    fn publish_empty(&self, network: NetworkType) {
        self.publish_session(WalletSession::empty(network));
    }

    fn publish_session(&self, session: WalletSession) {
        if let Some(address) = session.address() {
            self.logger.log_session_connected(
                session.mode().name(),
                address.hex(),
                session.network().name(),
            );
        }
        self.store.publish(StoreAction::SetNetwork(session.network()));
        self.store.publish(StoreAction::SetWallet(session));
        self.store.publish(StoreAction::SetConnectionReady(true));
    }

    fn notify(&self, notification: Notification) {
        self.store.publish(StoreAction::Notify(notification));
    }

    fn watched_tokens(&self) -> Vec<String> {
        self.store
            .tokens()
            .into_iter()
            .filter(|token| !token.is_native())
            .map(|token| token.address)
            .collect()
    }
}
