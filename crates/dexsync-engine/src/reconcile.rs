//! Reconciliation loop
//!
//! One supervisor task consumes store changes and internal signals and
//! re-evaluates the whole state on each wake-up:
//!
//! 1. active network changed: re-seed the token set from the live token list
//! 2. connection became ready or the wallet session changed: reload history
//!    (or clear it) and mark every token dirty
//! 3. run a refresh pass over whatever is stale
//!
//! Evaluation is level-triggered, so coalesced or lagged notifications only
//! cost an extra pass.

use crate::cancel::Lifecycle;
use crate::config::EngineConfig;
use crate::logger::ReconcileLogger;
use crate::observer::TransactionObserver;
use crate::ports::{Extension, HistoryQuery, LedgerClient, TransactionHistory};
use crate::refresh::RefreshScheduler;
use crate::resolver;
use crate::session::SessionManager;
use crate::store::{Notification, StateStore, StoreAction, StoreChange};
use crate::{Error, Result};
use dexsync_core::{ConnectionMode, TrackedToken, TrackedTransaction, WalletSession};
use dexsync_params::NetworkType;
use dexsync_storage::SessionStore;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Internal wake-up for the supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// A token refresh finished, successfully or not
    RefreshSettled {
        /// Token address (lower-case)
        address: String,
    },
    /// Re-evaluate now
    Wake,
}

/// Collaborators injected into the engine
pub struct EngineDeps {
    /// State container
    pub store: Arc<dyn StateStore>,
    /// Ledger / DEX client
    pub ledger: Arc<dyn LedgerClient>,
    /// Optional browser-extension wallet
    pub extension: Extension,
    /// Transaction history service
    pub history: Arc<dyn TransactionHistory>,
    /// Persisted session hints
    pub hints: Arc<dyn SessionStore>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Observed {
    network: Option<NetworkType>,
    /// Network showing the native-only fallback after a failed token list
    fallback: Option<NetworkType>,
    ready: bool,
    wallet: Option<WalletSession>,
}

struct Supervisor {
    store: Arc<dyn StateStore>,
    ledger: Arc<dyn LedgerClient>,
    history: Arc<dyn TransactionHistory>,
    session: Arc<SessionManager>,
    scheduler: Arc<RefreshScheduler>,
    config: EngineConfig,
    lifecycle: Lifecycle,
    logger: Arc<ReconcileLogger>,
    observed: Arc<Mutex<Observed>>,
    session_generation: Arc<AtomicU64>,
    history_loads: Arc<AtomicUsize>,
}

impl Supervisor {
    async fn run(
        self,
        mut changes: broadcast::Receiver<StoreChange>,
        mut signals: mpsc::UnboundedReceiver<Signal>,
    ) {
        info!("Reconciliation supervisor started");
        self.evaluate().await;

        loop {
            tokio::select! {
                biased;
                _ = self.lifecycle.torn_down() => break,
                change = changes.recv() => match change {
                    Ok(StoreChange::Notification(_)) | Ok(StoreChange::Transactions) => continue,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped = %skipped, "Supervisor lagged behind store changes");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                signal = signals.recv() => match signal {
                    Some(signal) => debug!(?signal, "Supervisor signal"),
                    None => break,
                },
            }
            self.evaluate().await;
        }
        info!("Reconciliation supervisor stopped");
    }

    async fn evaluate(&self) {
        if self.lifecycle.is_torn_down() {
            return;
        }

        let network = self.store.network();
        let last_network = self.observed.lock().network;
        if last_network != Some(network) && self.reseed(network).await {
            self.observed.lock().network = Some(network);
        }

        let ready = self.store.connection_ready();
        let wallet = self.store.wallet();
        let session_changed = {
            let mut observed = self.observed.lock();
            let changed = (ready && !observed.ready) || wallet != observed.wallet;
            observed.ready = ready;
            observed.wallet = wallet.clone();
            changed
        };
        if session_changed {
            self.on_session_changed(wallet.as_ref());
        }

        if ready {
            let started = self.scheduler.run_pass();
            if started > 0 {
                debug!(started = %started, "Refresh pass");
            }
        }
    }

    /// Replace the token set for `network`.
    ///
    /// Returns `false` when the network moved on or the token list could not
    /// be loaded; the network then stays unseeded and the next evaluation
    /// tries again.
    async fn reseed(&self, network: NetworkType) -> bool {
        let listed = self.ledger.token_list(network).await;
        if self.lifecycle.is_torn_down() || self.store.network() != network {
            return false;
        }
        let descriptors = match listed {
            Ok(descriptors) => descriptors,
            Err(e) => {
                warn!(network = %network, error = %e, "Token list unavailable");
                self.seed_fallback(network, &e);
                return false;
            }
        };
        self.observed.lock().fallback = None;

        let mut seen = HashSet::new();
        let mut tokens = vec![TrackedToken::native()];
        seen.insert(tokens[0].address.to_ascii_lowercase());
        for descriptor in &descriptors {
            if !seen.insert(descriptor.address.to_ascii_lowercase()) {
                continue;
            }
            let mut token = TrackedToken::from_descriptor(descriptor);
            token.reward = self.config.is_reward_token(&descriptor.address);
            tokens.push(token);
        }

        let count = tokens.len();
        self.scheduler.begin_epoch();
        self.store.publish(StoreAction::InitTokens(tokens));
        self.logger.log_network_reseed(network.name(), count);
        true
    }

    /// Track the native asset alone until the token list comes back.
    ///
    /// Published once per network so repeated failures do not churn the store.
    fn seed_fallback(&self, network: NetworkType, error: &Error) {
        {
            let mut observed = self.observed.lock();
            if observed.fallback == Some(network) {
                return;
            }
            observed.fallback = Some(network);
        }
        self.store
            .publish(StoreAction::Notify(Notification::warning(error.user_message())));
        self.scheduler.begin_epoch();
        self.store
            .publish(StoreAction::InitTokens(vec![TrackedToken::native()]));
    }

    fn on_session_changed(&self, wallet: Option<&WalletSession>) {
        let generation = self.session_generation.fetch_add(1, Ordering::AcqRel) + 1;

        match wallet.filter(|session| session.is_bound()) {
            Some(session) => {
                if session.is_extension() {
                    self.session.watch_external_changes();
                }
                self.spawn_history_load(session, generation);
            }
            None => self.store.publish(StoreAction::InitTransactions(Vec::new())),
        }
        self.store.publish(StoreAction::InvalidateTokens);
    }

    fn spawn_history_load(&self, session: &WalletSession, generation: u64) {
        let Some(address) = session.address() else {
            return;
        };
        let query = HistoryQuery {
            network: session.network(),
            address: address.hex().to_string(),
            page_size: self.config.history_page_size,
        };
        let store = Arc::clone(&self.store);
        let history = Arc::clone(&self.history);
        let lifecycle = self.lifecycle.clone();
        let current_generation = Arc::clone(&self.session_generation);
        let loads = Arc::clone(&self.history_loads);

        loads.fetch_add(1, Ordering::AcqRel);
        tokio::spawn(async move {
            let result = history.list_transactions(&query).await;
            let stale = lifecycle.is_torn_down()
                || current_generation.load(Ordering::Acquire) != generation;
            if stale {
                debug!(generation = %generation, "Discarding stale history load");
            } else {
                match result {
                    Ok(entries) => {
                        let transactions = entries
                            .into_iter()
                            .map(|entry| {
                                let mut tx = TrackedTransaction::new(&entry.hash, entry.status);
                                tx.from = entry.from;
                                tx.timestamp = entry.timestamp;
                                tx
                            })
                            .collect::<Vec<_>>();
                        debug!(count = %transactions.len(), "Transaction history loaded");
                        store.publish(StoreAction::InitTransactions(transactions));
                    }
                    Err(e) => {
                        warn!(error = %e, "Transaction history load failed");
                        store.publish(StoreAction::InitTransactions(Vec::new()));
                        store.publish(StoreAction::Notify(Notification::error(e.user_message())));
                    }
                }
            }
            loads.fetch_sub(1, Ordering::AcqRel);
        });
    }
}

/// Reconciliation engine handle
pub struct Reconciler {
    store: Arc<dyn StateStore>,
    hints: Arc<dyn SessionStore>,
    config: EngineConfig,
    lifecycle: Lifecycle,
    logger: Arc<ReconcileLogger>,
    session: Arc<SessionManager>,
    observer: TransactionObserver,
    scheduler: Arc<RefreshScheduler>,
    supervisor: Mutex<Option<Supervisor>>,
    signals_tx: mpsc::UnboundedSender<Signal>,
    signals_rx: Mutex<Option<mpsc::UnboundedReceiver<Signal>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    observed: Arc<Mutex<Observed>>,
    history_loads: Arc<AtomicUsize>,
}

impl Reconciler {
    /// Wire the engine; nothing runs until [`Reconciler::start`]
    pub fn new(deps: EngineDeps, config: EngineConfig) -> Self {
        let EngineDeps {
            store,
            ledger,
            extension,
            history,
            hints,
        } = deps;
        let lifecycle = Lifecycle::new();
        let logger = Arc::new(ReconcileLogger::new(config.log_capacity));
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();

        let session = Arc::new(SessionManager::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            extension,
            Arc::clone(&hints),
            config.default_network,
            lifecycle.clone(),
            Arc::clone(&logger),
        ));
        let observer = TransactionObserver::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            lifecycle.clone(),
            Arc::clone(&logger),
        );
        let scheduler = Arc::new(RefreshScheduler::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            lifecycle.clone(),
            Arc::clone(&logger),
            signals_tx.clone(),
            config.refresh_timeout(),
        ));
        let observed = Arc::new(Mutex::new(Observed::default()));
        let history_loads = Arc::new(AtomicUsize::new(0));

        let supervisor = Supervisor {
            store: Arc::clone(&store),
            ledger,
            history,
            session: Arc::clone(&session),
            scheduler: Arc::clone(&scheduler),
            config: config.clone(),
            lifecycle: lifecycle.clone(),
            logger: Arc::clone(&logger),
            observed: Arc::clone(&observed),
            session_generation: Arc::new(AtomicU64::new(0)),
            history_loads: Arc::clone(&history_loads),
        };

        Self {
            store,
            hints,
            config,
            lifecycle,
            logger,
            session,
            observer,
            scheduler,
            supervisor: Mutex::new(Some(supervisor)),
            signals_tx,
            signals_rx: Mutex::new(Some(signals_rx)),
            handle: Mutex::new(None),
            observed,
            history_loads,
        }
    }

    /// Register the transaction observer, start the supervisor and establish
    /// the connection picked from the stored hints.
    pub async fn start(&self) -> Result<ConnectionMode> {
        if self.lifecycle.is_torn_down() {
            return Err(Error::Cancelled);
        }
        let supervisor = self.supervisor.lock().take();
        let signals = self.signals_rx.lock().take();
        let (Some(supervisor), Some(signals)) = (supervisor, signals) else {
            return Err(Error::Config("engine already started".to_string()));
        };

        info!(network = %self.config.default_network, "Starting reconciliation engine");
        let changes = self.store.subscribe();
        self.observer.register();
        *self.handle.lock() = Some(tokio::spawn(supervisor.run(changes, signals)));

        Ok(resolver::resolve_and_establish(self.hints.as_ref(), &self.session).await)
    }

    /// Tear down: stop the supervisor and watchers, clear the observer.
    pub async fn shutdown(&self) {
        self.session.teardown();
        self.observer.unregister();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Supervisor task ended abnormally");
            }
        }
        info!("Reconciliation engine stopped");
    }

    /// Rebind on another network and reconnect with the stored hints
    pub async fn switch_network(&self, network: NetworkType) -> ConnectionMode {
        info!(network = %network, "Switching network");
        self.session.set_configured_network(network);
        resolver::resolve_and_establish(self.hints.as_ref(), &self.session).await
    }

    /// Connect with a raw secret key
    pub async fn connect_with_key(&self, credential: dexsync_core::RawCredential) -> ConnectionMode {
        self.session.connect_with_key(credential).await
    }

    /// Connect through the browser extension
    pub async fn connect_with_extension(&self) -> ConnectionMode {
        self.session.connect_with_extension().await
    }

    /// Forget the wallet and continue read-only
    pub async fn disconnect(&self) {
        self.session.disconnect().await
    }

    /// Track a submitted transaction until it reaches a terminal status
    pub async fn submit_transaction(&self, hash: &str) -> Result<()> {
        self.observer.submit(hash).await
    }

    /// Ask the supervisor to re-evaluate
    pub fn wake(&self) {
        let _ = self.signals_tx.send(Signal::Wake);
    }

    /// Whether all observed state has been reconciled
    pub fn is_settled(&self) -> bool {
        if !self.store.connection_ready() || self.scheduler.active() > 0 {
            return false;
        }
        if self.history_loads.load(Ordering::Acquire) > 0 {
            return false;
        }
        let caught_up = {
            let observed = self.observed.lock();
            observed.network == Some(self.store.network())
                && observed.ready
                && observed.wallet == self.store.wallet()
        };
        caught_up
            && self
                .store
                .tokens()
                .iter()
                .all(|token| !token.loading && !token.needs_refresh())
    }

    /// Poll until settled; `false` on timeout
    pub async fn until_settled(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_settled() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// State container
    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Session manager
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Refresh scheduler
    pub fn scheduler(&self) -> &Arc<RefreshScheduler> {
        &self.scheduler
    }

    /// Event logger
    pub fn logger(&self) -> &Arc<ReconcileLogger> {
        &self.logger
    }

    /// Effective configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Drop for Reconciler {
    fn drop(&mut self) {
        self.session.teardown();
    }
}
