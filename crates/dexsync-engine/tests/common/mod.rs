//! Shared fixtures for engine integration tests
#![allow(dead_code)]

use dexsync_core::{AssetDescriptor, RawCredential, TrackedToken, WalletAddress};
use dexsync_engine::testing::{FakeExtension, FakeHistory, FakeLedger};
use dexsync_engine::{
    EngineConfig, EngineDeps, Extension, MemoryStore, Notification, Reconciler, StateStore,
    StoreAction, StoreChange,
};
use dexsync_core::{TrackedTransaction, WalletSession};
use dexsync_params::NetworkType;
use dexsync_storage::{MemorySessionStore, SessionHints};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Secret key 1
pub const KEY_ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";
/// Address derived from [`KEY_ONE`]
pub const KEY_ONE_ADDRESS: &str = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf";
/// Another valid account
pub const OTHER_ADDRESS: &str = "0x2b5ad5c4795c026514f8317c7a215e218dccd6cf";

pub const SETTLE: Duration = Duration::from_secs(5);

pub fn address(hex: &str) -> WalletAddress {
    WalletAddress::parse(hex).unwrap()
}

pub fn descriptor(address: &str, symbol: &str) -> AssetDescriptor {
    AssetDescriptor {
        address: address.to_string(),
        symbol: symbol.to_string(),
        name: None,
        decimals: 18,
        registered: true,
        whitelisted: true,
    }
}

pub fn raw_key_hints() -> SessionHints {
    SessionHints {
        raw_credential: Some(RawCredential::new(KEY_ONE)),
        extension_connected: false,
    }
}

pub fn extension_hints() -> SessionHints {
    SessionHints {
        raw_credential: None,
        extension_connected: true,
    }
}

/// Store that records every token set it is seeded with
pub struct RecordingStore {
    inner: MemoryStore,
    seeded: Mutex<Vec<Vec<TrackedToken>>>,
}

impl RecordingStore {
    pub fn new(network: NetworkType) -> Self {
        Self {
            inner: MemoryStore::new(network, 256),
            seeded: Mutex::new(Vec::new()),
        }
    }

    pub fn seeded(&self) -> Vec<Vec<TrackedToken>> {
        self.seeded.lock().clone()
    }
}

impl StateStore for RecordingStore {
    fn network(&self) -> NetworkType {
        self.inner.network()
    }

    fn connection_ready(&self) -> bool {
        self.inner.connection_ready()
    }

    fn wallet(&self) -> Option<WalletSession> {
        self.inner.wallet()
    }

    fn tokens(&self) -> Vec<TrackedToken> {
        self.inner.tokens()
    }

    fn transactions(&self) -> Vec<TrackedTransaction> {
        self.inner.transactions()
    }

    fn notifications(&self) -> Vec<Notification> {
        self.inner.notifications()
    }

    fn publish(&self, action: StoreAction) {
        if let StoreAction::InitTokens(tokens) = &action {
            self.seeded.lock().push(tokens.clone());
        }
        self.inner.publish(action);
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.inner.subscribe()
    }
}

pub struct Harness {
    pub engine: Reconciler,
    pub store: Arc<RecordingStore>,
    pub ledger: Arc<FakeLedger>,
    pub history: Arc<FakeHistory>,
    pub hints: Arc<MemorySessionStore>,
    pub extension: Option<Arc<FakeExtension>>,
}

impl Harness {
    pub fn new(hints: SessionHints, extension: Option<FakeExtension>) -> Self {
        Self::with_config(hints, extension, EngineConfig::default())
    }

    pub fn with_config(
        hints: SessionHints,
        extension: Option<FakeExtension>,
        config: EngineConfig,
    ) -> Self {
        let store = Arc::new(RecordingStore::new(config.default_network));
        let ledger = Arc::new(FakeLedger::new());
        let history = Arc::new(FakeHistory::new());
        let hints = Arc::new(MemorySessionStore::with_hints(hints));
        let extension = extension.map(Arc::new);

        let deps = EngineDeps {
            store: store.clone(),
            ledger: ledger.clone(),
            extension: match &extension {
                Some(wallet) => Extension::Present(wallet.clone()),
                None => Extension::Absent,
            },
            history: history.clone(),
            hints: hints.clone(),
        };

        Self {
            engine: Reconciler::new(deps, config),
            store,
            ledger,
            history,
            hints,
            extension,
        }
    }

    pub fn extension(&self) -> &FakeExtension {
        self.extension.as_deref().expect("harness has an extension")
    }

    pub async fn settle(&self) {
        assert!(
            self.engine.until_settled(SETTLE).await,
            "engine did not settle"
        );
    }

    pub fn token(&self, address: &str) -> TrackedToken {
        self.store.token(address).expect("token is tracked")
    }

    /// Every session is either bound to a wallet or explicitly read-only
    pub fn assert_single_mode(&self) {
        let session = self.store.wallet().expect("session published");
        assert_eq!(
            session.is_bound(),
            session.mode() != dexsync_core::ConnectionMode::None
        );
        assert!(self.store.connection_ready());
        assert!(self.ledger.last_bind().is_some(), "ledger never bound");
    }
}

/// Poll until `check` holds
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + SETTLE;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
