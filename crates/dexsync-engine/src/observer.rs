//! Transaction observer
//!
//! Holds the single transaction callback registered with the ledger client.
//! A status update for a tracked transaction replaces its record and marks
//! every token dirty, since any balance may have moved.

use crate::cancel::Lifecycle;
use crate::logger::ReconcileLogger;
use crate::ports::{LedgerClient, TransactionCallback, TransactionEvent};
use crate::store::{StateStore, StoreAction};
use crate::Result;
use dexsync_core::{TrackedTransaction, TxStatus};
use std::sync::Arc;
use tracing::debug;

/// Transaction observer
pub struct TransactionObserver {
    store: Arc<dyn StateStore>,
    ledger: Arc<dyn LedgerClient>,
    lifecycle: Lifecycle,
    logger: Arc<ReconcileLogger>,
}

impl TransactionObserver {
    /// Create an observer
    pub fn new(
        store: Arc<dyn StateStore>,
        ledger: Arc<dyn LedgerClient>,
        lifecycle: Lifecycle,
        logger: Arc<ReconcileLogger>,
    ) -> Self {
        Self {
            store,
            ledger,
            lifecycle,
            logger,
        }
    }

    /// Register the callback, replacing any earlier registration
    pub fn register(&self) {
        let store = Arc::clone(&self.store);
        let lifecycle = self.lifecycle.clone();
        let logger = Arc::clone(&self.logger);
        let callback: TransactionCallback = Arc::new(move |event| {
            apply_event(store.as_ref(), &lifecycle, &logger, event);
        });
        self.ledger.register_transaction_observer(Some(callback));
        debug!("Transaction observer registered");
    }

    /// Clear the registration
    pub fn unregister(&self) {
        self.ledger.register_transaction_observer(None);
    }

    /// Track a freshly submitted transaction and ask the ledger to watch it
    pub async fn submit(&self, hash: &str) -> Result<()> {
        self.store
            .publish(StoreAction::AddTransaction(TrackedTransaction::new(
                hash,
                TxStatus::Pending,
            )));
        self.ledger.watch_transaction(hash).await
    }
}

fn apply_event(
    store: &dyn StateStore,
    lifecycle: &Lifecycle,
    logger: &ReconcileLogger,
    event: TransactionEvent,
) {
    if lifecycle.is_torn_down() {
        return;
    }
    let tracked = store.transaction(&event.hash).is_some();
    logger.log_transaction_status(&event.hash, event.status.name(), tracked);
    if !tracked {
        return;
    }

    store.publish(StoreAction::UpdateTransaction {
        hash: event.hash,
        status: event.status,
        receipt: event.receipt,
    });
    store.publish(StoreAction::InvalidateTokens);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use dexsync_core::TrackedToken;
    use dexsync_params::NetworkType;

    fn fixture() -> (MemoryStore, Lifecycle, ReconcileLogger) {
        let store = MemoryStore::new(NetworkType::Mainnet, 16);
        let mut native = TrackedToken::native();
        native.claim();
        native.loading = false;
        store.publish(StoreAction::InitTokens(vec![native]));
        store.publish(StoreAction::InitTransactions(vec![TrackedTransaction::new(
            "0xHASH1",
            TxStatus::Pending,
        )]));
        (store, Lifecycle::new(), ReconcileLogger::new(8))
    }

    fn confirmed(hash: &str) -> TransactionEvent {
        TransactionEvent {
            hash: hash.to_string(),
            status: TxStatus::Confirmed,
            receipt: None,
        }
    }

    #[test]
    fn test_tracked_confirmation_dirties_tokens() {
        let (store, lifecycle, logger) = fixture();
        apply_event(&store, &lifecycle, &logger, confirmed("0xhash1"));

        assert_eq!(
            store.transaction("0xHASH1").unwrap().status,
            TxStatus::Confirmed
        );
        assert!(store.tokens().iter().all(|t| t.dirty));
    }

    #[test]
    fn test_untracked_hash_is_ignored() {
        let (store, lifecycle, logger) = fixture();
        apply_event(&store, &lifecycle, &logger, confirmed("0xother"));

        assert!(store.transaction("0xother").is_none());
        assert!(store.tokens().iter().all(|t| !t.dirty));
        assert_eq!(logger.events().len(), 1);
    }

    #[test]
    fn test_events_after_teardown_are_dropped() {
        let (store, lifecycle, logger) = fixture();
        lifecycle.teardown();
        apply_event(&store, &lifecycle, &logger, confirmed("0xhash1"));

        assert_eq!(
            store.transaction("0xhash1").unwrap().status,
            TxStatus::Pending
        );
    }
}
