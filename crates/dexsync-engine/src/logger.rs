//! Structured logging for reconciliation observability
//!
//! Every reconciliation milestone is emitted as a `tracing` event with an
//! `event` field and recorded in a bounded ring for export.

#![allow(missing_docs)]

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Reconciliation event type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReconcileEvent {
    /// Wallet bound
    SessionConnected {
        mode: String,
        address: String,
        network: String,
    },
    /// Connection failed and the engine fell back to read-only
    SessionFallback { reason: String },
    /// Token set re-seeded for a network
    NetworkReseed { network: String, token_count: usize },
    /// Token refresh started
    RefreshStarted { address: String },
    /// Token refresh finished
    RefreshCompleted { address: String, duration_ms: u64 },
    /// Token refresh failed
    RefreshFailed { address: String, error: String },
    /// Result of a refresh from an earlier epoch thrown away
    RefreshDiscarded { address: String },
    /// Transaction status reported by the ledger
    TransactionStatus {
        hash: String,
        status: String,
        tracked: bool,
    },
}

/// Reconciliation logger
pub struct ReconcileLogger {
    capacity: usize,
    events: Mutex<VecDeque<ReconcileEvent>>,
}

impl ReconcileLogger {
    /// Logger that keeps the most recent `capacity` events
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    fn record(&self, event: ReconcileEvent) {
        if self.capacity == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    pub fn log_session_connected(&self, mode: &str, address: &str, network: &str) {
        info!(
            event = "session_connected",
            mode = %mode,
            address = %address,
            network = %network,
            "Wallet session connected"
        );
        self.record(ReconcileEvent::SessionConnected {
            mode: mode.to_string(),
            address: address.to_string(),
            network: network.to_string(),
        });
    }

    pub fn log_session_fallback(&self, reason: &str) {
        warn!(
            event = "session_fallback",
            reason = %reason,
            "Falling back to read-only connection"
        );
        self.record(ReconcileEvent::SessionFallback {
            reason: reason.to_string(),
        });
    }

    pub fn log_network_reseed(&self, network: &str, token_count: usize) {
        info!(
            event = "network_reseed",
            network = %network,
            token_count = %token_count,
            "Token set re-seeded"
        );
        self.record(ReconcileEvent::NetworkReseed {
            network: network.to_string(),
            token_count,
        });
    }

    pub fn log_refresh_started(&self, address: &str) {
        debug!(event = "refresh_started", address = %address, "Token refresh started");
        self.record(ReconcileEvent::RefreshStarted {
            address: address.to_string(),
        });
    }

    pub fn log_refresh_completed(&self, address: &str, duration_ms: u64) {
        debug!(
            event = "refresh_completed",
            address = %address,
            duration_ms = %duration_ms,
            "Token refresh completed"
        );
        self.record(ReconcileEvent::RefreshCompleted {
            address: address.to_string(),
            duration_ms,
        });
    }

    pub fn log_refresh_failed(&self, address: &str, error: &str) {
        warn!(
            event = "refresh_failed",
            address = %address,
            error = %error,
            "Token refresh failed"
        );
        self.record(ReconcileEvent::RefreshFailed {
            address: address.to_string(),
            error: error.to_string(),
        });
    }

    pub fn log_refresh_discarded(&self, address: &str) {
        debug!(event = "refresh_discarded", address = %address, "Stale refresh discarded");
        self.record(ReconcileEvent::RefreshDiscarded {
            address: address.to_string(),
        });
    }

    pub fn log_transaction_status(&self, hash: &str, status: &str, tracked: bool) {
        info!(
            event = "transaction_status",
            hash = %hash,
            status = %status,
            tracked = %tracked,
            "Transaction status update"
        );
        self.record(ReconcileEvent::TransactionStatus {
            hash: hash.to_string(),
            status: status.to_string(),
            tracked,
        });
    }

    /// Snapshot of retained events, oldest first
    pub fn events(&self) -> Vec<ReconcileEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Retained events as a JSON array
    pub fn export_events(&self) -> serde_json::Value {
        let events = self.events.lock();
        serde_json::Value::Array(
            events
                .iter()
                .filter_map(|event| serde_json::to_value(event).ok())
                .collect(),
        )
    }

    pub fn clear(&self) {
        self.events.lock().clear();
        debug!("Reconciliation log cleared");
    }
}

impl Default for ReconcileLogger {
    fn default() -> Self {
        Self::new(512)
    }
}

/// Install a global `tracing` subscriber.
///
/// Filtering follows `RUST_LOG`, defaulting to `info`. Does nothing if a
/// subscriber is already installed.
pub fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .json()
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = %json, "Reconciliation logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_logger() {
        let logger = ReconcileLogger::new(16);
        logger.log_session_connected("raw-key", "0xabc", "mainnet");
        logger.log_refresh_started("native");
        logger.log_refresh_completed("native", 12);

        assert_eq!(logger.events().len(), 3);
        assert!(matches!(
            logger.events()[0],
            ReconcileEvent::SessionConnected { .. }
        ));
    }

    #[test]
    fn test_ring_is_bounded() {
        let logger = ReconcileLogger::new(2);
        logger.log_refresh_started("a");
        logger.log_refresh_started("b");
        logger.log_refresh_started("c");

        let events = logger.events();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            ReconcileEvent::RefreshStarted {
                address: "b".to_string()
            }
        );
    }

    #[test]
    fn test_logger_export() {
        let logger = ReconcileLogger::new(4);
        logger.log_transaction_status("0xhash1", "confirmed", true);

        let export = logger.export_events();
        let array = export.as_array().unwrap();
        assert_eq!(array.len(), 1);
        assert_eq!(array[0]["event"], "transaction_status");
        assert_eq!(array[0]["tracked"], true);
    }

    #[test]
    fn test_logger_clear() {
        let logger = ReconcileLogger::new(4);
        logger.log_session_fallback("no extension");
        logger.clear();
        assert!(logger.events().is_empty());
    }
}
