//! Token refresh scheduler
//!
//! A pass claims every stale token (publishing `loading`, clearing `dirty`)
//! before any await, then refreshes each claimed token on its own task.
//! Generic token balances are loaded through a keyed single-flight registry
//! so concurrent requests for the same token share one fetch. Symbols come
//! from the ledger's live token list, fetched at most once per pass.

use crate::cancel::Lifecycle;
use crate::inflight::InflightRegistry;
use crate::logger::ReconcileLogger;
use crate::ports::LedgerClient;
use crate::reconcile::Signal;
use crate::store::{StateStore, StoreAction};
use crate::{Error, Result};
use dexsync_core::{
    normalize_holder, AllowanceMap, Amount, AssetDescriptor, BalanceMap, PoolRef, TrackedToken,
    WalletAddress,
};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::debug;

type LiveTokenList = Shared<BoxFuture<'static, Result<Arc<Vec<AssetDescriptor>>>>>;

/// Holder balances and allowances of one token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalances {
    /// Name recovered from constructor parameters
    pub name: Option<String>,
    /// Holder (lower-case hex) to balance
    pub balances: BalanceMap,
    /// Holder to spender to allowance, keys lower-cased
    pub allowances: AllowanceMap,
}

impl TokenBalances {
    /// Balance of a holder
    pub fn balance_of(&self, holder: &WalletAddress) -> Amount {
        self.balances.get(holder.hex()).copied().unwrap_or(0)
    }
}

#[derive(Debug, Default)]
struct Refreshed {
    name: Option<String>,
    symbol: Option<String>,
    balance: Option<Amount>,
    balances: Option<(BalanceMap, AllowanceMap)>,
    pool: Option<PoolRef>,
}

impl Refreshed {
    fn apply_to(self, token: &mut TrackedToken) {
        if token.name.is_none() {
            token.name = self.name;
        }
        if let Some(symbol) = self.symbol {
            token.symbol = symbol;
        }
        if let Some((balances, allowances)) = self.balances {
            token.balance = self.balance;
            token.balances = balances;
            token.allowances = allowances;
            // A token re-dirtied mid-flight must reload its balances.
            if !token.dirty {
                token.balances_fetched = true;
            }
        }
        if !token.is_native() {
            token.pool = self.pool;
        }
        token.error = None;
    }
}

/// Token refresh scheduler
pub struct RefreshScheduler {
    store: Arc<dyn StateStore>,
    ledger: Arc<dyn LedgerClient>,
    lifecycle: Lifecycle,
    logger: Arc<ReconcileLogger>,
    inflight: InflightRegistry<Result<TokenBalances>>,
    refreshing: Mutex<HashSet<String>>,
    epoch: AtomicU64,
    signals: mpsc::UnboundedSender<Signal>,
    timeout: Duration,
}

impl RefreshScheduler {
    /// Create a scheduler; `signals` receives a settle notice per refresh
    pub fn new(
        store: Arc<dyn StateStore>,
        ledger: Arc<dyn LedgerClient>,
        lifecycle: Lifecycle,
        logger: Arc<ReconcileLogger>,
        signals: mpsc::UnboundedSender<Signal>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            ledger,
            lifecycle,
            logger,
            inflight: InflightRegistry::new(),
            refreshing: Mutex::new(HashSet::new()),
            epoch: AtomicU64::new(0),
            signals,
            timeout,
        }
    }

    /// Start a new token-set epoch; refreshes from earlier epochs are discarded
    pub fn begin_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Number of refreshes running
    pub fn active(&self) -> usize {
        self.refreshing.lock().len()
    }

    /// Claim and refresh every stale token; returns the number started
    pub fn run_pass(self: &Arc<Self>) -> usize {
        if self.lifecycle.is_torn_down() {
            return 0;
        }
        let holder = self
            .store
            .wallet()
            .and_then(|session| session.address().cloned());
        let epoch = self.epoch.load(Ordering::Acquire);
        // Lazy: only polled if a generic token in this pass needs its symbol.
        let listing = {
            let ledger = Arc::clone(&self.ledger);
            let network = self.store.network();
            async move { ledger.token_list(network).await.map(Arc::new) }
                .boxed()
                .shared()
        };

        let mut started = 0;
        for mut token in self.store.tokens() {
            if !token.needs_refresh() {
                continue;
            }
            let key = token.address.to_ascii_lowercase();
            if !self.refreshing.lock().insert(key.clone()) {
                continue;
            }

            token.claim();
            self.store.publish(StoreAction::UpdateToken(token.clone()));
            self.logger.log_refresh_started(&token.address);

            let scheduler = Arc::clone(self);
            let holder = holder.clone();
            let listing = listing.clone();
            tokio::spawn(async move {
                scheduler.refresh(token, key, holder, listing, epoch).await;
            });
            started += 1;
        }
        started
    }

    async fn refresh(
        &self,
        token: TrackedToken,
        key: String,
        holder: Option<WalletAddress>,
        listing: LiveTokenList,
        epoch: u64,
    ) {
        let started = Instant::now();
        let fetch = self.fetch(&token, holder.as_ref(), listing);
        let outcome = match tokio::time::timeout(self.timeout, fetch).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Timeout(self.timeout.as_secs())),
        };

        self.refreshing.lock().remove(&key);
        self.finish(&token.address, epoch, outcome, started);
        let _ = self.signals.send(Signal::RefreshSettled { address: key });
    }

    fn finish(&self, address: &str, epoch: u64, outcome: Result<Refreshed>, started: Instant) {
        if self.lifecycle.is_torn_down() || self.epoch.load(Ordering::Acquire) != epoch {
            self.logger.log_refresh_discarded(address);
            return;
        }
        // Merge onto the current entity so concurrent invalidation survives.
        let Some(mut current) = self.store.token(address) else {
            self.logger.log_refresh_discarded(address);
            return;
        };

        match outcome {
            Ok(refreshed) => {
                refreshed.apply_to(&mut current);
                self.logger
                    .log_refresh_completed(address, started.elapsed().as_millis() as u64);
            }
            Err(e) => {
                self.logger.log_refresh_failed(address, &e.to_string());
                current.error = Some(e.to_string());
            }
        }
        current.loading = false;
        current.initialized = true;
        self.store.publish(StoreAction::UpdateToken(current));
    }

    async fn fetch(
        &self,
        token: &TrackedToken,
        holder: Option<&WalletAddress>,
        listing: LiveTokenList,
    ) -> Result<Refreshed> {
        if token.is_native() {
            return self.fetch_native(holder).await;
        }

        let mut refreshed = Refreshed::default();
        if !token.balances_fetched || token.reward {
            let loaded = self
                .load_balances(&token.address, token.name.is_none())
                .await?;
            refreshed.balance = holder.map(|h| loaded.balance_of(h));
            refreshed.name = loaded.name;
            refreshed.balances = Some((loaded.balances, loaded.allowances));
        }
        refreshed.pool = self.ledger.pool(&token.address).await?;
        refreshed.symbol = match listing.await {
            Ok(descriptors) => descriptors
                .iter()
                .find(|d| d.address.eq_ignore_ascii_case(&token.address))
                .map(|d| d.symbol.clone()),
            Err(e) => {
                // Keep the current symbol.
                debug!(token = %token.address, error = %e, "Token list unavailable for symbol");
                None
            }
        };
        Ok(refreshed)
    }

    async fn fetch_native(&self, holder: Option<&WalletAddress>) -> Result<Refreshed> {
        let mut balances = BalanceMap::new();
        let balance = match holder {
            Some(holder) => {
                let amount = self.ledger.get_balance(holder).await?;
                balances.insert(holder.hex().to_string(), amount);
                Some(amount)
            }
            None => None,
        };
        Ok(Refreshed {
            balance,
            balances: Some((balances, AllowanceMap::new())),
            ..Refreshed::default()
        })
    }

    /// Load holder balances and allowances for a token.
    ///
    /// Requests for the same token while a load is running share its result.
    pub async fn load_balances(&self, address: &str, resolve_name: bool) -> Result<TokenBalances> {
        let key = address.to_ascii_lowercase();
        let ledger = Arc::clone(&self.ledger);
        let token = address.to_string();
        let timeout = self.timeout;

        self.inflight
            .run(&key, move || async move {
                let load = async {
                    let name = if resolve_name {
                        ledger.constructor_name(&token).await?
                    } else {
                        None
                    };
                    let balances = ledger.balance_mapping(&token).await?;
                    let allowances = ledger.allowance_mapping(&token).await?;
                    Ok::<_, Error>(TokenBalances {
                        name,
                        balances: normalize_balances(balances),
                        allowances: normalize_allowances(allowances),
                    })
                };
                match tokio::time::timeout(timeout, load).await {
                    Ok(loaded) => loaded,
                    Err(_) => Err(Error::Timeout(timeout.as_secs())),
                }
            })
            .await
    }
}

fn normalize_balances(balances: BalanceMap) -> BalanceMap {
    balances
        .into_iter()
        .map(|(holder, amount)| (normalize_holder(&holder), amount))
        .collect()
}

fn normalize_allowances(allowances: AllowanceMap) -> AllowanceMap {
    allowances
        .into_iter()
        .map(|(holder, spenders)| (normalize_holder(&holder), normalize_balances(spenders)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holder_keys_are_lower_cased() {
        let mut balances = BalanceMap::new();
        balances.insert("0xABC".to_string(), 3);
        let normalized = normalize_balances(balances);
        assert_eq!(normalized.get("0xabc"), Some(&3));

        let mut spenders = BalanceMap::new();
        spenders.insert("0xROUTER".to_string(), 9);
        let mut allowances = AllowanceMap::new();
        allowances.insert("0xABC".to_string(), spenders);
        let normalized = normalize_allowances(allowances);
        assert_eq!(normalized["0xabc"]["0xrouter"], 9);
    }

    #[test]
    fn test_redirtied_token_keeps_balances_stale() {
        let mut token = TrackedToken::native();
        token.address = "0xtoken".to_string();
        token.claim();
        token.invalidate();

        let mut balances = BalanceMap::new();
        balances.insert("0xabc".to_string(), 1);
        Refreshed {
            balance: Some(1),
            balances: Some((balances, AllowanceMap::new())),
            ..Refreshed::default()
        }
        .apply_to(&mut token);

        assert_eq!(token.balance, Some(1));
        assert!(token.dirty);
        assert!(!token.balances_fetched);
    }

    #[test]
    fn test_failure_does_not_touch_balances() {
        let mut token = TrackedToken::native();
        token.balance = Some(5);
        token.error = Some("boom".to_string());
        Refreshed::default().apply_to(&mut token);
        assert_eq!(token.balance, Some(5));
        assert!(token.error.is_none());
    }
}
