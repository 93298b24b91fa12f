//! Deterministic in-memory collaborators
//!
//! Enabled with the `test-helpers` feature. Each fake records the calls it
//! receives so tests can assert on call counts and bind history.

#![allow(missing_docs)]

use crate::ports::{
    AccountChanged, ExtensionAccount, ExtensionWallet, HistoryEntry, HistoryQuery, LedgerClient,
    NetworkChanged, TransactionCallback, TransactionEvent, TransactionHistory, WalletBinding,
};
use crate::{Error, Result};
use async_trait::async_trait;
use dexsync_core::{
    AllowanceMap, Amount, AssetDescriptor, BalanceMap, PoolRef, WalletAddress,
};
use dexsync_params::NetworkType;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// One `bind_wallet` / `bind_readonly` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindRecord {
    Wallet {
        address: String,
        network: NetworkType,
        extension: bool,
    },
    ReadOnly {
        network: NetworkType,
    },
}

impl BindRecord {
    pub fn network(&self) -> NetworkType {
        match self {
            BindRecord::Wallet { network, .. } | BindRecord::ReadOnly { network } => *network,
        }
    }
}

#[derive(Default)]
struct LedgerData {
    native_balances: HashMap<String, Amount>,
    token_lists: HashMap<NetworkType, Vec<AssetDescriptor>>,
    balance_mappings: HashMap<String, BalanceMap>,
    allowance_mappings: HashMap<String, AllowanceMap>,
    pools: HashMap<String, PoolRef>,
    names: HashMap<String, String>,
    failing_tokens: HashSet<String>,
    token_list_failures: usize,
    fail_bind: bool,
    binds: Vec<BindRecord>,
    watched_transactions: Vec<String>,
}

/// In-memory ledger client
#[derive(Default)]
pub struct FakeLedger {
    data: Mutex<LedgerData>,
    observer: RwLock<Option<TransactionCallback>>,
    delay: Mutex<Duration>,
    get_balance_calls: AtomicUsize,
    balance_mapping_calls: AtomicUsize,
    token_list_calls: AtomicUsize,
}

fn key(address: &str) -> String {
    address.to_ascii_lowercase()
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay applied to every remote read
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn set_native_balance(&self, holder: &str, amount: Amount) {
        self.data.lock().native_balances.insert(key(holder), amount);
    }

    pub fn set_token_list(&self, network: NetworkType, tokens: Vec<AssetDescriptor>) {
        self.data.lock().token_lists.insert(network, tokens);
    }

    pub fn set_balance_mapping(&self, token: &str, balances: BalanceMap) {
        self.data.lock().balance_mappings.insert(key(token), balances);
    }

    pub fn set_allowance_mapping(&self, token: &str, allowances: AllowanceMap) {
        self.data
            .lock()
            .allowance_mappings
            .insert(key(token), allowances);
    }

    pub fn set_pool(&self, token: &str, pool: PoolRef) {
        self.data.lock().pools.insert(key(token), pool);
    }

    pub fn set_constructor_name(&self, token: &str, name: &str) {
        self.data.lock().names.insert(key(token), name.to_string());
    }

    /// Make every read for `token` fail
    pub fn fail_token(&self, token: &str) {
        self.data.lock().failing_tokens.insert(key(token));
    }

    /// Fail the next `count` token list requests
    pub fn fail_token_lists(&self, count: usize) {
        self.data.lock().token_list_failures = count;
    }

    pub fn set_fail_bind(&self, fail: bool) {
        self.data.lock().fail_bind = fail;
    }

    pub fn binds(&self) -> Vec<BindRecord> {
        self.data.lock().binds.clone()
    }

    pub fn last_bind(&self) -> Option<BindRecord> {
        self.data.lock().binds.last().cloned()
    }

    pub fn watched_transactions(&self) -> Vec<String> {
        self.data.lock().watched_transactions.clone()
    }

    pub fn has_observer(&self) -> bool {
        self.observer.read().is_some()
    }

    /// Deliver a transaction update to the registered observer
    pub fn emit_transaction(&self, event: TransactionEvent) -> bool {
        let callback = self.observer.read().clone();
        match callback {
            Some(callback) => {
                callback(event);
                true
            }
            None => false,
        }
    }

    pub fn get_balance_calls(&self) -> usize {
        self.get_balance_calls.load(Ordering::SeqCst)
    }

    pub fn balance_mapping_calls(&self) -> usize {
        self.balance_mapping_calls.load(Ordering::SeqCst)
    }

    pub fn token_list_calls(&self) -> usize {
        self.token_list_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_token(&self, token: &str) -> Result<()> {
        if self.data.lock().failing_tokens.contains(&key(token)) {
            return Err(Error::Ledger(format!("token {} unavailable", token)));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for FakeLedger {
    async fn bind_wallet(
        &self,
        wallet: &WalletBinding,
        network: NetworkType,
        _watched_tokens: &[String],
    ) -> Result<()> {
        let mut data = self.data.lock();
        if data.fail_bind {
            return Err(Error::Ledger("bind rejected".to_string()));
        }
        data.binds.push(BindRecord::Wallet {
            address: wallet.address().hex().to_string(),
            network,
            extension: matches!(wallet, WalletBinding::Extension { .. }),
        });
        Ok(())
    }

    async fn bind_readonly(&self, network: NetworkType, _watched_tokens: &[String]) {
        self.data.lock().binds.push(BindRecord::ReadOnly { network });
    }

    async fn get_balance(&self, address: &WalletAddress) -> Result<Amount> {
        self.get_balance_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Ok(self
            .data
            .lock()
            .native_balances
            .get(address.hex())
            .copied()
            .unwrap_or(0))
    }

    async fn token_list(&self, network: NetworkType) -> Result<Vec<AssetDescriptor>> {
        self.token_list_calls.fetch_add(1, Ordering::SeqCst);
        let mut data = self.data.lock();
        if data.token_list_failures > 0 {
            data.token_list_failures -= 1;
            return Err(Error::Ledger("token list unavailable".to_string()));
        }
        Ok(data
            .token_lists
            .get(&network)
            .cloned()
            .unwrap_or_default())
    }

    async fn balance_mapping(&self, token: &str) -> Result<BalanceMap> {
        self.balance_mapping_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.check_token(token)?;
        Ok(self
            .data
            .lock()
            .balance_mappings
            .get(&key(token))
            .cloned()
            .unwrap_or_default())
    }

    async fn allowance_mapping(&self, token: &str) -> Result<AllowanceMap> {
        self.check_token(token)?;
        Ok(self
            .data
            .lock()
            .allowance_mappings
            .get(&key(token))
            .cloned()
            .unwrap_or_default())
    }

    async fn pool(&self, token: &str) -> Result<Option<PoolRef>> {
        self.check_token(token)?;
        Ok(self.data.lock().pools.get(&key(token)).cloned())
    }

    async fn constructor_name(&self, token: &str) -> Result<Option<String>> {
        self.check_token(token)?;
        Ok(self.data.lock().names.get(&key(token)).cloned())
    }

    fn register_transaction_observer(&self, callback: Option<TransactionCallback>) {
        *self.observer.write() = callback;
    }

    async fn watch_transaction(&self, hash: &str) -> Result<()> {
        self.data
            .lock()
            .watched_transactions
            .push(hash.to_ascii_lowercase());
        Ok(())
    }
}

/// In-memory browser-extension wallet
pub struct FakeExtension {
    account: Mutex<std::result::Result<ExtensionAccount, String>>,
    account_events: bool,
    network_events: bool,
    account_senders: Mutex<Vec<mpsc::UnboundedSender<AccountChanged>>>,
    network_senders: Mutex<Vec<mpsc::UnboundedSender<NetworkChanged>>>,
    connect_calls: AtomicUsize,
}

impl FakeExtension {
    /// Extension that authorizes `address` on `network`
    pub fn new(address: WalletAddress, network: &str) -> Self {
        Self {
            account: Mutex::new(Ok(ExtensionAccount {
                address,
                network: network.to_string(),
            })),
            account_events: true,
            network_events: true,
            account_senders: Mutex::new(Vec::new()),
            network_senders: Mutex::new(Vec::new()),
            connect_calls: AtomicUsize::new(0),
        }
    }

    /// Extension that refuses authorization
    pub fn rejecting(reason: &str) -> Self {
        let mut extension = Self::new(placeholder_address(), "mainnet");
        extension.account = Mutex::new(Err(reason.to_string()));
        extension
    }

    /// Drop the change-stream primitives
    pub fn without_change_streams(mut self) -> Self {
        self.account_events = false;
        self.network_events = false;
        self
    }

    /// Change what the next `connect` reports
    pub fn set_account(&self, address: WalletAddress, network: &str) {
        *self.account.lock() = Ok(ExtensionAccount {
            address,
            network: network.to_string(),
        });
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn account_watchers(&self) -> usize {
        self.account_senders.lock().len()
    }

    pub fn network_watchers(&self) -> usize {
        self.network_senders.lock().len()
    }

    pub fn emit_account(&self, address: &str) {
        for sender in self.account_senders.lock().iter() {
            let _ = sender.send(AccountChanged {
                address: address.to_string(),
            });
        }
    }

    pub fn emit_network(&self, network: &str) {
        for sender in self.network_senders.lock().iter() {
            let _ = sender.send(NetworkChanged {
                network: network.to_string(),
            });
        }
    }
}

fn placeholder_address() -> WalletAddress {
    WalletAddress::parse("0x0000000000000000000000000000000000000001")
        .unwrap_or_else(|_| unreachable!("constant address is valid"))
}

#[async_trait]
impl ExtensionWallet for FakeExtension {
    async fn connect(&self) -> Result<ExtensionAccount> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.account.lock().clone().map_err(Error::Extension)
    }

    fn observe_account_changes(&self) -> Option<mpsc::UnboundedReceiver<AccountChanged>> {
        if !self.account_events {
            return None;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.account_senders.lock().push(tx);
        Some(rx)
    }

    fn observe_network_changes(&self) -> Option<mpsc::UnboundedReceiver<NetworkChanged>> {
        if !self.network_events {
            return None;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.network_senders.lock().push(tx);
        Some(rx)
    }
}

/// In-memory transaction history
#[derive(Default)]
pub struct FakeHistory {
    entries: Mutex<Vec<HistoryEntry>>,
    failure: Mutex<Option<String>>,
    queries: Mutex<Vec<HistoryQuery>>,
}

impl FakeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<HistoryEntry>) -> Self {
        let history = Self::default();
        *history.entries.lock() = entries;
        history
    }

    pub fn set_entries(&self, entries: Vec<HistoryEntry>) {
        *self.entries.lock() = entries;
    }

    pub fn fail_with(&self, reason: &str) {
        *self.failure.lock() = Some(reason.to_string());
    }

    pub fn queries(&self) -> Vec<HistoryQuery> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl TransactionHistory for FakeHistory {
    async fn list_transactions(&self, query: &HistoryQuery) -> Result<Vec<HistoryEntry>> {
        self.queries.lock().push(query.clone());
        if let Some(reason) = self.failure.lock().clone() {
            return Err(Error::History(reason));
        }
        let mut entries = self.entries.lock().clone();
        entries.truncate(query.page_size);
        Ok(entries)
    }
}
