//! Tracked tokens
//!
//! One entry per fungible asset known to the engine, plus a synthetic entry
//! for the native asset. The token address is the unique key.

use crate::address::normalize_holder;
use dexsync_params::{NATIVE_ASSET_ADDRESS, NATIVE_DECIMALS, NATIVE_NAME, NATIVE_SYMBOL};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Token amount in the asset's smallest unit
pub type Amount = u128;

/// Holder address (lower-case hex) to amount
pub type BalanceMap = HashMap<String, Amount>;

/// Holder address to spender address to amount
pub type AllowanceMap = HashMap<String, HashMap<String, Amount>>;

/// Asset descriptor from the DEX client's live token list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    /// Contract address
    pub address: String,
    /// Ticker
    pub symbol: String,
    /// Display name, if published in the list
    pub name: Option<String>,
    /// Decimal precision
    pub decimals: u8,
    /// Registered with the DEX
    pub registered: bool,
    /// Whitelisted for display
    pub whitelisted: bool,
}

/// Reference to the liquidity pool for a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRef {
    /// Pair contract address
    pub pair_address: String,
    /// Token the pool quotes against
    pub quote_token: String,
}

/// Tracked token state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedToken {
    /// Contract address (unique key)
    pub address: String,
    /// Ticker
    pub symbol: String,
    /// Display name
    pub name: Option<String>,
    /// Decimal precision
    pub decimals: u8,
    /// Registered with the DEX
    pub registered: bool,
    /// Whitelisted for display
    pub whitelisted: bool,
    /// Reward token that is loaded on every refresh
    pub reward: bool,
    /// Balance of the bound wallet
    pub balance: Option<Amount>,
    /// Per-holder balances
    pub balances: BalanceMap,
    /// Per-holder allowances
    pub allowances: AllowanceMap,
    /// Balance data fetched since the last invalidation
    pub balances_fetched: bool,
    /// Refreshed at least once
    pub initialized: bool,
    /// Needs a refresh
    pub dirty: bool,
    /// Refresh in progress
    pub loading: bool,
    /// Liquidity pool, if one exists
    pub pool: Option<PoolRef>,
    /// Last refresh failure
    pub error: Option<String>,
}

impl TrackedToken {
    /// Synthetic native asset entry
    pub fn native() -> Self {
        Self {
            address: NATIVE_ASSET_ADDRESS.to_string(),
            symbol: NATIVE_SYMBOL.to_string(),
            name: Some(NATIVE_NAME.to_string()),
            decimals: NATIVE_DECIMALS,
            registered: true,
            whitelisted: true,
            ..Self::blank()
        }
    }

    /// Uninitialized entry for an asset in the live token list
    pub fn from_descriptor(descriptor: &AssetDescriptor) -> Self {
        Self {
            address: descriptor.address.clone(),
            symbol: descriptor.symbol.clone(),
            name: descriptor.name.clone(),
            decimals: descriptor.decimals,
            registered: descriptor.registered,
            whitelisted: descriptor.whitelisted,
            ..Self::blank()
        }
    }

    fn blank() -> Self {
        Self {
            address: String::new(),
            symbol: String::new(),
            name: None,
            decimals: 0,
            registered: false,
            whitelisted: false,
            reward: false,
            balance: None,
            balances: BalanceMap::new(),
            allowances: AllowanceMap::new(),
            balances_fetched: false,
            initialized: false,
            dirty: true,
            loading: false,
            pool: None,
            error: None,
        }
    }

    /// Whether this is the synthetic native asset
    pub fn is_native(&self) -> bool {
        self.address == NATIVE_ASSET_ADDRESS
    }

    /// Whether the next reconciliation pass must refresh this token
    pub fn needs_refresh(&self) -> bool {
        !self.initialized || self.dirty
    }

    /// Mark the token for refresh and drop the freshness of its balance data.
    ///
    /// Last-known balances stay visible until the refresh replaces them.
    pub fn invalidate(&mut self) {
        self.dirty = true;
        self.balances_fetched = false;
    }

    /// Claim the token for a refresh: loading, no longer dirty, initialized.
    pub fn claim(&mut self) {
        self.loading = true;
        self.dirty = false;
        self.initialized = true;
    }

    /// Balance of a holder via lower-cased lookup
    pub fn balance_of(&self, holder: &str) -> Option<Amount> {
        self.balances.get(&normalize_holder(holder)).copied()
    }

    /// Whether addresses refer to the same token
    pub fn same_key(&self, address: &str) -> bool {
        self.address.eq_ignore_ascii_case(address)
    }
}
