//! Harmony network parameters and native asset constants
//!
//! This crate provides the network identifiers the wallet engine can bind to,
//! the mapping from extension-reported network names, and the constants that
//! describe the synthetic native asset entry.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod native;
pub mod network;

pub use native::{
    NATIVE_ASSET_ADDRESS, NATIVE_DECIMALS, NATIVE_NAME, NATIVE_SYMBOL, ADDRESS_HRP,
};
pub use network::{Network, NetworkType};

/// Error types for parameter operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid network specified
    #[error("Invalid network: {0}")]
    InvalidNetwork(String),
}

/// Result type for parameter operations
pub type Result<T> = std::result::Result<T, Error>;
