//! DEX wallet domain model
//!
//! Wallet addresses and key derivation, the active wallet session, tracked
//! tokens and tracked transactions shared by the reconciliation engine and
//! its collaborators.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod address;
pub mod error;
pub mod keys;
pub mod session;
pub mod token;
pub mod transaction;

pub use address::{normalize_holder, WalletAddress, ADDRESS_LEN};
pub use error::{Error, ErrorCategory, Result};
pub use keys::{derive_address, RawCredential};
pub use session::{ConnectionMode, WalletSession};
pub use token::{AllowanceMap, Amount, AssetDescriptor, BalanceMap, PoolRef, TrackedToken};
pub use transaction::{normalize_hash, TrackedTransaction, TxStatus};
