//! Wallet addresses in bech32 (`one1...`) and 20-byte hex (`0x...`) form
//!
//! Harmony accounts have two textual encodings of the same 20 bytes. The
//! engine keys holder mappings by the lower-cased hex form, so both forms are
//! carried on every address.

use crate::{Error, Result};
use bech32::{Bech32, Hrp};
use dexsync_params::ADDRESS_HRP;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of a raw account address in bytes
pub const ADDRESS_LEN: usize = 20;

/// Account address with both textual encodings
///
/// Serialized as the hex form; deserialization goes through [`WalletAddress::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress {
    /// Lower-case `0x`-prefixed hex form
    hex: String,
    /// Bech32 form (`one1...`)
    bech32: String,
}

impl WalletAddress {
    /// Build from raw account bytes
    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Result<Self> {
        let hrp = Hrp::parse(ADDRESS_HRP)
            .map_err(|e| Error::InvalidAddress(format!("Invalid address HRP: {e}")))?;
        let bech32 = bech32::encode::<Bech32>(hrp, &bytes)
            .map_err(|e| Error::InvalidAddress(format!("bech32 encode failed: {e}")))?;

        Ok(Self {
            hex: format!("0x{}", hex::encode(bytes)),
            bech32,
        })
    }

    /// Parse either a `one1...` bech32 address or a `0x...` hex address.
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidAddress("Address is empty".to_string()));
        }

        let bytes = if let Some(stripped) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            hex::decode(stripped)
                .map_err(|e| Error::InvalidAddress(format!("Invalid hex address: {e}")))?
        } else {
            let (hrp, data) = bech32::decode(trimmed)
                .map_err(|e| Error::InvalidAddress(format!("bech32 decode failed: {e}")))?;
            if !hrp.as_str().eq_ignore_ascii_case(ADDRESS_HRP) {
                return Err(Error::InvalidAddress(format!(
                    "Unexpected address prefix: {}",
                    hrp.as_str()
                )));
            }
            data
        };

        let raw: [u8; ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|_| Error::InvalidAddress("Address must be 20 bytes".to_string()))?;
        Self::from_bytes(raw)
    }

    /// Lower-case hex form, used as the holder key in balance mappings
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Bech32 form
    pub fn bech32(&self) -> &str {
        &self.bech32
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<WalletAddress> for String {
    fn from(address: WalletAddress) -> Self {
        address.hex
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.bech32)
    }
}

/// Normalize a holder or spender key for mapping lookups.
pub fn normalize_holder(key: &str) -> String {
    key.trim().to_ascii_lowercase()
}
