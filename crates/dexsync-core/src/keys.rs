//! Raw-key credentials and account derivation
//!
//! A raw credential is a hex-encoded secp256k1 secret key. The account address
//! is the last 20 bytes of the Keccak-256 hash of the uncompressed public key.

use crate::address::{WalletAddress, ADDRESS_LEN};
use crate::{Error, Result};
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use sha3::{Digest, Keccak256};
use std::fmt;
use zeroize::Zeroizing;

/// Hex-encoded secret key held in zeroizing memory.
#[derive(Clone)]
pub struct RawCredential(Zeroizing<String>);

impl RawCredential {
    /// Wrap a credential string
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Borrow the secret value
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    /// Whether the credential is blank
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for RawCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RawCredential(<redacted>)")
    }
}

impl PartialEq for RawCredential {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for RawCredential {}

/// Derive the account address controlled by a raw credential.
pub fn derive_address(credential: &RawCredential) -> Result<WalletAddress> {
    let trimmed = credential.expose().trim();
    let hex_key = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let key_bytes = Zeroizing::new(
        hex::decode(hex_key).map_err(|e| Error::InvalidKey(format!("Key is not hex: {e}")))?,
    );
    if key_bytes.len() != 32 {
        return Err(Error::InvalidKey(format!(
            "Expected 32-byte key, got {} bytes",
            key_bytes.len()
        )));
    }

    let secret = SecretKey::from_slice(&key_bytes)
        .map_err(|e| Error::KeyDerivation(format!("Invalid secp256k1 key: {e}")))?;
    let public = PublicKey::from_secret_key(&Secp256k1::signing_only(), &secret);
    let uncompressed = public.serialize_uncompressed();

    let mut hasher = Keccak256::new();
    hasher.update(&uncompressed[1..]);
    let digest = hasher.finalize();

    let mut account = [0u8; ADDRESS_LEN];
    account.copy_from_slice(&digest[12..]);
    WalletAddress::from_bytes(account)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn test_known_vector() {
        let addr = derive_address(&RawCredential::new(KEY_ONE)).unwrap();
        assert_eq!(addr.hex(), "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf");
    }

    #[test]
    fn test_prefix_optional() {
        let with = derive_address(&RawCredential::new(KEY_ONE)).unwrap();
        let without = derive_address(&RawCredential::new(&KEY_ONE[2..])).unwrap();
        assert_eq!(with, without);
    }

    #[test]
    fn test_invalid_keys() {
        assert!(derive_address(&RawCredential::new("")).is_err());
        assert!(derive_address(&RawCredential::new("0x1234")).is_err());
        assert!(derive_address(&RawCredential::new("not hex at all")).is_err());
        // Zero is outside the secp256k1 scalar range.
        let zero = format!("0x{}", "00".repeat(32));
        assert!(matches!(
            derive_address(&RawCredential::new(zero)),
            Err(Error::KeyDerivation(_))
        ));
    }

    #[test]
    fn test_debug_is_redacted() {
        let cred = RawCredential::new(KEY_ONE);
        assert!(!format!("{:?}", cred).contains("0001"));
    }
}
