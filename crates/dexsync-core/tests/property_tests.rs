//! Property-based tests for dexsync-core
//!
//! Uses proptest to verify invariants across randomized inputs

use dexsync_core::{derive_address, normalize_hash, normalize_holder, RawCredential, WalletAddress};
use proptest::prelude::*;

// ============================================================================
// Property Test Strategies
// ============================================================================

/// Generate raw account bytes
fn account_strategy() -> impl Strategy<Value = [u8; 20]> {
    prop::array::uniform20(any::<u8>())
}

/// Generate secret keys inside the secp256k1 scalar range
fn secret_key_strategy() -> impl Strategy<Value = [u8; 32]> {
    prop::array::uniform32(any::<u8>()).prop_filter("non-zero, below curve order", |k| {
        k.iter().any(|b| *b != 0) && k[0] < 0xff
    })
}

// ============================================================================
// Address Properties
// ============================================================================

proptest! {
    /// Property: hex and bech32 forms decode to the same account
    #[test]
    fn prop_address_forms_agree(bytes in account_strategy()) {
        let addr = WalletAddress::from_bytes(bytes).unwrap();
        let from_hex = WalletAddress::parse(addr.hex()).unwrap();
        let from_bech32 = WalletAddress::parse(addr.bech32()).unwrap();

        prop_assert_eq!(&from_hex, &addr);
        prop_assert_eq!(&from_bech32, &addr);
        prop_assert_eq!(addr.hex(), format!("0x{}", hex::encode(bytes)));
    }

    /// Property: upper-casing a hex address does not change the account
    #[test]
    fn prop_hex_case_insensitive(bytes in account_strategy()) {
        let addr = WalletAddress::from_bytes(bytes).unwrap();
        let upper = format!("0x{}", addr.hex()[2..].to_ascii_uppercase());
        prop_assert_eq!(WalletAddress::parse(&upper).unwrap(), addr);
    }

    /// Property: holder keys are always stored lower-case
    #[test]
    fn prop_holder_key_normalized(bytes in account_strategy()) {
        let addr = WalletAddress::from_bytes(bytes).unwrap();
        prop_assert_eq!(normalize_holder(addr.hex()), addr.hex().to_string());
    }

    /// Property: normalization is idempotent
    #[test]
    fn prop_normalize_idempotent(s in "[a-zA-Z0-9 ]{0,80}") {
        let once = normalize_hash(&s);
        prop_assert_eq!(normalize_hash(&once), once.clone());
        prop_assert_eq!(normalize_holder(&once), once);
    }
}

// ============================================================================
// Key Derivation Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: derivation is deterministic and ignores the 0x prefix
    #[test]
    fn prop_deterministic_derivation(key in secret_key_strategy()) {
        let bare = hex::encode(key);
        let prefixed = format!("0x{}", bare);

        let a = derive_address(&RawCredential::new(bare)).unwrap();
        let b = derive_address(&RawCredential::new(prefixed)).unwrap();
        prop_assert_eq!(a, b);
    }
}
