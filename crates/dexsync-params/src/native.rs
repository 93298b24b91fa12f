//! Native asset constants

/// Key of the synthetic native asset in the tracked token set.
///
/// The native asset has no contract address; it is refreshed through the
/// wallet balance path rather than the token metadata path.
pub const NATIVE_ASSET_ADDRESS: &str = "native";

/// Native asset ticker
pub const NATIVE_SYMBOL: &str = "ONE";

/// Native asset display name
pub const NATIVE_NAME: &str = "Harmony ONE";

/// Native asset decimal precision
pub const NATIVE_DECIMALS: u8 = 18;

/// Human-readable part of bech32 wallet addresses
pub const ADDRESS_HRP: &str = "one";
