//! Error types for the wallet domain model
//!
//! Error taxonomy for address parsing, key derivation and record validation.

use std::fmt;

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Domain errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid address format
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Key derivation error
    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    /// Invalid key
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Invalid network name
    #[error("Invalid network: {0}")]
    InvalidNetwork(String),

    /// Invalid transaction status
    #[error("Invalid transaction status: {0}")]
    InvalidStatus(String),
}

impl From<dexsync_params::Error> for Error {
    fn from(e: dexsync_params::Error) -> Self {
        match e {
            dexsync_params::Error::InvalidNetwork(name) => Error::InvalidNetwork(name),
        }
    }
}

impl Error {
    /// Check if error is a user-facing error (vs internal error)
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidAddress(_) | Error::InvalidKey(_) | Error::InvalidNetwork(_)
        )
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidAddress(_) => {
                "The wallet address is invalid. Please check and try again.".to_string()
            }
            Error::InvalidKey(_) | Error::KeyDerivation(_) => {
                "The private key is invalid. Please check and try again.".to_string()
            }
            Error::InvalidNetwork(name) => {
                format!("The network \"{}\" is not supported.", name)
            }
            _ => self.to_string(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidAddress(_) => ErrorCategory::Address,
            Error::KeyDerivation(_) | Error::InvalidKey(_) => ErrorCategory::Keys,
            Error::InvalidNetwork(_) => ErrorCategory::Network,
            Error::InvalidStatus(_) => ErrorCategory::Transaction,
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Address-related errors
    Address,
    /// Key-related errors
    Keys,
    /// Network-related errors
    Network,
    /// Transaction-related errors
    Transaction,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Address => write!(f, "Address"),
            ErrorCategory::Keys => write!(f, "Keys"),
            ErrorCategory::Network => write!(f, "Network"),
            ErrorCategory::Transaction => write!(f, "Transaction"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_error_detection() {
        assert!(Error::InvalidAddress("test".to_string()).is_user_error());
        assert!(Error::InvalidKey("test".to_string()).is_user_error());
        assert!(!Error::KeyDerivation("test".to_string()).is_user_error());
        assert!(!Error::InvalidStatus("test".to_string()).is_user_error());
    }

    #[test]
    fn test_user_messages() {
        let msg = Error::InvalidAddress("details".to_string()).user_message();
        assert!(msg.contains("address is invalid"));

        let msg = Error::InvalidNetwork("private".to_string()).user_message();
        assert!(msg.contains("\"private\""));
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            Error::InvalidAddress("test".to_string()).category(),
            ErrorCategory::Address
        );
        assert_eq!(
            Error::KeyDerivation("test".to_string()).category(),
            ErrorCategory::Keys
        );
        assert_eq!(
            Error::InvalidStatus("test".to_string()).category(),
            ErrorCategory::Transaction
        );
    }

    #[test]
    fn test_params_error_conversion() {
        let err: Error = dexsync_params::Error::InvalidNetwork("x".to_string()).into();
        assert_eq!(err.category(), ErrorCategory::Network);
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Keys.to_string(), "Keys");
        assert_eq!(ErrorCategory::Transaction.to_string(), "Transaction");
    }
}
