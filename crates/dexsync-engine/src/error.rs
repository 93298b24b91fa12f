//! Error types for reconciliation operations

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
///
/// Errors are cloneable so one in-flight fetch can hand the same outcome to
/// every caller that joined it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Ledger client error
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Extension wallet error
    #[error("Extension error: {0}")]
    Extension(String),

    /// Extension wallet not present in the host
    #[error("Extension wallet not available")]
    ExtensionUnavailable,

    /// Transaction history service error
    #[error("History error: {0}")]
    History(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Remote call exceeded its deadline
    #[error("Timed out after {0}s")]
    Timeout(u64),

    /// Operation cancelled by teardown
    #[error("Cancelled")]
    Cancelled,
}

impl Error {
    /// Message suitable for a user-visible notification
    pub fn user_message(&self) -> String {
        match self {
            Error::Extension(reason) => format!("Could not connect the browser wallet: {}", reason),
            Error::ExtensionUnavailable => {
                "No browser wallet was found. Install or unlock the extension and try again."
                    .to_string()
            }
            Error::Ledger(_) | Error::Timeout(_) => {
                "Unable to reach the network. Please check your connection and try again."
                    .to_string()
            }
            Error::History(_) => "Could not load transaction history.".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Config(format!("IO error: {}", e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(format!("Invalid JSON: {}", e))
    }
}
