//! Persisted session hints for wallet session resumption
//!
//! Two scalar hints survive restarts: the stored raw credential and the
//! "extension connected" flag. The connection resolver reads them at startup
//! to pick exactly one connection strategy.
//!
//! ## Backends
//!
//! - **Memory**: process-lifetime storage, credential held in zeroizing memory
//! - **JSON file**: small JSON document written atomically (temp file + rename)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod file;
pub mod hints;
pub mod memory;

pub use error::{Error, Result};
pub use file::JsonFileSessionStore;
pub use hints::{SessionHints, SessionStore};
pub use memory::MemorySessionStore;
