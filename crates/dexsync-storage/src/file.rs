//! JSON file-backed session hints

use crate::hints::{SessionHints, SessionStore};
use crate::{Error, Result};
use directories::ProjectDirs;
use dexsync_core::RawCredential;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

const HINTS_FILE_NAME: &str = "session_hints.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    raw_credential: Option<String>,
    #[serde(default)]
    extension_connected: bool,
}

/// Session hints persisted as a small JSON document
pub struct JsonFileSessionStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileSessionStore {
    /// Store hints at an explicit file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store hints inside a directory
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(HINTS_FILE_NAME))
    }

    /// Store hints in the platform data directory
    pub fn default_location() -> Result<Self> {
        let dirs = ProjectDirs::from("com", "DexWallet", "DexSync")
            .ok_or_else(|| Error::Location("no home directory".to_string()))?;
        Ok(Self::in_dir(dirs.data_local_dir()))
    }

    /// Location of the hints file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StoredHints> {
        let raw = match fs::read(&self.path) {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StoredHints::default()),
            Err(e) => return Err(e.into()),
        };
        if raw.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(StoredHints::default());
        }
        Ok(serde_json::from_slice(&raw)?)
    }

    fn write(&self, hints: &StoredHints) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = Zeroizing::new(serde_json::to_vec_pretty(hints)?);
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes.as_slice())?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut StoredHints)) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut stored = self.read()?;
        apply(&mut stored);
        self.write(&stored)?;
        tracing::debug!(path = %self.path.display(), "Session hints written");
        Ok(())
    }
}

impl SessionStore for JsonFileSessionStore {
    fn load(&self) -> Result<SessionHints> {
        let stored = self.read()?;
        Ok(SessionHints {
            raw_credential: stored.raw_credential.map(RawCredential::new),
            extension_connected: stored.extension_connected,
        })
    }

    fn set_credential(&self, credential: Option<&RawCredential>) -> Result<()> {
        let value = credential.map(|c| c.expose().to_string());
        self.update(move |stored| stored.raw_credential = value)
    }

    fn set_extension_connected(&self, connected: bool) -> Result<()> {
        self.update(|stored| stored.extension_connected = connected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileSessionStore::in_dir(dir.path());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_hints_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = JsonFileSessionStore::in_dir(dir.path());
            store
                .set_credential(Some(&RawCredential::new("0xfeed")))
                .unwrap();
            store.set_extension_connected(true).unwrap();
        }

        let reopened = JsonFileSessionStore::in_dir(dir.path());
        let hints = reopened.load().unwrap();
        assert_eq!(hints.credential().map(|c| c.expose()), Some("0xfeed"));
        assert!(hints.extension_connected);
    }

    #[test]
    fn test_clear_removes_credential() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileSessionStore::in_dir(dir.path().join("nested"));
        store
            .set_credential(Some(&RawCredential::new("0xfeed")))
            .unwrap();
        store.clear().unwrap();

        let contents = fs::read_to_string(store.path()).unwrap();
        assert!(!contents.contains("feed"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileSessionStore::in_dir(dir.path());
        fs::write(store.path(), b"{not json").unwrap();
        assert!(matches!(store.load(), Err(Error::Serialization(_))));
    }
}
