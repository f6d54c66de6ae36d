//! Persistent Key-Value Store
//!
//! Session state (history, mode, failure tally, agent threads, assistant
//! progress) is kept behind [`KeyValueStore`] so the session never touches
//! storage directly. Values are strings; [`StoreExt`] adds typed JSON access.
//!
//! # File Format
//!
//! [`FileStore`] writes one JSON object per file, prefixed by its CRC32:
//!
//! ```text
//! crc32:<8 hex digits>\n
//! {"history":"[...]","mode":"\"shell\"",...}
//! ```
//!
//! A checksum mismatch is reported as [`StoreError::Corrupt`] rather than
//! silently loading half-written state.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Well-known keys
pub mod keys {
    /// Submitted lines, oldest first
    pub const HISTORY: &str = "history";
    /// Last detected user level
    pub const USER_LEVEL: &str = "user_level";
    /// Current session mode
    pub const MODE: &str = "mode";
    /// Failure tally
    pub const FAILURE_TALLY: &str = "failure_tally";
    /// Recent shell misses
    pub const FAILED_COMMANDS: &str = "failed_commands";
    /// Guided assistant progress
    pub const ASSISTANT: &str = "assistant";
    /// Working directory
    pub const CURRENT_DIR: &str = "current_dir";
    /// Activity log used as model context
    pub const SESSION_LOG: &str = "session_log";

    /// Key of the thread for agent `agent_id`
    #[must_use]
    pub fn agent(agent_id: u32) -> String {
        format!("agent:{agent_id}")
    }
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem error
    #[error("store I/O error at {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Value could not be (de)serialized
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File contents do not match their checksum
    #[error("store file {path} is corrupt: {reason}")]
    Corrupt {
        /// File involved
        path: PathBuf,
        /// What was wrong
        reason: String,
    },
}

/// String key-value storage
pub trait KeyValueStore: Send + Sync {
    /// Value for `key`
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`
    ///
    /// # Errors
    ///
    /// Fails if the value cannot be persisted.
    fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Delete `key` (no-op if absent)
    ///
    /// # Errors
    ///
    /// Fails if the removal cannot be persisted.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Typed JSON access on any [`KeyValueStore`]
pub trait StoreExt: KeyValueStore {
    /// Decode the value under `key`; unreadable values count as absent
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Ignoring unreadable stored value");
                None
            }
        }
    }

    /// Encode `value` and store it under `key`
    ///
    /// # Errors
    ///
    /// Fails on serialization or persistence errors.
    fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        self.set(key, serde_json::to_string(value)?)
    }
}

impl<S: KeyValueStore + ?Sized> StoreExt for S {}

// ============================================================================
// MemoryStore
// ============================================================================

/// Volatile store, used for tests and `--ephemeral` sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

// ============================================================================
// FileStore
// ============================================================================

const CHECKSUM_PREFIX: &str = "crc32:";

/// Store persisted to a single checksummed JSON file
///
/// Every write rewrites the file through a temporary sibling and a rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Default location: `$XDG_DATA_HOME/phantom-shell/state.json`
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("phantom-shell").join("state.json"))
    }

    /// Open (or start) the store at `path`
    ///
    /// A missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or fails its checksum.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => decode(&path, &contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        tracing::debug!(path = %path.display(), entries = entries.len(), "Opened state file");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// File backing this store
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let payload = serde_json::to_string(entries)?;
        let contents = format!(
            "{CHECKSUM_PREFIX}{:08x}\n{payload}",
            crc32fast::hash(payload.as_bytes())
        );

        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(contents.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

fn decode(path: &Path, contents: &str) -> Result<BTreeMap<String, String>, StoreError> {
    let corrupt = |reason: &str| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    let (header, payload) = contents
        .split_once('\n')
        .ok_or_else(|| corrupt("missing checksum header"))?;
    let expected = header
        .strip_prefix(CHECKSUM_PREFIX)
        .and_then(|hex| u32::from_str_radix(hex.trim(), 16).ok())
        .ok_or_else(|| corrupt("malformed checksum header"))?;
    if crc32fast::hash(payload.as_bytes()) != expected {
        return Err(corrupt("checksum mismatch"));
    }
    Ok(serde_json::from_str(payload)?)
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value);
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_typed_roundtrip() {
        let store = MemoryStore::new();
        store.set_json(keys::HISTORY, &vec!["ls", "pwd"]).unwrap();
        let history: Vec<String> = store.get_json(keys::HISTORY).unwrap();
        assert_eq!(history, vec!["ls".to_string(), "pwd".to_string()]);

        store.remove(keys::HISTORY).unwrap();
        assert!(store.get(keys::HISTORY).is_none());
    }

    #[test]
    fn test_unreadable_value_is_absent() {
        let store = MemoryStore::new();
        store.set(keys::MODE, "{not json".to_string()).unwrap();
        assert!(store.get_json::<String>(keys::MODE).is_none());
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = FileStore::open(&path).unwrap();
        assert!(store.get("a").is_none());
        store.set("a", "1".to_string()).unwrap();
        store.set(&keys::agent(7), "[]".to_string()).unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("a").as_deref(), Some("1"));
        assert_eq!(reopened.get("agent:7").as_deref(), Some("[]"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_file_store_detects_tampering() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        FileStore::open(&path)
            .unwrap()
            .set("level", "\"beginner\"".to_string())
            .unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        fs::write(&path, contents.replace("beginner", "advanced")).unwrap();

        assert!(matches!(
            FileStore::open(&path),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_file_store_rejects_missing_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{}").unwrap();
        assert!(matches!(
            FileStore::open(&path),
            Err(StoreError::Corrupt { .. })
        ));
    }
}
