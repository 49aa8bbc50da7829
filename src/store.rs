//! Durable storage for the session registry and per-session transcripts.
//!
//! The store is a plain key/value blob store: it neither knows nor cares whether a value is
//! the registry, a message list, or a model history.  Keys are typed so that the on-disk layout
//! is decided in exactly one place.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::observability::{STORE_READS, STORE_WRITES};
use crate::types::ChatSessionId;

/// Names a single record in a [`TranscriptStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// The mapping of known session ids to their records.
    Registry,
    /// The user-facing message list of one session.
    Messages(ChatSessionId),
    /// The completion backend's history of one session.
    History(ChatSessionId),
}

impl StorageKey {
    /// The file name this key is stored under.
    pub fn file_name(&self) -> String {
        match self {
            StorageKey::Registry => "past_chats.json".to_string(),
            StorageKey::Messages(id) => format!("{id}-messages.json"),
            StorageKey::History(id) => format!("{id}-model-history.json"),
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Key/value persistence that survives process restarts.
///
/// Single-writer only: no locking is performed across processes.
pub trait TranscriptStore: Send + Sync {
    /// Loads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if nothing has been saved under `key`.
    fn load(&self, key: &StorageKey) -> Result<Vec<u8>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn save(&self, key: &StorageKey, value: &[u8]) -> Result<()>;
}

/// Loads and deserializes a JSON value.
pub fn load_json<T: DeserializeOwned>(store: &dyn TranscriptStore, key: &StorageKey) -> Result<T> {
    let bytes = store.load(key)?;
    serde_json::from_slice(&bytes).map_err(|err| {
        Error::serialization(format!("failed to parse {key}"), Some(Box::new(err)))
    })
}

/// Serializes a value as JSON and saves it.
pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn TranscriptStore,
    key: &StorageKey,
    value: &T,
) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|err| {
        Error::serialization(format!("failed to serialize {key}"), Some(Box::new(err)))
    })?;
    store.save(key, &bytes)
}

fn not_found(key: &StorageKey) -> Error {
    Error::not_found(
        "no record stored under this key",
        Some("transcript".to_string()),
        Some(key.to_string()),
    )
}

/// Stores each key as one JSON file inside a data directory.
#[derive(Debug, Clone)]
pub struct FileTranscriptStore {
    root: PathBuf,
}

impl FileTranscriptStore {
    /// Creates a store rooted at `root`.  The directory is created lazily on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the data directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path a key is stored at.
    pub fn path_for(&self, key: &StorageKey) -> PathBuf {
        self.root.join(key.file_name())
    }
}

impl TranscriptStore for FileTranscriptStore {
    fn load(&self, key: &StorageKey) -> Result<Vec<u8>> {
        STORE_READS.click();
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(not_found(key)),
            Err(err) => Err(Error::io(
                format!("failed to read {}", path.display()),
                err,
            )),
        }
    }

    fn save(&self, key: &StorageKey, value: &[u8]) -> Result<()> {
        STORE_WRITES.click();
        fs::create_dir_all(&self.root).map_err(|err| {
            Error::io(
                format!("failed to create {}", self.root.display()),
                err,
            )
        })?;
        let path = self.path_for(key);
        let tmp = self.root.join(format!(".{}.tmp", key.file_name()));
        let write = || -> io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(value)?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        };
        write().map_err(|err| Error::io(format!("failed to write {}", path.display()), err))
    }
}

/// Keeps every record in memory; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryTranscriptStore {
    records: Mutex<HashMap<StorageKey, Vec<u8>>>,
}

impl MemoryTranscriptStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a value is stored under `key`.
    pub fn contains(&self, key: &StorageKey) -> bool {
        self.records
            .lock()
            .map(|records| records.contains_key(key))
            .unwrap_or(false)
    }
}

impl TranscriptStore for MemoryTranscriptStore {
    fn load(&self, key: &StorageKey) -> Result<Vec<u8>> {
        STORE_READS.click();
        let records = self
            .records
            .lock()
            .map_err(|_| Error::io("transcript store lock poisoned", io::Error::other("poisoned")))?;
        records.get(key).cloned().ok_or_else(|| not_found(key))
    }

    fn save(&self, key: &StorageKey, value: &[u8]) -> Result<()> {
        STORE_WRITES.click();
        let mut records = self
            .records
            .lock()
            .map_err(|_| Error::io("transcript store lock poisoned", io::Error::other("poisoned")))?;
        records.insert(key.clone(), value.to_vec());
        Ok(())
    }
}
