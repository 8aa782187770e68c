use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// An error from a storage backend.
///
/// These never escape the privacy manager: every storage failure degrades to
/// "no consent / no data" with a warning-level log.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backing store is not available in this context.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// The backing store rejected the operation.
    #[error("Storage operation failed: {0}")]
    Backend(String),
}

/// A key-value storage capability.
///
/// The privacy manager is constructed with two providers: a persistent one
/// for consent records (origin-wide, long-lived) and an ephemeral one for
/// session data (tab-scoped, cleared at session end). No other component
/// touches these keys directly.
pub trait StorageProvider: Send + Sync {
    /// Retrieves the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any existing value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes the value stored under `key`. Removing a missing key is not
    /// an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Returns every key currently present in the store.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// An in-memory `StorageProvider` for tests and non-browser contexts.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Creates a new, empty `MemoryStorage`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageProvider for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.lock().unwrap().keys().cloned().collect())
    }
}

/// A `StorageProvider` that is never available.
///
/// Stands in for browser storage in contexts where none exists; every
/// consent check against it degrades to `false`.
#[derive(Debug, Default)]
pub struct UnavailableStorage;

impl StorageProvider for UnavailableStorage {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("no storage in this context".into()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("no storage in this context".into()))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("no storage in this context".into()))
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Err(StorageError::Unavailable("no storage in this context".into()))
    }
}
