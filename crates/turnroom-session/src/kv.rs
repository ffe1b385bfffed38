//! Key-value persistence seam.
//!
//! On a device this is whatever local storage the platform offers. The
//! session layer only needs byte values under string keys.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::SessionError;

/// Device-local key-value storage.
///
/// Synchronous on purpose: local storage is a memory-speed lookup on every
/// platform Turnroom targets, and callers hit it from non-async code paths
/// such as UI callbacks.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Returns the value under `key`, or `None` if unset.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SessionError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), SessionError>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), SessionError>;
}

/// In-memory [`KeyValueStore`]. Clones share the same map, which lets a
/// test inspect what a component persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    inner: Arc<Mutex<MemoryKv>>,
}

#[derive(Debug, Default)]
struct MemoryKv {
    entries: HashMap<String, Vec<u8>>,
    read_only: bool,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, MemoryKv> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every later write fail, like a full or locked-down storage.
    pub fn set_read_only(&self, read_only: bool) {
        self.inner().read_only = read_only;
    }

    pub fn len(&self) -> usize {
        self.inner().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every key currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.inner().entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SessionError> {
        Ok(self.inner().entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), SessionError> {
        let mut inner = self.inner();
        if inner.read_only {
            return Err(SessionError::Storage(format!("cannot write {key}: read-only")));
        }
        inner.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        let mut inner = self.inner();
        if inner.read_only {
            return Err(SessionError::Storage(format!("cannot remove {key}: read-only")));
        }
        inner.entries.remove(key);
        Ok(())
    }
}
