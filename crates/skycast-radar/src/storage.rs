//! Session-scoped key/value storage.
//!
//! Values live for the lifetime of the process (the "browsing session"),
//! serialized as JSON strings so a corrupted or outdated value can be
//! detected and discarded on read.

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use skycast_core::StorageError;
use std::collections::HashMap;
use std::sync::Arc;

/// Backing store for session state.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
    fn remove(&self, key: &str);
}

/// In-process session store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}

/// A typed value persisted under a fixed session key.
///
/// Reads fall back to the default when the key is missing or unreadable;
/// write failures are logged and the in-memory value still updates.
pub struct SessionState<T> {
    key: String,
    store: Arc<dyn SessionStore>,
    value: T,
}

impl<T> SessionState<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub fn load(store: Arc<dyn SessionStore>, key: impl Into<String>, default: T) -> Self {
        let key = key.into();
        let value = match store.get(&key) {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!("Error reading session key {:?}: {}", key, e);
                    default
                }
            },
            None => default,
        };
        Self { key, store, value }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn set(&mut self, value: T) {
        self.value = value;
        if let Err(e) = write_json(self.store.as_ref(), &self.key, &self.value) {
            tracing::warn!("Error writing session key {:?}: {}", self.key, e);
        }
    }
}

/// Serialize `value` and store it under `key`.
pub fn write_json<T: Serialize>(
    store: &dyn SessionStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let json = serde_json::to_string(value).map_err(|e| StorageError::Serialize {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    store.set(key, json)
}

/// Read and deserialize the value under `key`, dropping it if unreadable.
pub fn read_json<T: DeserializeOwned>(store: &dyn SessionStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!("Discarding unreadable session key {:?}: {}", key, e);
            store.remove(key);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Prefs {
        enabled: bool,
    }

    #[test]
    fn test_session_state_defaults_when_missing() {
        let store = Arc::new(MemoryStore::new());
        let state = SessionState::load(store, "prefs", Prefs { enabled: false });
        assert!(!state.get().enabled);
    }

    #[test]
    fn test_session_state_persists_writes() {
        let store = Arc::new(MemoryStore::new());
        let mut state = SessionState::load(store.clone(), "prefs", Prefs { enabled: false });
        state.set(Prefs { enabled: true });

        let reloaded = SessionState::load(store, "prefs", Prefs { enabled: false });
        assert!(reloaded.get().enabled);
    }

    #[test]
    fn test_session_state_ignores_garbage() {
        let store = Arc::new(MemoryStore::new());
        let _ = store.set("prefs", "{not json".to_string());
        let state = SessionState::load(store, "prefs", Prefs { enabled: true });
        assert!(state.get().enabled);
    }

    #[test]
    fn test_read_json_evicts_unreadable_value() {
        let store = MemoryStore::new();
        let _ = store.set("k", "[1,2".to_string());
        assert_eq!(read_json::<Vec<i32>>(&store, "k"), None);
        assert!(store.is_empty());
    }
}
