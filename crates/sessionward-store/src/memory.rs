//! In-memory store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::{KeyValueStore, StoreError};

/// A [`KeyValueStore`] backed by a shared `HashMap`.
///
/// Clones share the same map, so a test can keep one handle for inspection
/// while another is owned by the component under test.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.data.lock().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of the whole map, for byte-for-byte comparisons.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.data.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let data = self.data.lock().map_err(poisoned)?;
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut data = self.data.lock().map_err(poisoned)?;
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut data = self.data.lock().map_err(poisoned)?;
        data.remove(key);
        Ok(())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Unavailable("memory store lock poisoned".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_set_get_remove() {
        let store = MemoryStore::new();

        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));

        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);

        // Removing again is fine.
        store.remove("k").unwrap();
    }

    #[test]
    fn test_memory_store_clones_share_data() {
        let a = MemoryStore::new();
        let b = a.clone();

        a.set("k", "v").unwrap();

        assert_eq!(b.get("k").unwrap(), Some("v".to_string()));
        assert_eq!(b.len(), 1);
    }
}
