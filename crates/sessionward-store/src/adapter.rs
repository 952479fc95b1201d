//! The fault-tolerant front door to storage.
//!
//! Storage is shared, process-wide, and may fail at any time (quota, disk,
//! permissions). None of those failures are allowed to reach the session
//! logic: every operation here logs the error and degrades to "absent" or
//! "nothing happened".

use std::sync::Arc;

use crate::{KeyValueStore, StorageKeys};

/// Error-tolerant wrapper around a [`KeyValueStore`].
///
/// Cheap to clone: the store and key names are shared behind `Arc`s, so the
/// backend adapter, the repair logic and the sign-out path can each hold one.
pub struct StoreAdapter<S> {
    store: Arc<S>,
    keys: Arc<StorageKeys>,
}

impl<S> Clone for StoreAdapter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            keys: Arc::clone(&self.keys),
        }
    }
}

impl<S: KeyValueStore> StoreAdapter<S> {
    pub fn new(store: S, keys: StorageKeys) -> Self {
        Self::from_shared(Arc::new(store), keys)
    }

    pub fn from_shared(store: Arc<S>, keys: StorageKeys) -> Self {
        Self {
            store,
            keys: Arc::new(keys),
        }
    }

    /// The key names this adapter manages.
    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.store
    }

    /// Reads `key`. Any storage failure reads as `None`.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "storage read failed, treating as absent");
                None
            }
        }
    }

    /// Writes `key`. Returns `false` (after logging) if the write failed.
    pub fn set(&self, key: &str, value: &str) -> bool {
        match self.store.set(key, value) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "storage write failed");
                false
            }
        }
    }

    /// Removes `key`. Returns `false` (after logging) if the removal failed.
    pub fn remove(&self, key: &str) -> bool {
        match self.store.remove(key) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "storage remove failed");
                false
            }
        }
    }

    /// Raw text at the canonical key.
    pub fn canonical(&self) -> Option<String> {
        self.get(&self.keys.canonical)
    }

    /// Raw text at the legacy key.
    pub fn legacy(&self) -> Option<String> {
        self.get(&self.keys.legacy)
    }

    /// Replaces the canonical record with `text`.
    pub fn write_canonical(&self, text: &str) -> bool {
        self.set(&self.keys.canonical, text)
    }

    /// Records a short-lived marker (redirect target, return path, ...).
    ///
    /// Markers are expected to be one of [`StorageKeys::ancillary`] so that
    /// [`clear_auth_data`](Self::clear_auth_data) removes them.
    pub fn set_marker(&self, key: &str, value: &str) -> bool {
        if !self.keys.ancillary.iter().any(|k| k == key) {
            tracing::debug!(key, "marker key is not registered as ancillary");
        }
        self.set(key, value)
    }

    /// Removes the canonical record, the legacy record and every ancillary
    /// marker.
    ///
    /// Never fails: each removal is attempted even if an earlier one did
    /// not go through. Returns `true` when all removals succeeded.
    pub fn clear_auth_data(&self) -> bool {
        let mut all_ok = true;
        for key in self.all_keys() {
            all_ok &= self.remove(key);
        }
        if all_ok {
            tracing::debug!("auth storage cleared");
        } else {
            tracing::warn!("auth storage only partially cleared");
        }
        all_ok
    }

    fn all_keys(&self) -> impl Iterator<Item = &str> {
        [self.keys.canonical.as_str(), self.keys.legacy.as_str()]
            .into_iter()
            .chain(self.keys.ancillary.iter().map(String::as_str))
    }
}
