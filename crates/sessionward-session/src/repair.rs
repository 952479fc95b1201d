//! Canonical/legacy storage repair and migration.

use sessionward_protocol::record_has_tokens;
use sessionward_store::{KeyValueStore, StoreAdapter};
use tracing::{debug, info, warn};

/// Brings the two storage locations into a consistent shape.
///
/// ```text
/// canonical valid ────────────────→ keep (drop a differing legacy copy) → true
/// canonical corrupt ──→ remove ──┐
/// canonical absent ──────────────┴→ legacy valid?  ── yes → copy to canonical → true
///                                                  └─ no ─────────────────────→ false
/// ```
///
/// Canonical always wins. Repair either writes a complete record or writes
/// nothing, and running it twice without intervening writes leaves storage
/// byte-identical.
pub struct StorageRepair<S> {
    store: StoreAdapter<S>,
}

impl<S: KeyValueStore> StorageRepair<S> {
    pub fn new(store: StoreAdapter<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &StoreAdapter<S> {
        &self.store
    }

    /// Returns `true` when a well-formed session record is at the canonical
    /// key once repair is done.
    pub fn repair_storage(&self) -> bool {
        let keys = self.store.keys();

        if let Some(canonical) = self.store.canonical() {
            if record_has_tokens(&canonical) {
                self.drop_stale_legacy(&canonical);
                return true;
            }
            warn!(
                key = %keys.canonical,
                len = canonical.len(),
                "canonical session record is corrupt, removing it"
            );
            self.store.remove(&keys.canonical);
        }

        let Some(legacy) = self.store.legacy() else {
            debug!("no session record in storage");
            return false;
        };
        if !record_has_tokens(&legacy) {
            debug!(key = %keys.legacy, "legacy session record is not usable");
            return false;
        }

        if self.store.write_canonical(&legacy) {
            info!(
                from = %keys.legacy,
                to = %keys.canonical,
                "migrated legacy session record"
            );
            true
        } else {
            warn!("could not write migrated session record");
            false
        }
    }

    /// Removes a legacy record that disagrees with the canonical one.
    /// An identical copy is left alone.
    fn drop_stale_legacy(&self, canonical: &str) {
        let keys = self.store.keys();
        match self.store.legacy() {
            Some(legacy) if legacy != canonical => {
                debug!(key = %keys.legacy, "removing stale legacy session record");
                self.store.remove(&keys.legacy);
            }
            _ => {}
        }
    }
}
