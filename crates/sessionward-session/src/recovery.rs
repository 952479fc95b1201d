//! Repair followed by a backend re-query.

use std::sync::Arc;

use sessionward_protocol::AuthBackend;
use sessionward_store::KeyValueStore;
use tracing::{debug, info, warn};

use crate::StorageRepair;

/// One recovery attempt: fix storage, then ask the backend whether it now
/// sees a session.
///
/// A successful repair is necessary but not sufficient; the backend has the
/// final word.
pub struct SessionRecovery<B, S> {
    backend: Arc<B>,
    repair: StorageRepair<S>,
}

impl<B, S> SessionRecovery<B, S>
where
    B: AuthBackend,
    S: KeyValueStore,
{
    pub fn new(backend: Arc<B>, repair: StorageRepair<S>) -> Self {
        Self { backend, repair }
    }

    pub fn repair(&self) -> &StorageRepair<S> {
        &self.repair
    }

    /// Returns `true` only if repair succeeded and the backend then reports
    /// a session. When repair fails the backend is not contacted.
    pub async fn attempt_session_recovery(&self) -> bool {
        if !self.repair.repair_storage() {
            debug!("recovery skipped, storage holds no usable session");
            return false;
        }

        match self.backend.get_current_session().await {
            Ok(Some(session)) if session.has_tokens() => {
                info!("session recovered from storage");
                true
            }
            Ok(_) => {
                warn!("storage repaired but backend reports no session");
                false
            }
            Err(e) => {
                warn!(error = %e, "backend query failed during recovery");
                false
            }
        }
    }
}
