//! The session manager: the cached "is there a valid session?" predicate.
//!
//! Several parts of an application tend to ask at nearly the same moment
//! (during start-up, for instance). The manager answers the first caller
//! with a real check and everyone inside the following cooldown window with
//! the cached result.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use sessionward_protocol::AuthBackend;
use sessionward_store::{KeyValueStore, StoreAdapter};
use sessionward_throttle::Cooldown;
use tracing::{debug, trace, warn};

use crate::{SessionConfig, SessionInfo, SessionRecovery, StorageRepair, TokenValidator};

struct CheckState {
    cooldown: Cooldown,
    last_known_valid: bool,
}

/// Owns the validator and recovery path and caches their verdict.
///
/// ## Fresh check
///
/// ```text
/// backend.get_current_session()
///     ├─ Some(session) ──────────────────────────→ validator.validate_token()
///     └─ None ──→ recovery ── ok ──→ re-query ──→ validator.validate_token()
///                     └── failed / still none ──→ false
/// ```
pub struct SessionManager<B, S> {
    backend: Arc<B>,
    store: StoreAdapter<S>,
    validator: TokenValidator<B>,
    recovery: SessionRecovery<B, S>,
    check: Mutex<CheckState>,
}

impl<B, S> SessionManager<B, S>
where
    B: AuthBackend,
    S: KeyValueStore,
{
    pub fn new(backend: Arc<B>, store: StoreAdapter<S>, config: SessionConfig) -> Self {
        let config = config.validated();
        let validator = TokenValidator::new(Arc::clone(&backend), config.clone());
        let recovery = SessionRecovery::new(
            Arc::clone(&backend),
            StorageRepair::new(store.clone()),
        );
        Self {
            backend,
            store,
            validator,
            recovery,
            check: Mutex::new(CheckState {
                cooldown: Cooldown::new(config.check_cooldown()),
                last_known_valid: false,
            }),
        }
    }

    pub fn validator(&self) -> &TokenValidator<B> {
        &self.validator
    }

    pub fn recovery(&self) -> &SessionRecovery<B, S> {
        &self.recovery
    }

    pub fn store(&self) -> &StoreAdapter<S> {
        &self.store
    }

    /// The result of the most recent fresh check.
    pub fn last_known_valid(&self) -> bool {
        self.lock().last_known_valid
    }

    /// Whether a usable session exists right now.
    ///
    /// Inside the cooldown window this returns the cached result without
    /// touching the backend. The window opens when a fresh check starts, so
    /// callers arriving while it runs get the previous result.
    pub async fn check_session(&self) -> bool {
        {
            let mut state = self.lock();
            if state.cooldown.is_cooling() {
                trace!(
                    cached = state.last_known_valid,
                    "session check cooling down, using cached result"
                );
                return state.last_known_valid;
            }
            state.cooldown.mark();
        }

        let valid = self.fresh_check().await;
        self.lock().last_known_valid = valid;
        debug!(valid, "session check complete");
        valid
    }

    async fn fresh_check(&self) -> bool {
        let session = match self.backend.get_current_session().await {
            Ok(Some(session)) => session,
            Ok(None) => {
                debug!("backend reports no session, attempting recovery");
                if !self.recovery.attempt_session_recovery().await {
                    return false;
                }
                match self.backend.get_current_session().await {
                    Ok(Some(session)) => session,
                    Ok(None) => {
                        warn!("no session after successful recovery");
                        return false;
                    }
                    Err(e) => {
                        warn!(error = %e, "session re-query failed after recovery");
                        return false;
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "session query failed");
                return false;
            }
        };

        self.validator.validate_token(Some(&session)).await
    }

    /// Drops the cached result so the next [`check_session`](Self::check_session)
    /// asks the backend again. Call after the session changes out from under
    /// the cache (sign-in, sign-out).
    pub fn invalidate(&self) {
        let mut state = self.lock();
        state.cooldown.reset();
        state.last_known_valid = false;
        debug!("session check cache invalidated");
    }

    /// Describes what storage currently holds, showing only token prefixes.
    pub fn get_session_info(&self) -> SessionInfo {
        let canonical = self.store.canonical();
        let legacy = self.store.legacy();
        SessionInfo::inspect(
            self.store.keys(),
            canonical.as_deref(),
            legacy.as_deref(),
            Utc::now().timestamp(),
        )
    }

    fn lock(&self) -> MutexGuard<'_, CheckState> {
        self.check.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
