//! Sign-out: local state first, remote revocation second.

use std::sync::Arc;

use serde::Serialize;
use sessionward_protocol::{AuthBackend, Session, SignOutScope};
use sessionward_store::{KeyValueStore, StoreAdapter};
use tracing::{debug, info, warn};

/// What happened remotely during a sign-out.
///
/// Local storage is clean whatever these flags say.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SignOutReport {
    /// The backend revoked this device's session.
    pub local_revoked: bool,
    /// The backend revoked every session of the user.
    pub global_revoked: bool,
    /// A session was still reported after sign-out and storage was cleared
    /// a second time.
    pub forced_cleanup: bool,
}

/// Clears the local session and revokes it remotely, tolerating remote
/// failure.
pub struct SignOutOrchestrator<B, S> {
    backend: Arc<B>,
    store: StoreAdapter<S>,
}

impl<B, S> SignOutOrchestrator<B, S>
where
    B: AuthBackend,
    S: KeyValueStore,
{
    pub fn new(backend: Arc<B>, store: StoreAdapter<S>) -> Self {
        Self { backend, store }
    }

    /// Signs out on this device and then everywhere.
    ///
    /// Storage is cleared before the backend is contacted, so the client is
    /// signed out even when every remote call fails.
    pub async fn sign_out(&self) -> SignOutReport {
        let access_token = self.stored_access_token();
        self.store.clear_auth_data();
        debug!(had_token = access_token.is_some(), "local auth state cleared");

        let mut report = SignOutReport::default();
        if let Some(token) = access_token.as_deref() {
            report.local_revoked = self.revoke(token, SignOutScope::Local).await;
            report.global_revoked = self.revoke(token, SignOutScope::Global).await;
        }

        match self.backend.get_current_session().await {
            Ok(Some(_)) => {
                warn!("session still present after sign-out, forcing cleanup");
                self.store.clear_auth_data();
                report.forced_cleanup = true;
            }
            Ok(None) => {}
            Err(e) => debug!(error = %e, "could not verify sign-out with backend"),
        }

        info!(
            local_revoked = report.local_revoked,
            global_revoked = report.global_revoked,
            forced_cleanup = report.forced_cleanup,
            "signed out"
        );
        report
    }

    /// Recovers from a state nothing else can fix.
    ///
    /// Attempts a global sign-out, then clears the session records and every
    /// redirect/return-path marker unconditionally. Safe to call when the
    /// stored session is unreadable.
    pub async fn reset_auth_system(&self) {
        if let Some(token) = self.stored_access_token() {
            self.revoke(&token, SignOutScope::Global).await;
        }
        self.store.clear_auth_data();
        info!("auth system reset");
    }

    /// The access token of whichever stored record still parses.
    fn stored_access_token(&self) -> Option<String> {
        [self.store.canonical(), self.store.legacy()]
            .into_iter()
            .flatten()
            .filter_map(|text| Session::from_record(&text).ok())
            .map(|session| session.access_token)
            .find(|token| !token.is_empty())
    }

    async fn revoke(&self, access_token: &str, scope: SignOutScope) -> bool {
        match self.backend.sign_out(access_token, scope).await {
            Ok(()) => true,
            Err(e) => {
                warn!(%scope, error = %e, "remote sign-out failed");
                false
            }
        }
    }
}
