//! An in-process auth backend.
//!
//! Behaves like the HTTP backend from the session layer's point of view:
//! sessions are persisted to the canonical storage key, the current session
//! is read back from storage, and transitions are broadcast. Tokens are
//! unsigned (`alg: none`) and carry real `sub`/`email`/`exp` claims, so
//! expiry logic runs against them unchanged.
//!
//! Beyond that it offers the knobs tests need: an unreachable switch,
//! scripted refresh failures, artificial latency and call counters.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use sessionward_protocol::{
    AuthBackend, AuthEvent, BackendError, FederatedSignIn, Session, SignOutScope, SignUpOutcome,
    SignUpRequest, User, decode_claims, encode_unsigned,
};
use sessionward_store::{KeyValueStore, StoreAdapter};
use tokio::sync::broadcast;
use tracing::{debug, info};
use url::Url;

use crate::EVENT_CHANNEL_CAPACITY;

/// Default access-token lifetime.
const DEFAULT_TTL_SECS: i64 = 3_600;

struct Account {
    user: User,
    password: String,
}

/// Which user a refresh token belongs to.
struct Grant {
    user: User,
    access_token: String,
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, Account>,
    /// Live refresh tokens.
    grants: HashMap<String, Grant>,
    /// Refresh tokens invalidated by sign-out or rotation.
    revoked: HashSet<String>,
    refresh_failures: VecDeque<BackendError>,
    unreachable: bool,
    latency: Duration,
    sign_out_scopes: Vec<SignOutScope>,
    password_resets: Vec<(String, String)>,
    provider_requests: Vec<FederatedSignIn>,
}

/// A self-contained [`AuthBackend`] backed by the same store the session
/// layer reads.
pub struct InMemoryBackend<S> {
    store: StoreAdapter<S>,
    events: broadcast::Sender<AuthEvent>,
    ttl_secs: i64,
    state: Mutex<State>,
    session_queries: AtomicU32,
    refresh_calls: AtomicU32,
    sign_out_calls: AtomicU32,
}

impl<S: KeyValueStore> InMemoryBackend<S> {
    pub fn new(store: StoreAdapter<S>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            events,
            ttl_secs: DEFAULT_TTL_SECS,
            state: Mutex::new(State::default()),
            session_queries: AtomicU32::new(0),
            refresh_calls: AtomicU32::new(0),
            sign_out_calls: AtomicU32::new(0),
        }
    }

    /// Lifetime of issued access tokens. Negative values issue tokens that
    /// are already expired.
    pub fn with_token_ttl(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn store(&self) -> &StoreAdapter<S> {
        &self.store
    }

    // -- Accounts and sessions ----------------------------------------------

    /// Creates a confirmed account directly.
    pub fn register(&self, email: &str, password: &str) -> User {
        let user = User::new(format!("user-{}", random_hex(6)), Some(email.to_string()));
        self.lock().accounts.insert(
            email.to_ascii_lowercase(),
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        user
    }

    /// Issues a session for `user` expiring `ttl_secs` from now, without
    /// persisting it. The refresh token is accepted by
    /// [`refresh_session`](AuthBackend::refresh_session).
    pub fn issue_session(&self, user: &User, ttl_secs: i64) -> Session {
        let now = Utc::now().timestamp();
        let exp = now + ttl_secs;
        let access_token = encode_unsigned(&json!({
            "sub": user.id,
            "email": user.email,
            "role": "authenticated",
            "iat": now,
            "exp": exp,
        }));
        let refresh_token = random_hex(16);

        self.lock().grants.insert(
            refresh_token.clone(),
            Grant {
                user: user.clone(),
                access_token: access_token.clone(),
            },
        );

        let mut session = Session::new(access_token, refresh_token, Some(exp));
        session.expires_in = Some(ttl_secs);
        session.user = Some(user.clone());
        session
    }

    /// Issues a session and stores it at the canonical key.
    pub fn seed_session(&self, user: &User, ttl_secs: i64) -> Session {
        let session = self.issue_session(user, ttl_secs);
        self.persist(&session);
        session
    }

    // -- Fault injection ----------------------------------------------------

    /// While set, every operation fails with [`BackendError::Unavailable`].
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    /// Makes the next refresh call fail with `error`. Queued failures are
    /// consumed one per call.
    pub fn push_refresh_failure(&self, error: BackendError) {
        self.lock().refresh_failures.push_back(error);
    }

    /// Delay added to every async operation.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Broadcasts `event` to subscribers as if the backend had observed it.
    pub fn emit(&self, event: AuthEvent) {
        debug!(kind = %event.kind, "emitting auth event");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// `true` if `refresh_token` was revoked by sign-out or rotation.
    pub fn is_revoked(&self, refresh_token: &str) -> bool {
        self.lock().revoked.contains(refresh_token)
    }

    // -- Counters -----------------------------------------------------------

    pub fn session_queries(&self) -> u32 {
        self.session_queries.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> u32 {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    /// Scopes of every sign-out call, in order, including failed ones.
    pub fn sign_out_scopes(&self) -> Vec<SignOutScope> {
        self.lock().sign_out_scopes.clone()
    }

    /// `(email, redirect_to)` of every password-reset request.
    pub fn password_resets(&self) -> Vec<(String, String)> {
        self.lock().password_resets.clone()
    }

    pub fn provider_requests(&self) -> Vec<FederatedSignIn> {
        self.lock().provider_requests.clone()
    }

    // -- Internals ----------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits out the configured latency, then fails if unreachable.
    async fn round_trip(&self) -> Result<(), BackendError> {
        let latency = self.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.lock().unreachable {
            return Err(BackendError::Unavailable("connection refused".into()));
        }
        Ok(())
    }

    fn stored_session(&self) -> Option<Session> {
        let text = self.store.canonical()?;
        Session::from_record(&text).ok()
    }

    fn persist(&self, session: &Session) {
        if let Ok(text) = session.to_record() {
            self.store.write_canonical(&text);
        }
    }
}

impl<S: KeyValueStore> AuthBackend for InMemoryBackend<S> {
    async fn get_current_session(&self) -> Result<Option<Session>, BackendError> {
        self.session_queries.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await?;
        Ok(self.stored_session())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        self.round_trip().await?;

        let user = {
            let state = self.lock();
            match state.accounts.get(&email.to_ascii_lowercase()) {
                Some(account) if account.password == password => account.user.clone(),
                _ => {
                    return Err(BackendError::InvalidCredentials(
                        "Invalid login credentials".into(),
                    ));
                }
            }
        };

        let session = self.seed_session(&user, self.ttl_secs);
        info!(user_id = %user.id, "signed in");
        self.emit(AuthEvent::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_in_with_provider(&self, request: &FederatedSignIn) -> Result<String, BackendError> {
        self.round_trip().await?;
        self.lock().provider_requests.push(request.clone());

        let mut url = Url::parse("memory://auth/authorize")
            .map_err(|e| BackendError::Malformed(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("provider", request.provider.as_str())
                .append_pair("redirect_to", &request.redirect_to)
                .append_pair("scopes", &request.scope_param());
            if let Some(prompt) = request.prompt.as_param() {
                query.append_pair("prompt", prompt);
            }
            for (key, value) in &request.query_params {
                query.append_pair(key, value);
            }
        }
        Ok(url.into())
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, BackendError> {
        self.round_trip().await?;

        let key = request.email.to_ascii_lowercase();
        let mut state = self.lock();
        if state.accounts.contains_key(&key) {
            return Err(BackendError::AlreadyRegistered(
                "User already registered".into(),
            ));
        }

        let mut user = User::new(format!("user-{}", random_hex(6)), Some(request.email.clone()));
        if let Some(data) = request.data.as_object() {
            user.user_metadata = data.clone();
        }
        state.accounts.insert(
            key,
            Account {
                user: user.clone(),
                password: request.password.clone(),
            },
        );
        Ok(SignUpOutcome {
            user: Some(user),
            confirmation_sent: true,
        })
    }

    async fn request_password_reset(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), BackendError> {
        self.round_trip().await?;
        self.lock()
            .password_resets
            .push((email.to_string(), redirect_to.to_string()));
        Ok(())
    }

    async fn refresh_session(&self) -> Result<Option<Session>, BackendError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await?;

        if let Some(error) = self.lock().refresh_failures.pop_front() {
            debug!(error = %error, "scripted refresh failure");
            return Err(error);
        }

        let Some(current) = self.stored_session() else {
            return Ok(None);
        };

        let user = {
            let mut state = self.lock();
            if state.revoked.contains(&current.refresh_token) {
                None
            } else {
                let user = state
                    .grants
                    .remove(&current.refresh_token)
                    .map(|grant| grant.user)
                    .or_else(|| current.derive_user())
                    .unwrap_or_else(|| User::new("anonymous", None));
                state.revoked.insert(current.refresh_token.clone());
                Some(user)
            }
        };
        let Some(user) = user else {
            return Err(BackendError::InvalidCredentials(
                "Invalid Refresh Token: Already Used".into(),
            ));
        };

        let session = self.seed_session(&user, self.ttl_secs);
        self.emit(AuthEvent::token_refreshed(session.clone()));
        Ok(Some(session))
    }

    async fn sign_out(&self, access_token: &str, scope: SignOutScope) -> Result<(), BackendError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.lock().sign_out_scopes.push(scope);
        self.round_trip().await?;

        let mut state = self.lock();
        // An access token already revoked at device scope still names its
        // owner through the `sub` claim.
        let owner = state
            .grants
            .values()
            .find(|g| g.access_token == access_token)
            .map(|g| g.user.id.clone())
            .or_else(|| decode_claims(access_token).ok().and_then(|c| c.sub));
        let Some(owner) = owner else {
            return Ok(());
        };

        let doomed: Vec<String> = state
            .grants
            .iter()
            .filter(|(_, g)| match scope {
                SignOutScope::Local => g.access_token == access_token,
                SignOutScope::Global => g.user.id == owner,
            })
            .map(|(token, _)| token.clone())
            .collect();
        for token in doomed {
            state.grants.remove(&token);
            state.revoked.insert(token);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

fn random_hex(bytes: usize) -> String {
    (0..bytes)
        .map(|_| format!("{:02x}", rand::random::<u8>()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessionward_store::{MemoryStore, StorageKeys};

    fn backend() -> InMemoryBackend<MemoryStore> {
        InMemoryBackend::new(StoreAdapter::new(MemoryStore::new(), StorageKeys::default()))
    }

    #[test]
    fn test_issue_session_tokens_carry_claims() {
        let b = backend();
        let user = b.register("a@example.com", "pw");
        let session = b.issue_session(&user, 60);

        let claims = session.claims().unwrap();
        assert_eq!(claims.sub.as_deref(), Some(user.id.as_str()));
        assert_eq!(claims.email.as_deref(), Some("a@example.com"));
        assert_eq!(session.expiry(), session.expires_at);
        assert_eq!(session.refresh_token.len(), 32);
    }

    #[test]
    fn test_issue_session_does_not_persist() {
        let b = backend();
        let user = b.register("a@example.com", "pw");
        b.issue_session(&user, 60);
        assert_eq!(b.store().canonical(), None);
    }
}
