//! The remote authentication backend contract.
//!
//! Sessionward doesn't issue or verify tokens itself; the remote backend
//! does. [`AuthBackend`] lists exactly what the session layer needs from it,
//! so the layers above can run against an HTTP adapter in production and an
//! in-process one in development and tests without changing.

use std::future::Future;

use tokio::sync::broadcast;

use crate::{
    AuthEvent, BackendError, FederatedSignIn, Session, SignOutScope, SignUpOutcome,
    SignUpRequest,
};

/// Operations provided by the remote authentication backend.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → one backend is shared (behind an `Arc`) by
///   the validator, the recovery path and the service's notification task.
/// - Every returned future is `Send`, so callers can hold them across
///   `tokio::spawn` boundaries.
pub trait AuthBackend: Send + Sync + 'static {
    /// The backend's notion of the current session, if any.
    ///
    /// Adapters that persist sessions client-side answer from storage.
    fn get_current_session(
        &self,
    ) -> impl Future<Output = Result<Option<Session>, BackendError>> + Send;

    /// Exchanges email and password for a session.
    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, BackendError>> + Send;

    /// Builds the provider redirect for a federated sign-in and returns the
    /// URL to open. Completion happens out-of-process via the callback.
    fn sign_in_with_provider(
        &self,
        request: &FederatedSignIn,
    ) -> impl Future<Output = Result<String, BackendError>> + Send;

    /// Creates an account. Does not sign the caller in.
    fn sign_up(
        &self,
        request: &SignUpRequest,
    ) -> impl Future<Output = Result<SignUpOutcome, BackendError>> + Send;

    /// Triggers a password-reset email.
    fn request_password_reset(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Exchanges the stored refresh token for a new session.
    ///
    /// Returns `Ok(None)` when there is nothing to refresh.
    fn refresh_session(
        &self,
    ) -> impl Future<Output = Result<Option<Session>, BackendError>> + Send;

    /// Invalidates the session identified by `access_token` at `scope`.
    fn sign_out(
        &self,
        access_token: &str,
        scope: SignOutScope,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Subscribes to the backend's state-change notifications.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}
