//! Request/response wrappers around the backend's account operations.

use std::sync::Arc;

use serde_json::Value;
use sessionward_protocol::{
    AuthBackend, BackendError, FederatedProvider, Session, SignUpOutcome, SignUpRequest,
};
use sessionward_store::{KeyValueStore, StorageKeys, StoreAdapter};
use tracing::{info, warn};

use crate::{AuthConfig, AuthError};

/// Sign-in, sign-up and password-reset requests.
///
/// Holds no state of its own. Input that can't succeed is rejected before
/// the backend is contacted; backend failures come back as [`AuthError`]
/// with the original [`BackendError`] as the source.
pub struct AuthOperations<B, S> {
    backend: Arc<B>,
    store: StoreAdapter<S>,
    config: Arc<AuthConfig>,
}

impl<B, S> AuthOperations<B, S>
where
    B: AuthBackend,
    S: KeyValueStore,
{
    pub fn new(backend: Arc<B>, store: StoreAdapter<S>, config: Arc<AuthConfig>) -> Self {
        Self {
            backend,
            store,
            config,
        }
    }

    /// Password sign-in.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = require_credentials(email, password)?;
        let session = self
            .backend
            .sign_in_with_password(email, password)
            .await
            .map_err(|e| failed("sign-in", e))?;
        info!(user_id = ?session.derive_user().map(|u| u.id), "signed in with password");
        Ok(session)
    }

    /// Starts a federated sign-in and returns the provider URL to open.
    ///
    /// No session comes back from here; the provider redirects to the
    /// configured callback, which completes the sign-in.
    pub async fn sign_in_with_provider(
        &self,
        provider: FederatedProvider,
    ) -> Result<String, AuthError> {
        let request = self.config.federated_request(provider)?;
        self.store
            .set_marker(StorageKeys::REDIRECT_TO, &request.redirect_to);
        let url = self
            .backend
            .sign_in_with_provider(&request)
            .await
            .map_err(|e| failed("federated sign-in", e))?;
        info!(%provider, scopes = %request.scope_param(), "federated sign-in started");
        Ok(url)
    }

    /// Creates an account. The backend sends the confirmation email; the
    /// caller is not signed in.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        data: Value,
    ) -> Result<SignUpOutcome, AuthError> {
        let email = require_credentials(email, password)?;
        let request = SignUpRequest {
            email: email.to_string(),
            password: password.to_string(),
            data,
            email_redirect_to: Some(self.config.callback_url()?.to_string()),
        };
        let outcome = self
            .backend
            .sign_up(&request)
            .await
            .map_err(|e| failed("sign-up", e))?;
        info!(
            confirmation_sent = outcome.confirmation_sent,
            "account created"
        );
        Ok(outcome)
    }

    /// Asks the backend to email a password-reset link.
    pub async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AuthError::InvalidInput("Email is required."));
        }
        let redirect_to = self.config.reset_password_url()?;
        self.backend
            .request_password_reset(email, redirect_to.as_str())
            .await
            .map_err(|e| failed("password reset", e))?;
        info!("password reset requested");
        Ok(())
    }
}

fn require_credentials<'a>(email: &'a str, password: &str) -> Result<&'a str, AuthError> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(AuthError::InvalidInput("Email and password are required."));
    }
    Ok(email)
}

fn failed(operation: &'static str, error: BackendError) -> AuthError {
    warn!(operation, error = %error, "auth operation failed");
    error.into()
}
