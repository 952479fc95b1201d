//! Identity-provider redirect callbacks.
//!
//! After a federated sign-in (or a password-recovery link) the provider
//! sends the browser back to the application with the new tokens in the
//! URL fragment:
//!
//! ```text
//! https://app.example/auth/callback#access_token=...&refresh_token=...&expires_in=3600&type=recovery
//! ```
//!
//! Some deployments use the query string instead; both are read, and the
//! fragment wins when a parameter appears in both.

use std::collections::HashMap;

use sessionward_protocol::{AuthEventKind, Session};
use url::Url;

use crate::CallbackError;

/// Tokens carried by a redirect callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectCallback {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub expires_at: Option<i64>,
    /// The `type` parameter: `signup`, `recovery`, `magiclink`, ...
    pub kind: Option<String>,
}

impl RedirectCallback {
    /// `true` for password-recovery links.
    pub fn is_recovery(&self) -> bool {
        self.kind.as_deref() == Some("recovery")
    }

    /// The event announced when this callback completes.
    pub fn event_kind(&self) -> AuthEventKind {
        if self.is_recovery() {
            AuthEventKind::PasswordRecovery
        } else {
            AuthEventKind::SignedIn
        }
    }

    /// Builds the session, computing `expires_at` from `expires_in` when the
    /// callback only carried the latter. `now` is Unix seconds.
    pub fn into_session(self, now: i64) -> Session {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| now + secs));
        let mut session = Session::new(self.access_token, self.refresh_token, expires_at);
        session.expires_in = self.expires_in;
        if let Some(token_type) = self.token_type {
            session.token_type = token_type;
        }
        session.user = session.derive_user();
        session
    }
}

/// Extracts the tokens from a provider callback URL.
///
/// # Errors
///
/// - [`CallbackError::InvalidUrl`] when `url` does not parse.
/// - [`CallbackError::Provider`] when the provider reported an error.
/// - [`CallbackError::MissingField`] when either token is absent or empty.
pub fn parse_redirect_callback(url: &str) -> Result<RedirectCallback, CallbackError> {
    let parsed = Url::parse(url).map_err(|e| CallbackError::InvalidUrl(e.to_string()))?;

    let mut params: HashMap<String, String> = parsed.query_pairs().into_owned().collect();
    if let Some(fragment) = parsed.fragment() {
        params.extend(url::form_urlencoded::parse(fragment.as_bytes()).into_owned());
    }

    if let Some(error) = params.get("error") {
        let detail = params
            .get("error_description")
            .cloned()
            .unwrap_or_else(|| error.clone());
        return Err(CallbackError::Provider(detail));
    }

    let mut take = |key: &'static str| -> Result<String, CallbackError> {
        params
            .remove(key)
            .filter(|v| !v.is_empty())
            .ok_or(CallbackError::MissingField(key))
    };
    let access_token = take("access_token")?;
    let refresh_token = take("refresh_token")?;

    let number = |key: &str| params.get(key).and_then(|v| v.parse::<i64>().ok());
    Ok(RedirectCallback {
        access_token,
        refresh_token,
        token_type: params.get("token_type").cloned(),
        expires_in: number("expires_in"),
        expires_at: number("expires_at"),
        kind: params.get("type").cloned(),
    })
}
