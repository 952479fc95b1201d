//! Core session types.
//!
//! A [`Session`] is what sits in storage between runs: a bearer token, a
//! refresh token and an expiry. A [`User`] is derived from it and never
//! stored on its own. An [`AuthEvent`] describes one transition of the
//! session and is what listeners receive.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::claims::{self, TokenClaims};
use crate::ProtocolError;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// The identity principal behind a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Opaque identifier assigned by the backend (the token's `sub`).
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Profile claims supplied at sign-up (name, avatar, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub user_metadata: Map<String, Value>,

    /// Claims controlled by the backend (provider, roles, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub app_metadata: Map<String, Value>,
}

impl User {
    /// Creates a user with no profile claims.
    pub fn new(id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: id.into(),
            email,
            user_metadata: Map::new(),
            app_metadata: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

fn default_token_type() -> String {
    "bearer".to_string()
}

/// A bearer-token session.
///
/// Serialized as JSON text this is also the storage record format. Every
/// field except the two tokens has a serde default, so older or partial
/// records still parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,

    pub refresh_token: String,

    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Lifetime in seconds as reported by the backend when issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,

    /// Absolute expiry, seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl Session {
    /// Creates a session from its two tokens and an absolute expiry.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: Option<i64>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_type: default_token_type(),
            expires_in: None,
            expires_at,
            user: None,
        }
    }

    /// `true` when both token strings are non-empty.
    pub fn has_tokens(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }

    /// Decodes the claims embedded in the access token.
    pub fn claims(&self) -> Result<TokenClaims, ProtocolError> {
        claims::decode_claims(&self.access_token)
    }

    /// The instant (Unix seconds) after which the access token is no longer
    /// accepted.
    ///
    /// The token's own `exp` claim is authoritative; `expires_at` is only
    /// used when the token carries no readable expiry.
    pub fn expiry(&self) -> Option<i64> {
        self.claims()
            .ok()
            .and_then(|c| c.exp)
            .or(self.expires_at)
    }

    /// The user for this session: the embedded record if the backend sent
    /// one, otherwise whatever the token's claims identify.
    pub fn derive_user(&self) -> Option<User> {
        if let Some(user) = &self.user {
            return Some(user.clone());
        }
        let claims = self.claims().ok()?;
        let id = claims.sub?;
        Some(User::new(id, claims.email))
    }

    /// Serializes this session into its storage record text.
    pub fn to_record(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Parses a storage record.
    pub fn from_record(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}

// ---------------------------------------------------------------------------
// AuthEvent
// ---------------------------------------------------------------------------

/// The kind of session transition being announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    UserUpdated,
    TokenRefreshed,
    PasswordRecovery,
    Error,
}

impl AuthEventKind {
    /// Wire name, e.g. `SIGNED_IN`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::UserUpdated => "USER_UPDATED",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::PasswordRecovery => "PASSWORD_RECOVERY",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for AuthEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable `(kind, session)` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

impl AuthEvent {
    pub fn new(kind: AuthEventKind, session: Option<Session>) -> Self {
        Self { kind, session }
    }

    pub fn signed_in(session: Session) -> Self {
        Self::new(AuthEventKind::SignedIn, Some(session))
    }

    pub fn signed_out() -> Self {
        Self::new(AuthEventKind::SignedOut, None)
    }

    pub fn token_refreshed(session: Session) -> Self {
        Self::new(AuthEventKind::TokenRefreshed, Some(session))
    }

    pub fn error() -> Self {
        Self::new(AuthEventKind::Error, None)
    }
}

// ---------------------------------------------------------------------------
// Backend request types
// ---------------------------------------------------------------------------

/// How far a sign-out reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignOutScope {
    /// Only the session presented with the request.
    Local,
    /// Every session of the user, on every device.
    Global,
}

impl SignOutScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Global => "global",
        }
    }
}

impl fmt::Display for SignOutScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity providers reachable through a redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FederatedProvider {
    Google,
    Microsoft,
}

impl FederatedProvider {
    /// The provider name the backend's authorize endpoint expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Microsoft => "azure",
        }
    }
}

impl fmt::Display for FederatedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The provider's account-chooser / consent behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    /// Always show the consent screen (needed to get a fresh refresh token).
    Consent,
    /// Always let the user pick an account.
    SelectAccount,
    /// Let the provider decide.
    None,
}

impl PromptMode {
    /// Query-string value, or `None` when no `prompt` parameter is sent.
    pub fn as_param(&self) -> Option<&'static str> {
        match self {
            Self::Consent => Some("consent"),
            Self::SelectAccount => Some("select_account"),
            Self::None => None,
        }
    }
}

/// Everything needed to start a federated sign-in redirect.
#[derive(Debug, Clone, PartialEq)]
pub struct FederatedSignIn {
    pub provider: FederatedProvider,
    /// Where the provider sends the browser back after authentication.
    pub redirect_to: String,
    pub scopes: Vec<String>,
    pub prompt: PromptMode,
    /// Extra provider parameters, e.g. `access_type=offline`.
    pub query_params: Vec<(String, String)>,
}

impl FederatedSignIn {
    /// Scopes as the space-separated `scopes` parameter.
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

/// A new-account request.
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    /// Profile data stored as the user's metadata.
    pub data: Value,
    /// Where the verification email links back to.
    pub email_redirect_to: Option<String>,
}

/// Result of a sign-up. Signing up never signs the caller in.
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpOutcome {
    pub user: Option<User>,
    /// `true` when the backend sent a verification email.
    pub confirmation_sent: bool,
}
