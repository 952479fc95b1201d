//! Error types for the protocol layer.
//!
//! Two enums live here. [`ProtocolError`] covers local decoding problems
//! (a token segment that is not base64, a record that is not JSON).
//! [`BackendError`] is the tagged result every backend adapter returns, so
//! the layers above switch on a closed set of kinds instead of inspecting
//! response bodies.

/// Errors that can occur while encoding or decoding session data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The token does not have the `header.claims.signature` shape, or a
    /// segment is not valid base64url.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON or missing required fields.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}

/// Failure reported by the remote authentication backend.
///
/// `Clone` is required because one refresh result may be shared by several
/// waiting callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// HTTP 429 or an equivalent rate-limit error code.
    #[error("rate limited by auth backend")]
    RateLimited {
        /// Seconds the backend asked us to wait, when it said so.
        retry_after_secs: Option<u64>,
    },

    /// Wrong password, unknown account, or a revoked refresh token.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Sign-up for an email that already has an account.
    #[error("account already registered: {0}")]
    AlreadyRegistered(String),

    /// Any other 4xx: validation failures, malformed requests.
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The backend could not be reached (DNS, connect, timeout).
    #[error("auth backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered with a 5xx.
    #[error("auth backend error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The operation needs a session and there is none.
    #[error("no active session")]
    NoSession,

    /// The backend answered successfully but the body made no sense.
    #[error("malformed backend response: {0}")]
    Malformed(String),
}

/// Error codes that mean "slow down", independent of the HTTP status.
const RATE_LIMIT_CODES: &[&str] = &[
    "over_request_rate_limit",
    "over_email_send_rate_limit",
    "over_sms_send_rate_limit",
    "rate_limited",
];

/// Error codes that mean the caller's credentials were refused.
const CREDENTIAL_CODES: &[&str] = &[
    "invalid_grant",
    "invalid_credentials",
    "refresh_token_not_found",
    "refresh_token_already_used",
    "session_not_found",
];

/// Error codes that mean the account already exists.
const DUPLICATE_CODES: &[&str] = &["user_already_exists", "email_exists"];

impl BackendError {
    /// Maps an HTTP status plus the optional machine-readable error code
    /// into a [`BackendError`].
    ///
    /// The code wins over the status: some deployments report rate limits
    /// as `400 { "error_code": "over_request_rate_limit" }`.
    pub fn classify(status: u16, code: Option<&str>, message: impl Into<String>) -> Self {
        let message = message.into();
        let code = code.map(str::to_ascii_lowercase);

        if let Some(code) = code.as_deref() {
            if RATE_LIMIT_CODES.contains(&code) {
                return Self::RateLimited {
                    retry_after_secs: None,
                };
            }
            if CREDENTIAL_CODES.contains(&code) {
                return Self::InvalidCredentials(message);
            }
            if DUPLICATE_CODES.contains(&code) {
                return Self::AlreadyRegistered(message);
            }
        }

        match status {
            429 => Self::RateLimited {
                retry_after_secs: None,
            },
            401 | 403 => Self::InvalidCredentials(message),
            400 if message.to_ascii_lowercase().contains("invalid login credentials") => {
                Self::InvalidCredentials(message)
            }
            422 if message.to_ascii_lowercase().contains("already registered") => {
                Self::AlreadyRegistered(message)
            }
            400..=499 => Self::Rejected { status, message },
            _ => Self::Server { status, message },
        }
    }

    /// `true` for rate-limit responses.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// `true` when repeating the same request later could succeed.
    ///
    /// Credential and validation failures are final; throttling, network
    /// failures and 5xx are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Unavailable(_) | Self::Server { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_429_is_rate_limited() {
        let err = BackendError::classify(429, None, "slow down");
        assert!(err.is_rate_limited());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_classify_rate_limit_code_overrides_status() {
        let err = BackendError::classify(400, Some("over_request_rate_limit"), "limit");
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_classify_invalid_grant_is_credentials() {
        let err = BackendError::classify(400, Some("invalid_grant"), "Invalid Refresh Token");
        assert!(matches!(err, BackendError::InvalidCredentials(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_classify_login_message_without_code_is_credentials() {
        let err = BackendError::classify(400, None, "Invalid login credentials");
        assert!(matches!(err, BackendError::InvalidCredentials(_)));
    }

    #[test]
    fn test_classify_duplicate_signup() {
        let err = BackendError::classify(422, Some("user_already_exists"), "User already registered");
        assert!(matches!(err, BackendError::AlreadyRegistered(_)));

        let err = BackendError::classify(422, None, "User already registered");
        assert!(matches!(err, BackendError::AlreadyRegistered(_)));
    }

    #[test]
    fn test_classify_other_4xx_is_rejected() {
        let err = BackendError::classify(422, None, "Password should be at least 6 characters");
        assert!(matches!(err, BackendError::Rejected { status: 422, .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_classify_5xx_is_retryable_server_error() {
        let err = BackendError::classify(503, None, "upstream down");
        assert!(matches!(err, BackendError::Server { status: 503, .. }));
        assert!(err.is_retryable());
        assert!(!err.is_rate_limited());
    }
}
