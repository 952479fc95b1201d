//! Unified error type for the Sessionward façade.

use std::path::PathBuf;

use sessionward_protocol::BackendError;

/// Errors raised while loading or validating an [`AuthConfig`](crate::AuthConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `site_url` is not an absolute URL.
    #[error("invalid site_url {url:?}: {source}")]
    SiteUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// A redirect path could not be joined onto `site_url`.
    #[error("invalid redirect path {path:?}: {source}")]
    RedirectPath {
        path: String,
        #[source]
        source: url::ParseError,
    },
}

/// Error returned by the imperative auth operations.
///
/// `Display` is the text to show an end user. The backend failure that
/// caused it, when there was one, stays reachable through
/// [`std::error::Error::source`] for logging.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The backend refused or failed the request.
    #[error("{message}")]
    Backend {
        message: String,
        #[source]
        source: BackendError,
    },

    /// The request was rejected before reaching the backend.
    #[error("{0}")]
    InvalidInput(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AuthError {
    /// The underlying backend failure, if any.
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            Self::Backend { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.backend_error().is_some_and(BackendError::is_rate_limited)
    }
}

impl From<BackendError> for AuthError {
    fn from(source: BackendError) -> Self {
        Self::Backend {
            message: user_message(&source),
            source,
        }
    }
}

fn user_message(err: &BackendError) -> String {
    match err {
        BackendError::RateLimited { .. } => {
            "Too many attempts. Please wait a moment and try again.".into()
        }
        BackendError::InvalidCredentials(_) => "Invalid email or password.".into(),
        BackendError::AlreadyRegistered(_) => {
            "An account with this email already exists.".into()
        }
        BackendError::Rejected { message, .. } if !message.is_empty() => message.clone(),
        BackendError::Rejected { .. } => "The request was rejected.".into(),
        BackendError::Unavailable(_) => {
            "Unable to reach the authentication service. Check your connection and try again."
                .into()
        }
        BackendError::Server { .. } => {
            "The authentication service is having trouble. Please try again later.".into()
        }
        BackendError::NoSession => "You are not signed in.".into(),
        BackendError::Malformed(_) => {
            "The authentication service returned an unexpected response.".into()
        }
    }
}
