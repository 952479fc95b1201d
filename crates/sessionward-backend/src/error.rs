//! Error types for the backend adapters.
//!
//! Operation failures are reported as
//! [`BackendError`](sessionward_protocol::BackendError); the types here
//! cover adapter construction and redirect parsing.

use sessionward_protocol::BackendError;

/// Errors constructing a backend adapter.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("invalid api url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// URLs like `mailto:x` have no path to append endpoints to.
    #[error("api url {0:?} cannot be used as a base url")]
    NotABase(String),
}

/// Errors reading an identity-provider redirect callback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallbackError {
    #[error("invalid callback url: {0}")]
    InvalidUrl(String),

    /// The provider redirected back with `error` / `error_description`.
    #[error("identity provider refused sign-in: {0}")]
    Provider(String),

    #[error("callback url has no {0}")]
    MissingField(&'static str),
}

impl From<CallbackError> for BackendError {
    fn from(e: CallbackError) -> Self {
        match e {
            CallbackError::Provider(message) => BackendError::Rejected {
                status: 400,
                message,
            },
            other => BackendError::Malformed(other.to_string()),
        }
    }
}
