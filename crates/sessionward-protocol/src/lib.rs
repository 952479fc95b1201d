//! Shared vocabulary for Sessionward.
//!
//! This crate defines what every other layer talks about:
//!
//! - **Types** ([`Session`], [`User`], [`AuthEvent`], [`SignOutScope`], etc.):
//!   the session record and the notifications that describe its transitions.
//! - **Claims** ([`decode_claims`], [`TokenClaims`]): reading the expiry and
//!   subject embedded in a bearer token.
//! - **Backend contract** ([`AuthBackend`]): the operations the remote
//!   authentication service must provide.
//! - **Errors** ([`BackendError`], [`ProtocolError`]): the closed set of
//!   failure kinds a backend adapter can report.
//!
//! # Architecture
//!
//! ```text
//! Store (text at rest) → Protocol (Session / AuthEvent) → Session layer (validity)
//! ```

mod backend;
mod claims;
mod error;
mod types;

pub use backend::AuthBackend;
pub use claims::{TokenClaims, decode_claims, encode_unsigned, record_has_tokens};
pub use error::{BackendError, ProtocolError};
pub use types::{
    AuthEvent, AuthEventKind, FederatedProvider, FederatedSignIn, PromptMode, Session,
    SignOutScope, SignUpOutcome, SignUpRequest, User,
};
