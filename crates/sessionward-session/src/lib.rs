//! Session validity for Sessionward.
//!
//! This crate answers one question, "is there a usable session right
//! now?", and keeps storage in a shape where the answer is reliable:
//!
//! 1. **Validation** ([`TokenValidator`]): reads the access token's expiry
//!    and refreshes it through the backend when needed, behind a cooldown
//!    that backs off when the backend throttles us.
//! 2. **Repair** ([`StorageRepair`]): removes corrupt records and migrates
//!    the legacy record to the canonical key.
//! 3. **Recovery** ([`SessionRecovery`]): repair followed by a backend
//!    re-query, used when the backend sees no session.
//! 4. **Checking** ([`SessionManager`]): the cached, cooled-down predicate
//!    the rest of the application calls, plus [`SessionInfo`] diagnostics.
//!
//! # How it fits in the stack
//!
//! ```text
//! Auth Service (above)  ← exposes check_session / get_session_info
//!     ↕
//! Session Layer (this crate)  ← validity, repair, recovery
//!     ↕
//! Store + Protocol (below)  ← raw records, claims, backend contract
//! ```

mod config;
mod info;
mod manager;
mod recovery;
mod repair;
mod validator;

pub use config::SessionConfig;
pub use info::{SessionInfo, SessionStatus, token_prefix};
pub use manager::SessionManager;
pub use recovery::SessionRecovery;
pub use repair::StorageRepair;
pub use validator::TokenValidator;
