//! Remote authentication backends for Sessionward.
//!
//! Two implementations of [`AuthBackend`](sessionward_protocol::AuthBackend):
//!
//! - [`HttpBackend`]: a REST client for a GoTrue-style `/auth/v1` API.
//! - [`InMemoryBackend`]: an in-process backend for development and tests,
//!   with fault injection and call counters.
//!
//! Both keep the session client-side in a [`StoreAdapter`](sessionward_store::StoreAdapter)
//! at the canonical key and announce transitions on a broadcast channel.
//!
//! # Feature Flags
//!
//! - `http` (default): [`HttpBackend`] and its `reqwest` dependency

mod callback;
mod error;
#[cfg(feature = "http")]
mod http;
mod memory;

pub use callback::{RedirectCallback, parse_redirect_callback};
pub use error::{CallbackError, SetupError};
#[cfg(feature = "http")]
pub use http::HttpBackend;
pub use memory::InMemoryBackend;

/// Capacity of each backend's notification channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;
