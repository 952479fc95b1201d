//! # Sessionward
//!
//! Client-side auth session lifecycle manager.
//!
//! Sessionward sits between an application and a remote authentication
//! backend. It decides whether the stored session is still usable, refreshes
//! it without hammering the backend, repairs storage left behind by older
//! clients, and broadcasts every transition to the rest of the application.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use sessionward::prelude::*;
//!
//! # async fn run() -> Result<(), AuthError> {
//! let store = MemoryStore::new();
//! let backend = Arc::new(InMemoryBackend::new(StoreAdapter::new(
//!     store.clone(),
//!     StorageKeys::default(),
//! )));
//! let auth = AuthService::init(AuthConfig::default(), backend, store)?;
//!
//! auth.add_event_listener(|event| println!("auth event: {}", event.kind));
//! if !auth.check_session().await {
//!     auth.sign_in("ada@example.com", "hunter22").await?;
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod operations;
mod service;
mod signout;

pub use config::{AuthConfig, ProviderConfig};
pub use error::{AuthError, ConfigError};
pub use operations::AuthOperations;
pub use service::AuthService;
pub use signout::{SignOutOrchestrator, SignOutReport};

/// Re-exports for building and using an [`AuthService`].
pub mod prelude {
    pub use sessionward_backend::{HttpBackend, InMemoryBackend};
    pub use sessionward_events::{EventBus, Subscription};
    pub use sessionward_protocol::{
        AuthBackend, AuthEvent, AuthEventKind, BackendError, FederatedProvider, Session,
        SignOutScope, User,
    };
    pub use sessionward_session::{SessionConfig, SessionInfo, SessionStatus};
    pub use sessionward_store::{FileStore, KeyValueStore, MemoryStore, StorageKeys, StoreAdapter};

    pub use crate::{AuthConfig, AuthError, AuthService, ProviderConfig, SignOutReport};
}
