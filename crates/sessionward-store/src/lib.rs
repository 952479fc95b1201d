//! Persistence layer for Sessionward.
//!
//! Provides the [`KeyValueStore`] trait that abstracts over where session
//! records live (memory, a JSON file, a browser-like local store), and the
//! [`StoreAdapter`] that every other component goes through.
//!
//! # Feature Flags
//!
//! - `file` (default): [`FileStore`], a JSON file that survives restarts

mod adapter;
mod error;
#[cfg(feature = "file")]
mod file;
mod memory;

pub use adapter::StoreAdapter;
pub use error::StoreError;
#[cfg(feature = "file")]
pub use file::FileStore;
pub use memory::MemoryStore;

use serde::{Deserialize, Serialize};

/// A string-keyed store of text values.
///
/// Implementations report failures honestly; turning them into no-ops is
/// the [`StoreAdapter`]'s job.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Returns the value stored at `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` at `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// The storage locations used for one logical session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageKeys {
    /// Where the current-format record lives.
    pub canonical: String,

    /// Where older clients kept the record. Read for migration only.
    pub legacy: String,

    /// Short-lived redirect/invitation markers cleared with the session.
    #[serde(default)]
    pub ancillary: Vec<String>,
}

impl StorageKeys {
    pub const CANONICAL: &'static str = "sb-auth-token";
    pub const LEGACY: &'static str = "supabase.auth.token";
    /// Post-login destination recorded before a federated redirect.
    pub const REDIRECT_TO: &'static str = "auth.redirect_to";
    /// Page to return to after the session is restored.
    pub const RETURN_PATH: &'static str = "auth.return_path";
    /// Pending invitation token carried through sign-up.
    pub const INVITE_TOKEN: &'static str = "auth.invite_token";
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            canonical: Self::CANONICAL.to_string(),
            legacy: Self::LEGACY.to_string(),
            ancillary: vec![
                Self::REDIRECT_TO.to_string(),
                Self::RETURN_PATH.to_string(),
                Self::INVITE_TOKEN.to_string(),
            ],
        }
    }
}
