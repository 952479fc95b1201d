/// Errors a [`KeyValueStore`](crate::KeyValueStore) backend can report.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the underlying medium failed.
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying medium holds data the store cannot interpret.
    #[error("storage encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The store is unusable (quota exceeded, access denied, poisoned lock).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
