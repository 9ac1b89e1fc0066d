//! Storage errors.

use thiserror::Error;

/// Errors from the KV and token stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A stored payload could not be (de)serialized.
    #[error("Token payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store failed.
    #[error("Store backend error: {0}")]
    Backend(String),
}
