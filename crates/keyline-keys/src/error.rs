//! Errors from the key lifecycle.

use keyline_core::VirtualServerId;
use thiserror::Error;

/// Errors from key generation, storage and lookup.
#[derive(Debug, Error)]
pub enum KeysError {
    /// No servable (non-expired) key pair exists. Keys are provisioned at
    /// tenant creation and by rotation, never on demand, so callers treat
    /// this as an internal failure.
    #[error("No servable key pair for virtual server {virtual_server}")]
    KeyPairNotFound {
        /// The tenant whose key was requested
        virtual_server: VirtualServerId,
    },

    /// Key material could not be generated, parsed or converted.
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Unknown signing algorithm name.
    #[error("Unknown signing algorithm: {0}")]
    UnknownAlgorithm(String),

    /// A stored key pair could not be (de)serialized.
    #[error("Key serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store failed.
    #[error("Key store I/O error: {0}")]
    Io(#[from] std::io::Error),
}
