//! Error types.
//!
//! A small shared taxonomy used across the keyline crates. HTTP mapping
//! happens at the API layer; this crate stays transport-agnostic.
//!
//! # Example
//!
//! ```
//! use keyline_core::{KeylineError, Result};
//!
//! fn find_user(id: &str) -> Result<String> {
//!     if id.is_empty() {
//!         return Err(KeylineError::NotFound {
//!             resource: "User".to_string(),
//!             id: None,
//!         });
//!     }
//!     Ok(format!("User {id}"))
//! }
//! ```

use serde::Serialize;
use thiserror::Error;

/// Standardized error type for keyline.
///
/// Variants map to HTTP status codes at the API layer:
/// `Validation` → 400, `Unauthorized` → 401, `NotFound` → 404,
/// `Conflict` → 409, `Configuration`/`Internal` → 500.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeylineError {
    /// Input validation failure.
    #[error("Validation error on '{field}': {message}")]
    Validation {
        /// The field that failed validation
        field: String,
        /// Description of the validation failure
        message: String,
    },

    /// Authentication or authorization failure.
    #[error("Unauthorized{}", message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
    Unauthorized {
        /// Optional message providing more context
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Requested resource was not found.
    #[error("{resource} not found{}", id.as_ref().map(|i| format!(": {i}")).unwrap_or_default())]
    NotFound {
        /// The type of resource that was not found (e.g., "User", "KeyPair")
        resource: String,
        /// Optional identifier of the resource
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// A uniqueness or concurrency constraint was violated.
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflicting state
        message: String,
    },

    /// The deployment is misconfigured.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem
        message: String,
    },

    /// An unexpected internal failure.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure
        message: String,
    },
}

impl KeylineError {
    /// Shorthand for a [`KeylineError::NotFound`] without an identifier.
    #[must_use]
    pub fn not_found(resource: &str) -> Self {
        Self::NotFound {
            resource: resource.to_string(),
            id: None,
        }
    }

    /// Shorthand for a [`KeylineError::Unauthorized`] without a message.
    #[must_use]
    pub fn unauthorized() -> Self {
        Self::Unauthorized { message: None }
    }

    /// Shorthand for a [`KeylineError::Internal`].
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Type alias for Results using [`KeylineError`].
pub type Result<T> = std::result::Result<T, KeylineError>;
