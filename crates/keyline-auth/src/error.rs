//! Error types for authentication primitives.

use thiserror::Error;

/// Authentication error types.
///
/// Explicit variants for each failure mode so callers can map them to
/// protocol-level responses without string matching.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    // JWT errors
    /// Token has expired (exp claim is in the past).
    #[error("Token has expired")]
    TokenExpired,

    /// Token signature is invalid.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// Token format is malformed or invalid.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token uses an algorithm the verifying key does not support.
    #[error("Unsupported algorithm: {0}")]
    InvalidAlgorithm(String),

    /// Required claim is missing from the token.
    #[error("Missing required claim: {0}")]
    MissingClaim(String),

    // Password errors
    /// Password hashing operation failed.
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    /// Password hash format is invalid.
    #[error("Invalid password hash format")]
    InvalidHashFormat,

    // TOTP errors
    /// The TOTP secret could not be decoded or used.
    #[error("Invalid TOTP secret: {0}")]
    InvalidTotpSecret(String),

    // Split token errors
    /// A session token did not have the `id:secret` shape.
    #[error("Malformed session token")]
    MalformedSplitToken,

    // Key errors
    /// A signing or verification key is invalid or malformed.
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}
