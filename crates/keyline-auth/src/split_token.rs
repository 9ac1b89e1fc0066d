//! Split session tokens.
//!
//! The browser holds base64url of `"{id}:{secret}"`; the server stores only
//! the SHA-256 hash of the secret. A stolen session table therefore cannot
//! be replayed, and lookups stay O(1) because the id travels in the clear.

use crate::error::AuthError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Secret length in bytes before encoding.
const SECRET_LENGTH: usize = 32;

/// A session token split into its public id and its private secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitToken {
    /// Public half, used to locate the session record.
    pub id: String,
    /// Private half, never stored in plain form.
    pub secret: String,
}

impl SplitToken {
    /// Mint a token for a session id with a fresh random secret.
    #[must_use]
    pub fn generate(id: impl Into<String>) -> Self {
        let mut secret = [0u8; SECRET_LENGTH];
        rand::thread_rng().fill_bytes(&mut secret);
        Self {
            id: id.into(),
            secret: URL_SAFE_NO_PAD.encode(secret),
        }
    }

    /// Parse the base64url-wrapped `"{id}:{secret}"` wire form.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedSplitToken`] when the token is not
    /// base64url, either half is empty, or the separator is missing.
    pub fn parse(token: &str) -> Result<Self, AuthError> {
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| AuthError::MalformedSplitToken)?;
        let raw = String::from_utf8(raw).map_err(|_| AuthError::MalformedSplitToken)?;
        let (id, secret) = raw
            .split_once(':')
            .ok_or(AuthError::MalformedSplitToken)?;
        if id.is_empty() || secret.is_empty() {
            return Err(AuthError::MalformedSplitToken);
        }
        Ok(Self {
            id: id.to_string(),
            secret: secret.to_string(),
        })
    }

    /// The wire form handed to the browser: base64url of `"{id}:{secret}"`,
    /// opaque and cookie-safe regardless of what the id contains.
    #[must_use]
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!("{}:{}", self.id, self.secret))
    }

    /// Hash of the secret half, safe to persist.
    #[must_use]
    pub fn hashed_secret(&self) -> String {
        hash_secret(&self.secret)
    }
}

/// SHA-256 of a secret, base64url-encoded.
#[must_use]
pub fn hash_secret(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Constant-time comparison of a presented secret against a stored hash.
#[must_use]
pub fn verify_secret(presented: &str, stored_hash: &str) -> bool {
    let presented_digest = Sha256::digest(presented.as_bytes());
    let Ok(stored) = URL_SAFE_NO_PAD.decode(stored_hash) else {
        return false;
    };
    presented_digest.as_slice().ct_eq(&stored).into()
}
