//! Opaque token store.
//!
//! Tokens are 16 random bytes, base64url-encoded, namespaced by kind in
//! the KV store as `"{kind}:{token}"`. Payloads are JSON.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Duration;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::error::StoreError;
use crate::kv::KvStore;

/// TTL for login ceremony sessions.
pub const LOGIN_SESSION_TTL: Duration = Duration::minutes(15);

/// TTL for email verification tokens.
pub const EMAIL_VERIFICATION_TTL: Duration = Duration::minutes(15);

/// TTL for authorization codes.
pub const OIDC_CODE_TTL: Duration = Duration::minutes(1);

/// TTL for refresh tokens.
pub const OIDC_REFRESH_TOKEN_TTL: Duration = Duration::days(30);

/// The namespaces of opaque tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Email ownership proof during the login ceremony.
    EmailVerification,
    /// An in-flight login ceremony.
    LoginSession,
    /// A single-use OAuth authorization code.
    OidcCode,
    /// A rotating OAuth refresh token.
    OidcRefreshToken,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TokenKind::EmailVerification => "email_verification",
            TokenKind::LoginSession => "login_session",
            TokenKind::OidcCode => "oidc_code",
            TokenKind::OidcRefreshToken => "oidc_refresh_token",
        };
        write!(f, "{name}")
    }
}

/// Mint a fresh opaque token.
#[must_use]
pub fn generate_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Issues and resolves opaque tokens against a [`KvStore`].
#[derive(Clone)]
pub struct TokenStore {
    kv: Arc<dyn KvStore>,
}

impl TokenStore {
    /// Creates a token store over `kv`.
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn key(kind: TokenKind, token: &str) -> String {
        format!("{kind}:{token}")
    }

    /// Store `value` under a freshly minted token.
    ///
    /// # Errors
    ///
    /// Fails if serialization or the backend fails.
    pub async fn create<T: Serialize>(
        &self,
        kind: TokenKind,
        value: &T,
        ttl: Duration,
    ) -> Result<String, StoreError> {
        let token = generate_token();
        self.update(kind, &token, value, ttl).await?;
        Ok(token)
    }

    /// Replace the payload of an existing token, refreshing its TTL.
    ///
    /// # Errors
    ///
    /// Fails if serialization or the backend fails.
    pub async fn update<T: Serialize>(
        &self,
        kind: TokenKind,
        token: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_vec(value)?;
        self.kv.set(&Self::key(kind, token), payload, ttl).await
    }

    /// Resolve a token to its payload, if it exists and has not expired.
    ///
    /// # Errors
    ///
    /// Fails if deserialization or the backend fails.
    pub async fn get<T: DeserializeOwned>(
        &self,
        kind: TokenKind,
        token: &str,
    ) -> Result<Option<T>, StoreError> {
        match self.kv.get(&Self::key(kind, token)).await? {
            Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
            None => Ok(None),
        }
    }

    /// Invalidate a token.
    ///
    /// # Errors
    ///
    /// Fails if the backend fails.
    pub async fn delete(&self, kind: TokenKind, token: &str) -> Result<(), StoreError> {
        self.kv.delete(&Self::key(kind, token)).await
    }
}
