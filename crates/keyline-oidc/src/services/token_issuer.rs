//! Signed token minting.

use chrono::Duration;
use keyline_auth::{encode_access_token, encode_token_with_kid};
use keyline_core::Clock;
use keyline_db::{Application, User, VirtualServer};
use keyline_keys::KeyService;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::OidcError;
use crate::services::ClaimsMapper;

/// Lifetime of id and access tokens minted through the code and refresh
/// grants.
pub const TOKEN_TTL: Duration = Duration::hours(1);

/// Lifetime of access tokens minted through token exchange.
pub const EXCHANGE_TOKEN_TTL: Duration = Duration::minutes(5);

/// Claims of an id token. `aud` is always a one-element array.
#[derive(Debug, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: Vec<String>,
    pub iat: i64,
    pub exp: i64,
    pub auth_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Claims of an access token. `aud` is always a one-element array.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: Vec<String>,
    pub client_id: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub scopes: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Mints id and access tokens signed with a tenant's current key.
#[derive(Clone)]
pub struct TokenIssuer {
    key_service: Arc<KeyService>,
    claims_mapper: Arc<dyn ClaimsMapper>,
    clock: Arc<dyn Clock>,
    external_url: String,
}

impl TokenIssuer {
    pub fn new(
        key_service: Arc<KeyService>,
        claims_mapper: Arc<dyn ClaimsMapper>,
        clock: Arc<dyn Clock>,
        external_url: String,
    ) -> Self {
        Self {
            key_service,
            claims_mapper,
            clock,
            external_url,
        }
    }

    /// Issuer URL of a virtual server.
    #[must_use]
    pub fn issuer(&self, virtual_server: &str) -> String {
        format!("{}/oidc/{virtual_server}", self.external_url)
    }

    /// Mint an id token for a finished authentication. Profile and email
    /// claims appear only when the corresponding scope was granted.
    #[allow(clippy::too_many_arguments)]
    pub async fn issue_id_token(
        &self,
        virtual_server: &VirtualServer,
        application: &Application,
        user: &User,
        scopes: &[String],
        authenticated_at: chrono::DateTime<chrono::Utc>,
        nonce: Option<String>,
    ) -> Result<String, OidcError> {
        let has_scope = |name: &str| scopes.iter().any(|s| s == name);
        let now = self.clock.now();
        let claims = IdTokenClaims {
            iss: self.issuer(&virtual_server.name),
            sub: user.id.to_string(),
            aud: vec![application.name.clone()],
            iat: now.timestamp(),
            exp: (now + TOKEN_TTL).timestamp(),
            auth_time: authenticated_at.timestamp(),
            nonce,
            email: has_scope("email").then(|| user.email.clone()),
            email_verified: has_scope("email").then_some(user.email_verified),
            name: has_scope("profile").then(|| user.display_name.clone()),
        };

        let pair = self
            .key_service
            .current_key(virtual_server.id, virtual_server.signing_algorithm)
            .await?;
        let token = encode_token_with_kid(
            &claims,
            &pair.encoding_key()?,
            virtual_server.signing_algorithm.jwt_algorithm(),
            &pair.kid,
        )?;
        Ok(token)
    }

    /// Mint an access token for a user, audience `application`.
    pub async fn issue_access_token(
        &self,
        virtual_server: &VirtualServer,
        application: &Application,
        user: &User,
        scopes: &[String],
        ttl: Duration,
    ) -> Result<String, OidcError> {
        let extra = self
            .claims_mapper
            .claims_for(virtual_server.id, user.id, application.id)
            .await?;

        let now = self.clock.now();
        let claims = AccessTokenClaims {
            iss: self.issuer(&virtual_server.name),
            sub: user.id.to_string(),
            aud: vec![application.name.clone()],
            client_id: application.name.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
            scopes: scopes.to_vec(),
            extra,
        };

        let pair = self
            .key_service
            .current_key(virtual_server.id, virtual_server.signing_algorithm)
            .await?;
        let token = encode_access_token(
            &claims,
            &pair.encoding_key()?,
            virtual_server.signing_algorithm.jwt_algorithm(),
            &pair.kid,
        )?;
        Ok(token)
    }
}
