//! Token endpoint models and stored token payloads.

use chrono::{DateTime, Utc};
use keyline_core::{ApplicationId, UserId};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// `grant_type` for the authorization code flow.
pub const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";

/// `grant_type` for refresh token rotation.
pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";

/// `grant_type` for RFC 8693 token exchange.
pub const GRANT_TOKEN_EXCHANGE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";

/// RFC 8693 token type identifier for access tokens.
pub const TOKEN_TYPE_ACCESS_TOKEN: &str = "urn:ietf:params:oauth:token-type:access_token";

/// Form body of `POST /oidc/{virtual_server}/token`, all grants flattened.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    // Client authentication (client_secret_post).
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    // authorization_code
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    // refresh_token
    pub refresh_token: Option<String>,
    // token-exchange
    pub subject_token: Option<String>,
    pub subject_token_type: Option<String>,
    pub audience: Option<String>,
    pub scope: Option<String>,
}

/// Successful response for the code and refresh grants.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CodeFlowResponse {
    /// Always `Bearer`.
    pub token_type: String,
    pub id_token: String,
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Space-joined granted scopes.
    pub scope: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Successful response for the token-exchange grant.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    /// Always `urn:ietf:params:oauth:token-type:access_token`.
    pub issued_token_type: String,
    /// Always `Bearer`.
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Payload stored behind an authorization code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeInfo {
    /// Virtual server name.
    pub virtual_server: String,
    pub client_id: ApplicationId,
    /// The redirect URI the code was issued for; must match at redemption.
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub user_id: UserId,
    pub nonce: Option<String>,
    /// PKCE S256 challenge, when the authorize request carried one.
    pub code_challenge: Option<String>,
    /// When the user's session was established (`auth_time` claim).
    pub authenticated_at: DateTime<Utc>,
}

/// Payload stored behind an opaque refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenInfo {
    /// Virtual server name.
    pub virtual_server: String,
    pub client_id: ApplicationId,
    pub user_id: UserId,
    pub scopes: Vec<String>,
    /// Carried forward into reissued ID tokens.
    pub authenticated_at: DateTime<Utc>,
}

/// Payload stored behind an email verification token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailVerificationInfo {
    pub user_id: UserId,
}
