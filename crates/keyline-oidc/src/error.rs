//! OAuth2/OIDC error types.
//!
//! Error shapes follow RFC 6749: token and userinfo endpoints answer with
//! bare JSON `{error, error_description}`; the authorize endpoint redirects
//! errors back to the client where the redirect URI has been validated
//! (handled separately in the authorize handler).

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OAuth2 error codes as defined in RFC 6749 and OIDC Core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthErrorCode {
    /// The request is missing a required parameter.
    InvalidRequest,
    /// Client authentication failed.
    InvalidClient,
    /// The provided authorization grant or refresh token is invalid.
    InvalidGrant,
    /// The client is not authorized to use this grant.
    UnauthorizedClient,
    /// The authorization server does not support the grant type.
    UnsupportedGrantType,
    /// The requested scope is invalid, unknown, or malformed.
    InvalidScope,
    /// The resource owner denied the request.
    AccessDenied,
    /// The authorization server does not support the response type.
    UnsupportedResponseType,
    /// OIDC: interaction is required but `prompt=none` was requested.
    LoginRequired,
    /// The authorization server encountered an unexpected condition.
    ServerError,
    /// The access token is invalid (resource server errors).
    InvalidToken,
}

impl std::fmt::Display for OAuthErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidScope => "invalid_scope",
            Self::AccessDenied => "access_denied",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::LoginRequired => "login_required",
            Self::ServerError => "server_error",
            Self::InvalidToken => "invalid_token",
        };
        write!(f, "{s}")
    }
}

/// OAuth2 error response following RFC 6749 Section 5.2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthErrorResponse {
    /// Error code.
    pub error: OAuthErrorCode,
    /// Human-readable error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl OAuthErrorResponse {
    /// Create a new error response.
    #[must_use]
    pub fn new(error: OAuthErrorCode, description: impl Into<String>) -> Self {
        Self {
            error,
            error_description: Some(description.into()),
        }
    }
}

/// OIDC API errors.
#[derive(Debug, Error)]
pub enum OidcError {
    /// Invalid request parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Client authentication failed.
    #[error("Invalid client: {0}")]
    InvalidClient(String),

    /// Invalid authorization code or refresh token.
    #[error("Invalid grant: {0}")]
    InvalidGrant(String),

    /// Unsupported grant type.
    #[error("Unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    /// Invalid scope.
    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    /// Unsupported response type.
    #[error("Unsupported response type: {0}")]
    UnsupportedResponseType(String),

    /// Invalid or expired access token.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// A login ceremony step was invoked out of order or with bad
    /// credentials. Deliberately coarse.
    #[error("Unauthorized")]
    Unauthorized,

    /// A named resource does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// JWT handling failed.
    #[error("JWT error: {0}")]
    Jwt(#[from] keyline_auth::AuthError),

    /// Signing key lookup or generation failed.
    #[error("Key error: {0}")]
    Keys(#[from] keyline_keys::KeysError),

    /// Token/KV storage failed.
    #[error("Store error: {0}")]
    Store(#[from] keyline_store::StoreError),

    /// Repository failure.
    #[error(transparent)]
    Core(#[from] keyline_core::KeylineError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OidcError {
    /// The HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidGrant(_)
            | Self::UnsupportedGrantType(_)
            | Self::InvalidScope(_)
            | Self::UnsupportedResponseType(_) => StatusCode::BAD_REQUEST,
            Self::InvalidClient(_) | Self::InvalidToken(_) | Self::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Core(core) => match core {
                keyline_core::KeylineError::Validation { .. } => StatusCode::BAD_REQUEST,
                keyline_core::KeylineError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
                keyline_core::KeylineError::NotFound { .. } => StatusCode::NOT_FOUND,
                keyline_core::KeylineError::Conflict { .. } => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Jwt(_) => StatusCode::UNAUTHORIZED,
            Self::Keys(_) | Self::Store(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The OAuth2 error code for this error.
    #[must_use]
    pub fn error_code(&self) -> OAuthErrorCode {
        match self {
            Self::InvalidRequest(_) => OAuthErrorCode::InvalidRequest,
            Self::InvalidClient(_) => OAuthErrorCode::InvalidClient,
            Self::InvalidGrant(_) => OAuthErrorCode::InvalidGrant,
            Self::UnsupportedGrantType(_) => OAuthErrorCode::UnsupportedGrantType,
            Self::InvalidScope(_) => OAuthErrorCode::InvalidScope,
            Self::UnsupportedResponseType(_) => OAuthErrorCode::UnsupportedResponseType,
            Self::InvalidToken(_) | Self::Jwt(_) => OAuthErrorCode::InvalidToken,
            Self::Unauthorized => OAuthErrorCode::AccessDenied,
            Self::NotFound(_) | Self::Core(_) => OAuthErrorCode::InvalidRequest,
            Self::Keys(_) | Self::Store(_) | Self::Internal(_) => OAuthErrorCode::ServerError,
        }
    }

    /// Convert to an OAuth2 error response body.
    #[must_use]
    pub fn to_response(&self) -> OAuthErrorResponse {
        OAuthErrorResponse::new(self.error_code(), self.to_string())
    }
}

impl IntoResponse for OidcError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let mut response = (status, Json(self.to_response())).into_response();
        if matches!(self, Self::InvalidToken(_) | Self::Jwt(_)) {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                header::HeaderValue::from_static("Bearer error=\"invalid_token\""),
            );
        }
        response
    }
}
