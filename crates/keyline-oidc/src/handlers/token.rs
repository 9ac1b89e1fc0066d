//! Token endpoint: authorization_code, refresh_token and token exchange.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use keyline_auth::{decode_token, decode_unverified, extract_kid, ValidationConfig};
use keyline_db::{Application, CredentialDetails, User, VirtualServer};
use keyline_store::{TokenKind, OIDC_REFRESH_TOKEN_TTL};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::OidcError;
use crate::handlers::require_virtual_server;
use crate::models::{
    CodeFlowResponse, CodeInfo, RefreshTokenInfo, TokenExchangeResponse, TokenRequest,
    GRANT_AUTHORIZATION_CODE, GRANT_REFRESH_TOKEN, GRANT_TOKEN_EXCHANGE, TOKEN_TYPE_ACCESS_TOKEN,
};
use crate::services::{EXCHANGE_TOKEN_TTL, TOKEN_TTL};
use crate::state::OidcState;

/// OAuth2 token endpoint.
#[utoipa::path(
    post,
    path = "/oidc/{virtual_server}/token",
    params(("virtual_server" = String, Path, description = "Virtual server name")),
    request_body(content = TokenRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Token response", body = CodeFlowResponse),
        (status = 400, description = "Invalid grant or request"),
        (status = 401, description = "Client authentication failed"),
        (status = 404, description = "Unknown virtual server"),
    ),
    tag = "OIDC"
)]
pub async fn token_handler(
    State(state): State<OidcState>,
    Path(virtual_server): Path<String>,
    headers: HeaderMap,
    Form(request): Form<TokenRequest>,
) -> Result<Response, OidcError> {
    let vs = require_virtual_server(&state, &virtual_server).await?;

    match request.grant_type.as_deref() {
        Some(GRANT_AUTHORIZATION_CODE) => {
            let response = authorization_code_grant(&state, &vs, &headers, &request).await?;
            Ok(Json(response).into_response())
        }
        Some(GRANT_REFRESH_TOKEN) => {
            let response = refresh_token_grant(&state, &vs, &headers, &request).await?;
            Ok(Json(response).into_response())
        }
        Some(GRANT_TOKEN_EXCHANGE) => {
            let response = token_exchange_grant(&state, &vs, &request).await?;
            Ok(Json(response).into_response())
        }
        Some(other) => Err(OidcError::UnsupportedGrantType(other.to_string())),
        None => Err(OidcError::InvalidRequest("Missing grant_type".to_string())),
    }
}

/// Client credentials from the Authorization header (client_secret_basic)
/// or the form body (client_secret_post). The header wins.
fn extract_client_credentials(
    headers: &HeaderMap,
    request: &TokenRequest,
) -> Result<(String, Option<String>), OidcError> {
    if let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(encoded) = value.strip_prefix("Basic ") {
            let decoded = STANDARD
                .decode(encoded.trim())
                .map_err(|_| OidcError::InvalidClient("Malformed Basic credentials".to_string()))?;
            let decoded = String::from_utf8(decoded)
                .map_err(|_| OidcError::InvalidClient("Malformed Basic credentials".to_string()))?;
            let (id, secret) = decoded
                .split_once(':')
                .ok_or_else(|| OidcError::InvalidClient("Malformed Basic credentials".to_string()))?;
            return Ok((id.to_string(), Some(secret.to_string())));
        }
    }

    let client_id = request
        .client_id
        .clone()
        .ok_or_else(|| OidcError::InvalidClient("Missing client_id".to_string()))?;
    Ok((client_id, request.client_secret.clone()))
}

/// Authenticate the client named by the request.
///
/// Confidential clients must present their secret; public clients
/// (no stored secret) authenticate by PKCE in the code grant.
async fn authenticate_client(
    state: &OidcState,
    vs: &VirtualServer,
    headers: &HeaderMap,
    request: &TokenRequest,
) -> Result<Application, OidcError> {
    let (client_id, client_secret) = extract_client_credentials(headers, request)?;
    let application = state
        .applications
        .get_by_name(vs.id, &client_id)
        .await?
        .ok_or_else(|| OidcError::InvalidClient(format!("Unknown client {client_id}")))?;

    if let Some(hashed_secret) = &application.hashed_secret {
        let secret = client_secret
            .ok_or_else(|| OidcError::InvalidClient("Missing client_secret".to_string()))?;
        let valid = state.password_hasher.verify(&secret, hashed_secret)?;
        if !valid {
            return Err(OidcError::InvalidClient(
                "Client authentication failed".to_string(),
            ));
        }
    }
    Ok(application)
}

async fn authorization_code_grant(
    state: &OidcState,
    vs: &VirtualServer,
    headers: &HeaderMap,
    request: &TokenRequest,
) -> Result<CodeFlowResponse, OidcError> {
    let application = authenticate_client(state, vs, headers, request).await?;

    let code = request
        .code
        .as_deref()
        .ok_or_else(|| OidcError::InvalidRequest("Missing code".to_string()))?;
    let info: CodeInfo = state
        .token_store
        .get(TokenKind::OidcCode, code)
        .await?
        .ok_or_else(|| OidcError::InvalidGrant("Unknown or expired code".to_string()))?;
    // Single use, even when a later check fails.
    state.token_store.delete(TokenKind::OidcCode, code).await?;

    if info.virtual_server != vs.name || info.client_id != application.id {
        return Err(OidcError::InvalidGrant(
            "Code was issued to a different client".to_string(),
        ));
    }
    if request.redirect_uri.as_deref() != Some(info.redirect_uri.as_str()) {
        return Err(OidcError::InvalidGrant(
            "redirect_uri does not match the authorization request".to_string(),
        ));
    }
    verify_pkce(&application, &info, request)?;

    let user = state
        .users
        .get(info.user_id)
        .await?
        .ok_or_else(|| OidcError::InvalidGrant("User no longer exists".to_string()))?;

    let refresh_info = RefreshTokenInfo {
        virtual_server: vs.name.clone(),
        client_id: application.id,
        user_id: user.id,
        scopes: info.scopes.clone(),
        authenticated_at: info.authenticated_at,
    };
    let refresh_token = state
        .token_store
        .create(
            TokenKind::OidcRefreshToken,
            &refresh_info,
            OIDC_REFRESH_TOKEN_TTL,
        )
        .await?;

    issue_code_flow_response(
        state,
        vs,
        &application,
        &user,
        &info.scopes,
        info.nonce.clone(),
        info.authenticated_at,
        Some(refresh_token),
    )
    .await
}

async fn refresh_token_grant(
    state: &OidcState,
    vs: &VirtualServer,
    headers: &HeaderMap,
    request: &TokenRequest,
) -> Result<CodeFlowResponse, OidcError> {
    let application = authenticate_client(state, vs, headers, request).await?;

    let presented = request
        .refresh_token
        .as_deref()
        .ok_or_else(|| OidcError::InvalidRequest("Missing refresh_token".to_string()))?;
    let info: RefreshTokenInfo = state
        .token_store
        .get(TokenKind::OidcRefreshToken, presented)
        .await?
        .ok_or_else(|| OidcError::InvalidGrant("Unknown or expired refresh token".to_string()))?;
    // Rotation: the presented token is dead regardless of what follows.
    state
        .token_store
        .delete(TokenKind::OidcRefreshToken, presented)
        .await?;

    if info.virtual_server != vs.name || info.client_id != application.id {
        return Err(OidcError::InvalidGrant(
            "Refresh token was issued to a different client".to_string(),
        ));
    }
    let user = state
        .users
        .get(info.user_id)
        .await?
        .ok_or_else(|| OidcError::InvalidGrant("User no longer exists".to_string()))?;

    let successor = state
        .token_store
        .create(TokenKind::OidcRefreshToken, &info, OIDC_REFRESH_TOKEN_TTL)
        .await?;

    issue_code_flow_response(
        state,
        vs,
        &application,
        &user,
        &info.scopes,
        None,
        info.authenticated_at,
        Some(successor),
    )
    .await
}

#[allow(clippy::too_many_arguments)]
async fn issue_code_flow_response(
    state: &OidcState,
    vs: &VirtualServer,
    application: &Application,
    user: &User,
    scopes: &[String],
    nonce: Option<String>,
    authenticated_at: chrono::DateTime<chrono::Utc>,
    refresh_token: Option<String>,
) -> Result<CodeFlowResponse, OidcError> {
    let id_token = state
        .token_issuer
        .issue_id_token(vs, application, user, scopes, authenticated_at, nonce)
        .await?;
    let access_token = state
        .token_issuer
        .issue_access_token(vs, application, user, scopes, TOKEN_TTL)
        .await?;

    tracing::info!(
        virtual_server = %vs.name,
        client_id = %application.name,
        user_id = %user.id,
        "issued tokens"
    );
    Ok(CodeFlowResponse {
        token_type: "Bearer".to_string(),
        id_token,
        access_token,
        refresh_token,
        scope: scopes.join(" "),
        expires_in: TOKEN_TTL.num_seconds(),
    })
}

fn verify_pkce(
    application: &Application,
    info: &CodeInfo,
    request: &TokenRequest,
) -> Result<(), OidcError> {
    match &info.code_challenge {
        Some(challenge) => {
            let verifier = request
                .code_verifier
                .as_deref()
                .ok_or_else(|| OidcError::InvalidGrant("Missing code_verifier".to_string()))?;
            let digest = Sha256::digest(verifier.as_bytes());
            if URL_SAFE_NO_PAD.encode(digest) != *challenge {
                return Err(OidcError::InvalidGrant(
                    "code_verifier does not match the challenge".to_string(),
                ));
            }
            Ok(())
        }
        None if application.hashed_secret.is_none() => Err(OidcError::InvalidGrant(
            "Public clients must use PKCE".to_string(),
        )),
        None => Ok(()),
    }
}

/// Claims of a token-exchange subject assertion. Self-issued: `iss` and
/// `sub` are both the service user's username.
#[derive(Debug, Deserialize)]
struct SubjectTokenClaims {
    iss: String,
    sub: String,
    #[serde(default)]
    scope: Option<String>,
}

async fn token_exchange_grant(
    state: &OidcState,
    vs: &VirtualServer,
    request: &TokenRequest,
) -> Result<TokenExchangeResponse, OidcError> {
    if request.subject_token_type.as_deref() != Some(TOKEN_TYPE_ACCESS_TOKEN) {
        return Err(OidcError::InvalidRequest(format!(
            "subject_token_type must be {TOKEN_TYPE_ACCESS_TOKEN}"
        )));
    }
    let subject_token = request
        .subject_token
        .as_deref()
        .ok_or_else(|| OidcError::InvalidRequest("Missing subject_token".to_string()))?;
    let audience = request
        .audience
        .as_deref()
        .ok_or_else(|| OidcError::InvalidRequest("Missing audience".to_string()))?;

    // Identify the claimed service user before any signature check; the
    // key to verify against is a credential of that user.
    let unverified: SubjectTokenClaims = decode_unverified(subject_token)
        .map_err(|e| OidcError::InvalidGrant(format!("Malformed subject token: {e}")))?;
    if unverified.iss != unverified.sub {
        return Err(OidcError::InvalidGrant(
            "Subject token must be self-issued (iss == sub)".to_string(),
        ));
    }
    let user = state
        .users
        .get_by_username(vs.id, &unverified.iss)
        .await?
        .filter(|u| u.service_user)
        .ok_or_else(|| OidcError::InvalidGrant("Unknown service user".to_string()))?;

    let kid = extract_kid(subject_token)?
        .ok_or_else(|| OidcError::InvalidGrant("Subject token has no kid".to_string()))?;
    let key = state
        .credentials
        .get_for_user(user.id)
        .await?
        .into_iter()
        .find_map(|c| match c.details {
            CredentialDetails::ServiceUserKey {
                public_key_pem,
                kid: key_id,
                algorithm,
            } if key_id == kid => Some((public_key_pem, algorithm)),
            _ => None,
        })
        .ok_or_else(|| OidcError::InvalidGrant("No key registered for kid".to_string()))?;
    let (public_key_pem, algorithm) = key;

    let decoding_key = match algorithm {
        keyline_keys::KeyAlgorithm::Rs256 => {
            jsonwebtoken::DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
        }
        keyline_keys::KeyAlgorithm::EdDsa => {
            jsonwebtoken::DecodingKey::from_ed_pem(public_key_pem.as_bytes())
        }
    }
    .map_err(|e| OidcError::Internal(format!("stored service user key is invalid: {e}")))?;

    let verified = decode_token::<SubjectTokenClaims>(
        subject_token,
        &decoding_key,
        algorithm.jwt_algorithm(),
        &ValidationConfig::default(),
    )?
    .claims;

    let scopes: Vec<String> = verified
        .scope
        .as_deref()
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if !scopes.iter().any(|s| s == "openid") {
        return Err(OidcError::InvalidScope(
            "Subject token scope must include openid".to_string(),
        ));
    }

    let application = state
        .applications
        .get_by_name(vs.id, audience)
        .await?
        .ok_or_else(|| OidcError::InvalidRequest(format!("Unknown audience {audience}")))?;

    let access_token = state
        .token_issuer
        .issue_access_token(vs, &application, &user, &scopes, EXCHANGE_TOKEN_TTL)
        .await?;

    tracing::info!(
        virtual_server = %vs.name,
        service_user = %user.username,
        audience = %application.name,
        "exchanged service user token"
    );
    Ok(TokenExchangeResponse {
        access_token,
        issued_token_type: TOKEN_TYPE_ACCESS_TOKEN.to_string(),
        token_type: "Bearer".to_string(),
        expires_in: EXCHANGE_TOKEN_TTL.num_seconds(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_map(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, authorization.parse().unwrap());
        headers
    }

    #[test]
    fn basic_header_credentials_win_over_the_form() {
        let encoded = STANDARD.encode("webapp:s3cret");
        let headers = header_map(&format!("Basic {encoded}"));
        let request = TokenRequest {
            client_id: Some("other".to_string()),
            client_secret: Some("other-secret".to_string()),
            ..Default::default()
        };

        let (id, secret) = extract_client_credentials(&headers, &request).unwrap();
        assert_eq!(id, "webapp");
        assert_eq!(secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn form_credentials_are_used_without_a_header() {
        let request = TokenRequest {
            client_id: Some("webapp".to_string()),
            client_secret: None,
            ..Default::default()
        };
        let (id, secret) = extract_client_credentials(&HeaderMap::new(), &request).unwrap();
        assert_eq!(id, "webapp");
        assert_eq!(secret, None);
    }

    #[test]
    fn garbage_basic_header_is_rejected() {
        let headers = header_map("Basic %%%not-base64%%%");
        let request = TokenRequest::default();
        assert!(extract_client_credentials(&headers, &request).is_err());
    }

    #[test]
    fn missing_client_id_is_rejected() {
        let request = TokenRequest::default();
        assert!(extract_client_credentials(&HeaderMap::new(), &request).is_err());
    }
}
