//! Userinfo endpoint.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::{Form, Json};
use keyline_auth::{decode_token, extract_kid, ValidationConfig};
use keyline_core::UserId;
use std::str::FromStr;

use crate::error::OidcError;
use crate::handlers::require_virtual_server;
use crate::models::{UserInfoForm, UserInfoResponse};
use crate::services::AccessTokenClaims;
use crate::state::OidcState;

/// OIDC userinfo endpoint (Bearer token).
#[utoipa::path(
    get,
    path = "/oidc/{virtual_server}/userinfo",
    params(("virtual_server" = String, Path, description = "Virtual server name")),
    responses(
        (status = 200, description = "Claims of the authenticated user", body = UserInfoResponse),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Unknown virtual server"),
    ),
    security(("bearer" = [])),
    tag = "OIDC"
)]
pub async fn userinfo_get_handler(
    State(state): State<OidcState>,
    Path(virtual_server): Path<String>,
    headers: HeaderMap,
) -> Result<Json<UserInfoResponse>, OidcError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| OidcError::InvalidToken("Missing access token".to_string()))?
        .to_string();
    userinfo(&state, &virtual_server, &token).await
}

/// OIDC userinfo endpoint (form-encoded token, RFC 6750 section 2.2).
#[utoipa::path(
    post,
    path = "/oidc/{virtual_server}/userinfo",
    params(("virtual_server" = String, Path, description = "Virtual server name")),
    request_body(content = UserInfoForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Claims of the authenticated user", body = UserInfoResponse),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Unknown virtual server"),
    ),
    tag = "OIDC"
)]
pub async fn userinfo_post_handler(
    State(state): State<OidcState>,
    Path(virtual_server): Path<String>,
    headers: HeaderMap,
    Form(form): Form<UserInfoForm>,
) -> Result<Json<UserInfoResponse>, OidcError> {
    // Bearer header still wins if both are supplied.
    let token = bearer_token(&headers)
        .map(str::to_string)
        .or(form.access_token)
        .ok_or_else(|| OidcError::InvalidToken("Missing access token".to_string()))?;
    userinfo(&state, &virtual_server, &token).await
}

async fn userinfo(
    state: &OidcState,
    virtual_server: &str,
    token: &str,
) -> Result<Json<UserInfoResponse>, OidcError> {
    let vs = require_virtual_server(state, virtual_server).await?;

    let kid = extract_kid(token)?
        .ok_or_else(|| OidcError::InvalidToken("Access token has no kid".to_string()))?;
    let pair = state
        .key_service
        .key_by_kid(vs.id, &kid)
        .await
        .map_err(|_| OidcError::InvalidToken("Unknown signing key".to_string()))?;

    let validation = ValidationConfig::default().issuer(state.token_issuer.issuer(&vs.name));
    let claims = decode_token::<AccessTokenClaims>(
        token,
        &pair.decoding_key()?,
        pair.algorithm.jwt_algorithm(),
        &validation,
    )?
    .claims;

    let user_id = UserId::from_str(&claims.sub)
        .map_err(|_| OidcError::InvalidToken("Malformed sub claim".to_string()))?;
    let user = state
        .users
        .get(user_id)
        .await?
        .ok_or_else(|| OidcError::InvalidToken("User no longer exists".to_string()))?;

    let has_scope = |name: &str| claims.scopes.iter().any(|s| s == name);
    Ok(Json(UserInfoResponse {
        sub: claims.sub,
        email: has_scope("email").then(|| user.email.clone()),
        email_verified: has_scope("email").then_some(user.email_verified),
        name: has_scope("profile").then(|| user.display_name.clone()),
    }))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        let mut basic = HeaderMap::new();
        basic.insert(header::AUTHORIZATION, "Basic Zm9v".parse().unwrap());
        assert_eq!(bearer_token(&basic), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
