//! RP-initiated logout.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use keyline_auth::{decode_token, extract_kid, ValidationConfig};
use keyline_db::{Application, VirtualServer};
use serde::Deserialize;
use url::Url;
use utoipa::IntoParams;

use crate::error::OidcError;
use crate::handlers::require_virtual_server;
use crate::services::{cookie_value, session_cookie_name};
use crate::state::OidcState;

/// Query parameters of `GET /oidc/{virtual_server}/end_session`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(default)]
pub struct EndSessionParams {
    /// ID token previously issued to the client; names the client whose
    /// redirect URIs apply. The signature must verify against a tenant key.
    pub id_token_hint: Option<String>,
    /// Where to send the browser afterwards; must be registered.
    pub post_logout_redirect_uri: Option<String>,
    /// Echoed onto the redirect.
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdTokenHintClaims {
    aud: Vec<String>,
}

/// Verify the hint against the tenant key its header names and resolve the
/// client it was issued to. Expiry is ignored: logging out with an expired
/// id token is fine.
async fn resolve_hint_client(
    state: &OidcState,
    vs: &VirtualServer,
    hint: &str,
) -> Result<Application, OidcError> {
    let kid = extract_kid(hint)
        .map_err(|e| OidcError::InvalidRequest(format!("Invalid id_token_hint: {e}")))?
        .ok_or_else(|| OidcError::InvalidRequest("id_token_hint has no kid".to_string()))?;
    let pair = state
        .key_service
        .key_by_kid(vs.id, &kid)
        .await
        .map_err(|_| OidcError::InvalidRequest("id_token_hint kid is unknown".to_string()))?;

    let validation = ValidationConfig::default()
        .issuer(state.token_issuer.issuer(&vs.name))
        .skip_exp_validation();
    let claims = decode_token::<IdTokenHintClaims>(
        hint,
        &pair.decoding_key()?,
        pair.algorithm.jwt_algorithm(),
        &validation,
    )
    .map_err(|e| OidcError::InvalidRequest(format!("Invalid id_token_hint: {e}")))?
    .claims;

    let client_id = claims
        .aud
        .first()
        .ok_or_else(|| OidcError::InvalidRequest("id_token_hint has no audience".to_string()))?;
    state
        .applications
        .get_by_name(vs.id, client_id)
        .await?
        .ok_or_else(|| OidcError::InvalidRequest("Unknown client".to_string()))
}

/// OIDC end-session endpoint.
///
/// Revokes the browser session, clears the cookie and redirects to the
/// registered post-logout URI, or to the client's first redirect URI when
/// none is requested.
#[utoipa::path(
    get,
    path = "/oidc/{virtual_server}/end_session",
    params(
        ("virtual_server" = String, Path, description = "Virtual server name"),
        EndSessionParams,
    ),
    responses(
        (status = 303, description = "Redirect after logout"),
        (status = 400, description = "Missing or unverifiable id_token_hint, or unregistered post-logout redirect URI"),
        (status = 404, description = "Unknown virtual server"),
    ),
    tag = "OIDC"
)]
pub async fn end_session_handler(
    State(state): State<OidcState>,
    Path(virtual_server): Path<String>,
    headers: HeaderMap,
    Query(params): Query<EndSessionParams>,
) -> Result<Response, OidcError> {
    let vs = require_virtual_server(&state, &virtual_server).await?;

    let hint = params
        .id_token_hint
        .as_deref()
        .ok_or_else(|| OidcError::InvalidRequest("Missing id_token_hint".to_string()))?;
    let application = resolve_hint_client(&state, &vs, hint).await?;

    let cookie_name = session_cookie_name(&vs.name);
    if let Some(cookie) = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| cookie_value(h, &cookie_name))
    {
        state.sessions.delete(&vs, cookie).await?;
    }

    let target = match params.post_logout_redirect_uri {
        Some(uri) => {
            if !application.post_logout_redirect_uris.contains(&uri) {
                return Err(OidcError::InvalidRequest(
                    "post_logout_redirect_uri is not registered".to_string(),
                ));
            }
            match &params.state {
                Some(client_state) => {
                    let mut url = Url::parse(&uri).map_err(|e| {
                        OidcError::InvalidRequest(format!("Invalid post_logout_redirect_uri: {e}"))
                    })?;
                    url.query_pairs_mut().append_pair("state", client_state);
                    url.into()
                }
                None => uri,
            }
        }
        None => application
            .redirect_uris
            .first()
            .cloned()
            .ok_or_else(|| {
                OidcError::InvalidRequest("Client has no redirect URI".to_string())
            })?,
    };

    // Expire the cookie regardless of whether a session resolved.
    let clear_cookie = format!(
        "{cookie_name}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax"
    );
    Ok((
        AppendHeaders([(header::SET_COOKIE, clear_cookie)]),
        Redirect::to(&target),
    )
        .into_response())
}
