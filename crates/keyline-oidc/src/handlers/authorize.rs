//! Authorization endpoint.
//!
//! Validation order matters: the tenant, client and redirect URI are
//! checked first and fail hard, because errors may only be redirected to a
//! redirect URI that has been proven to belong to the client. Everything
//! after that point reports back via error redirect.

use axum::extract::{Form, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use keyline_auth::decode_unverified;
use keyline_db::{Application, VirtualServer};
use keyline_store::{TokenKind, LOGIN_SESSION_TTL, OIDC_CODE_TTL};
use url::Url;

use crate::error::{OAuthErrorCode, OidcError};
use crate::handlers::require_virtual_server;
use crate::models::{AuthorizeParams, CodeInfo};
use crate::services::{session_cookie_name, LoginSession, LoginStep};
use crate::state::OidcState;

/// OIDC authorization endpoint.
///
/// Either redirects straight back with a code (valid session cookie) or
/// starts a login ceremony and redirects to the login frontend.
#[utoipa::path(
    get,
    path = "/oidc/{virtual_server}/authorize",
    params(
        ("virtual_server" = String, Path, description = "Virtual server name"),
        AuthorizeParams,
    ),
    responses(
        (status = 302, description = "Redirect with code, error, or to the login frontend"),
        (status = 400, description = "Unidentifiable client or redirect URI"),
        (status = 404, description = "Unknown virtual server"),
    ),
    tag = "OIDC"
)]
pub async fn authorize_handler(
    State(state): State<OidcState>,
    Path(virtual_server): Path<String>,
    headers: HeaderMap,
    Query(params): Query<AuthorizeParams>,
) -> Result<Response, OidcError> {
    authorize(state, virtual_server, headers, params).await
}

/// OIDC authorization endpoint, form-encoded body variant.
#[utoipa::path(
    post,
    path = "/oidc/{virtual_server}/authorize",
    params(("virtual_server" = String, Path, description = "Virtual server name")),
    request_body(content = AuthorizeParams, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "Redirect with code, error, or to the login frontend"),
        (status = 400, description = "Unidentifiable client or redirect URI"),
        (status = 404, description = "Unknown virtual server"),
    ),
    tag = "OIDC"
)]
pub async fn authorize_form_handler(
    State(state): State<OidcState>,
    Path(virtual_server): Path<String>,
    headers: HeaderMap,
    Form(params): Form<AuthorizeParams>,
) -> Result<Response, OidcError> {
    authorize(state, virtual_server, headers, params).await
}

async fn authorize(
    state: OidcState,
    virtual_server: String,
    headers: HeaderMap,
    mut params: AuthorizeParams,
) -> Result<Response, OidcError> {
    let vs = require_virtual_server(&state, &virtual_server).await?;

    // Claims of a request object override the query parameters. The JWT is
    // decoded without signature verification.
    if let Some(request) = params.request.take() {
        let overlay: AuthorizeParams = decode_unverified(&request)
            .map_err(|e| OidcError::InvalidRequest(format!("Invalid request object: {e}")))?;
        params.merge(overlay);
    }

    // Hard failures: no proven redirect target yet.
    let client_id = params
        .client_id
        .clone()
        .ok_or_else(|| OidcError::InvalidRequest("Missing client_id".to_string()))?;
    let application = state
        .applications
        .get_by_name(vs.id, &client_id)
        .await?
        .ok_or_else(|| OidcError::InvalidRequest(format!("Unknown client {client_id}")))?;
    let redirect_uri = params
        .redirect_uri
        .clone()
        .ok_or_else(|| OidcError::InvalidRequest("Missing redirect_uri".to_string()))?;
    if !application.redirect_uris.contains(&redirect_uri) {
        return Err(OidcError::InvalidRequest(
            "redirect_uri is not registered for this client".to_string(),
        ));
    }

    // From here on, errors redirect back to the client.
    if params.response_type.as_deref() != Some("code") {
        return Ok(error_redirect(
            &redirect_uri,
            OAuthErrorCode::UnsupportedResponseType,
            "Only response_type=code is supported",
            params.state.as_deref(),
        ));
    }
    let scopes = params.scopes();
    if !scopes.iter().any(|s| s == "openid") {
        return Err(OidcError::InvalidScope(
            "scope must include openid".to_string(),
        ));
    }
    if let Some(method) = params.code_challenge_method.as_deref() {
        if method != "S256" {
            return Ok(error_redirect(
                &redirect_uri,
                OAuthErrorCode::InvalidRequest,
                "Only the S256 code challenge method is supported",
                params.state.as_deref(),
            ));
        }
    }

    // An existing session short-circuits the ceremony.
    if let Some(session) = resolve_session_cookie(&state, &vs, &headers).await? {
        let code = mint_code(&state, &vs, &application, &params, &scopes, &session).await?;
        let target = append_query(
            &redirect_uri,
            &[("code", Some(code.as_str())), ("state", params.state.as_deref())],
        )?;
        return Ok(Redirect::to(target.as_str()).into_response());
    }

    if params.prompt.as_deref() == Some("none") {
        return Ok(error_redirect(
            &redirect_uri,
            OAuthErrorCode::LoginRequired,
            "Authentication required",
            params.state.as_deref(),
        ));
    }

    // Start a login ceremony and send the browser to the login frontend.
    let original_url = original_authorize_url(&state, &vs.name, &params)?;
    let login_session = LoginSession {
        virtual_server: vs.name.clone(),
        application_id: application.id,
        original_url,
        step: LoginStep::PasswordVerification,
        user_id: None,
        totp_onboarding_secret: None,
        scopes,
        nonce: params.nonce.clone(),
    };
    let token = state
        .token_store
        .create(TokenKind::LoginSession, &login_session, LOGIN_SESSION_TTL)
        .await?;
    tracing::debug!(
        virtual_server = %vs.name,
        client_id = %client_id,
        "started login ceremony"
    );
    let target = format!("{}/login?token={token}", state.frontend_url);
    Ok(Redirect::to(&target).into_response())
}

/// Mint a single-use authorization code for an authenticated user.
async fn mint_code(
    state: &OidcState,
    vs: &VirtualServer,
    application: &Application,
    params: &AuthorizeParams,
    scopes: &[String],
    session: &keyline_db::Session,
) -> Result<String, OidcError> {
    let info = CodeInfo {
        virtual_server: vs.name.clone(),
        client_id: application.id,
        redirect_uri: params
            .redirect_uri
            .clone()
            .unwrap_or_default(),
        scopes: scopes.to_vec(),
        user_id: session.user_id,
        nonce: params.nonce.clone(),
        code_challenge: params.code_challenge.clone(),
        authenticated_at: session.created_at,
    };
    let code = state
        .token_store
        .create(TokenKind::OidcCode, &info, OIDC_CODE_TTL)
        .await?;
    Ok(code)
}

async fn resolve_session_cookie(
    state: &OidcState,
    vs: &VirtualServer,
    headers: &HeaderMap,
) -> Result<Option<keyline_db::Session>, OidcError> {
    let Some(header) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) else {
        return Ok(None);
    };
    let name = session_cookie_name(&vs.name);
    let Some(value) = crate::services::cookie_value(header, &name) else {
        return Ok(None);
    };
    state.sessions.resolve(vs, value).await
}

/// The authorize URL to replay once the login ceremony finishes.
fn original_authorize_url(
    state: &OidcState,
    virtual_server: &str,
    params: &AuthorizeParams,
) -> Result<String, OidcError> {
    let base = format!("{}/oidc/{virtual_server}/authorize", state.external_url);
    let mut url = Url::parse(&base)
        .map_err(|e| OidcError::Internal(format!("external_url is not a URL: {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        let pairs = [
            ("client_id", params.client_id.as_deref()),
            ("redirect_uri", params.redirect_uri.as_deref()),
            ("response_type", params.response_type.as_deref()),
            ("scope", params.scope.as_deref()),
            ("state", params.state.as_deref()),
            ("nonce", params.nonce.as_deref()),
            ("code_challenge", params.code_challenge.as_deref()),
            ("code_challenge_method", params.code_challenge_method.as_deref()),
        ];
        for (key, value) in pairs {
            if let Some(value) = value {
                query.append_pair(key, value);
            }
        }
    }
    Ok(url.into())
}

/// Redirect an error back to a validated redirect URI.
fn error_redirect(
    redirect_uri: &str,
    error: OAuthErrorCode,
    description: &str,
    client_state: Option<&str>,
) -> Response {
    let error = error.to_string();
    match append_query(
        redirect_uri,
        &[
            ("error", Some(error.as_str())),
            ("error_description", Some(description)),
            ("state", client_state),
        ],
    ) {
        Ok(target) => Redirect::to(target.as_str()).into_response(),
        // The URI was validated against the client registration already;
        // if it still fails to parse, refuse to redirect anywhere.
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

fn append_query(uri: &str, pairs: &[(&str, Option<&str>)]) -> Result<String, OidcError> {
    let mut url = Url::parse(uri)
        .map_err(|e| OidcError::InvalidRequest(format!("Invalid redirect_uri: {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in pairs {
            if let Some(value) = value {
                query.append_pair(key, value);
            }
        }
    }
    Ok(url.into())
}
