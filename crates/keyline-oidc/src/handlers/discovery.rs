//! OIDC discovery and JWKS handlers.

use axum::extract::{Path, State};
use axum::Json;

use crate::error::OidcError;
use crate::handlers::require_virtual_server;
use crate::models::{JwkSet, OpenIdConfiguration};
use crate::state::OidcState;

/// Returns the OpenID Connect discovery document of one virtual server.
#[utoipa::path(
    get,
    path = "/oidc/{virtual_server}/.well-known/openid-configuration",
    params(("virtual_server" = String, Path, description = "Virtual server name")),
    responses(
        (status = 200, description = "OIDC discovery document", body = OpenIdConfiguration),
        (status = 404, description = "Unknown virtual server"),
    ),
    tag = "OIDC Discovery"
)]
pub async fn discovery_handler(
    State(state): State<OidcState>,
    Path(virtual_server): Path<String>,
) -> Result<Json<OpenIdConfiguration>, OidcError> {
    let vs = require_virtual_server(&state, &virtual_server).await?;
    let issuer = state.token_issuer.issuer(&vs.name);
    let algorithms = vec![vs.signing_algorithm.to_string()];
    Ok(Json(OpenIdConfiguration::new(&issuer, &algorithms)))
}

/// Returns the JSON Web Key Set of one virtual server.
///
/// Contains every non-expired public key, so tokens signed before a
/// rotation stay verifiable until the old key expires.
#[utoipa::path(
    get,
    path = "/oidc/{virtual_server}/.well-known/jwks.json",
    params(("virtual_server" = String, Path, description = "Virtual server name")),
    responses(
        (status = 200, description = "JSON Web Key Set", body = JwkSet),
        (status = 404, description = "Unknown virtual server"),
    ),
    tag = "OIDC Discovery"
)]
pub async fn jwks_handler(
    State(state): State<OidcState>,
    Path(virtual_server): Path<String>,
) -> Result<Json<JwkSet>, OidcError> {
    let vs = require_virtual_server(&state, &virtual_server).await?;

    let mut keys = Vec::new();
    for pair in state.key_service.verification_keys(vs.id).await? {
        match pair.jwk() {
            Ok(jwk) => keys.push(jwk),
            Err(e) => {
                tracing::error!(kid = %pair.kid, error = %e, "skipping unparseable public key");
            }
        }
    }
    Ok(Json(JwkSet { keys }))
}
