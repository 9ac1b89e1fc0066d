//! Authorization endpoint parameters.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Parameters of `GET|POST /oidc/{virtual_server}/authorize`, either
/// query-encoded or as a form body.
///
/// When a `request` JWT is supplied, its payload claims override the query
/// parameters. The JWT's signature is not verified.
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams, ToSchema)]
#[serde(default)]
pub struct AuthorizeParams {
    /// The application name acting as OAuth `client_id`.
    pub client_id: Option<String>,
    /// Must exactly match a registered redirect URI.
    pub redirect_uri: Option<String>,
    /// Only `code` is supported.
    pub response_type: Option<String>,
    /// Space-separated scopes; must include `openid`.
    pub scope: Option<String>,
    /// Opaque client state, echoed on every redirect.
    pub state: Option<String>,
    /// OIDC nonce, echoed in the ID token.
    pub nonce: Option<String>,
    /// `none` suppresses the login ceremony.
    pub prompt: Option<String>,
    /// PKCE code challenge (S256).
    pub code_challenge: Option<String>,
    /// PKCE challenge method; only `S256` is accepted.
    pub code_challenge_method: Option<String>,
    /// Request object JWT whose claims merge over the query parameters.
    pub request: Option<String>,
}

impl AuthorizeParams {
    /// Overlay the claims of a request object over these parameters.
    /// Claims present in `overlay` win.
    pub fn merge(&mut self, overlay: AuthorizeParams) {
        fn take(target: &mut Option<String>, value: Option<String>) {
            if value.is_some() {
                *target = value;
            }
        }
        take(&mut self.client_id, overlay.client_id);
        take(&mut self.redirect_uri, overlay.redirect_uri);
        take(&mut self.response_type, overlay.response_type);
        take(&mut self.scope, overlay.scope);
        take(&mut self.state, overlay.state);
        take(&mut self.nonce, overlay.nonce);
        take(&mut self.prompt, overlay.prompt);
        take(&mut self.code_challenge, overlay.code_challenge);
        take(&mut self.code_challenge_method, overlay.code_challenge_method);
    }

    /// The scope string split into individual scopes.
    #[must_use]
    pub fn scopes(&self) -> Vec<String> {
        self.scope
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}
