//! Router configuration for the protocol and login ceremony endpoints.
//!
//! Two routers share one [`OidcState`]:
//! - `oidc_router` serves `/{virtual_server}/...` and is mounted at `/oidc`
//! - `login_router` serves `/{token}/...` and is mounted at `/login-sessions`

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{
    authorize_form_handler, authorize_handler, discovery_handler, end_session_handler,
    finish_handler, jwks_handler,
    login_state_handler, onboard_totp_handler, resend_email_verification_handler,
    reset_temporary_password_handler, token_handler, userinfo_get_handler, userinfo_post_handler,
    verify_email_handler, verify_password_handler, verify_totp_handler,
};
use crate::state::OidcState;

/// The per-tenant OIDC protocol endpoints.
pub fn oidc_router(state: OidcState) -> Router {
    Router::new()
        .route(
            "/:virtual_server/.well-known/openid-configuration",
            get(discovery_handler),
        )
        .route(
            "/:virtual_server/.well-known/jwks.json",
            get(jwks_handler),
        )
        .route(
            "/:virtual_server/authorize",
            get(authorize_handler).post(authorize_form_handler),
        )
        .route("/:virtual_server/token", post(token_handler))
        .route(
            "/:virtual_server/userinfo",
            get(userinfo_get_handler).post(userinfo_post_handler),
        )
        .route("/:virtual_server/end_session", get(end_session_handler))
        .with_state(state)
}

/// The login ceremony endpoints driven by the login frontend.
pub fn login_router(state: OidcState) -> Router {
    Router::new()
        .route("/:token", get(login_state_handler))
        .route("/:token/verify-password", post(verify_password_handler))
        .route(
            "/:token/reset-temporary-password",
            post(reset_temporary_password_handler),
        )
        .route(
            "/:token/resend-email-verification",
            post(resend_email_verification_handler),
        )
        .route("/:token/verify-email", post(verify_email_handler))
        .route("/:token/onboard-totp", post(onboard_totp_handler))
        .route("/:token/verify-totp", post(verify_totp_handler))
        .route("/:token/finish", post(finish_handler))
        .with_state(state)
}
