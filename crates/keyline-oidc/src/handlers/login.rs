//! Login ceremony handlers.
//!
//! All endpoints hang off `/login-sessions/{token}`. Submitting a step the
//! ceremony is not at, an unknown token, or bad credentials all answer with
//! the same coarse 401 so the login page leaks nothing about accounts.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::Json;
use keyline_auth::{generate_totp_secret, verify_totp_code, TOTP_DIGITS, TOTP_PERIOD};
use keyline_core::CredentialId;
use keyline_db::{Application, Credential, CredentialDetails, User, VirtualServer};
use keyline_store::{TokenKind, EMAIL_VERIFICATION_TTL, LOGIN_SESSION_TTL};

use crate::error::OidcError;
use crate::models::{
    EmailVerificationInfo, LoginStateResponse, OnboardTotpRequest,
    ResetPasswordRequest, VerifyEmailRequest, VerifyPasswordRequest, VerifyTotpRequest,
};
use crate::services::{next_step, session_cookie_name, LoginSession, LoginStep, SESSION_TTL};
use crate::state::OidcState;

/// A login session together with the tenant and application it belongs to.
struct Ceremony {
    session: LoginSession,
    vs: VirtualServer,
    application: Application,
}

async fn load_ceremony(state: &OidcState, token: &str) -> Result<Ceremony, OidcError> {
    let session: LoginSession = state
        .token_store
        .get(TokenKind::LoginSession, token)
        .await?
        .ok_or(OidcError::Unauthorized)?;
    let vs = state
        .virtual_servers
        .get_by_name(&session.virtual_server)
        .await?
        .ok_or(OidcError::Unauthorized)?;
    let application = state
        .applications
        .get(session.application_id)
        .await?
        .ok_or(OidcError::Unauthorized)?;
    Ok(Ceremony {
        session,
        vs,
        application,
    })
}

/// The user a ceremony past the password step belongs to.
async fn ceremony_user(state: &OidcState, session: &LoginSession) -> Result<User, OidcError> {
    let user_id = session.user_id.ok_or(OidcError::Unauthorized)?;
    state
        .users
        .get(user_id)
        .await?
        .ok_or(OidcError::Unauthorized)
}

fn state_response(ceremony: &Ceremony) -> LoginStateResponse {
    LoginStateResponse {
        step: ceremony.session.step,
        application_display_name: ceremony.application.display_name.clone(),
        virtual_server_display_name: ceremony.vs.display_name.clone(),
        virtual_server_name: ceremony.vs.name.clone(),
        signup_enabled: ceremony.vs.enable_registration,
        totp_secret: if ceremony.session.step == LoginStep::TotpOnboarding {
            ceremony.session.totp_onboarding_secret.clone()
        } else {
            None
        },
    }
}

/// Advance the ceremony past `completed` and persist it, refreshing the TTL.
///
/// Entering the email verification step mints a verification token;
/// entering TOTP onboarding mints the shared secret.
async fn advance(
    state: &OidcState,
    token: &str,
    ceremony: &mut Ceremony,
    completed: LoginStep,
    user: &User,
) -> Result<(), OidcError> {
    let credentials = state.credentials.get_for_user(user.id).await?;
    let step = next_step(completed, user, &credentials, &ceremony.vs);
    ceremony.session.step = step;

    match step {
        LoginStep::EmailVerification => {
            send_email_verification(state, user).await?;
        }
        LoginStep::TotpOnboarding => {
            if ceremony.session.totp_onboarding_secret.is_none() {
                ceremony.session.totp_onboarding_secret = Some(generate_totp_secret());
            }
        }
        _ => {
            ceremony.session.totp_onboarding_secret = None;
        }
    }

    state
        .token_store
        .update(
            TokenKind::LoginSession,
            token,
            &ceremony.session,
            LOGIN_SESSION_TTL,
        )
        .await?;
    Ok(())
}

/// Mint an email verification token for `user`.
///
/// Without a configured mail transport the token is only written to the
/// log, where operators can relay it manually.
async fn send_email_verification(state: &OidcState, user: &User) -> Result<(), OidcError> {
    let token = state
        .token_store
        .create(
            TokenKind::EmailVerification,
            &EmailVerificationInfo { user_id: user.id },
            EMAIL_VERIFICATION_TTL,
        )
        .await?;
    tracing::info!(
        user_id = %user.id,
        email = %user.email,
        token = %token,
        "email verification token issued"
    );
    Ok(())
}

fn require_step(ceremony: &Ceremony, expected: LoginStep) -> Result<(), OidcError> {
    if ceremony.session.step == expected {
        Ok(())
    } else {
        Err(OidcError::Unauthorized)
    }
}

/// Current state of a login ceremony.
#[utoipa::path(
    get,
    path = "/login-sessions/{token}",
    params(("token" = String, Path, description = "Login session token")),
    responses(
        (status = 200, description = "Ceremony state", body = LoginStateResponse),
        (status = 401, description = "Unknown or expired ceremony"),
    ),
    tag = "Login"
)]
pub async fn login_state_handler(
    State(state): State<OidcState>,
    Path(token): Path<String>,
) -> Result<Json<LoginStateResponse>, OidcError> {
    let ceremony = load_ceremony(&state, &token).await?;
    Ok(Json(state_response(&ceremony)))
}

/// Username and password step.
#[utoipa::path(
    post,
    path = "/login-sessions/{token}/verify-password",
    params(("token" = String, Path, description = "Login session token")),
    request_body = VerifyPasswordRequest,
    responses(
        (status = 200, description = "Ceremony state after the step", body = LoginStateResponse),
        (status = 401, description = "Wrong credentials or wrong step"),
    ),
    tag = "Login"
)]
pub async fn verify_password_handler(
    State(state): State<OidcState>,
    Path(token): Path<String>,
    Json(body): Json<VerifyPasswordRequest>,
) -> Result<Json<LoginStateResponse>, OidcError> {
    let mut ceremony = load_ceremony(&state, &token).await?;
    require_step(&ceremony, LoginStep::PasswordVerification)?;

    let user = state
        .users
        .get_by_username(ceremony.vs.id, &body.username)
        .await?
        .filter(|u| !u.service_user)
        .ok_or(OidcError::Unauthorized)?;
    let credentials = state.credentials.get_for_user(user.id).await?;
    let hash = credentials
        .iter()
        .find_map(|c| c.as_password().map(|(hash, _)| hash))
        .ok_or(OidcError::Unauthorized)?;
    if !state.password_hasher.verify(&body.password, hash)? {
        tracing::debug!(virtual_server = %ceremony.vs.name, "password verification failed");
        return Err(OidcError::Unauthorized);
    }

    ceremony.session.user_id = Some(user.id);
    advance(
        &state,
        &token,
        &mut ceremony,
        LoginStep::PasswordVerification,
        &user,
    )
    .await?;
    Ok(Json(state_response(&ceremony)))
}

/// Replace a temporary password.
#[utoipa::path(
    post,
    path = "/login-sessions/{token}/reset-temporary-password",
    params(("token" = String, Path, description = "Login session token")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Ceremony state after the step", body = LoginStateResponse),
        (status = 401, description = "Wrong step"),
    ),
    tag = "Login"
)]
pub async fn reset_temporary_password_handler(
    State(state): State<OidcState>,
    Path(token): Path<String>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<LoginStateResponse>, OidcError> {
    let mut ceremony = load_ceremony(&state, &token).await?;
    require_step(&ceremony, LoginStep::TemporaryPassword)?;
    let user = ceremony_user(&state, &ceremony.session).await?;

    let credentials = state.credentials.get_for_user(user.id).await?;
    let existing = credentials
        .into_iter()
        .find(|c| c.as_password().is_some())
        .ok_or(OidcError::Unauthorized)?;
    let hash = state.password_hasher.hash(&body.password)?;
    state
        .credentials
        .update(Credential {
            id: existing.id,
            user_id: user.id,
            details: CredentialDetails::Password {
                hash,
                temporary: false,
            },
        })
        .await?;

    advance(
        &state,
        &token,
        &mut ceremony,
        LoginStep::TemporaryPassword,
        &user,
    )
    .await?;
    Ok(Json(state_response(&ceremony)))
}

/// Mint a fresh email verification token.
#[utoipa::path(
    post,
    path = "/login-sessions/{token}/resend-email-verification",
    params(("token" = String, Path, description = "Login session token")),
    responses(
        (status = 200, description = "Ceremony state, unchanged", body = LoginStateResponse),
        (status = 401, description = "Wrong step"),
    ),
    tag = "Login"
)]
pub async fn resend_email_verification_handler(
    State(state): State<OidcState>,
    Path(token): Path<String>,
) -> Result<Json<LoginStateResponse>, OidcError> {
    let ceremony = load_ceremony(&state, &token).await?;
    require_step(&ceremony, LoginStep::EmailVerification)?;
    let user = ceremony_user(&state, &ceremony.session).await?;
    send_email_verification(&state, &user).await?;
    Ok(Json(state_response(&ceremony)))
}

/// Redeem an email verification token.
#[utoipa::path(
    post,
    path = "/login-sessions/{token}/verify-email",
    params(("token" = String, Path, description = "Login session token")),
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Ceremony state after the step", body = LoginStateResponse),
        (status = 401, description = "Bad token or wrong step"),
    ),
    tag = "Login"
)]
pub async fn verify_email_handler(
    State(state): State<OidcState>,
    Path(token): Path<String>,
    Json(body): Json<VerifyEmailRequest>,
) -> Result<Json<LoginStateResponse>, OidcError> {
    let mut ceremony = load_ceremony(&state, &token).await?;
    require_step(&ceremony, LoginStep::EmailVerification)?;
    let mut user = ceremony_user(&state, &ceremony.session).await?;

    let info: EmailVerificationInfo = state
        .token_store
        .get(TokenKind::EmailVerification, &body.token)
        .await?
        .ok_or(OidcError::Unauthorized)?;
    if info.user_id != user.id {
        return Err(OidcError::Unauthorized);
    }
    state
        .token_store
        .delete(TokenKind::EmailVerification, &body.token)
        .await?;

    user.email_verified = true;
    let user = state.users.update(user).await?;

    advance(
        &state,
        &token,
        &mut ceremony,
        LoginStep::EmailVerification,
        &user,
    )
    .await?;
    Ok(Json(state_response(&ceremony)))
}

/// Enroll a TOTP authenticator against the secret minted for this ceremony.
#[utoipa::path(
    post,
    path = "/login-sessions/{token}/onboard-totp",
    params(("token" = String, Path, description = "Login session token")),
    request_body = OnboardTotpRequest,
    responses(
        (status = 200, description = "Ceremony state after the step", body = LoginStateResponse),
        (status = 401, description = "Wrong code or wrong step"),
    ),
    tag = "Login"
)]
pub async fn onboard_totp_handler(
    State(state): State<OidcState>,
    Path(token): Path<String>,
    Json(body): Json<OnboardTotpRequest>,
) -> Result<Json<LoginStateResponse>, OidcError> {
    let mut ceremony = load_ceremony(&state, &token).await?;
    require_step(&ceremony, LoginStep::TotpOnboarding)?;
    let user = ceremony_user(&state, &ceremony.session).await?;

    let secret = ceremony
        .session
        .totp_onboarding_secret
        .clone()
        .ok_or(OidcError::Unauthorized)?;
    if !verify_totp_code(&secret, &body.code, TOTP_DIGITS, TOTP_PERIOD)? {
        return Err(OidcError::Unauthorized);
    }
    state
        .credentials
        .create(Credential {
            id: CredentialId::new(),
            user_id: user.id,
            details: CredentialDetails::Totp {
                secret,
                digits: TOTP_DIGITS,
                period: TOTP_PERIOD,
            },
        })
        .await?;
    ceremony.session.totp_onboarding_secret = None;

    advance(
        &state,
        &token,
        &mut ceremony,
        LoginStep::TotpOnboarding,
        &user,
    )
    .await?;
    Ok(Json(state_response(&ceremony)))
}

/// Verify a code against an enrolled TOTP credential.
#[utoipa::path(
    post,
    path = "/login-sessions/{token}/verify-totp",
    params(("token" = String, Path, description = "Login session token")),
    request_body = VerifyTotpRequest,
    responses(
        (status = 200, description = "Ceremony state after the step", body = LoginStateResponse),
        (status = 401, description = "Wrong code or wrong step"),
    ),
    tag = "Login"
)]
pub async fn verify_totp_handler(
    State(state): State<OidcState>,
    Path(token): Path<String>,
    Json(body): Json<VerifyTotpRequest>,
) -> Result<Json<LoginStateResponse>, OidcError> {
    let mut ceremony = load_ceremony(&state, &token).await?;
    require_step(&ceremony, LoginStep::TotpVerification)?;
    let user = ceremony_user(&state, &ceremony.session).await?;

    let credentials = state.credentials.get_for_user(user.id).await?;
    let verified = credentials.iter().any(|c| match &c.details {
        CredentialDetails::Totp {
            secret,
            digits,
            period,
        } => verify_totp_code(secret, &body.code, *digits, *period).unwrap_or(false),
        _ => false,
    });
    if !verified {
        return Err(OidcError::Unauthorized);
    }

    advance(
        &state,
        &token,
        &mut ceremony,
        LoginStep::TotpVerification,
        &user,
    )
    .await?;
    Ok(Json(state_response(&ceremony)))
}

/// Complete the ceremony: mint the browser session and redirect back to
/// the original authorize URL.
#[utoipa::path(
    post,
    path = "/login-sessions/{token}/finish",
    params(("token" = String, Path, description = "Login session token")),
    responses(
        (status = 303, description = "Session cookie set, redirect to the original authorize URL"),
        (status = 401, description = "Ceremony is not finished"),
    ),
    tag = "Login"
)]
pub async fn finish_handler(
    State(state): State<OidcState>,
    Path(token): Path<String>,
) -> Result<Response, OidcError> {
    let ceremony = load_ceremony(&state, &token).await?;
    require_step(&ceremony, LoginStep::Finish)?;
    let user = ceremony_user(&state, &ceremony.session).await?;

    let cookie_value = state.sessions.create(&ceremony.vs, user.id).await?;
    state
        .token_store
        .delete(TokenKind::LoginSession, &token)
        .await?;

    tracing::info!(
        virtual_server = %ceremony.vs.name,
        user_id = %user.id,
        "login ceremony finished"
    );
    let cookie = format!(
        "{}={cookie_value}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        session_cookie_name(&ceremony.vs.name),
        SESSION_TTL.num_seconds(),
    );
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Redirect::to(&ceremony.session.original_url),
    )
        .into_response())
}
