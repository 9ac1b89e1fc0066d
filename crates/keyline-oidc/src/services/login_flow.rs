//! Login ceremony state machine.
//!
//! A ceremony starts at password verification and walks forward through
//! the guards below; each satisfied guard falls through to the next, so a
//! user with nothing outstanding goes straight to `Finish`:
//!
//! 1. temporary password → `TemporaryPassword`
//! 2. unverified email on a tenant requiring it → `EmailVerification`
//! 3. TOTP credential present → `TotpVerification`;
//!    none but tenant requires TOTP → `TotpOnboarding`
//! 4. otherwise → `Finish`
//!
//! Transitions only move forward. Handlers reject submissions for any
//! other step with a coarse 401 before calling in here.

use keyline_core::{ApplicationId, UserId};
use keyline_db::{Credential, CredentialDetails, User, VirtualServer};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The steps of the login ceremony.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoginStep {
    /// Waiting for username + password.
    PasswordVerification,
    /// A temporary password was used; a new one must be set.
    TemporaryPassword,
    /// Waiting for proof of email ownership.
    EmailVerification,
    /// Waiting for a TOTP code against an existing credential.
    TotpVerification,
    /// Tenant requires TOTP and the user has none; waiting for enrollment.
    TotpOnboarding,
    /// All guards passed; the ceremony can mint a session.
    Finish,
}

impl LoginStep {
    /// How far through the guard chain this step is.
    fn stage(self) -> u8 {
        match self {
            LoginStep::PasswordVerification => 0,
            LoginStep::TemporaryPassword => 1,
            LoginStep::EmailVerification => 2,
            LoginStep::TotpVerification | LoginStep::TotpOnboarding => 3,
            LoginStep::Finish => 4,
        }
    }
}

/// An in-flight login ceremony, stored behind an opaque token with a
/// 15-minute TTL that refreshes on every step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginSession {
    /// Virtual server name.
    pub virtual_server: String,
    /// The application that started the ceremony.
    pub application_id: ApplicationId,
    /// The authorize URL to resume once the ceremony finishes.
    pub original_url: String,
    /// Current step.
    pub step: LoginStep,
    /// Set once the password step succeeds.
    pub user_id: Option<UserId>,
    /// Transient TOTP onboarding secret. Lives only here; cleared when the
    /// credential is persisted.
    pub totp_onboarding_secret: Option<String>,
    /// Scopes of the authorize request.
    pub scopes: Vec<String>,
    /// Nonce of the authorize request.
    pub nonce: Option<String>,
}

/// Compute the step after `current` has just been completed.
#[must_use]
pub fn next_step(
    current: LoginStep,
    user: &User,
    credentials: &[Credential],
    virtual_server: &VirtualServer,
) -> LoginStep {
    let stage = current.stage();

    if stage < 1 && has_temporary_password(credentials) {
        return LoginStep::TemporaryPassword;
    }
    if stage < 2 && virtual_server.require_email_verification && !user.email_verified {
        return LoginStep::EmailVerification;
    }
    if stage < 3 {
        if credentials.iter().any(Credential::is_totp) {
            return LoginStep::TotpVerification;
        }
        if virtual_server.require_totp {
            return LoginStep::TotpOnboarding;
        }
    }
    LoginStep::Finish
}

fn has_temporary_password(credentials: &[Credential]) -> bool {
    credentials.iter().any(|c| {
        matches!(
            c.details,
            CredentialDetails::Password {
                temporary: true,
                ..
            }
        )
    })
}
