//! Login ceremony request/response models.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::LoginStep;

/// State of an in-flight login ceremony, rendered by the login frontend.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginStateResponse {
    /// The step the frontend should render next.
    pub step: LoginStep,
    pub application_display_name: String,
    pub virtual_server_display_name: String,
    pub virtual_server_name: String,
    /// Whether the login page offers self-service signup.
    pub signup_enabled: bool,
    /// Transient TOTP onboarding secret; only set while the ceremony is at
    /// the onboarding step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totp_secret: Option<String>,
}

/// Body of `POST /verify-password`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPasswordRequest {
    pub username: String,
    pub password: String,
}

/// Body of `POST /reset-temporary-password`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub password: String,
}

/// Body of `POST /verify-email`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyEmailRequest {
    pub token: String,
}

/// Body of `POST /onboard-totp`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OnboardTotpRequest {
    pub code: String,
}

/// Body of `POST /verify-totp`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyTotpRequest {
    pub code: String,
}
