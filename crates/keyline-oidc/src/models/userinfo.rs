//! Userinfo endpoint models.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Claims returned from the userinfo endpoint, filtered by the granted
/// scopes of the presented access token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserInfoResponse {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Form body of `POST /userinfo` (RFC 6750 form-encoded token).
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct UserInfoForm {
    pub access_token: Option<String>,
}
