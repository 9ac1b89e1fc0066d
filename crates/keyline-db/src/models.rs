//! Domain models.

use chrono::{DateTime, Utc};
use keyline_core::{
    ApplicationId, CredentialId, RoleId, SessionId, UserId, VirtualServerId,
};
use keyline_keys::KeyAlgorithm;
use serde::{Deserialize, Serialize};

/// An isolated tenant with its own users, applications and signing keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualServer {
    pub id: VirtualServerId,
    /// URL-safe slug, unique across the deployment. Appears in issuer URLs
    /// and the session cookie name.
    pub name: String,
    pub display_name: String,
    /// Preferred signing algorithm for newly issued tokens.
    pub signing_algorithm: KeyAlgorithm,
    /// Whether the login page offers self-service signup.
    pub enable_registration: bool,
    /// Whether logins require a verified email address.
    pub require_email_verification: bool,
    /// Whether logins require TOTP, onboarding users who lack it.
    pub require_totp: bool,
}

/// A user account within a virtual server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub virtual_server_id: VirtualServerId,
    /// Unique per virtual server.
    pub username: String,
    pub email: String,
    pub email_verified: bool,
    pub display_name: String,
    /// Service users authenticate via `ServiceUserKey` credentials and the
    /// token-exchange grant instead of the login ceremony.
    pub service_user: bool,
}

/// An OAuth client registered on a virtual server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub virtual_server_id: VirtualServerId,
    /// The OAuth `client_id`, unique per virtual server.
    pub name: String,
    pub display_name: String,
    /// Argon2 hash of the client secret. `None` marks a public client,
    /// which must use PKCE instead.
    pub hashed_secret: Option<String>,
    /// Allowed redirect URIs, matched exactly.
    pub redirect_uris: Vec<String>,
    /// Allowed post-logout redirect URIs, matched exactly.
    pub post_logout_redirect_uris: Vec<String>,
}

/// A credential attached to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub user_id: UserId,
    pub details: CredentialDetails,
}

/// The secret material of a credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialDetails {
    /// Argon2id password hash.
    Password {
        hash: String,
        /// Temporary passwords force a reset during login.
        temporary: bool,
    },
    /// TOTP authenticator (SHA1).
    Totp {
        /// Base32-encoded shared secret.
        secret: String,
        digits: usize,
        period: u64,
    },
    /// Public key a service user signs token-exchange assertions with.
    ServiceUserKey {
        public_key_pem: String,
        /// Key id referenced by the assertion's JWS header.
        kid: String,
        algorithm: KeyAlgorithm,
    },
}

/// A role granted to a user, optionally scoped to one application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub id: RoleId,
    pub user_id: UserId,
    /// `None` grants the role across the whole virtual server.
    pub application_id: Option<ApplicationId>,
    pub role: String,
}

/// A durable browser session. The browser holds `"{id}:{secret}"`; only the
/// hash of the secret is stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub virtual_server_id: VirtualServerId,
    pub user_id: UserId,
    pub hashed_secret: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// The password details, if this is a password credential.
    #[must_use]
    pub fn as_password(&self) -> Option<(&str, bool)> {
        match &self.details {
            CredentialDetails::Password { hash, temporary } => Some((hash, *temporary)),
            _ => None,
        }
    }

    /// Whether this is a TOTP credential.
    #[must_use]
    pub fn is_totp(&self) -> bool {
        matches!(self.details, CredentialDetails::Totp { .. })
    }
}
