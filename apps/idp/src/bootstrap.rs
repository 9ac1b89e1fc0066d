//! Startup bootstrap.
//!
//! Ensures a default virtual server with a signing key and an admin user
//! exist before the server accepts requests. A bootstrap failure is fatal.

use std::sync::Arc;

use keyline_auth::{AuthError, PasswordHasher};
use keyline_core::{CredentialId, UserId, VirtualServerId};
use keyline_db::{
    Credential, CredentialDetails, CredentialRepository, User, UserRepository, VirtualServer,
    VirtualServerRepository,
};
use keyline_keys::{KeyAlgorithm, KeyService, KeysError};
use keyline_store::generate_token;
use thiserror::Error;
use tracing::{info, instrument};

pub const DEFAULT_VIRTUAL_SERVER: &str = "default";
pub const ADMIN_USERNAME: &str = "admin";

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Database error during bootstrap: {0}")]
    Db(#[from] keyline_core::KeylineError),

    #[error("Key generation failed during bootstrap: {0}")]
    Keys(#[from] KeysError),

    #[error("Password hashing failed during bootstrap: {0}")]
    Auth(#[from] AuthError),
}

/// What bootstrap actually did, for startup logging.
#[derive(Debug)]
pub struct BootstrapResult {
    pub virtual_server_id: VirtualServerId,
    pub virtual_server_created: bool,
    pub admin_created: bool,
}

/// Ensure the default virtual server, its signing key and the admin user
/// exist. Idempotent: a restart against existing data changes nothing.
///
/// # Errors
///
/// Any repository or key-store failure aborts startup.
#[instrument(skip_all, name = "bootstrap")]
pub async fn run_bootstrap(
    virtual_servers: &Arc<dyn VirtualServerRepository>,
    users: &Arc<dyn UserRepository>,
    credentials: &Arc<dyn CredentialRepository>,
    key_service: &KeyService,
) -> Result<BootstrapResult, BootstrapError> {
    let (virtual_server, virtual_server_created) =
        match virtual_servers.get_by_name(DEFAULT_VIRTUAL_SERVER).await? {
            Some(existing) => (existing, false),
            None => {
                let created = virtual_servers
                    .create(VirtualServer {
                        id: VirtualServerId::new(),
                        name: DEFAULT_VIRTUAL_SERVER.to_string(),
                        display_name: "Default".to_string(),
                        signing_algorithm: KeyAlgorithm::EdDsa,
                        enable_registration: false,
                        require_email_verification: false,
                        require_totp: false,
                    })
                    .await?;
                info!(virtual_server = %created.id, "Created default virtual server");
                (created, true)
            }
        };

    // Provision the signing key if none survives. Rotation keeps it fresh
    // afterwards.
    if key_service
        .current_key(virtual_server.id, virtual_server.signing_algorithm)
        .await
        .is_err()
    {
        key_service
            .generate(virtual_server.id, virtual_server.signing_algorithm)
            .await?;
    }

    let mut admin_created = false;
    if users
        .get_by_username(virtual_server.id, ADMIN_USERNAME)
        .await?
        .is_none()
    {
        let admin = users
            .create(User {
                id: UserId::new(),
                virtual_server_id: virtual_server.id,
                username: ADMIN_USERNAME.to_string(),
                email: format!("{ADMIN_USERNAME}@{DEFAULT_VIRTUAL_SERVER}.invalid"),
                email_verified: true,
                display_name: "Administrator".to_string(),
                service_user: false,
            })
            .await?;

        let temporary_password = generate_token();
        let hash = PasswordHasher::new().hash(&temporary_password)?;
        credentials
            .create(Credential {
                id: CredentialId::new(),
                user_id: admin.id,
                details: CredentialDetails::Password {
                    hash,
                    temporary: true,
                },
            })
            .await?;

        // Printed once on first boot; the login ceremony forces a reset.
        info!(
            username = ADMIN_USERNAME,
            password = %temporary_password,
            "Created admin user with temporary password"
        );
        admin_created = true;
    }

    Ok(BootstrapResult {
        virtual_server_id: virtual_server.id,
        virtual_server_created,
        admin_created,
    })
}
