//! Shared state for the OIDC and login routers.

use keyline_auth::PasswordHasher;
use keyline_core::Clock;
use keyline_db::{
    ApplicationRepository, CredentialRepository, SessionRepository, UserRepository,
    VirtualServerRepository,
};
use keyline_keys::KeyService;
use keyline_store::{KvStore, TokenStore};
use std::sync::Arc;

use crate::services::{DefaultClaimsMapper, SessionService, TokenIssuer};

/// Everything the protocol handlers need, cheap to clone.
#[derive(Clone)]
pub struct OidcState {
    pub virtual_servers: Arc<dyn VirtualServerRepository>,
    pub users: Arc<dyn UserRepository>,
    pub applications: Arc<dyn ApplicationRepository>,
    pub credentials: Arc<dyn CredentialRepository>,
    pub key_service: Arc<KeyService>,
    pub token_store: TokenStore,
    pub sessions: SessionService,
    pub token_issuer: TokenIssuer,
    pub password_hasher: Arc<PasswordHasher>,
    pub clock: Arc<dyn Clock>,
    /// Public base URL, no trailing slash.
    pub external_url: String,
    /// Base URL of the login UI, no trailing slash.
    pub frontend_url: String,
}

/// Dependencies handed to [`OidcState::new`].
pub struct OidcStateConfig {
    pub virtual_servers: Arc<dyn VirtualServerRepository>,
    pub users: Arc<dyn UserRepository>,
    pub applications: Arc<dyn ApplicationRepository>,
    pub credentials: Arc<dyn CredentialRepository>,
    pub role_assignments: Arc<dyn keyline_db::RoleAssignmentRepository>,
    pub session_repository: Arc<dyn SessionRepository>,
    pub key_service: Arc<KeyService>,
    pub kv: Arc<dyn KvStore>,
    pub clock: Arc<dyn Clock>,
    pub external_url: String,
    pub frontend_url: String,
}

impl OidcState {
    #[must_use]
    pub fn new(config: OidcStateConfig) -> Self {
        let token_issuer = TokenIssuer::new(
            config.key_service.clone(),
            Arc::new(DefaultClaimsMapper::new(config.role_assignments)),
            config.clock.clone(),
            config.external_url.clone(),
        );
        let sessions = SessionService::new(
            config.session_repository,
            config.kv.clone(),
            config.clock.clone(),
        );
        Self {
            virtual_servers: config.virtual_servers,
            users: config.users,
            applications: config.applications,
            credentials: config.credentials,
            key_service: config.key_service,
            token_store: TokenStore::new(config.kv),
            sessions,
            token_issuer,
            password_hasher: Arc::new(PasswordHasher::new()),
            clock: config.clock,
            external_url: config.external_url,
            frontend_url: config.frontend_url,
        }
    }
}
