//! Repository traits.
//!
//! The seam where a SQL or KV backend would plug in. Unique violations
//! surface as [`KeylineError::Conflict`]; lookups return `Ok(None)` rather
//! than `NotFound` so callers choose their own error shape.

use async_trait::async_trait;
use keyline_core::{ApplicationId, SessionId, UserId, VirtualServerId};
use keyline_core::Result;

use crate::models::{
    Application, Credential, RoleAssignment, Session, User, VirtualServer,
};

/// Virtual server (tenant) storage.
#[async_trait]
pub trait VirtualServerRepository: Send + Sync {
    /// Insert a new virtual server. Fails with `Conflict` on a duplicate name.
    async fn create(&self, virtual_server: VirtualServer) -> Result<VirtualServer>;

    async fn get(&self, id: VirtualServerId) -> Result<Option<VirtualServer>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<VirtualServer>>;

    /// Every virtual server, for batch jobs.
    async fn list(&self) -> Result<Vec<VirtualServer>>;
}

/// User storage, scoped by virtual server.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. Fails with `Conflict` on a duplicate username.
    async fn create(&self, user: User) -> Result<User>;

    async fn get(&self, id: UserId) -> Result<Option<User>>;

    async fn get_by_username(
        &self,
        virtual_server: VirtualServerId,
        username: &str,
    ) -> Result<Option<User>>;

    /// Replace a user record (email verification, profile edits).
    async fn update(&self, user: User) -> Result<User>;
}

/// OAuth application storage, scoped by virtual server.
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// Insert a new application. Fails with `Conflict` on a duplicate name.
    async fn create(&self, application: Application) -> Result<Application>;

    async fn get(&self, id: ApplicationId) -> Result<Option<Application>>;

    async fn get_by_name(
        &self,
        virtual_server: VirtualServerId,
        name: &str,
    ) -> Result<Option<Application>>;
}

/// Credential storage.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn create(&self, credential: Credential) -> Result<Credential>;

    /// All credentials of a user, every kind.
    async fn get_for_user(&self, user: UserId) -> Result<Vec<Credential>>;

    /// Replace a credential (password resets).
    async fn update(&self, credential: Credential) -> Result<Credential>;
}

/// Role assignment storage.
#[async_trait]
pub trait RoleAssignmentRepository: Send + Sync {
    async fn create(&self, assignment: RoleAssignment) -> Result<RoleAssignment>;

    /// All assignments of a user, global and application-scoped.
    async fn get_for_user(&self, user: UserId) -> Result<Vec<RoleAssignment>>;
}

/// Durable session storage.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: Session) -> Result<Session>;

    async fn get(&self, id: SessionId) -> Result<Option<Session>>;

    async fn delete(&self, id: SessionId) -> Result<()>;
}
