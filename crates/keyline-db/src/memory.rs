//! In-memory repository implementations.
//!
//! Backing storage for tests and single-node deployments. Uniqueness
//! checks mirror what the database constraints would enforce.

use async_trait::async_trait;
use keyline_core::{
    ApplicationId, KeylineError, Result, RoleId, SessionId, UserId, VirtualServerId,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::models::{
    Application, Credential, RoleAssignment, Session, User, VirtualServer,
};
use crate::repository::{
    ApplicationRepository, CredentialRepository, RoleAssignmentRepository, SessionRepository,
    UserRepository, VirtualServerRepository,
};

fn conflict(what: &str) -> KeylineError {
    KeylineError::Conflict {
        message: what.to_string(),
    }
}

/// In-memory [`VirtualServerRepository`].
#[derive(Default)]
pub struct MemoryVirtualServerRepository {
    rows: RwLock<HashMap<VirtualServerId, VirtualServer>>,
}

impl MemoryVirtualServerRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VirtualServerRepository for MemoryVirtualServerRepository {
    async fn create(&self, virtual_server: VirtualServer) -> Result<VirtualServer> {
        let mut rows = self.rows.write().await;
        if rows.values().any(|vs| vs.name == virtual_server.name) {
            return Err(conflict("virtual server name already in use"));
        }
        rows.insert(virtual_server.id, virtual_server.clone());
        Ok(virtual_server)
    }

    async fn get(&self, id: VirtualServerId) -> Result<Option<VirtualServer>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<VirtualServer>> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|vs| vs.name == name)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<VirtualServer>> {
        let mut all: Vec<VirtualServer> = self.rows.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}

/// In-memory [`UserRepository`].
#[derive(Default)]
pub struct MemoryUserRepository {
    rows: RwLock<HashMap<UserId, User>>,
}

impl MemoryUserRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, user: User) -> Result<User> {
        let mut rows = self.rows.write().await;
        if rows
            .values()
            .any(|u| u.virtual_server_id == user.virtual_server_id && u.username == user.username)
        {
            return Err(conflict("username already in use"));
        }
        rows.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn get_by_username(
        &self,
        virtual_server: VirtualServerId,
        username: &str,
    ) -> Result<Option<User>> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|u| u.virtual_server_id == virtual_server && u.username == username)
            .cloned())
    }

    async fn update(&self, user: User) -> Result<User> {
        let mut rows = self.rows.write().await;
        if !rows.contains_key(&user.id) {
            return Err(KeylineError::NotFound {
                resource: "User".to_string(),
                id: Some(user.id.to_string()),
            });
        }
        rows.insert(user.id, user.clone());
        Ok(user)
    }
}

/// In-memory [`ApplicationRepository`].
#[derive(Default)]
pub struct MemoryApplicationRepository {
    rows: RwLock<HashMap<ApplicationId, Application>>,
}

impl MemoryApplicationRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApplicationRepository for MemoryApplicationRepository {
    async fn create(&self, application: Application) -> Result<Application> {
        let mut rows = self.rows.write().await;
        if rows.values().any(|a| {
            a.virtual_server_id == application.virtual_server_id && a.name == application.name
        }) {
            return Err(conflict("application name already in use"));
        }
        rows.insert(application.id, application.clone());
        Ok(application)
    }

    async fn get(&self, id: ApplicationId) -> Result<Option<Application>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn get_by_name(
        &self,
        virtual_server: VirtualServerId,
        name: &str,
    ) -> Result<Option<Application>> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|a| a.virtual_server_id == virtual_server && a.name == name)
            .cloned())
    }
}

/// In-memory [`CredentialRepository`].
#[derive(Default)]
pub struct MemoryCredentialRepository {
    rows: RwLock<HashMap<keyline_core::CredentialId, Credential>>,
}

impl MemoryCredentialRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialRepository for MemoryCredentialRepository {
    async fn create(&self, credential: Credential) -> Result<Credential> {
        let mut rows = self.rows.write().await;
        rows.insert(credential.id, credential.clone());
        Ok(credential)
    }

    async fn get_for_user(&self, user: UserId) -> Result<Vec<Credential>> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|c| c.user_id == user)
            .cloned()
            .collect())
    }

    async fn update(&self, credential: Credential) -> Result<Credential> {
        let mut rows = self.rows.write().await;
        if !rows.contains_key(&credential.id) {
            return Err(KeylineError::NotFound {
                resource: "Credential".to_string(),
                id: Some(credential.id.to_string()),
            });
        }
        rows.insert(credential.id, credential.clone());
        Ok(credential)
    }
}

/// In-memory [`RoleAssignmentRepository`].
#[derive(Default)]
pub struct MemoryRoleAssignmentRepository {
    rows: RwLock<HashMap<RoleId, RoleAssignment>>,
}

impl MemoryRoleAssignmentRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleAssignmentRepository for MemoryRoleAssignmentRepository {
    async fn create(&self, assignment: RoleAssignment) -> Result<RoleAssignment> {
        let mut rows = self.rows.write().await;
        rows.insert(assignment.id, assignment.clone());
        Ok(assignment)
    }

    async fn get_for_user(&self, user: UserId) -> Result<Vec<RoleAssignment>> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|r| r.user_id == user)
            .cloned()
            .collect())
    }
}

/// In-memory [`SessionRepository`].
#[derive(Default)]
pub struct MemorySessionRepository {
    rows: RwLock<HashMap<SessionId, Session>>,
}

impl MemorySessionRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn create(&self, session: Session) -> Result<Session> {
        let mut rows = self.rows.write().await;
        rows.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get(&self, id: SessionId) -> Result<Option<Session>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn delete(&self, id: SessionId) -> Result<()> {
        self.rows.write().await.remove(&id);
        Ok(())
    }
}
