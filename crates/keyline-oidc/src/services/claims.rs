//! Extra access-token claims.

use async_trait::async_trait;
use keyline_core::{ApplicationId, UserId, VirtualServerId};
use keyline_db::RoleAssignmentRepository;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::OidcError;

/// Maps a user to the extra claims embedded in their access tokens.
#[async_trait]
pub trait ClaimsMapper: Send + Sync {
    async fn claims_for(
        &self,
        virtual_server_id: VirtualServerId,
        user_id: UserId,
        application_id: ApplicationId,
    ) -> Result<Map<String, Value>, OidcError>;
}

/// Default mapper: `roles` carries tenant-wide role names,
/// `application_roles` the ones scoped to the requesting application.
pub struct DefaultClaimsMapper {
    roles: Arc<dyn RoleAssignmentRepository>,
}

impl DefaultClaimsMapper {
    pub fn new(roles: Arc<dyn RoleAssignmentRepository>) -> Self {
        Self { roles }
    }
}

#[async_trait]
impl ClaimsMapper for DefaultClaimsMapper {
    async fn claims_for(
        &self,
        _virtual_server_id: VirtualServerId,
        user_id: UserId,
        application_id: ApplicationId,
    ) -> Result<Map<String, Value>, OidcError> {
        let assignments = self.roles.get_for_user(user_id).await?;

        let mut roles = Vec::new();
        let mut application_roles = Vec::new();
        for assignment in assignments {
            match assignment.application_id {
                None => roles.push(Value::String(assignment.role)),
                Some(id) if id == application_id => {
                    application_roles.push(Value::String(assignment.role));
                }
                Some(_) => {}
            }
        }

        let mut claims = Map::new();
        if !roles.is_empty() {
            claims.insert("roles".to_string(), Value::Array(roles));
        }
        if !application_roles.is_empty() {
            claims.insert("application_roles".to_string(), Value::Array(application_roles));
        }
        Ok(claims)
    }
}
