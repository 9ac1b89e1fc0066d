//! Hourly signing-key rotation across all virtual servers.

use async_trait::async_trait;
use keyline_db::VirtualServerRepository;
use keyline_keys::KeyService;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::job::{Job, JobError};

/// Walks every virtual server and applies the key lifecycle: expired pairs
/// are deleted, pairs past their rotation deadline get a successor.
///
/// The batch stops at the first tenant whose rotation fails; the remaining
/// tenants are picked up by the next run.
pub struct KeyRotationJob {
    virtual_servers: Arc<dyn VirtualServerRepository>,
    key_service: Arc<KeyService>,
}

impl KeyRotationJob {
    #[must_use]
    pub fn new(
        virtual_servers: Arc<dyn VirtualServerRepository>,
        key_service: Arc<KeyService>,
    ) -> Self {
        Self {
            virtual_servers,
            key_service,
        }
    }
}

#[async_trait]
impl Job for KeyRotationJob {
    fn name(&self) -> &'static str {
        "key-rotation"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(60 * 60)
    }

    async fn run(&self) -> Result<(), JobError> {
        let virtual_servers = self
            .virtual_servers
            .list()
            .await
            .map_err(|e| JobError::Failed(e.to_string()))?;

        let count = virtual_servers.len();
        for vs in virtual_servers {
            debug!(virtual_server = %vs.name, "rotating signing keys");
            self.key_service
                .rotate_virtual_server(vs.id)
                .await
                .map_err(|e| {
                    JobError::Failed(format!("rotation failed for {}: {e}", vs.name))
                })?;
        }
        info!(virtual_servers = count, "key rotation pass complete");
        Ok(())
    }
}
