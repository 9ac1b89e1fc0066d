//! Leader election seam.
//!
//! Jobs that mutate shared state should only run on one instance. The
//! single-node deployment uses [`NoLeaderElection`]; a clustered backend
//! would implement the trait over its coordination primitive.

use async_trait::async_trait;

/// Decides whether this instance runs scheduled jobs.
#[async_trait]
pub trait LeaderElection: Send + Sync {
    /// Join the election. Called once when the scheduler starts.
    async fn start(&self) {}

    /// Leave the election, releasing any held leadership. Called once on
    /// shutdown.
    async fn stop(&self) {}

    async fn is_leader(&self) -> bool;
}

/// Single-node deployment: always the leader.
pub struct NoLeaderElection;

#[async_trait]
impl LeaderElection for NoLeaderElection {
    async fn is_leader(&self) -> bool {
        true
    }
}
