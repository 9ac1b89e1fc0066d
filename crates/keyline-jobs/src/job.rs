//! The job trait.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Why a job run failed.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job returned an error of its own.
    #[error("{0}")]
    Failed(String),

    /// The run exceeded its timeout and was abandoned.
    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    /// The job panicked; the panic was contained to its task.
    #[error("panicked")]
    Panicked,
}

/// A periodic background job.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Stable name, used in logs.
    fn name(&self) -> &'static str;

    /// How often the job runs.
    fn interval(&self) -> Duration;

    /// How long one run may take before it is abandoned.
    fn timeout(&self) -> Duration {
        Duration::from_secs(10 * 60)
    }

    async fn run(&self) -> Result<(), JobError>;
}
