//! Background jobs for keyline.
//!
//! A small in-process scheduler runs periodic jobs behind a leader
//! election seam; the only built-in job rotates tenant signing keys.

mod job;
mod leader;
mod rotation;
mod scheduler;

pub use job::{Job, JobError};
pub use leader::{LeaderElection, NoLeaderElection};
pub use rotation::KeyRotationJob;
pub use scheduler::{ErrorHook, Scheduler};
