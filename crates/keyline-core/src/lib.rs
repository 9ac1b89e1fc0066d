//! keyline core library
//!
//! Shared types for the keyline identity provider.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (`VirtualServerId`, `UserId`, ...)
//! - [`error`] - Standardized error taxonomy (`KeylineError`)
//! - [`clock`] - Time source abstraction for deterministic tests

pub mod clock;
pub mod error;
pub mod ids;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{KeylineError, Result};
pub use ids::{
    ApplicationId, CredentialId, ParseIdError, RoleId, SessionId, UserId, VirtualServerId,
};
