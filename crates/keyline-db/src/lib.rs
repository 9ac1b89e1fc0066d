//! Domain models and repositories for keyline.
//!
//! Repositories are async traits so a SQL backend can replace the bundled
//! in-memory implementations without touching the protocol engine.

pub mod memory;
pub mod models;
pub mod repository;

pub use memory::{
    MemoryApplicationRepository, MemoryCredentialRepository, MemoryRoleAssignmentRepository,
    MemorySessionRepository, MemoryUserRepository, MemoryVirtualServerRepository,
};
pub use models::{
    Application, Credential, CredentialDetails, RoleAssignment, Session, User, VirtualServer,
};
pub use repository::{
    ApplicationRepository, CredentialRepository, RoleAssignmentRepository, SessionRepository,
    UserRepository, VirtualServerRepository,
};
