//! Multi-tenant OIDC protocol engine.
//!
//! Each virtual server is its own issuer at `{external_url}/oidc/{name}`,
//! with tenant-scoped signing keys, clients and users. The login ceremony
//! endpoints drive a browser frontend through password, email and TOTP
//! verification before a durable session is minted.

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;

pub use error::{OAuthErrorCode, OAuthErrorResponse, OidcError};
pub use router::{login_router, oidc_router};
pub use state::{OidcState, OidcStateConfig};
