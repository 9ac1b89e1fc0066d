//! JWKS document.

use keyline_keys::Jwk;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The `/.well-known/jwks.json` document: every non-expired key of the
/// virtual server, rotated-but-unexpired keys included.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}
