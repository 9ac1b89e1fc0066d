//! Signing algorithms supported for tenant keys.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::KeysError;

/// A signing algorithm a virtual server can issue tokens with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    /// Ed25519 (EdDSA).
    #[serde(rename = "EdDSA")]
    EdDsa,
    /// RSA with SHA-256 (RS256).
    #[serde(rename = "RS256")]
    Rs256,
}

impl KeyAlgorithm {
    /// All supported algorithms.
    pub const ALL: [KeyAlgorithm; 2] = [KeyAlgorithm::EdDsa, KeyAlgorithm::Rs256];

    /// The matching JWS algorithm.
    #[must_use]
    pub fn jwt_algorithm(&self) -> jsonwebtoken::Algorithm {
        match self {
            KeyAlgorithm::EdDsa => jsonwebtoken::Algorithm::EdDSA,
            KeyAlgorithm::Rs256 => jsonwebtoken::Algorithm::RS256,
        }
    }
}

impl Display for KeyAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyAlgorithm::EdDsa => write!(f, "EdDSA"),
            KeyAlgorithm::Rs256 => write!(f, "RS256"),
        }
    }
}

impl FromStr for KeyAlgorithm {
    type Err = KeysError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EdDSA" => Ok(KeyAlgorithm::EdDsa),
            "RS256" => Ok(KeyAlgorithm::Rs256),
            other => Err(KeysError::UnknownAlgorithm(other.to_string())),
        }
    }
}
