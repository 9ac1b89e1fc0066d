//! Key pair material and its lifecycle timestamps.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs8::DecodePublicKey as _;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::algorithm::KeyAlgorithm;
use crate::error::KeysError;

/// How long a key signs new tokens before rotation makes a successor.
pub const ROTATE_AFTER: Duration = Duration::days(20);

/// How long a key stays servable for verification.
pub const EXPIRE_AFTER: Duration = Duration::days(30);

/// A tenant signing key with its lifecycle window.
///
/// Between `rotates_at` and `expires_at` the pair verifies existing tokens
/// but no longer signs new ones once a successor exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    /// Signing algorithm of this pair.
    pub algorithm: KeyAlgorithm,
    /// Key id advertised in JWS headers and the JWKS document.
    pub kid: String,
    /// PKCS#8 PEM private key.
    pub private_key_pem: String,
    /// SPKI PEM public key.
    pub public_key_pem: String,
    /// When the pair was generated.
    pub created_at: DateTime<Utc>,
    /// When rotation should mint a successor (`created_at` + 20 days).
    pub rotates_at: DateTime<Utc>,
    /// When the pair stops being served entirely (`created_at` + 30 days).
    pub expires_at: DateTime<Utc>,
}

impl KeyPair {
    /// Whether the pair may no longer be served at all.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whether rotation should generate a successor.
    #[must_use]
    pub fn is_due_for_rotation(&self, now: DateTime<Utc>) -> bool {
        self.rotates_at <= now
    }

    /// Signing key for `jsonwebtoken`.
    ///
    /// # Errors
    ///
    /// Returns [`KeysError::InvalidKeyMaterial`] if the PEM cannot be parsed.
    pub fn encoding_key(&self) -> Result<EncodingKey, KeysError> {
        let pem = self.private_key_pem.as_bytes();
        match self.algorithm {
            KeyAlgorithm::Rs256 => EncodingKey::from_rsa_pem(pem),
            KeyAlgorithm::EdDsa => EncodingKey::from_ed_pem(pem),
        }
        .map_err(|e| KeysError::InvalidKeyMaterial(format!("private key: {e}")))
    }

    /// Verification key for `jsonwebtoken`.
    ///
    /// # Errors
    ///
    /// Returns [`KeysError::InvalidKeyMaterial`] if the PEM cannot be parsed.
    pub fn decoding_key(&self) -> Result<DecodingKey, KeysError> {
        let pem = self.public_key_pem.as_bytes();
        match self.algorithm {
            KeyAlgorithm::Rs256 => DecodingKey::from_rsa_pem(pem),
            KeyAlgorithm::EdDsa => DecodingKey::from_ed_pem(pem),
        }
        .map_err(|e| KeysError::InvalidKeyMaterial(format!("public key: {e}")))
    }

    /// The public half as a JWK for the tenant's JWKS document.
    ///
    /// # Errors
    ///
    /// Returns [`KeysError::InvalidKeyMaterial`] if the public key cannot be
    /// parsed back out of its PEM.
    pub fn jwk(&self) -> Result<Jwk, KeysError> {
        match self.algorithm {
            KeyAlgorithm::Rs256 => {
                let public = RsaPublicKey::from_public_key_pem(&self.public_key_pem)
                    .map_err(|e| KeysError::InvalidKeyMaterial(format!("RSA public key: {e}")))?;
                Ok(Jwk {
                    kty: "RSA".to_string(),
                    kid: self.kid.clone(),
                    alg: self.algorithm.to_string(),
                    use_: "sig".to_string(),
                    n: Some(URL_SAFE_NO_PAD.encode(trim_leading_zeros(&public.n().to_bytes_be()))),
                    e: Some(URL_SAFE_NO_PAD.encode(trim_leading_zeros(&public.e().to_bytes_be()))),
                    crv: None,
                    x: None,
                })
            }
            KeyAlgorithm::EdDsa => {
                let public =
                    ed25519_dalek::VerifyingKey::from_public_key_pem(&self.public_key_pem)
                        .map_err(|e| {
                            KeysError::InvalidKeyMaterial(format!("Ed25519 public key: {e}"))
                        })?;
                Ok(Jwk {
                    kty: "OKP".to_string(),
                    kid: self.kid.clone(),
                    alg: self.algorithm.to_string(),
                    use_: "sig".to_string(),
                    n: None,
                    e: None,
                    crv: Some("Ed25519".to_string()),
                    x: Some(URL_SAFE_NO_PAD.encode(public.to_bytes())),
                })
            }
        }
    }
}

/// Serializable snapshot of a key pair. The public half and the kid are
/// rederived from the private key on import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedKeyPair {
    /// Signing algorithm.
    pub algorithm: KeyAlgorithm,
    /// PKCS#8 PEM private key.
    pub private_key: String,
    /// When the pair was generated.
    pub created_at: DateTime<Utc>,
    /// Rotation deadline.
    pub rotates_at: DateTime<Utc>,
    /// Expiry deadline.
    pub expires_at: DateTime<Utc>,
}

/// A single JSON Web Key.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Jwk {
    /// Key type: `RSA` or `OKP`.
    pub kty: String,
    /// Key id.
    pub kid: String,
    /// Signing algorithm.
    pub alg: String,
    /// Key use, always `sig`.
    #[serde(rename = "use")]
    pub use_: String,
    /// RSA modulus (base64url, no leading zeros).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA public exponent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    /// Edwards curve name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// Edwards curve public key bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
}

/// Key id for an RSA public key: the RFC 7638 JWK thumbprint.
#[must_use]
pub(crate) fn rsa_kid(public: &RsaPublicKey) -> String {
    let n = URL_SAFE_NO_PAD.encode(trim_leading_zeros(&public.n().to_bytes_be()));
    let e = URL_SAFE_NO_PAD.encode(trim_leading_zeros(&public.e().to_bytes_be()));
    // Members in lexicographic order with no whitespace, per RFC 7638.
    let canonical = format!("{{\"e\":\"{e}\",\"kty\":\"RSA\",\"n\":\"{n}\"}}");
    URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes()))
}

/// Key id for an Ed25519 public key: SHA-256 of the raw 32 key bytes.
#[must_use]
pub(crate) fn ed25519_kid(public: &ed25519_dalek::VerifyingKey) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(public.to_bytes()))
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_leading_zeros() {
        assert_eq!(trim_leading_zeros(&[0, 0, 1, 0, 2]), &[1, 0, 2]);
        assert_eq!(trim_leading_zeros(&[1, 2]), &[1, 2]);
        let empty: &[u8] = &[];
        assert_eq!(trim_leading_zeros(&[0, 0]), empty);
    }
}
