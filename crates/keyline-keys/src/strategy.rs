//! Per-algorithm key generation, export and import.
//!
//! Each algorithm implements [`KeyStrategy`]; everything downstream (stores,
//! rotation, token signing) is algorithm-agnostic.

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey as _, EncodePrivateKey as _, EncodePublicKey as _, LineEnding};
use rsa::RsaPrivateKey;

use crate::algorithm::KeyAlgorithm;
use crate::error::KeysError;
use crate::pair::{ed25519_kid, rsa_kid, ExportedKeyPair, KeyPair, EXPIRE_AFTER, ROTATE_AFTER};

/// RSA modulus size in bits.
pub const RSA_KEY_BITS: usize = 2048;

/// Generation, export and import for one signing algorithm.
pub trait KeyStrategy: Send + Sync {
    /// The algorithm this strategy produces keys for.
    fn algorithm(&self) -> KeyAlgorithm;

    /// Generate a fresh pair with its lifecycle window anchored at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`KeysError::InvalidKeyMaterial`] if key generation fails.
    fn generate(&self, now: DateTime<Utc>) -> Result<KeyPair, KeysError>;

    /// Reconstruct a pair from its exported form. The public key and kid are
    /// rederived from the private key, so `import(export(k)) == k`.
    ///
    /// # Errors
    ///
    /// Returns [`KeysError::InvalidKeyMaterial`] if the private key PEM is
    /// unusable, [`KeysError::UnknownAlgorithm`] on an algorithm mismatch.
    fn import(&self, exported: &ExportedKeyPair) -> Result<KeyPair, KeysError>;

    /// Serializable snapshot of a pair.
    fn export(&self, pair: &KeyPair) -> ExportedKeyPair {
        ExportedKeyPair {
            algorithm: pair.algorithm,
            private_key: pair.private_key_pem.clone(),
            created_at: pair.created_at,
            rotates_at: pair.rotates_at,
            expires_at: pair.expires_at,
        }
    }
}

/// Look up the strategy for an algorithm.
#[must_use]
pub fn strategy_for(algorithm: KeyAlgorithm) -> &'static dyn KeyStrategy {
    match algorithm {
        KeyAlgorithm::EdDsa => &EdDsaStrategy,
        KeyAlgorithm::Rs256 => &Rs256Strategy,
    }
}

/// Ed25519 strategy.
pub struct EdDsaStrategy;

impl KeyStrategy for EdDsaStrategy {
    fn algorithm(&self) -> KeyAlgorithm {
        KeyAlgorithm::EdDsa
    }

    fn generate(&self, now: DateTime<Utc>) -> Result<KeyPair, KeysError> {
        let signing_key = ed25519_dalek::SigningKey::generate(&mut OsRng);
        pair_from_ed25519(&signing_key, now)
    }

    fn import(&self, exported: &ExportedKeyPair) -> Result<KeyPair, KeysError> {
        check_algorithm(exported, KeyAlgorithm::EdDsa)?;
        let signing_key = ed25519_dalek::SigningKey::from_pkcs8_pem(&exported.private_key)
            .map_err(|e| KeysError::InvalidKeyMaterial(format!("Ed25519 private key: {e}")))?;
        let mut pair = pair_from_ed25519(&signing_key, exported.created_at)?;
        pair.rotates_at = exported.rotates_at;
        pair.expires_at = exported.expires_at;
        Ok(pair)
    }
}

/// RSA 2048 strategy.
pub struct Rs256Strategy;

impl KeyStrategy for Rs256Strategy {
    fn algorithm(&self) -> KeyAlgorithm {
        KeyAlgorithm::Rs256
    }

    fn generate(&self, now: DateTime<Utc>) -> Result<KeyPair, KeysError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(|e| KeysError::InvalidKeyMaterial(format!("RSA generation: {e}")))?;
        pair_from_rsa(&private_key, now)
    }

    fn import(&self, exported: &ExportedKeyPair) -> Result<KeyPair, KeysError> {
        check_algorithm(exported, KeyAlgorithm::Rs256)?;
        let private_key = RsaPrivateKey::from_pkcs8_pem(&exported.private_key)
            .map_err(|e| KeysError::InvalidKeyMaterial(format!("RSA private key: {e}")))?;
        let mut pair = pair_from_rsa(&private_key, exported.created_at)?;
        pair.rotates_at = exported.rotates_at;
        pair.expires_at = exported.expires_at;
        Ok(pair)
    }
}

fn check_algorithm(exported: &ExportedKeyPair, expected: KeyAlgorithm) -> Result<(), KeysError> {
    if exported.algorithm == expected {
        Ok(())
    } else {
        Err(KeysError::UnknownAlgorithm(format!(
            "expected {expected}, found {}",
            exported.algorithm
        )))
    }
}

fn pair_from_ed25519(
    signing_key: &ed25519_dalek::SigningKey,
    created_at: DateTime<Utc>,
) -> Result<KeyPair, KeysError> {
    let verifying_key = signing_key.verifying_key();
    let private_key_pem = signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| KeysError::InvalidKeyMaterial(format!("Ed25519 PKCS#8: {e}")))?
        .to_string();
    let public_key_pem = verifying_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| KeysError::InvalidKeyMaterial(format!("Ed25519 SPKI: {e}")))?;

    Ok(KeyPair {
        algorithm: KeyAlgorithm::EdDsa,
        kid: ed25519_kid(&verifying_key),
        private_key_pem,
        public_key_pem,
        created_at,
        rotates_at: created_at + ROTATE_AFTER,
        expires_at: created_at + EXPIRE_AFTER,
    })
}

fn pair_from_rsa(
    private_key: &RsaPrivateKey,
    created_at: DateTime<Utc>,
) -> Result<KeyPair, KeysError> {
    let public_key = private_key.to_public_key();
    let private_key_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| KeysError::InvalidKeyMaterial(format!("RSA PKCS#8: {e}")))?
        .to_string();
    let public_key_pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| KeysError::InvalidKeyMaterial(format!("RSA SPKI: {e}")))?;

    Ok(KeyPair {
        algorithm: KeyAlgorithm::Rs256,
        kid: rsa_kid(&public_key),
        private_key_pem,
        public_key_pem,
        created_at,
        rotates_at: created_at + ROTATE_AFTER,
        expires_at: created_at + EXPIRE_AFTER,
    })
}
