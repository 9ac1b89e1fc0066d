//! Tenant signing-key lifecycle for keyline.
//!
//! Each virtual server owns its signing keys, one lineage per algorithm.
//! A pair signs new tokens for 20 days, keeps verifying existing tokens for
//! 30, and is deleted afterwards. [`KeyService`] fronts a pluggable
//! [`KeyStore`] with a current-key cache; [`KeyService::rotate_virtual_server`]
//! drives the lifecycle.

mod algorithm;
mod cache;
mod error;
mod pair;
mod service;
mod store;
mod strategy;

pub use algorithm::KeyAlgorithm;
pub use cache::KeyCache;
pub use error::KeysError;
pub use pair::{ExportedKeyPair, Jwk, KeyPair, EXPIRE_AFTER, ROTATE_AFTER};
pub use service::KeyService;
pub use store::{DirectoryKeyStore, KeyStore, MemoryKeyStore};
pub use strategy::{strategy_for, EdDsaStrategy, KeyStrategy, Rs256Strategy, RSA_KEY_BITS};
