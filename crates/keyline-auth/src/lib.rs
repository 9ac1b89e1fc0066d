//! Authentication primitives for keyline.
//!
//! This crate provides:
//! - JWT encoding and decoding for per-tenant signing keys (RS256, EdDSA)
//! - Argon2id password hashing with OWASP-recommended parameters
//! - TOTP secret generation and verification
//! - Split session tokens with constant-time secret comparison

mod error;
mod jwt;
mod password;
mod split_token;
mod totp;

pub use error::AuthError;
pub use jwt::{
    decode_token, decode_unverified, encode_access_token, encode_token_with_kid, extract_kid,
    ValidationConfig, ACCESS_TOKEN_TYP,
};
pub use password::PasswordHasher;
pub use split_token::{hash_secret, verify_secret, SplitToken};
pub use totp::{
    generate_totp_secret, totp_for_secret, verify_totp_code, TOTP_DIGITS, TOTP_PERIOD, TOTP_SKEW,
};
