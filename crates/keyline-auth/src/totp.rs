//! Time-based one-time passwords.
//!
//! Secrets are base32-encoded random bytes. Verification uses SHA1 with
//! 6 digits, a 30 second period and a skew of one step on either side,
//! matching what authenticator apps default to.

use crate::error::AuthError;
use data_encoding::BASE32;
use rand::RngCore;
use totp_rs::{Algorithm, TOTP};

/// TOTP secret length in bytes (256 bits).
const TOTP_SECRET_LENGTH: usize = 32;

/// Default number of code digits.
pub const TOTP_DIGITS: usize = 6;

/// Default step length in seconds.
pub const TOTP_PERIOD: u64 = 30;

/// Default accepted skew in steps.
pub const TOTP_SKEW: u8 = 1;

/// Generate a fresh base32-encoded TOTP secret.
#[must_use]
pub fn generate_totp_secret() -> String {
    let mut secret = [0u8; TOTP_SECRET_LENGTH];
    rand::thread_rng().fill_bytes(&mut secret);
    BASE32.encode(&secret)
}

/// Build a TOTP instance for a base32 secret.
///
/// # Errors
///
/// Returns [`AuthError::InvalidTotpSecret`] if the secret cannot be decoded
/// or is too short.
pub fn totp_for_secret(
    secret_base32: &str,
    digits: usize,
    period: u64,
    account_name: &str,
) -> Result<TOTP, AuthError> {
    let secret = BASE32
        .decode(secret_base32.as_bytes())
        .map_err(|e| AuthError::InvalidTotpSecret(format!("base32 decode failed: {e}")))?;

    TOTP::new(
        Algorithm::SHA1,
        digits,
        TOTP_SKEW,
        period,
        secret,
        None,
        account_name.to_string(),
    )
    .map_err(|e| AuthError::InvalidTotpSecret(e.to_string()))
}

/// Verify a submitted code against a base32 secret at the current time.
///
/// # Errors
///
/// Returns [`AuthError::InvalidTotpSecret`] if the secret is unusable.
pub fn verify_totp_code(
    secret_base32: &str,
    code: &str,
    digits: usize,
    period: u64,
) -> Result<bool, AuthError> {
    let totp = totp_for_secret(secret_base32, digits, period, "")?;
    totp.check_current(code)
        .map_err(|e| AuthError::InvalidTotpSecret(format!("system time error: {e}")))
}
