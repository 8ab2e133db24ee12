//! Password hashing and strength policy using Argon2id.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::debug;

use super::error::{RbacError, RbacResult};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password into a salted PHC string.
///
/// # Errors
/// Returns an internal error only if the hashing library itself fails.
pub fn hash_password(password: &str) -> RbacResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| RbacError::internal(anyhow::anyhow!("password hashing failed: {e}")))
}

/// Verify a password against a stored PHC hash. Any failure is a mismatch.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(err) => {
            debug!("stored password hash is malformed: {err}");
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// At least [`MIN_PASSWORD_LENGTH`] characters with at least one letter and one digit.
///
/// Letters and digits are both judged over all of Unicode (`char::is_alphabetic`,
/// `char::is_numeric`), so `пароль٣٤` is as acceptable as `password34`.
#[must_use]
pub fn validate_password_strength(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
        && password.chars().any(char::is_alphabetic)
        && password.chars().any(char::is_numeric)
}

/// [`hash_password`] on the blocking pool, keeping request tasks responsive.
///
/// # Errors
/// Returns an internal error if hashing fails or the blocking task panics.
pub async fn hash_password_blocking(password: String) -> RbacResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(RbacError::internal)?
}

/// [`verify_password`] on the blocking pool; a panicked task counts as a mismatch.
pub async fn verify_password_blocking(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .unwrap_or(false)
}
