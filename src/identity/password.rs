//! Argon2id password hashing.
//!
//! Hashing is CPU-bound, so both helpers run on the blocking pool.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::GatewayError;

/// Hashes `password` into a PHC string with a fresh random salt.
///
/// # Errors
///
/// Returns [`GatewayError::Internal`] if hashing fails.
pub async fn hash_password(password: &str) -> Result<String, GatewayError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| GatewayError::Internal(format!("failed to hash password: {e}")))
    })
    .await
    .map_err(|e| GatewayError::Internal(e.to_string()))?
}

/// Returns `true` if `password` matches the stored PHC `hash`.
///
/// A malformed stored hash counts as a mismatch.
///
/// # Errors
///
/// Returns [`GatewayError::Internal`] if the blocking task panicked.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, GatewayError> {
    let password = password.to_owned();
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || {
        let Ok(parsed) = PasswordHash::new(&hash) else {
            tracing::warn!("stored password hash is malformed");
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
    .await
    .map_err(|e| GatewayError::Internal(e.to_string()))
}
