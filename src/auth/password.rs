use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;

static PLACEHOLDER_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("placeholder-password").ok());

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?
        .to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash).map_err(|err| anyhow!(err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Runs one verification against a fixed hash so that a login for an unknown
/// email costs as much as a wrong password.
pub fn verify_placeholder(password: &str) -> bool {
    PLACEHOLDER_HASH
        .as_deref()
        .map(|hash| verify_password(password, hash).unwrap_or(false))
        .unwrap_or(false)
}
