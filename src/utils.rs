use actix_session::Session;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::errors::AppError;

const FLASH_KEY: &str = "flash";

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

pub fn verify_password(
    provided: &str,
    stored_hash: &str,
) -> Result<bool, argon2::password_hash::Error> {
    let parsed = PasswordHash::new(stored_hash)?;
    Ok(Argon2::default()
        .verify_password(provided.as_bytes(), &parsed)
        .is_ok())
}

/// Queue a one-shot notification on the session. It survives until the next
/// call to [`take_flash`], which happens on the next rendered page.
pub fn push_flash(session: &Session, message: String) -> Result<(), AppError> {
    let mut queue = session
        .get::<Vec<String>>(FLASH_KEY)
        .map_err(|e| AppError::SessionError(e.to_string()))?
        .unwrap_or_default();
    queue.push(message);
    session
        .insert(FLASH_KEY, queue)
        .map_err(|e| AppError::SessionError(e.to_string()))
}

/// Drain all queued flash messages, clearing them from the session.
pub fn take_flash(session: &Session) -> Vec<String> {
    session
        .remove(FLASH_KEY)
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}
