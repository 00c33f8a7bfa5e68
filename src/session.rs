//! Password hashing and cookie-session helpers.
//!
//! The session cookie carries only the logged-in user's id; everything else
//! is resolved per request by the `ClientCtx` middleware.

use actix_session::Session;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use once_cell::sync::Lazy;

const SESSION_USER_KEY: &str = "user_id";

static ARGON2: Lazy<Argon2<'static>> = Lazy::new(Argon2::default);

pub fn get_argon2() -> &'static Argon2<'static> {
    &ARGON2
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(get_argon2()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => get_argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// The logged-in user id, if the session has one.
pub fn session_user_id(session: &Session) -> Option<i32> {
    session.get::<i32>(SESSION_USER_KEY).ok().flatten()
}

pub fn log_in(session: &Session, user_id: i32) -> Result<(), actix_web::Error> {
    session
        .insert(SESSION_USER_KEY, user_id)
        .map_err(|_| actix_web::error::ErrorInternalServerError("Session error."))
}

pub fn log_out(session: &Session) {
    session.purge();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_roundtrip() {
        let hash = hash_password("hunter2hunter2").unwrap();
        assert!(verify_password(&hash, "hunter2hunter2"));
        assert!(!verify_password(&hash, "hunter3hunter3"));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("not-a-phc-string", "anything"));
    }
}
