//! Argon2id hashing for stored user credentials.

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| argon2_failure("hash password", e))
}

/// `Ok(false)` on a wrong password; `Err` only when `stored` is not a usable PHC string.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| argon2_failure("parse stored hash", e))?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(argon2_failure("verify password", e)),
    }
}

fn argon2_failure(op: &str, e: password_hash::Error) -> anyhow::Error {
    error!(error = %e, op, "argon2 failure");
    anyhow::anyhow!("{}: {}", op, e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_hash_is_salted_argon2id() {
        let a = hash_password("cantonment-clerk").unwrap();
        let b = hash_password("cantonment-clerk").unwrap();
        assert!(a.starts_with("$argon2id$"));
        assert_ne!(a, b);
        assert!(!a.contains("cantonment-clerk"));
    }

    #[test]
    fn verify_accepts_only_the_original_password() {
        let hash = hash_password("Permit#2023").unwrap();
        assert!(verify_password("Permit#2023", &hash).unwrap());
        assert!(!verify_password("permit#2023", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn unreadable_stored_hash_is_an_error() {
        let err = verify_password("anything", "plaintext-in-db").unwrap_err();
        assert!(err.to_string().starts_with("parse stored hash"));
    }
}
