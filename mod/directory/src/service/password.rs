//! Password hashing and verification using argon2id.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use esurat_core::ServiceError;

/// Hash a password with argon2id and a fresh random salt.
///
/// Returns the PHC-formatted hash string (salt and parameters included).
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::Internal(format!("failed to hash password: {}", e)))
}

/// Verify a password against a stored PHC hash. An unparseable hash
/// counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("rahasia-123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("rahasia-123", &hash));
        assert!(!verify_password("salah", &hash));
    }

    #[test]
    fn test_different_salts() {
        let h1 = hash_password("same").unwrap();
        let h2 = hash_password("same").unwrap();
        assert_ne!(h1, h2);
        assert!(verify_password("same", &h1));
        assert!(verify_password("same", &h2));
    }

    #[test]
    fn test_invalid_hash_is_mismatch() {
        assert!(!verify_password("anything", "not-a-hash"));
    }
}
