//! Account credential hashing (argon2, PHC string format)

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Hash a plaintext credential for storage
pub fn hash_credential(credential: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(credential.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("credential hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

/// Verify a plaintext credential against a stored hash.
///
/// A malformed stored hash verifies as false rather than erroring; the
/// caller only needs a yes/no.
pub fn verify_credential(credential: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(credential.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let hash = hash_credential("s3cret-pin").expect("should hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_credential("s3cret-pin", &hash));
    }

    #[test]
    fn test_wrong_credential_rejected() {
        let hash = hash_credential("s3cret-pin").expect("should hash");
        assert!(!verify_credential("wrong-pin", &hash));
    }

    #[test]
    fn test_garbage_hash_rejected() {
        assert!(!verify_credential("anything", "not-a-phc-string"));
        assert!(!verify_credential("anything", ""));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_credential("same-pin").unwrap();
        let b = hash_credential("same-pin").unwrap();
        assert_ne!(a, b, "same input must not produce the same hash");
    }
}
