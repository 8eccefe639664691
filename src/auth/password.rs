/// Hash a plaintext password for storage.
pub fn hash_password(plaintext: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(plaintext, cost)
}

/// Verify plaintext against a stored hash - constant-time via bcrypt.
/// A malformed stored hash verifies as false.
pub fn verify_password(plaintext: &str, hash: &str) -> bool {
    bcrypt::verify(plaintext, hash).unwrap_or(false)
}

/// Check a login attempt. With no account, the password is still run
/// against `dummy_hash`, so an unknown email takes as long as a wrong password.
pub fn verify_login(plaintext: &str, stored_hash: Option<&str>, dummy_hash: &str) -> bool {
    match stored_hash {
        Some(hash) => verify_password(plaintext, hash),
        None => {
            let _ = verify_password(plaintext, dummy_hash);
            false
        }
    }
}
