//! Password hashing.

use sha2::{Digest, Sha256};

/// Hash a password with the deployment salt as lowercase hex SHA-256.
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}
