//! Password hashing utilities

use bcrypt::{hash, verify};

/// Hash a password using bcrypt at the given cost (4 to 31)
pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    hash(password, cost)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password, hash)
}
