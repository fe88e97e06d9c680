//! Password hashing (bcrypt)

use crate::error::AppError;

// Unit tests hash many passwords; the minimum cost keeps them fast.
const COST: u32 = if cfg!(test) { 4 } else { bcrypt::DEFAULT_COST };

/// Hash a password with a fresh salt
pub fn hash_password(password: &str) -> Result<String, AppError> {
    bcrypt::hash(password, COST)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))
}

/// Check a password against a stored hash
///
/// A malformed stored hash never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}
