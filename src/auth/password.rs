//! Password hashing and verification using bcrypt

use crate::core::error::{Result, WardenError};

/// bcrypt silently truncates input past this many bytes
pub const MAX_PASSWORD_BYTES: usize = 72;

/// bcrypt wrapper with a fixed work factor
#[derive(Debug, Clone, Copy)]
pub struct CredentialHasher {
    cost: u32,
}

impl CredentialHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a password using bcrypt
    ///
    /// Passwords longer than [`MAX_PASSWORD_BYTES`] are refused rather than
    /// truncated.
    pub fn hash(&self, password: &str) -> Result<String> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(WardenError::HashError(format!(
                "Password exceeds {} bytes",
                MAX_PASSWORD_BYTES
            )));
        }

        bcrypt::hash(password, self.cost)
            .map_err(|e| WardenError::HashError(format!("Failed to hash password: {}", e)))
    }

    /// Verify a password against a hash.
    ///
    /// A mismatch is `Ok(false)`; only a malformed digest is an error. No
    /// stored digest covers more than [`MAX_PASSWORD_BYTES`], so longer input
    /// never matches.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Ok(false);
        }

        bcrypt::verify(password, hash)
            .map_err(|e| WardenError::HashError(format!("Failed to verify password: {}", e)))
    }

    /// Run `hash` on the blocking pool
    pub async fn hash_blocking(&self, password: String) -> Result<String> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| WardenError::TaskError(format!("Hash task panicked: {}", e)))?
    }

    /// Run `verify` on the blocking pool
    pub async fn verify_blocking(&self, password: String, hash: String) -> Result<bool> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| WardenError::TaskError(format!("Verify task panicked: {}", e)))?
    }
}
