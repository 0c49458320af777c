// ============================
// crates/backend-lib/src/auth/token_generator.rs
// ============================
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
/** Secure token generation for authentication
This module provides cryptographically secure opaque tokens
for refresh tokens and rotated session tokens. */
use rand::{rngs::OsRng, TryRngCore};

use crate::error::AppError;

/// Default token size in bytes (32 bytes = 256 bits of entropy)
pub const DEFAULT_TOKEN_BYTES: usize = 32;

/** Generate a cryptographically secure random token
# Returns
A base64 URL-safe encoded string without padding, or a dependency
error when the OS entropy source fails */
pub fn generate_secure_token() -> Result<String, AppError> {
    generate_secure_token_with_size(DEFAULT_TOKEN_BYTES)
}

/** Generate a cryptographically secure random token with specified size
# Arguments
* `bytes` - The size of the random token in bytes */
pub fn generate_secure_token_with_size(bytes: usize) -> Result<String, AppError> {
    Ok(URL_SAFE_NO_PAD.encode(random_bytes(bytes)?))
}

/// Fill a buffer from the OS entropy source
pub fn random_bytes(len: usize) -> Result<Vec<u8>, AppError> {
    let mut buffer = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut buffer)
        .map_err(|e| AppError::Dependency(format!("entropy source unavailable: {e}")))?;
    Ok(buffer)
}
