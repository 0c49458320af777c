// ============================
// crates/backend-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
//!
//! New hashes are Argon2id PHC strings. The cost parameters travel inside
//! the encoded string, so verification never depends on current settings.
//! Hashes written by earlier deployments with scrypt still verify and are
//! flagged for upgrade.
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, SaltString},
    Algorithm, Argon2, Params, Version,
};
use scrypt::{password_hash::PasswordVerifier, Scrypt};
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroize;

use crate::auth::token_generator::random_bytes;
use crate::config::{HashingSettings, PasswordSettings};
use crate::error::AppError;
use crate::validation::ValidationError;

const SCRYPT_TAG: &str = "scrypt";

/// Failures that are not a plain mismatch
#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("malformed password hash: {0}")]
    MalformedHash(String),

    #[error("could not decode salt or digest: {0}")]
    Decode(String),

    #[error("unsupported password hash algorithm `{0}`")]
    UnsupportedAlgorithm(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Dependency(err.to_string())
    }
}

/// Outcome of a successful parse-and-compare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub matches: bool,
    /// The stored hash uses a legacy algorithm or weaker parameters
    pub needs_rehash: bool,
}

/// Password complexity requirements
#[derive(Debug, Clone)]
pub struct PasswordRequirements {
    pub min_length: usize,
    pub max_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordRequirements {
    fn default() -> Self {
        Self::from(&PasswordSettings::default())
    }
}

impl From<&PasswordSettings> for PasswordRequirements {
    fn from(settings: &PasswordSettings) -> Self {
        Self {
            min_length: settings.min_length,
            max_length: settings.max_length,
            require_uppercase: settings.require_uppercase,
            require_lowercase: settings.require_lowercase,
            require_digit: settings.require_digit,
            require_special: settings.require_special,
        }
    }
}

impl PasswordRequirements {
    /// Check a candidate password, listing every rule it breaks
    pub fn check(&self, password: &str) -> Result<(), ValidationError> {
        let mut failures = Vec::new();
        let len = password.chars().count();

        if len < self.min_length {
            failures.push(format!("at least {} characters", self.min_length));
        }
        if len > self.max_length {
            failures.push(format!("at most {} characters", self.max_length));
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            failures.push("an uppercase letter".to_string());
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            failures.push("a lowercase letter".to_string());
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            failures.push("a digit".to_string());
        }
        if self.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
            failures.push("a special character".to_string());
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::InvalidPassword(format!(
                "Password must contain {}",
                failures.join(", ")
            )))
        }
    }
}

/// Check if a password meets the complexity requirements
pub fn validate_password_strength(password: &str, requirements: &PasswordRequirements) -> bool {
    requirements.check(password).is_ok()
}

/// Argon2id hasher configured from [`HashingSettings`]
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    params: Params,
    salt_len: usize,
}

impl CredentialHasher {
    pub fn new(settings: &HashingSettings) -> Result<Self, PasswordError> {
        let params = Params::new(
            settings.memory_kib,
            settings.time_cost,
            settings.parallelism,
            Some(settings.output_len),
        )
        .map_err(|e| PasswordError::Hashing(e.to_string()))?;
        Ok(Self { params, salt_len: settings.salt_len })
    }

    fn argon2(&self, params: Params) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    }

    /// Hash a password with a fresh random salt
    pub fn hash(&self, plain: &str) -> Result<String, PasswordError> {
        let salt_bytes = random_bytes(self.salt_len)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?;
        let hash = self
            .argon2(self.params.clone())
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    /// Hash a password and zeroize the original
    pub fn hash_secure(&self, plain: &mut String) -> Result<String, PasswordError> {
        let result = self.hash(plain);
        plain.zeroize();
        result
    }

    /// Verify a password against a stored hash
    ///
    /// `Ok(Verification { matches: false, .. })` is a mismatch; `Err` means the
    /// stored hash itself could not be used.
    pub fn verify(&self, plain: &str, encoded: &str) -> Result<Verification, PasswordError> {
        let parsed =
            PasswordHash::new(encoded).map_err(|e| PasswordError::MalformedHash(e.to_string()))?;

        match parsed.algorithm.as_str() {
            SCRYPT_TAG => {
                let matches = Scrypt.verify_password(plain.as_bytes(), &parsed).is_ok();
                Ok(Verification { matches, needs_rehash: matches })
            },
            tag if tag.starts_with("argon2") => self.verify_argon2(plain, &parsed),
            other => Err(PasswordError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    fn verify_argon2(
        &self,
        plain: &str,
        parsed: &PasswordHash<'_>,
    ) -> Result<Verification, PasswordError> {
        let algorithm = Algorithm::try_from(parsed.algorithm)
            .map_err(|_| PasswordError::UnsupportedAlgorithm(parsed.algorithm.to_string()))?;
        let version = match parsed.version {
            Some(v) => Version::try_from(v).map_err(|e| PasswordError::MalformedHash(e.to_string()))?,
            None => Version::V0x13,
        };
        let params =
            Params::try_from(parsed).map_err(|e| PasswordError::MalformedHash(e.to_string()))?;

        let salt = parsed
            .salt
            .ok_or_else(|| PasswordError::MalformedHash("missing salt".to_string()))?;
        let mut salt_buf = [0u8; 64];
        let salt_bytes =
            salt.decode_b64(&mut salt_buf).map_err(|e| PasswordError::Decode(e.to_string()))?;
        let expected = parsed
            .hash
            .ok_or_else(|| PasswordError::MalformedHash("missing digest".to_string()))?;

        let mut computed = vec![0u8; expected.len()];
        Argon2::new(algorithm, version, params.clone())
            .hash_password_into(plain.as_bytes(), salt_bytes, &mut computed)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?;

        let matches: bool = computed.as_slice().ct_eq(expected.as_bytes()).into();
        computed.zeroize();

        let needs_rehash = matches && self.is_weaker(algorithm, version, &params);
        Ok(Verification { matches, needs_rehash })
    }

    fn is_weaker(&self, algorithm: Algorithm, version: Version, params: &Params) -> bool {
        algorithm != Algorithm::Argon2id
            || version != Version::V0x13
            || params.m_cost() < self.params.m_cost()
            || params.t_cost() < self.params.t_cost()
            || params.p_cost() < self.params.p_cost()
    }
}
