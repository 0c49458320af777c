// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Input validation for account identifiers.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use crate::error::AppError;

const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 50;
const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit

#[allow(clippy::expect_used)]
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("static email pattern")
});
#[allow(clippy::expect_used)]
static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("static username pattern"));

/// Possible validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid login: {0}")]
    InvalidLogin(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate an email address
pub fn validate_email(email: &str) -> ValidationResult<()> {
    if email.is_empty() {
        return Err(ValidationError::InvalidEmail("Email cannot be empty".to_string()));
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail(format!(
            "Email must be at most {} characters",
            MAX_EMAIL_LENGTH
        )));
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail("Invalid email format".to_string()));
    }
    Ok(())
}

/// Validate a username
pub fn validate_username(username: &str) -> ValidationResult<()> {
    let len = username.chars().count();
    if !(MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&len) {
        return Err(ValidationError::InvalidUsername(format!(
            "Username must be between {} and {} characters",
            MIN_USERNAME_LENGTH, MAX_USERNAME_LENGTH
        )));
    }
    if !USERNAME_REGEX.is_match(username) {
        return Err(ValidationError::InvalidUsername(
            "Username may only contain letters, digits, '.', '_' and '-'".to_string(),
        ));
    }
    Ok(())
}

/// Check login input shape before any lookup happens.
///
/// The login identifier may be an email or a username.
pub fn validate_login_input(login: &str, password: &str) -> ValidationResult<()> {
    if login.trim().is_empty() {
        return Err(ValidationError::InvalidLogin("Login is required".to_string()));
    }
    if login.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidLogin("Login is too long".to_string()));
    }
    if password.is_empty() {
        return Err(ValidationError::InvalidPassword("Password is required".to_string()));
    }
    Ok(())
}

/// Case-folded form used for uniqueness checks and guard keys
pub fn normalize_identifier(value: &str) -> String {
    value.trim().to_lowercase()
}
