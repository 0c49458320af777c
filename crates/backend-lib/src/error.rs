// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use gameauth_common::{ErrorBody, ErrorDetail};
use thiserror::Error;
use uuid::Uuid;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Authentication error: {0}")]
    Unauthorized(String),

    #[error("Refresh token reuse detected for account {account_id}")]
    TokenReuse { account_id: Uuid },

    #[error("No active session")]
    NoActiveSession,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Locked out for {retry_after:?}")]
    LockedOut { retry_after: Duration },

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Dependency failure: {0}")]
    Dependency(String),

    #[error("Store timeout during {0}")]
    StoreTimeout(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::InvalidCredentials
            | AppError::NoActiveSession
            | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) | AppError::TokenReuse { .. } | AppError::NotFound(_) => {
                StatusCode::UNAUTHORIZED
            },
            AppError::LockedOut { .. } | AppError::RateLimitExceeded => {
                StatusCode::TOO_MANY_REQUESTS
            },
            AppError::StoreTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Dependency(_) | AppError::Io(_) | AppError::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    /// Get the error code for this error
    ///
    /// Token, session and lookup failures share one code so callers cannot
    /// tell which check rejected them.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VAL_001",
            AppError::Conflict(_) => "VAL_002",
            AppError::InvalidCredentials => "AUTH_001",
            AppError::Unauthorized(_) | AppError::TokenReuse { .. } | AppError::NotFound(_) => {
                "AUTH_002"
            },
            AppError::LockedOut { .. } => "AUTH_003",
            AppError::NoActiveSession => "SESSION_001",
            AppError::RateLimitExceeded => "RATE_001",
            AppError::StoreTimeout(_) => "DEP_002",
            AppError::Dependency(_) | AppError::Io(_) | AppError::Json(_) => "DEP_001",
        }
    }

    /// Get a sanitized message suitable for returning to a client
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::Conflict(_) => "An account with this email or username already exists".to_string(),
            AppError::InvalidCredentials => "Invalid credentials".to_string(),
            AppError::Unauthorized(_) | AppError::TokenReuse { .. } | AppError::NotFound(_) => {
                "Authentication failed".to_string()
            },
            AppError::LockedOut { retry_after } => format!(
                "Too many failed attempts, try again in {} seconds",
                retry_after.as_secs().max(1)
            ),
            AppError::NoActiveSession => "No active session found".to_string(),
            AppError::RateLimitExceeded => "Rate limit exceeded, please try again later".to_string(),
            AppError::StoreTimeout(_) => "Service temporarily unavailable".to_string(),
            AppError::Dependency(_) | AppError::Io(_) | AppError::Json(_) => {
                "Authentication failed".to_string()
            },
        }
    }

    /// Whether the failure came from infrastructure rather than the caller
    pub fn is_dependency(&self) -> bool {
        matches!(
            self,
            AppError::Dependency(_) | AppError::StoreTimeout(_) | AppError::Io(_) | AppError::Json(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if self.is_dependency() {
            tracing::error!(error = %self, "request failed on a dependency");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.sanitized_message(),
            },
        };

        let mut response = (status, axum::Json(body)).into_response();
        if let AppError::LockedOut { retry_after } = &self {
            let secs = retry_after.as_secs().max(1).to_string();
            if let Ok(value) = HeaderValue::from_str(&secs) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Dependency(format!("background task failed: {err}"))
    }
}
