//! Client error types

use reqwest::StatusCode;
use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed (connect, timeout, body)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Credential expired; a refresh may fix it
    #[error("Credential expired: {0}")]
    CredentialExpired(String),

    /// Authentication required
    #[error("Authentication required: {0}")]
    Unauthorized(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Server-side failure (5xx or unexpected status)
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// How the synchronizer should treat a failed remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Refresh the credential and retry once
    CredentialExpired,
    /// May succeed later (network, timeout, 5xx)
    Transient,
    /// Will fail again as-is (not found, validation, conflict)
    Permanent,
}

impl ClientError {
    /// Classify this error for retry handling
    pub fn classify(&self) -> ErrorClass {
        match self {
            Self::CredentialExpired(_) => ErrorClass::CredentialExpired,
            Self::Http(e) if e.is_decode() => ErrorClass::Permanent,
            Self::Http(_) => ErrorClass::Transient,
            Self::Server { status, .. } if *status >= 500 => ErrorClass::Transient,
            Self::Server { status, .. } if *status == StatusCode::REQUEST_TIMEOUT.as_u16() => {
                ErrorClass::Transient
            }
            _ => ErrorClass::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.classify() == ErrorClass::Transient
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
