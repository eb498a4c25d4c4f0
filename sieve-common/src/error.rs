//! Error types for the Sieve services.

use thiserror::Error;

/// Result type alias using the Sieve error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Sieve services.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input or request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Structural validation failed; carries every field-level problem so a
    /// caller can display all of them at once
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Numeric computation error (degenerate regression, domain error)
    #[error("Computation error: {0}")]
    Computation(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Check if this is a validation error.
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Field-level error messages, if any.
    pub fn field_errors(&self) -> &[String] {
        match self {
            Self::Validation(errors) => errors,
            _ => &[],
        }
    }

    /// Get HTTP status code for this error.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::InvalidInput(_) => 400,
            Self::Validation(_) => 422,
            _ => 500,
        }
    }
}
