//! Application error types.

use thiserror::Error;

/// Database-layer errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to connect to the database or connection lost
    #[error("Database connection error: {0}")]
    Connection(String),

    /// Requested row does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    /// Query failed for any other reason
    #[error("Database query error: {0}")]
    Query(String),

    /// Migration failure at startup
    #[error("Database migration error: {0}")]
    Migration(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound(err.to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                Self::Connection(err.to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::Duplicate(err.to_string())
            }
            _ => Self::Query(err.to_string()),
        }
    }
}

/// Errors from a resolved provider adapter call
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Provider could not be reached (network failure, connection refused)
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Provider call exceeded its timeout budget
    #[error("Provider call timed out: {0}")]
    Timeout(String),

    /// Provider answered with an error payload
    #[error("Provider API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Provider understood the request but declined it
    #[error("Provider declined the request: {0}")]
    Declined(String),

    /// Provider response could not be parsed into the expected shape
    #[error("Failed to parse provider response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}

/// Input validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    /// A single field failed validation
    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    /// A required field was absent or blank
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Free-form validation failure, possibly spanning several fields
    #[error("Validation failed: {0}")]
    Invalid(String),
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut parts: Vec<String> = errors
            .field_errors()
            .iter()
            .map(|(field, errs)| {
                let messages: Vec<String> = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                format!("{}: {}", field, messages.join(", "))
            })
            .collect();
        parts.sort();
        Self::Invalid(parts.join("; "))
    }
}

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No active registration / entity for the requested key
    #[error("Not found: {0}")]
    NotFound(String),

    /// Illegal state transition, including terminal mutation attempts and
    /// lost optimistic-concurrency races
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Missing or malformed actor identity
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Actor is known but the role does not permit the operation
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    /// Capability not implemented by the resolved provider
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Request rejected by the rate limiter
    #[error("Rate limit exceeded")]
    RateLimited,
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(DatabaseError::from(err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Provider(ProviderError::from(err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(ValidationError::from(errors))
    }
}
