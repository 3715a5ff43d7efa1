//! Error types for Tailor CRM
//!
//! All errors use thiserror for structured error handling.
//! Every variant folds into one of three kinds (see [`ErrorKind`]) so callers
//! can decide whether to re-prompt, report a missing record, or surface a
//! backend failure.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Object store error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No active session, sign in first")]
    SessionRequired,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification used by the front end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed input, detected before any backend call
    Validation,
    /// The record no longer exists in the store
    NotFound,
    /// Anything the backend (or its transport) reported
    Remote,
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        AppError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) | AppError::Config(_) => ErrorKind::Validation,
            AppError::NotFound { .. } => ErrorKind::NotFound,
            _ => ErrorKind::Remote,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
