//! Error handling module for memo-sync.
//!
//! Every failure is surfaced unchanged to the caller, tagged with a stable error code.

use std::path::PathBuf;

use thiserror::Error;

/// Error codes as constants to avoid stringly-typed errors.
#[allow(dead_code)]
pub mod codes {
    pub const FILESYSTEM_ERROR: &str = "FILESYSTEM_ERROR";
    pub const SHELL_ERROR: &str = "SHELL_ERROR";
    pub const STORE_ERROR: &str = "STORE_ERROR";
    pub const SERIALIZATION_ERROR: &str = "SERIALIZATION_ERROR";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";
    pub const TRANSACTION_LIMIT: &str = "TRANSACTION_LIMIT";
    pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
    pub const OTHER_ERROR: &str = "OTHER_ERROR";
}

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Reading from the local filesystem failed
    #[error("{message} ({path}): {source}")]
    Filesystem {
        message: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A shell command could not run or reported a failure
    #[error("failed to run `{command}`: {detail}")]
    Shell { command: String, detail: String },

    /// The document store rejected an operation
    #[error("{message}: {source}")]
    Store {
        message: String,
        #[source]
        source: sqlx::Error,
    },

    /// A raw document does not conform to its schema
    #[error("failed to serialize schema {schema} with {} errors: {}", .details.len(), .details.join(", "))]
    Serialization {
        schema: String,
        details: Vec<String>,
    },

    /// A typed entity broke one of its invariants
    #[error("{0}")]
    Validation(String),

    /// Document not found
    #[error("{0}")]
    NotFound(String),

    /// Document already exists
    #[error("{0}")]
    AlreadyExists(String),

    /// A transaction issued more operations than the store allows
    #[error("transaction exceeded the limit of {limit} operations")]
    TransactionLimit { limit: usize },

    /// Invalid configuration
    #[error("{0}")]
    Config(String),

    /// Anything raised by an upstream library that fits no other kind
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Filesystem { .. } => codes::FILESYSTEM_ERROR,
            AppError::Shell { .. } => codes::SHELL_ERROR,
            AppError::Store { .. } => codes::STORE_ERROR,
            AppError::Serialization { .. } => codes::SERIALIZATION_ERROR,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::AlreadyExists(_) => codes::ALREADY_EXISTS,
            AppError::TransactionLimit { .. } => codes::TRANSACTION_LIMIT,
            AppError::Config(_) => codes::CONFIG_ERROR,
            AppError::Other(_) => codes::OTHER_ERROR,
        }
    }

    /// Wrap a store failure with a description of the attempted operation.
    pub fn store(message: impl Into<String>, source: sqlx::Error) -> Self {
        let message = message.into();
        tracing::error!("Store error: {}: {:?}", message, source);
        AppError::Store { message, source }
    }

    /// Wrap a filesystem failure with the path that was accessed.
    pub fn filesystem(message: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Filesystem {
            message: message.into(),
            path: path.into(),
            source,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::store("Database error", err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::Serialization {
            schema: "json".to_string(),
            details: vec![err.to_string()],
        }
    }
}
