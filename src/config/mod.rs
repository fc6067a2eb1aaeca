//! Configuration module for memo-sync.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;

use crate::errors::AppError;

/// Per-transaction operation ceiling of the backing store, inclusive.
pub const DEFAULT_TRANSACTION_LIMIT: usize = 499;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite file backing the document store
    pub db_path: PathBuf,
    /// Directory holding one `<id>.json` file per collection
    pub collections_dir: PathBuf,
    /// Repository-relative path segment that marks collection files in `git diff`
    pub collections_segment: String,
    /// Working directory for git commands
    pub repo_dir: PathBuf,
    /// Maximum read+write operations per store transaction
    pub transaction_limit: usize,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    /// Raw `{added, updated, removed}` JSON for the explicit-ids entry point
    pub updated_collections: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let db_path = env::var("MEMO_DB_PATH")
            .unwrap_or_else(|_| "./data/memo.sqlite".to_string())
            .into();

        let collections_dir = env::var("MEMO_COLLECTIONS_DIR")
            .unwrap_or_else(|_| "./collections".to_string())
            .into();

        let collections_segment =
            env::var("MEMO_COLLECTIONS_SEGMENT").unwrap_or_else(|_| "collections".to_string());

        let repo_dir = env::var("MEMO_REPO_DIR")
            .unwrap_or_else(|_| ".".to_string())
            .into();

        let transaction_limit = match env::var("MEMO_TRANSACTION_LIMIT") {
            Ok(raw) => parse_transaction_limit(&raw)?,
            Err(_) => DEFAULT_TRANSACTION_LIMIT,
        };

        let log_level = env::var("MEMO_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_format = match env::var("MEMO_LOG_FORMAT") {
            Ok(raw) => parse_log_format(&raw)?,
            Err(_) => LogFormat::Text,
        };

        let updated_collections = env::var("MEMO_UPDATED_COLLECTIONS").ok();

        Ok(Self {
            db_path,
            collections_dir,
            collections_segment,
            repo_dir,
            transaction_limit,
            log_level,
            log_format,
            updated_collections,
        })
    }
}

fn parse_transaction_limit(raw: &str) -> Result<usize, AppError> {
    match raw.trim().parse::<usize>() {
        Ok(limit) if limit > 0 => Ok(limit),
        _ => Err(AppError::Config(format!(
            "Invalid MEMO_TRANSACTION_LIMIT \"{}\": expected a positive integer",
            raw
        ))),
    }
}

fn parse_log_format(raw: &str) -> Result<LogFormat, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        _ => Err(AppError::Config(format!(
            "Invalid MEMO_LOG_FORMAT \"{}\": expected \"text\" or \"json\"",
            raw
        ))),
    }
}
