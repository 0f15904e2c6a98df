//! Library error types

use thiserror::Error;

/// Library-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("discovery error: {0}")]
    Discovery(String),

    #[error("probe timing error: {0}")]
    Timing(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("solver error: {0}")]
    Solver(String),

    #[error("invalid k: {0}")]
    InvalidK(String),

    #[error("bind error: {0}")]
    Bind(String),
}

/// Result type for library operations
pub type Result<T> = std::result::Result<T, AppError>;
