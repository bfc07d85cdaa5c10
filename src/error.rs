// src/error.rs

//! Unified error handling for the directory core.
//!
//! Only conditions a caller must act on are errors. A missing record or slug
//! is an `Option::None`, and a throttled refresh is a
//! [`RefreshOutcome`](crate::services::RefreshOutcome), never an `AppError`.

use std::fmt;

use thiserror::Error;

/// Result type alias for directory operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Backend is not configured or cannot be reached
    #[error("Backend unavailable ({backend}): {message}")]
    BackendUnavailable {
        backend: &'static str,
        message: String,
    },

    /// Backend answered with a non-success status
    #[error("Backend {backend} returned {status}: {message}")]
    Api {
        backend: &'static str,
        status: u16,
        message: String,
    },

    /// A single row or record could not be parsed
    #[error("Parse error at row {row}: {message}")]
    Parse { row: usize, message: String },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Startup initialization did not finish in time
    #[error("Timed out after {millis}ms: {context}")]
    Timeout { context: String, millis: u64 },
}

impl AppError {
    /// Create a backend-unavailable error.
    pub fn unavailable(backend: &'static str, message: impl fmt::Display) -> Self {
        Self::BackendUnavailable {
            backend,
            message: message.to_string(),
        }
    }

    /// Create a row parse error.
    pub fn parse(row: usize, message: impl fmt::Display) -> Self {
        Self::Parse {
            row,
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
