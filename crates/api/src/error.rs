//! Error types for the catalog API crate.
//!
//! These never leave the executor: they are converted into synthesized
//! envelopes at the point the ladder observes them.

use thiserror::Error;

/// Result type alias for transport and configuration operations.
pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP client error (DNS, connect, timeout, reset, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint or redirect target that is not a usable URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::InvalidUrl(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
