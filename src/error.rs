//! Error types for multilimiter.

use thiserror::Error;

/// Main error type for limiter operations.
#[derive(Error, Debug)]
pub enum LimiterError {
    /// Invalid construction parameters or configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller cancelled the wait before a token was available
    #[error("wait cancelled")]
    Cancelled,

    /// The caller's deadline passed (or would pass) before a token was available
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LimiterError {
    /// Whether this error came from the caller's cancellation signal.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, LimiterError::Cancelled | LimiterError::DeadlineExceeded)
    }
}

impl From<config::ConfigError> for LimiterError {
    fn from(err: config::ConfigError) -> Self {
        LimiterError::Config(err.to_string())
    }
}

/// Result type alias for limiter operations.
pub type Result<T> = std::result::Result<T, LimiterError>;
