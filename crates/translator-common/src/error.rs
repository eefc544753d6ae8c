//! Error types for the translator
//!
//! This module defines the common error types used throughout the system.

use thiserror::Error;

/// Common result type for translator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the translator
#[derive(Debug, Error)]
pub enum Error {
    // Lookup source errors
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("lookup query failed: {0}")]
    Lookup(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("configuration source error: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    /// Create a lookup error
    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Check if this is a retryable error: the lookup source could not be
    /// reached, so the failure says nothing about the looked-up value
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_))
    }
}
