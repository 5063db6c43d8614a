//! Error types for the statement executor.
//!
//! Defines the main error enum used throughout the crate.

use thiserror::Error;

/// Main error type for executor operations.
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// Configuration errors (invalid config file, unknown dialect, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Statement boundary detection errors (unterminated strings, etc.)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Errors reported by the execution backend.
    #[error("Execution error: {0}")]
    Execution(String),

    /// An executable was asked to do something its lifecycle does not allow.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Internal errors (closed channels, unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExecutorError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a parse error with the given message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates an invalid state error with the given message.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "Configuration Error",
            Self::Parse(_) => "Parse Error",
            Self::Execution(_) => "Execution Error",
            Self::InvalidState(_) => "Invalid State",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using ExecutorError.
pub type Result<T> = std::result::Result<T, ExecutorError>;
