// src/error.rs

//! Unified error handling for the monitoring workflow.

use std::fmt;

use thiserror::Error;

/// Result type alias for monitoring operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// The listing source could not deliver results
    #[error("Source fetch failed for {context}: {message}")]
    SourceFetch { context: String, message: String },

    /// A snapshot could not be written or read back
    #[error("Persistence error for {context}: {message}")]
    Persistence { context: String, message: String },

    /// A notification could not be delivered
    #[error("Notification error: {0}")]
    Notification(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization/deserialization failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Coarse classification used by the run loop to route failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SourceFetch,
    Persistence,
    Notification,
    Config,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::SourceFetch => "source fetch",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Notification => "notification",
            ErrorKind::Config => "configuration",
            ErrorKind::Other => "internal",
        };
        f.write_str(name)
    }
}

impl AppError {
    /// Create a source fetch error with context.
    pub fn source_fetch(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::SourceFetch {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a persistence error with context.
    pub fn persistence(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Persistence {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a notification error.
    pub fn notification(message: impl fmt::Display) -> Self {
        Self::Notification(message.to_string())
    }

    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
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

    /// Classify the error for routing.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::SourceFetch { .. } => ErrorKind::SourceFetch,
            AppError::Persistence { .. } | AppError::Io(_) | AppError::Csv(_) => {
                ErrorKind::Persistence
            }
            AppError::Notification(_) => ErrorKind::Notification,
            AppError::Toml(_)
            | AppError::TomlSerialize(_)
            | AppError::Selector { .. }
            | AppError::Config(_)
            | AppError::Validation(_) => ErrorKind::Config,
            AppError::Url(_) => ErrorKind::Other,
        }
    }
}
