//! Error types for debounced.
//!
//! This module defines all error types used throughout the debounced crate.
//! Every failure is surfaced synchronously to the caller of the operation
//! that triggered it; there is no deferred error channel.

use thiserror::Error;

use crate::scheduler::SchedulerError;

/// The main error type for debounced operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Argument Errors ===
    /// An argument was rejected before any state changed.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the rejected argument.
        message: String,
    },

    // === Scheduling Errors ===
    /// The timer facility failed to arm a timer. The triggering call was
    /// rolled back.
    #[error("scheduling failed: {0}")]
    Scheduling(#[from] SchedulerError),

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// Reading input or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for debounced operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A caller-supplied argument was rejected.
    InvalidArgument,
    /// The timer facility could not arm a timer.
    Scheduling,
    /// Configuration could not be loaded or was invalid.
    Config,
    /// An I/O operation failed.
    Io,
    /// Serialization failed.
    Serialization,
    /// An internal invariant was broken.
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid_argument"),
            Self::Scheduling => write!(f, "scheduling"),
            Self::Config => write!(f, "config"),
            Self::Io => write!(f, "io"),
            Self::Serialization => write!(f, "serialization"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

impl Error {
    /// Create a new invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a new configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::Scheduling(_) => ErrorKind::Scheduling,
            Self::ConfigLoad(_) | Self::ConfigValidation { .. } => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
            Self::Json(_) => ErrorKind::Serialization,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Check if this error rejected an argument.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    /// Check if this error came from the timer facility.
    #[must_use]
    pub fn is_scheduling_error(&self) -> bool {
        matches!(self, Self::Scheduling(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_argument("delay must be non-negative");
        assert_eq!(
            err.to_string(),
            "invalid argument: delay must be non-negative"
        );

        let err = Error::internal("lost timer");
        assert_eq!(err.to_string(), "internal error: lost timer");
    }

    #[test]
    fn test_error_is_invalid_argument() {
        assert!(Error::invalid_argument("x").is_invalid_argument());
        assert!(!Error::internal("x").is_invalid_argument());
    }

    #[test]
    fn test_error_is_scheduling_error() {
        let err: Error = SchedulerError::Exhausted { limit: 4 }.into();
        assert!(err.is_scheduling_error());
        assert!(err.to_string().contains("4"));
        assert!(!Error::invalid_argument("x").is_scheduling_error());
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(
            Error::invalid_argument("x").kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            Error::from(SchedulerError::Exhausted { limit: 1 }).kind(),
            ErrorKind::Scheduling
        );
        assert_eq!(Error::config_validation("x").kind(), ErrorKind::Config);
        assert_eq!(Error::internal("x").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::InvalidArgument.to_string(), "invalid_argument");
        assert_eq!(ErrorKind::Scheduling.to_string(), "scheduling");
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::config_validation("delay_ms must be non-negative");
        assert!(err.to_string().contains("delay_ms"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: Error = io_err.into();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("pipe closed"));
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }
}
