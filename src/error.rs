//! Error handling for plsl-rs
//!
//! This module defines the crate error type, the acquisition error kinds
//! returned by frame parsers, and a Result alias used throughout.

use thiserror::Error;

/// Main error type for plsl-rs operations
#[derive(Error, Debug)]
pub enum PlslError {
    /// Invalid or unusable configuration (empty replay source, zero rate, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// No streams could be resolved on the bus
    #[error("No stream available on the bus")]
    StreamUnavailable,

    /// A malformed inbound frame from an acquisition front-end
    #[error("Acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    /// Errors related to bus channel communication
    #[error("Bus error: {0}")]
    Bus(String),

    /// Errors decoding a recorded source file
    #[error("Decode error: {0}")]
    Decode(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PlslError>,
    },
}

impl PlslError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PlslError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error should abort the process rather than be skipped
    pub fn is_fatal(&self) -> bool {
        match self {
            PlslError::Acquisition(_) => false,
            PlslError::WithContext { source, .. } => source.is_fatal(),
            _ => true,
        }
    }
}

impl From<hound::Error> for PlslError {
    fn from(err: hound::Error) -> Self {
        PlslError::Decode(err.to_string())
    }
}

/// Why an inbound acquisition frame was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    #[error("empty frame")]
    Empty,

    #[error("frame is not valid UTF-8")]
    Utf8,

    #[error("unparsable field {field:?}")]
    Parse { field: String },

    #[error("wrong channel arity: expected {expected}, got {actual}")]
    Arity { expected: usize, actual: usize },
}

/// Result type alias for plsl-rs operations
pub type Result<T> = std::result::Result<T, PlslError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlslError::Config("replay source is empty".to_string());
        assert_eq!(err.to_string(), "Configuration error: replay source is empty");
    }

    #[test]
    fn test_error_with_context() {
        let err = PlslError::Bus("inlet closed".to_string());
        let with_ctx = err.with_context("Failed to drain stream");
        assert!(with_ctx.to_string().contains("Failed to drain stream"));
        assert!(with_ctx.to_string().contains("inlet closed"));
    }

    #[test]
    fn test_arity_error() {
        let err = PlslError::from(AcquisitionError::Arity {
            expected: 6,
            actual: 4,
        });
        assert!(err.to_string().contains("expected 6, got 4"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_fatality_follows_context() {
        let err = PlslError::StreamUnavailable.with_context("startup");
        assert!(err.is_fatal());

        let err = PlslError::from(AcquisitionError::Empty).with_context("serial");
        assert!(!err.is_fatal());
    }
}
