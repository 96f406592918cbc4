//! Unified error handling for the leaguedex crate
//!
//! This module provides a unified error type that consolidates all domain-specific
//! errors into a single `Error` enum, while maintaining the ability to use
//! domain-specific errors when needed.
//!
//! # Architecture
//!
//! - [`CatalogError`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! Fetch and extraction failures abort a run. Probe, persistence and export
//! failures are recovered where they happen and only surface as counts.

use thiserror::Error;

pub use crate::utils::error::{ExportError, ExtractionError, FetchError, PersistenceError};

/// Common trait for all leaguedex error types
pub trait CatalogError: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;

    /// Whether this error must abort the whole run
    fn is_fatal(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::Parsing | ErrorCategory::Config
        )
    }
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout, status)
    Network,
    /// Script extraction errors
    Parsing,
    /// Store errors
    Storage,
    /// Spreadsheet export errors
    Export,
    /// Configuration and validation errors
    Config,
}

impl ErrorCategory {
    /// Short human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Network => "network error",
            Self::Parsing => "extraction error",
            Self::Storage => "storage error",
            Self::Export => "export error",
            Self::Config => "configuration error",
        }
    }
}

impl CatalogError for FetchError {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout | Self::Http(_) | Self::MaxRetriesExceeded { .. } => true,
            Self::Status(code) => matches!(code, 429 | 500 | 502 | 503 | 504),
            Self::Decode(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Network
    }
}

impl CatalogError for ExtractionError {
    fn is_recoverable(&self) -> bool {
        false
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Parsing
    }
}

impl CatalogError for PersistenceError {
    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Pool(_))
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Storage
    }
}

impl CatalogError for ExportError {
    fn is_recoverable(&self) -> bool {
        false
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Export
    }
}

/// Unified error type for the leaguedex crate
#[derive(Error, Debug)]
pub enum Error {
    /// Upstream fetch errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Script extraction errors
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Store errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

impl CatalogError for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Extraction(e) => e.is_recoverable(),
            Self::Persistence(e) => e.is_recoverable(),
            Self::Config(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(_) => ErrorCategory::Network,
            Self::Extraction(_) => ErrorCategory::Parsing,
            Self::Persistence(_) => ErrorCategory::Storage,
            Self::Config(_) => ErrorCategory::Config,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category() {
        let fetch_err = Error::Fetch(FetchError::Timeout);
        assert_eq!(fetch_err.category(), ErrorCategory::Network);

        let parse_err = Error::Extraction(ExtractionError::NoRegions);
        assert_eq!(parse_err.category(), ErrorCategory::Parsing);
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::Fetch(FetchError::Status(404)).is_fatal());
        assert!(Error::Extraction(ExtractionError::NoRegions).is_fatal());

        let persist = Error::Persistence(PersistenceError::Pool("exhausted".into()));
        assert!(!persist.is_fatal());

        let export = ExportError::Io(std::io::Error::other("disk full"));
        assert!(!export.is_fatal());
        assert_eq!(export.category().label(), "export error");
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::Fetch(FetchError::Timeout).is_recoverable());
        assert!(Error::Fetch(FetchError::Status(503)).is_recoverable());
        assert!(!Error::Fetch(FetchError::Status(404)).is_recoverable());
        assert!(!Error::Extraction(ExtractionError::NoRegions).is_recoverable());
    }

    #[test]
    fn test_error_conversion() {
        let unified: Error = ExtractionError::MissingAssignment("arrSeason".into()).into();
        assert!(matches!(unified, Error::Extraction(_)));
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("missing areas_url");
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(!err.is_recoverable());
        assert_eq!(err.category().label(), "configuration error");
    }
}
