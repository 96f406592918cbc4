//! Error types for the leaguedex scraper
//!
//! This module defines the per-concern error types used throughout the application.

use thiserror::Error;

/// Errors that can occur while fetching the upstream script resources
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status code
    #[error("Unexpected status: {0}")]
    Status(u16),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Maximum retry attempts exceeded
    #[error("Maximum retry attempts exceeded (last status: {last_status:?})")]
    MaxRetriesExceeded { last_status: Option<u16> },

    /// Content decoding error
    #[error("Decoding error: {0}")]
    Decode(String),
}

/// Errors raised while extracting records from script payloads
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The literal could not be tokenized or parsed
    #[error("Malformed array literal at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: String },

    /// The literal parsed but does not have the expected tuple shape
    #[error("Unexpected shape in {context}: {reason}")]
    Shape { context: String, reason: String },

    /// Content was present but not a single region could be recovered
    #[error("No regions recovered from script payload; upstream layout may have changed")]
    NoRegions,

    /// A named assignment was not found in the script
    #[error("Assignment not found: {0}")]
    MissingAssignment(String),
}

impl ExtractionError {
    pub(crate) fn shape(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Shape {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by the persistent store
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// PostgreSQL error
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Could not borrow a pooled connection
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// A stored value could not be mapped back into a record
    #[error("Invalid stored value in {column}: {value}")]
    InvalidValue { column: &'static str, value: String },

    /// I/O error while preparing the store location
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<deadpool_postgres::PoolError> for PersistenceError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

/// Errors raised while writing spreadsheet exports
#[derive(Error, Debug)]
pub enum ExportError {
    /// Workbook writer error
    #[error("Workbook error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
