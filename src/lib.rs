//! leaguedex - Football region and competition catalog scraper
//!
//! Builds a catalog of regions and their leagues and cups from a sports site's
//! area script, checks that every competition's detail page is reachable, and
//! keeps a relational store and spreadsheet exports in sync with it.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`crawler`] - Script fetching, catalog building and URL probing
//! - [`parser`] - Array literal parsing and record extraction
//! - [`cache`] - Time-boxed cache for probe results
//! - [`reconcile`] - Diff-and-upsert synchronization with the store
//! - [`storage`] - Store backends (SQLite, PostgreSQL) and workbook export
//! - [`commands`] - The `areas` and `seasons` jobs
//! - [`models`] - Core data structures and types
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use leaguedex::commands::areas;
//! use leaguedex::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let summary = areas::run(&config).await?;
//!     summary.print();
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod commands;
pub mod config;
pub mod crawler;
pub mod error;
pub mod models;
pub mod parser;
pub mod reconcile;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::{Catalog, Crawler, UrlProber};
    pub use crate::error::{CatalogError, Error, ErrorCategory, Result};
    pub use crate::models::{Competition, CompetitionKind, Region, RegionBlock, Season};
    pub use crate::reconcile::{diff, ApplyResult, ChangeSet, Reconciler};
    pub use crate::storage::{CatalogStore, SqliteCatalogStore};
}

// Direct re-exports for convenience
pub use models::{Competition, CompetitionKind, Region, RegionBlock, Season};
