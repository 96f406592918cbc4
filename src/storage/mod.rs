//! Persistence for the catalog
//!
//! The relational store is the source of truth; the workbook exports are
//! projections of it.

pub mod postgres;
pub mod repository;
pub mod workbook;

pub use postgres::PostgresCatalogStore;
pub use repository::{CatalogStore, SqliteCatalogStore, StoreCounts};
pub use workbook::{Cell, Sheet, WorkbookWriter};

use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::utils::error::PersistenceError;

/// Open the configured store and make sure its schema exists
pub async fn open_store(config: &DatabaseConfig) -> Result<Box<dyn CatalogStore>, PersistenceError> {
    let store: Box<dyn CatalogStore> = match config.backend {
        DatabaseBackend::Sqlite => Box::new(SqliteCatalogStore::new(&config.sqlite_path)?),
        DatabaseBackend::Postgres => {
            tracing::info!(pool_size = config.pool_size, "Connecting to PostgreSQL");
            Box::new(PostgresCatalogStore::new(&config.postgres_url, config.pool_size)?)
        }
    };

    store.init_schema().await?;
    Ok(store)
}
