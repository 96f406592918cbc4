//! Repository Pattern for the catalog store
//!
//! The reconciler talks to the store only through [`CatalogStore`], so the
//! SQLite and PostgreSQL backends are interchangeable.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                Reconciler / Orchestrator                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CatalogStore trait                      │
//! └─────────────────────────────────────────────────────────────┘
//!                   │                         │
//!                   ▼                         ▼
//!         ┌─────────────────┐       ┌─────────────────┐
//!         │     SQLite      │       │   PostgreSQL    │
//!         │  Implementation │       │ Implementation  │
//!         └─────────────────┘       └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use leaguedex::storage::{CatalogStore, SqliteCatalogStore};
//!
//! let store = SqliteCatalogStore::new("data/leaguedex.db")?;
//! store.upsert_region(&region).await?;
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, Row};

use crate::models::{Competition, CompetitionKind, Region, RegionCompetition};
use crate::utils::error::PersistenceError;

// ============================================================================
// Core Types
// ============================================================================

/// Row counts of the two catalog tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub areas: u64,
    pub events: u64,
}

impl StoreCounts {
    /// Whether the store holds a usable catalog (both tables populated)
    pub fn has_data(&self) -> bool {
        self.areas > 0 && self.events > 0
    }
}

// ============================================================================
// Repository Trait
// ============================================================================

/// Persistent store of regions and competitions
///
/// Every call borrows a connection for its own duration only.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Create tables if they do not exist
    async fn init_schema(&self) -> Result<(), PersistenceError>;

    /// All regions ordered by level
    async fn load_regions(&self) -> Result<Vec<Region>, PersistenceError>;

    /// All competitions ordered by id
    async fn load_competitions(&self) -> Result<Vec<Competition>, PersistenceError>;

    /// Levels of all persisted regions
    async fn region_levels(&self) -> Result<HashSet<u32>, PersistenceError>;

    /// Insert a region or update the one with the same level
    async fn upsert_region(&self, region: &Region) -> Result<(), PersistenceError>;

    /// Insert a competition or update the one with the same id
    async fn upsert_competition(&self, competition: &Competition) -> Result<(), PersistenceError>;

    /// Row counts of both tables
    async fn counts(&self) -> Result<StoreCounts, PersistenceError>;

    /// Competitions joined with their region, ordered by level then id
    async fn competitions_by_region(&self) -> Result<Vec<RegionCompetition>, PersistenceError>;
}

pub(crate) fn url_status(valid: bool) -> i32 {
    i32::from(valid)
}

pub(crate) fn parse_kind(value: String) -> Result<CompetitionKind, PersistenceError> {
    value.parse().map_err(|_| PersistenceError::InvalidValue {
        column: "event_type",
        value,
    })
}

pub(crate) fn parse_url_status(value: i32) -> Result<bool, PersistenceError> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(PersistenceError::InvalidValue {
            column: "url_status",
            value: other.to_string(),
        }),
    }
}

// ============================================================================
// SQLite Implementation
// ============================================================================

const SQLITE_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS areas (
        name_zh TEXT NOT NULL CHECK (length(name_zh) > 0),
        name_zht TEXT NOT NULL,
        name_en TEXT NOT NULL,
        level INTEGER PRIMARY KEY CHECK (level >= 0),
        last_modified TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS events (
        event_id INTEGER PRIMARY KEY,
        levelid INTEGER NOT NULL REFERENCES areas(level),
        name_zh TEXT NOT NULL CHECK (length(name_zh) > 0),
        name_zht TEXT NOT NULL,
        name_en TEXT NOT NULL,
        event_type TEXT NOT NULL CHECK (event_type IN ('league', 'cup')),
        type_code INTEGER NOT NULL CHECK (type_code BETWEEN 0 AND 2),
        access_url TEXT NOT NULL,
        url_status INTEGER NOT NULL CHECK (url_status IN (0, 1)),
        last_modified TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_events_levelid ON events(levelid);
"#;

/// SQLite implementation of [`CatalogStore`]
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteCatalogStore {
    conn: Mutex<Connection>,
}

impl SqliteCatalogStore {
    /// Open or create a store file
    pub fn new(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite store initialized");
        Ok(store)
    }

    /// Create in-memory store (for testing)
    pub fn in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn create_schema(&self) -> Result<(), PersistenceError> {
        self.conn().execute_batch(SQLITE_SCHEMA)?;
        Ok(())
    }

    fn competition_from_row(row: &Row<'_>) -> rusqlite::Result<(Competition, String, i32)> {
        let competition = Competition {
            id: row.get(0)?,
            region_level: row.get(1)?,
            name_zh: row.get(2)?,
            name_zht: row.get(3)?,
            name_en: row.get(4)?,
            kind: CompetitionKind::League,
            type_code: row.get(6)?,
            detail_url: row.get(7)?,
            url_is_valid: false,
        };
        Ok((competition, row.get(5)?, row.get(8)?))
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn init_schema(&self) -> Result<(), PersistenceError> {
        self.create_schema()
    }

    async fn load_regions(&self) -> Result<Vec<Region>, PersistenceError> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT name_zh, name_zht, name_en, level FROM areas ORDER BY level")?;

        let regions = stmt
            .query_map([], |row| {
                Ok(Region {
                    name_zh: row.get(0)?,
                    name_zht: row.get(1)?,
                    name_en: row.get(2)?,
                    level: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(regions)
    }

    async fn load_competitions(&self) -> Result<Vec<Competition>, PersistenceError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT event_id, levelid, name_zh, name_zht, name_en,
                    event_type, type_code, access_url, url_status
             FROM events ORDER BY event_id",
        )?;

        let rows = stmt
            .query_map([], Self::competition_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(mut competition, kind, status)| {
                competition.kind = parse_kind(kind)?;
                competition.url_is_valid = parse_url_status(status)?;
                Ok(competition)
            })
            .collect()
    }

    async fn region_levels(&self) -> Result<HashSet<u32>, PersistenceError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT level FROM areas")?;
        let levels = stmt
            .query_map([], |row| row.get::<_, u32>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(levels)
    }

    async fn upsert_region(&self, region: &Region) -> Result<(), PersistenceError> {
        self.conn().execute(
            "INSERT INTO areas (name_zh, name_zht, name_en, level, last_modified)
             VALUES (?1, ?2, ?3, ?4, CURRENT_TIMESTAMP)
             ON CONFLICT(level) DO UPDATE SET
                name_zh = excluded.name_zh,
                name_zht = excluded.name_zht,
                name_en = excluded.name_en,
                last_modified = CURRENT_TIMESTAMP",
            params![region.name_zh, region.name_zht, region.name_en, region.level],
        )?;
        Ok(())
    }

    async fn upsert_competition(&self, competition: &Competition) -> Result<(), PersistenceError> {
        self.conn().execute(
            "INSERT INTO events (
                event_id, levelid, name_zh, name_zht, name_en,
                event_type, type_code, access_url, url_status, last_modified
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, CURRENT_TIMESTAMP)
             ON CONFLICT(event_id) DO UPDATE SET
                levelid = excluded.levelid,
                name_zh = excluded.name_zh,
                name_zht = excluded.name_zht,
                name_en = excluded.name_en,
                event_type = excluded.event_type,
                type_code = excluded.type_code,
                access_url = excluded.access_url,
                url_status = excluded.url_status,
                last_modified = CURRENT_TIMESTAMP",
            params![
                competition.id,
                competition.region_level,
                competition.name_zh,
                competition.name_zht,
                competition.name_en,
                competition.kind.as_str(),
                competition.type_code,
                competition.detail_url,
                url_status(competition.url_is_valid),
            ],
        )?;
        Ok(())
    }

    async fn counts(&self) -> Result<StoreCounts, PersistenceError> {
        let conn = self.conn();
        let areas: i64 = conn.query_row("SELECT COUNT(*) FROM areas", [], |row| row.get(0))?;
        let events: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;

        Ok(StoreCounts {
            areas: u64::try_from(areas).unwrap_or(0),
            events: u64::try_from(events).unwrap_or(0),
        })
    }

    async fn competitions_by_region(&self) -> Result<Vec<RegionCompetition>, PersistenceError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT a.level, a.name_zh, e.event_id, e.name_zh, e.type_code, e.access_url
             FROM events e
             JOIN areas a ON e.levelid = a.level
             ORDER BY a.level, e.event_id",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(RegionCompetition {
                    region_level: row.get(0)?,
                    region_name: row.get(1)?,
                    event_id: row.get(2)?,
                    name_zh: row.get(3)?,
                    type_code: row.get(4)?,
                    access_url: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}
