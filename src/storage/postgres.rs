//! PostgreSQL implementation of the catalog store
//!
//! A client is borrowed from the pool for each call and returned on drop.

use std::collections::HashSet;

use async_trait::async_trait;
use deadpool_postgres::{Config as PoolConfig, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::{NoTls, Row};

use super::repository::{parse_kind, parse_url_status, url_status, CatalogStore, StoreCounts};
use crate::models::{Competition, Region, RegionCompetition};
use crate::utils::error::PersistenceError;

const POSTGRES_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS areas (
        name_zh TEXT NOT NULL CHECK (length(name_zh) > 0),
        name_zht TEXT NOT NULL,
        name_en TEXT NOT NULL,
        level INTEGER PRIMARY KEY CHECK (level >= 0),
        last_modified TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );

    CREATE TABLE IF NOT EXISTS events (
        event_id BIGINT PRIMARY KEY,
        levelid INTEGER NOT NULL REFERENCES areas(level),
        name_zh TEXT NOT NULL CHECK (length(name_zh) > 0),
        name_zht TEXT NOT NULL,
        name_en TEXT NOT NULL,
        event_type TEXT NOT NULL CHECK (event_type IN ('league', 'cup')),
        type_code INTEGER NOT NULL CHECK (type_code BETWEEN 0 AND 2),
        access_url TEXT NOT NULL,
        url_status INTEGER NOT NULL CHECK (url_status IN (0, 1)),
        last_modified TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );

    CREATE INDEX IF NOT EXISTS idx_events_levelid ON events(levelid);
"#;

/// PostgreSQL implementation of [`CatalogStore`]
pub struct PostgresCatalogStore {
    pool: Pool,
}

impl PostgresCatalogStore {
    /// Create a connection pool for `url`
    ///
    /// No connection is made until the first call.
    pub fn new(url: &str, pool_size: usize) -> Result<Self, PersistenceError> {
        let mut cfg = PoolConfig::new();
        cfg.url = Some(url.to_string());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(deadpool_postgres::PoolConfig::new(pool_size));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| PersistenceError::Pool(e.to_string()))?;

        Ok(Self { pool })
    }

    fn level_param(level: u32) -> Result<i32, PersistenceError> {
        i32::try_from(level).map_err(|_| PersistenceError::InvalidValue {
            column: "level",
            value: level.to_string(),
        })
    }

    fn level_from(value: i32) -> Result<u32, PersistenceError> {
        u32::try_from(value).map_err(|_| PersistenceError::InvalidValue {
            column: "level",
            value: value.to_string(),
        })
    }

    fn competition_from_row(row: &Row) -> Result<Competition, PersistenceError> {
        Ok(Competition {
            id: row.try_get("event_id")?,
            region_level: Self::level_from(row.try_get("levelid")?)?,
            name_zh: row.try_get("name_zh")?,
            name_zht: row.try_get("name_zht")?,
            name_en: row.try_get("name_en")?,
            kind: parse_kind(row.try_get("event_type")?)?,
            type_code: row.try_get("type_code")?,
            detail_url: row.try_get("access_url")?,
            url_is_valid: parse_url_status(row.try_get("url_status")?)?,
        })
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn init_schema(&self) -> Result<(), PersistenceError> {
        let client = self.pool.get().await?;
        client.batch_execute(POSTGRES_SCHEMA).await?;
        tracing::info!("PostgreSQL schema ready");
        Ok(())
    }

    async fn load_regions(&self) -> Result<Vec<Region>, PersistenceError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT name_zh, name_zht, name_en, level FROM areas ORDER BY level",
                &[],
            )
            .await?;

        rows.iter()
            .map(|row| {
                Ok(Region {
                    name_zh: row.try_get("name_zh")?,
                    name_zht: row.try_get("name_zht")?,
                    name_en: row.try_get("name_en")?,
                    level: Self::level_from(row.try_get("level")?)?,
                })
            })
            .collect()
    }

    async fn load_competitions(&self) -> Result<Vec<Competition>, PersistenceError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT event_id, levelid, name_zh, name_zht, name_en,
                        event_type, type_code, access_url, url_status
                 FROM events ORDER BY event_id",
                &[],
            )
            .await?;

        rows.iter().map(Self::competition_from_row).collect()
    }

    async fn region_levels(&self) -> Result<HashSet<u32>, PersistenceError> {
        let client = self.pool.get().await?;
        let rows = client.query("SELECT level FROM areas", &[]).await?;

        rows.iter()
            .map(|row| Self::level_from(row.try_get("level")?))
            .collect()
    }

    async fn upsert_region(&self, region: &Region) -> Result<(), PersistenceError> {
        let level = Self::level_param(region.level)?;
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO areas (name_zh, name_zht, name_en, level, last_modified)
                 VALUES ($1, $2, $3, $4, NOW())
                 ON CONFLICT (level) DO UPDATE SET
                    name_zh = EXCLUDED.name_zh,
                    name_zht = EXCLUDED.name_zht,
                    name_en = EXCLUDED.name_en,
                    last_modified = NOW()",
                &[&region.name_zh, &region.name_zht, &region.name_en, &level],
            )
            .await?;
        Ok(())
    }

    async fn upsert_competition(&self, competition: &Competition) -> Result<(), PersistenceError> {
        let level = Self::level_param(competition.region_level)?;
        let status = url_status(competition.url_is_valid);
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO events (
                    event_id, levelid, name_zh, name_zht, name_en,
                    event_type, type_code, access_url, url_status, last_modified
                 ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
                 ON CONFLICT (event_id) DO UPDATE SET
                    levelid = EXCLUDED.levelid,
                    name_zh = EXCLUDED.name_zh,
                    name_zht = EXCLUDED.name_zht,
                    name_en = EXCLUDED.name_en,
                    event_type = EXCLUDED.event_type,
                    type_code = EXCLUDED.type_code,
                    access_url = EXCLUDED.access_url,
                    url_status = EXCLUDED.url_status,
                    last_modified = NOW()",
                &[
                    &competition.id,
                    &level,
                    &competition.name_zh,
                    &competition.name_zht,
                    &competition.name_en,
                    &competition.kind.as_str(),
                    &competition.type_code,
                    &competition.detail_url,
                    &status,
                ],
            )
            .await?;
        Ok(())
    }

    async fn counts(&self) -> Result<StoreCounts, PersistenceError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "SELECT (SELECT COUNT(*) FROM areas) AS areas, (SELECT COUNT(*) FROM events) AS events",
                &[],
            )
            .await?;

        let areas: i64 = row.try_get("areas")?;
        let events: i64 = row.try_get("events")?;
        Ok(StoreCounts {
            areas: u64::try_from(areas).unwrap_or(0),
            events: u64::try_from(events).unwrap_or(0),
        })
    }

    async fn competitions_by_region(&self) -> Result<Vec<RegionCompetition>, PersistenceError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT a.level, a.name_zh AS region_name, e.event_id, e.name_zh,
                        e.type_code, e.access_url
                 FROM events e
                 JOIN areas a ON e.levelid = a.level
                 ORDER BY a.level, e.event_id",
                &[],
            )
            .await?;

        rows.iter()
            .map(|row| {
                Ok(RegionCompetition {
                    region_level: Self::level_from(row.try_get("level")?)?,
                    region_name: row.try_get("region_name")?,
                    event_id: row.try_get("event_id")?,
                    name_zh: row.try_get("name_zh")?,
                    type_code: row.try_get("type_code")?,
                    access_url: row.try_get("access_url")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_creation_is_lazy() {
        let store = PostgresCatalogStore::new("postgresql://localhost/leaguedex_test", 4);
        assert!(store.is_ok());
    }

    #[test]
    fn test_level_conversion() {
        assert_eq!(PostgresCatalogStore::level_param(3).unwrap(), 3);
        assert!(PostgresCatalogStore::level_param(u32::MAX).is_err());
        assert!(PostgresCatalogStore::level_from(-1).is_err());
    }
}
