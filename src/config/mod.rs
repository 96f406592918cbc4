//! Configuration management for the leaguedex scraper
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files. Base URLs and store credentials are opaque values
//! handed through to the fetcher and the store.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Browser-like User-Agent sent with every request
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upstream source locations
    pub source: SourceConfig,

    /// Script fetcher configuration
    pub fetcher: FetcherConfig,

    /// URL prober configuration
    pub prober: ProberConfig,

    /// Store configuration
    pub database: DatabaseConfig,

    /// Local output locations
    pub output: OutputConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Upstream source locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Script listing every area and its competitions
    pub areas_url: String,

    /// Site root, with trailing slash; detail and season URLs hang off it
    pub source_url: String,

    /// Language segment of detail page URLs
    pub lang: String,
}

/// Script fetcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Rate limit (requests per second)
    pub rate_limit: u32,

    /// Maximum retry attempts on retryable statuses
    pub max_retries: u32,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// User agent string
    pub user_agent: String,
}

/// URL prober configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProberConfig {
    /// Maximum probes in flight
    pub max_concurrent_requests: usize,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// How long a probe result stays cached, in seconds
    pub cache_ttl_secs: u64,

    /// A reachable page body must be longer than this many bytes
    pub min_body_len: usize,

    /// Body fragments marking a soft 404 page
    pub not_found_markers: Vec<String>,

    /// Lower bound of the random pause between dispatches, in milliseconds
    pub dispatch_delay_min_ms: u64,

    /// Upper bound of the random pause between dispatches, in milliseconds
    pub dispatch_delay_max_ms: u64,
}

/// Store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Which backend to use
    pub backend: DatabaseBackend,

    /// SQLite database path
    pub sqlite_path: PathBuf,

    /// PostgreSQL connection string
    pub postgres_url: String,

    /// Maximum pool size
    pub pool_size: usize,
}

/// Local output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory holding the cached copy of the area script
    pub script_cache_dir: PathBuf,

    /// Workbook of areas and their competitions
    pub events_workbook: PathBuf,

    /// Workbook of discovered seasons
    pub seasons_workbook: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            areas_url: String::from("https://zq.titan007.com/jsData/leftData/leftData.js"),
            source_url: String::from("https://zq.titan007.com/"),
            lang: String::from("cn"),
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            rate_limit: 2,
            max_retries: 3,
            request_timeout_secs: 10,
            user_agent: String::from(DEFAULT_USER_AGENT),
        }
    }
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 10,
            request_timeout_secs: 10,
            cache_ttl_secs: 3600,
            min_body_len: 1000,
            not_found_markers: vec![String::from("<title>404</title>"), String::from("error404")],
            dispatch_delay_min_ms: 100,
            dispatch_delay_max_ms: 300,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::Sqlite,
            sqlite_path: PathBuf::from("data/leaguedex.db"),
            postgres_url: String::from("postgresql://localhost/leaguedex"),
            pool_size: 10,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            script_cache_dir: PathBuf::from("output/source_js/leftData"),
            events_workbook: PathBuf::from("output/football_areas_events_all.xlsx"),
            seasons_workbook: PathBuf::from("output/league_seasons.xlsx"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            fetcher: FetcherConfig::default(),
            prober: ProberConfig::default(),
            database: DatabaseConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay environment variables onto this configuration
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("LEAGUEDEX_AREAS_URL") {
            self.source.areas_url = url;
        }
        if let Ok(url) = std::env::var("LEAGUEDEX_SOURCE_URL") {
            self.source.source_url = url;
        }
        if let Ok(lang) = std::env::var("LEAGUEDEX_LANG") {
            self.source.lang = lang;
        }

        if let Some(rate) = env_parse("LEAGUEDEX_RATE_LIMIT") {
            self.fetcher.rate_limit = rate;
        }
        if let Some(timeout) = env_parse::<u64>("LEAGUEDEX_REQUEST_TIMEOUT") {
            self.fetcher.request_timeout_secs = timeout;
            self.prober.request_timeout_secs = timeout;
        }
        if let Ok(agent) = std::env::var("LEAGUEDEX_USER_AGENT") {
            self.fetcher.user_agent = agent;
        }

        if let Some(max) = env_parse("LEAGUEDEX_MAX_CONCURRENT_REQUESTS") {
            self.prober.max_concurrent_requests = max;
        }
        if let Some(ttl) = env_parse("LEAGUEDEX_PROBE_CACHE_TTL") {
            self.prober.cache_ttl_secs = ttl;
        }

        if let Ok(backend) = std::env::var("LEAGUEDEX_DB_BACKEND") {
            self.database.backend = match backend.to_lowercase().as_str() {
                "sqlite" => DatabaseBackend::Sqlite,
                "postgres" | "postgresql" => DatabaseBackend::Postgres,
                other => anyhow::bail!("Unknown database backend: {other}"),
            };
        }
        if let Ok(path) = std::env::var("LEAGUEDEX_SQLITE_PATH") {
            self.database.sqlite_path = PathBuf::from(path);
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.postgres_url = url;
        }
        if let Some(size) = env_parse("LEAGUEDEX_DB_POOL_SIZE") {
            self.database.pool_size = size;
        }

        if let Ok(dir) = std::env::var("LEAGUEDEX_OUTPUT_DIR") {
            let dir = PathBuf::from(dir);
            self.output.script_cache_dir = dir.join("source_js").join("leftData");
            self.output.events_workbook = dir.join("football_areas_events_all.xlsx");
            self.output.seasons_workbook = dir.join("league_seasons.xlsx");
        }

        if let Ok(level) = std::env::var("LEAGUEDEX_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LEAGUEDEX_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.source.areas_url.is_empty() {
            anyhow::bail!("areas_url must be set");
        }

        if !self.source.source_url.ends_with('/') {
            anyhow::bail!("source_url must end with '/'");
        }

        if self.fetcher.rate_limit == 0 {
            anyhow::bail!("rate_limit must be greater than 0");
        }

        if self.prober.max_concurrent_requests == 0 {
            anyhow::bail!("max_concurrent_requests must be greater than 0");
        }

        if self.prober.dispatch_delay_min_ms > self.prober.dispatch_delay_max_ms {
            anyhow::bail!("dispatch_delay_min_ms must not exceed dispatch_delay_max_ms");
        }

        if self.database.pool_size == 0 {
            anyhow::bail!("pool_size must be greater than 0");
        }

        Ok(())
    }

    /// Get fetcher request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.fetcher.request_timeout_secs)
    }

    /// Root of detail page URLs, e.g. `https://host/cn`
    #[must_use]
    pub fn detail_base_url(&self) -> String {
        format!("{}{}", self.source.source_url, self.source.lang)
    }

    /// Path of the cached area script
    #[must_use]
    pub fn script_cache_file(&self) -> PathBuf {
        self.output.script_cache_dir.join("leftData.js")
    }
}

impl ProberConfig {
    /// Get probe timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Get cache TTL as Duration
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_concurrent_requests() {
        let mut config = Config::default();
        config.prober.max_concurrent_requests = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_source_url_needs_trailing_slash() {
        let mut config = Config::default();
        config.source.source_url = String::from("https://example.com");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_dispatch_delay() {
        let mut config = Config::default();
        config.prober.dispatch_delay_min_ms = 500;
        config.prober.dispatch_delay_max_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_request_timeout_conversion() {
        let config = Config::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.prober.cache_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn test_derived_locations() {
        let mut config = Config::default();
        config.source.source_url = String::from("http://localhost:8080/");
        assert_eq!(config.detail_base_url(), "http://localhost:8080/cn");
        assert!(config.script_cache_file().ends_with("leftData/leftData.js"));
    }
}
