//! In-memory time-boxed cache for URL probe results
//!
//! Entries carry their own expiry. Time comes from an injected [`Clock`] so
//! expiry can be driven deterministically in tests with [`ManualClock`].
//!
//! # Example
//!
//! ```rust,ignore
//! use leaguedex::cache::{TtlCache, SystemClock};
//!
//! let cache = TtlCache::new(Duration::from_secs(3600), Arc::new(SystemClock));
//! let ok = cache.get_or_compute("https://...", || async { probe().await }).await;
//! ```

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += to_chrono(by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

/// Cached value with its expiry time
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub expires_at: DateTime<Utc>,
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Total cache hits
    pub hits: u64,
    /// Total cache misses (including expired entries)
    pub misses: u64,
}

impl CacheStats {
    /// Calculate hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Key-value cache with a fixed time-to-live per entry
///
/// Safe to share between tasks. Entries are independent by key, so two tasks
/// missing on the same key may both compute; the later write wins.
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    stats: Mutex<CacheStats>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache whose entries live for `ttl`
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            stats: Mutex::new(CacheStats::default()),
            ttl: to_chrono(ttl),
            clock,
        }
    }

    /// Get a live entry
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        let value = entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone());

        self.record(value.is_some());
        value
    }

    /// Insert or replace an entry, expiring `ttl` from now
    pub async fn insert(&self, key: &str, value: V) {
        let expires_at = self.clock.now() + self.ttl;
        self.entries
            .write()
            .await
            .insert(key.to_string(), CacheEntry { value, expires_at });
    }

    /// Return the live entry for `key`, or compute, store and return it
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(value) = self.get(key).await {
            tracing::trace!(key = %key, "Cache hit");
            return value;
        }

        let value = compute().await;
        self.insert(key, value.clone()).await;
        value
    }

    /// Drop expired entries, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of stored entries, live or expired
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Snapshot of hit/miss counters
    pub fn stats(&self) -> CacheStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, hit: bool) {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        if hit {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
    }
}
