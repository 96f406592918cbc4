//! Liveness probing of detail page URLs
//!
//! A URL is reachable when it answers 200 with a body that is long enough and
//! carries none of the soft-404 markers. Results, failures included, are
//! memoized in a [`TtlCache`] so each URL is probed at most once per TTL.

use rand::Rng;
use reqwest::{header::USER_AGENT, Client, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::cache::{Clock, SystemClock, TtlCache};
use crate::config::{ProberConfig, DEFAULT_USER_AGENT};
use crate::utils::error::FetchError;

/// Concurrent, cached URL prober
///
/// Cloning is cheap; clones share the client, cache and concurrency limit.
#[derive(Clone)]
pub struct UrlProber {
    client: Client,
    cache: Arc<TtlCache<bool>>,
    semaphore: Arc<Semaphore>,
    config: Arc<ProberConfig>,
}

impl UrlProber {
    /// Create a prober using the wall clock
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new(config: &ProberConfig) -> Result<Self, FetchError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a prober whose cache expiry follows `clock`
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn with_clock(config: &ProberConfig, clock: Arc<dyn Clock>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            cache: Arc::new(TtlCache::new(config.cache_ttl(), clock)),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
            config: Arc::new(config.clone()),
        })
    }

    /// Whether `url` serves a real page
    ///
    /// Network errors and timeouts count as unreachable. The answer is cached.
    pub async fn is_reachable(&self, url: &str) -> bool {
        self.cache
            .get_or_compute(url, || async {
                let reachable = match self.fetch_body(url).await {
                    Some(body) => self.looks_reachable(&body),
                    None => false,
                };
                tracing::debug!(url = %url, reachable, "Probed URL");
                reachable
            })
            .await
    }

    /// Probe many URLs concurrently
    ///
    /// Expired cache entries are dropped first. Dispatches are spaced by a
    /// random pause and at most `max_concurrent_requests` requests are in
    /// flight. Every distinct input URL appears in the result; a probe task
    /// that fails yields `false`.
    pub async fn probe_all<I>(&self, urls: I) -> HashMap<String, bool>
    where
        I: IntoIterator<Item = String>,
    {
        let purged = self.cache.purge_expired().await;
        if purged > 0 {
            tracing::debug!(purged, "Dropped expired probe results");
        }

        let mut pending = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for url in urls {
            if !seen.insert(url.clone()) {
                continue;
            }
            if !pending.is_empty() {
                self.dispatch_pause().await;
            }

            let prober = self.clone();
            let target = url.clone();
            let handle = tokio::spawn(async move { prober.is_reachable(&target).await });
            pending.push((url, handle));
        }

        let mut results = HashMap::with_capacity(pending.len());
        for (url, handle) in pending {
            let reachable = match handle.await {
                Ok(reachable) => reachable,
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Probe task failed");
                    false
                }
            };
            results.insert(url, reachable);
        }

        let valid = results.values().filter(|ok| **ok).count();
        tracing::info!(
            total = results.len(),
            valid,
            invalid = results.len() - valid,
            cache_hit_rate = self.cache.stats().hit_rate(),
            "URL probing complete"
        );

        results
    }

    /// GET `url` under the concurrency limit, returning the body on 200
    pub async fn fetch_body(&self, url: &str) -> Option<String> {
        let _permit = self.semaphore.acquire().await.ok()?;

        let response = match self
            .client
            .get(url)
            .header(USER_AGENT, DEFAULT_USER_AGENT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Probe request failed");
                return None;
            }
        };

        if response.status() != StatusCode::OK {
            tracing::debug!(url = %url, status = response.status().as_u16(), "Probe got non-200");
            return None;
        }

        match response.text().await {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Failed to read probe body");
                None
            }
        }
    }

    /// Whether a 200 body looks like a real page rather than a soft 404
    pub fn looks_reachable(&self, body: &str) -> bool {
        body.len() > self.config.min_body_len && !self.has_not_found_marker(body)
    }

    /// Whether the body carries one of the configured not-found markers
    pub fn has_not_found_marker(&self, body: &str) -> bool {
        self.config
            .not_found_markers
            .iter()
            .any(|marker| body.contains(marker.as_str()))
    }

    /// Hit/miss counters of the probe cache
    pub fn cache_stats(&self) -> crate::cache::CacheStats {
        self.cache.stats()
    }

    async fn dispatch_pause(&self) {
        let (min, max) = (
            self.config.dispatch_delay_min_ms,
            self.config.dispatch_delay_max_ms,
        );
        if max == 0 {
            return;
        }
        let delay = rand::thread_rng().gen_range(min..=max.max(min));
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}
