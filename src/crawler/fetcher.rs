//! HTTP fetcher for upstream script resources
//!
//! This module provides the fetcher used to download the area script and
//! season scripts, with features including:
//! - User-Agent rotation
//! - Rate limiting with governor
//! - Automatic retry with exponential backoff
//! - Charset detection with a GB18030 fallback

use crate::config::FetcherConfig;
use crate::utils::error::FetchError;
use encoding_rs::{Encoding, GB18030, UTF_8};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use rand::seq::SliceRandom;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT},
    Client, Response,
};
use std::num::NonZeroU32;
use std::time::Duration;

/// Pool of realistic User-Agent strings for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

/// Script fetcher with rate limiting and retries
pub struct ScriptFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Rate limiter to control request frequency
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    /// Maximum number of retry attempts for failed requests
    max_retries: u32,

    /// Base delay in milliseconds for exponential backoff
    base_delay_ms: u64,

    /// Fixed User-Agent; rotates through the pool when unset
    user_agent: Option<String>,

    /// Optional base URL override for testing with mock servers
    base_url: Option<String>,
}

impl ScriptFetcher {
    /// Create a new fetcher with default settings
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new(requests_per_second: u32) -> Result<Self, FetchError> {
        Self::with_config(requests_per_second, 3, Duration::from_secs(10))
    }

    /// Create a new fetcher with custom configuration
    ///
    /// # Arguments
    ///
    /// * `requests_per_second` - Maximum number of requests per second
    /// * `max_retries` - Maximum number of retry attempts
    /// * `timeout` - Request timeout duration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn with_config(
        requests_per_second: u32,
        max_retries: u32,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).gzip(true).build()?;

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
            max_retries,
            base_delay_ms: 1000,
            user_agent: None,
            base_url: None,
        })
    }

    /// Create a fetcher from the `[fetcher]` configuration section
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn from_config(config: &FetcherConfig) -> Result<Self, FetchError> {
        let mut fetcher = Self::with_config(
            config.rate_limit,
            config.max_retries,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        if !config.user_agent.is_empty() {
            fetcher.user_agent = Some(config.user_agent.clone());
        }
        Ok(fetcher)
    }

    /// Create a new fetcher with a custom base URL for testing
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn with_base_url(base_url: &str, requests_per_second: u32) -> Result<Self, FetchError> {
        let mut fetcher = Self::new(requests_per_second)?;
        fetcher.base_url = Some(base_url.to_string());
        Ok(fetcher)
    }

    /// Create a new fetcher with custom config and base URL for testing
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn with_config_and_base_url(
        base_url: &str,
        requests_per_second: u32,
        max_retries: u32,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let mut fetcher = Self::with_config(requests_per_second, max_retries, timeout)?;
        fetcher.base_url = Some(base_url.to_string());
        Ok(fetcher)
    }

    /// Override the base backoff delay
    #[must_use]
    pub fn with_backoff(mut self, base_delay: Duration) -> Self {
        self.base_delay_ms = u64::try_from(base_delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Fetch a script resource as decoded text
    ///
    /// # Errors
    ///
    /// - `FetchError::Status` for a non-retryable status
    /// - `FetchError::MaxRetriesExceeded` once retries are exhausted
    /// - `FetchError::Decode` if the body cannot be decoded
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.rate_limiter.until_ready().await;
        self.fetch_with_retry(url).await
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<String, FetchError> {
        let full_url = match &self.base_url {
            Some(base) => format!("{base}{url}"),
            None => url.to_string(),
        };

        let mut last_status = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay_ms.saturating_mul(2_u64.pow(attempt - 1));
                tracing::debug!(url = %full_url, attempt, delay_ms = delay, "Retrying fetch");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match self
                .client
                .get(&full_url)
                .headers(self.build_headers())
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status().as_u16();

                    if response.status().is_success() {
                        return self.decode_response(response).await;
                    }
                    if !Self::should_retry(status) {
                        tracing::warn!(url = %full_url, status, "Fetch failed");
                        return Err(FetchError::Status(status));
                    }
                    last_status = Some(status);
                }
                Err(e) if e.is_timeout() => {
                    tracing::warn!(url = %full_url, attempt, "Request timed out");
                    if attempt == self.max_retries {
                        return Err(FetchError::Timeout);
                    }
                }
                Err(e) => {
                    tracing::warn!(url = %full_url, attempt, error = %e, "Request failed");
                    if attempt == self.max_retries {
                        return Err(FetchError::Http(e));
                    }
                }
            }
        }

        Err(FetchError::MaxRetriesExceeded { last_status })
    }

    /// Retry on 429 and the transient 5xx statuses
    fn should_retry(status: u16) -> bool {
        matches!(status, 429 | 500 | 502 | 503 | 504)
    }

    async fn decode_response(&self, response: Response) -> Result<String, FetchError> {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_default();

        let bytes = response.bytes().await?;
        Self::decode_bytes(&bytes, &content_type)
    }

    /// Decode a body using the charset named in `content_type`
    ///
    /// Without a recognised charset the body is tried as UTF-8, then GB18030.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Decode` if no encoding decodes the body cleanly
    pub fn decode_bytes(bytes: &[u8], content_type: &str) -> Result<String, FetchError> {
        if let Some(encoding) = charset_of(content_type) {
            return decode_with(encoding, bytes);
        }

        decode_with(UTF_8, bytes).or_else(|_| decode_with(GB18030, bytes))
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        let agent = self
            .user_agent
            .as_deref()
            .unwrap_or_else(|| Self::random_user_agent());
        if let Ok(value) = HeaderValue::from_str(agent) {
            headers.insert(USER_AGENT, value);
        }

        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"),
        );

        headers
    }

    fn random_user_agent() -> &'static str {
        let mut rng = rand::thread_rng();
        USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0])
    }
}

fn charset_of(content_type: &str) -> Option<&'static Encoding> {
    content_type
        .split(';')
        .filter_map(|part| part.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .and_then(|(_, label)| Encoding::for_label(label.trim().trim_matches('"').as_bytes()))
}

fn decode_with(encoding: &'static Encoding, bytes: &[u8]) -> Result<String, FetchError> {
    let (cow, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(FetchError::Decode(format!(
            "{} decoding errors",
            encoding.name()
        )));
    }
    Ok(cow.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    // "英格兰" in GB18030
    const GBK_BYTES: &[u8] = &[0xd3, 0xa2, 0xb8, 0xf1, 0xc0, 0xbc];

    #[test]
    fn test_user_agent_rotation() {
        let mut agents = std::collections::HashSet::new();
        for _ in 0..100 {
            let agent = ScriptFetcher::random_user_agent();
            assert!(USER_AGENTS.contains(&agent));
            agents.insert(agent);
        }
        assert!(agents.len() > 1, "User agents should rotate");
    }

    #[test]
    fn test_fixed_user_agent_from_config() {
        let config = FetcherConfig::default();
        let fetcher = ScriptFetcher::from_config(&config).unwrap();
        let headers = fetcher.build_headers();
        assert_eq!(
            headers.get(USER_AGENT).unwrap().to_str().unwrap(),
            config.user_agent
        );
        assert!(headers.contains_key(ACCEPT_LANGUAGE));
    }

    #[test]
    fn test_random_user_agent_without_config() {
        let config = FetcherConfig {
            user_agent: String::new(),
            ..FetcherConfig::default()
        };
        let fetcher = ScriptFetcher::from_config(&config).unwrap();
        let headers = fetcher.build_headers();
        let agent = headers.get(USER_AGENT).unwrap().to_str().unwrap();
        assert!(USER_AGENTS.contains(&agent));
    }

    #[test]
    fn test_decode_utf8() {
        let text = "arrArea[1] = [['英格兰','英格蘭','England',1]];";
        let decoded = ScriptFetcher::decode_bytes(text.as_bytes(), "application/javascript; charset=utf-8");
        assert_eq!(decoded.unwrap(), text);
    }

    #[test]
    fn test_decode_declared_gb2312() {
        let decoded = ScriptFetcher::decode_bytes(GBK_BYTES, "application/x-javascript; charset=gb2312");
        assert_eq!(decoded.unwrap(), "英格兰");
    }

    #[test]
    fn test_decode_gb18030_fallback() {
        let decoded = ScriptFetcher::decode_bytes(GBK_BYTES, "application/javascript");
        assert_eq!(decoded.unwrap(), "英格兰");
    }

    #[test]
    fn test_decode_rejects_invalid_declared_charset() {
        let result = ScriptFetcher::decode_bytes(GBK_BYTES, "text/plain; charset=utf-8");
        assert!(matches!(result, Err(FetchError::Decode(_))));
    }

    #[test]
    fn test_charset_parsing() {
        assert_eq!(charset_of("text/html; charset=\"GBK\""), Some(encoding_rs::GBK));
        assert_eq!(charset_of("text/html"), None);
        assert_eq!(charset_of(""), None);
    }

    #[test]
    fn test_should_retry() {
        for status in [429, 500, 502, 503, 504] {
            assert!(ScriptFetcher::should_retry(status));
        }
        for status in [200, 400, 401, 403, 404] {
            assert!(!ScriptFetcher::should_retry(status));
        }
    }

    #[test]
    fn test_fetcher_with_base_url() {
        let fetcher = ScriptFetcher::with_base_url("http://localhost:8080", 10).unwrap();
        assert_eq!(fetcher.base_url.as_deref(), Some("http://localhost:8080"));
    }
}
