//! Integration tests for the script fetcher using wiremock

use leaguedex::crawler::fetcher::ScriptFetcher;
use leaguedex::utils::error::FetchError;
use std::time::Duration;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_fetcher(server: &MockServer, max_retries: u32) -> ScriptFetcher {
    ScriptFetcher::with_config_and_base_url(&server.uri(), 100, max_retries, Duration::from_secs(5))
        .unwrap()
        .with_backoff(Duration::from_millis(10))
}

/// Test successful fetch with mock server
#[tokio::test]
async fn test_fetch_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/jsData/leftData/leftData.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string("var arrArea = new Array();"))
        .mount(&mock_server)
        .await;

    let fetcher = fast_fetcher(&mock_server, 0);
    let body = fetcher.fetch_text("/jsData/leftData/leftData.js").await.unwrap();

    assert_eq!(body, "var arrArea = new Array();");
}

/// Test retry on a transient server error
#[tokio::test]
async fn test_retry_after_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
        .mount(&mock_server)
        .await;

    let fetcher = fast_fetcher(&mock_server, 2);
    let body = fetcher.fetch_text("/flaky").await.unwrap();

    assert_eq!(body, "recovered");
}

/// Test 404 is returned at once, without retries
#[tokio::test]
async fn test_not_found_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing.js"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = fast_fetcher(&mock_server, 3);
    let result = fetcher.fetch_text("/missing.js").await;

    assert!(matches!(result, Err(FetchError::Status(404))));
}

/// Test max retries exceeded reports the last status
#[tokio::test]
async fn test_max_retries_exceeded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/always-fail"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let fetcher = fast_fetcher(&mock_server, 2);
    let result = fetcher.fetch_text("/always-fail").await;

    assert!(matches!(
        result,
        Err(FetchError::MaxRetriesExceeded {
            last_status: Some(503)
        })
    ));
}

/// Test rate limited responses are retried
#[tokio::test]
async fn test_too_many_requests_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let fetcher = fast_fetcher(&mock_server, 3);
    assert_eq!(fetcher.fetch_text("/busy").await.unwrap(), "ok");
}

/// Test a GBK body is decoded from the declared charset
#[tokio::test]
async fn test_gbk_decoding() {
    let mock_server = MockServer::start().await;

    // GBK bytes for "英格兰"
    let gbk: Vec<u8> = vec![0xd3, 0xa2, 0xb8, 0xf1, 0xc0, 0xbc];

    Mock::given(method("GET"))
        .and(path("/gbk.js"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(gbk)
                .insert_header("content-type", "application/javascript; charset=gbk"),
        )
        .mount(&mock_server)
        .await;

    let fetcher = fast_fetcher(&mock_server, 0);
    assert_eq!(fetcher.fetch_text("/gbk.js").await.unwrap(), "英格兰");
}

/// Test an undeclared non-UTF-8 body falls back to GB18030
#[tokio::test]
async fn test_undeclared_charset_fallback() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/plain.js"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xd3, 0xa2, 0xb8, 0xf1, 0xc0, 0xbc]))
        .mount(&mock_server)
        .await;

    let fetcher = fast_fetcher(&mock_server, 0);
    assert_eq!(fetcher.fetch_text("/plain.js").await.unwrap(), "英格兰");
}

/// Test User-Agent header is set
#[tokio::test]
async fn test_user_agent_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ua-test"))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(&mock_server)
        .await;

    let fetcher = fast_fetcher(&mock_server, 0);
    assert!(fetcher.fetch_text("/ua-test").await.is_ok());
}

/// Test rate limiting respects configured limit
#[tokio::test]
async fn test_rate_limiting() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rate-test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(&mock_server)
        .await;

    let fetcher = ScriptFetcher::with_base_url(&mock_server.uri(), 2).unwrap();

    let start = std::time::Instant::now();
    for _ in 0..3 {
        let _ = fetcher.fetch_text("/rate-test").await;
    }
    let elapsed = start.elapsed();

    assert!(
        elapsed >= Duration::from_millis(400),
        "Rate limiting should slow down requests: {:?}",
        elapsed
    );
}

/// Test fetcher creation with different configs
#[test]
fn test_fetcher_creation_configs() {
    assert!(ScriptFetcher::new(2).is_ok());
    assert!(ScriptFetcher::with_config(5, 5, Duration::from_secs(60)).is_ok());
    assert!(ScriptFetcher::with_base_url("http://localhost:8080", 10).is_ok());
}
