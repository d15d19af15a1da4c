//! Rate-limited page and asset fetching.

use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{StatusCode, Url};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::FetchPolicy;
use crate::error::{CrawlError, FetchError};

/// A listing request: base URL plus query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// Value of a query parameter, if present.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn to_url(&self) -> Result<Url, FetchError> {
        Url::parse_with_params(&self.url, &self.query).map_err(|e| FetchError::InvalidUrl {
            url: self.url.clone(),
            source: e,
        })
    }
}

/// Outbound access to the listing and the image host.
///
/// Implementations own their cadence: a successful call may sleep before it
/// returns, and a rate-limited call sleeps its cooldown before returning
/// [`FetchError::RateLimited`]. Retrying is up to the caller.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch_text(&self, request: &FetchRequest) -> Result<String, FetchError>;

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// [`Fetch`] over HTTP with browser-like headers.
pub struct HttpFetcher {
    http: reqwest::Client,
    policy: FetchPolicy,
}

impl HttpFetcher {
    /// Build a client from the policy's user agent, headers and timeout.
    pub fn new(policy: FetchPolicy) -> Result<Self, CrawlError> {
        let mut headers = HeaderMap::new();
        let wanted = [
            (ACCEPT, &policy.accept),
            (ACCEPT_LANGUAGE, &policy.accept_language),
        ];
        for (name, value) in wanted {
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    headers.insert(name, value);
                }
                Err(_) => warn!(header = name.as_str(), "skipping invalid header value"),
            }
        }

        let http = reqwest::Client::builder()
            .user_agent(policy.user_agent.as_str())
            .default_headers(headers)
            .timeout(policy.timeout())
            .build()
            .map_err(CrawlError::Client)?;

        Ok(Self { http, policy })
    }

    /// Use a preconfigured [`reqwest::Client`]; the policy still drives
    /// cooldown and jitter.
    pub fn with_client(client: reqwest::Client, policy: FetchPolicy) -> Self {
        Self {
            http: client,
            policy,
        }
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, FetchError> {
        debug!(%url, "fetching");
        let response = self
            .http
            .get(url.clone())
            .timeout(self.policy.timeout())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let cooldown = self.policy.cooldown();
            warn!(%url, cooldown_secs = cooldown.as_secs(), "rate limited, cooling down");
            tokio::time::sleep(cooldown).await;
            return Err(FetchError::RateLimited {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch_text(&self, request: &FetchRequest) -> Result<String, FetchError> {
        let url = request.to_url()?;
        let response = self.get(url.clone()).await?;
        let body = response.text().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            source: e,
        })?;
        pause(self.policy.jitter_ms).await;
        Ok(body)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_owned(),
            source: e,
        })?;
        let response = self.get(parsed).await?;
        let bytes = response.bytes().await.map_err(|e| FetchError::Body {
            url: url.to_owned(),
            source: e,
        })?;
        pause(self.policy.jitter_ms).await;
        Ok(bytes.to_vec())
    }
}

/// Sleep for a random number of milliseconds in `[low, high]`.
pub async fn pause((low, high): (u64, u64)) {
    if high == 0 {
        return;
    }
    tokio::time::sleep(Duration::from_millis(jitter_millis(low, high))).await;
}

fn jitter_millis(low: u64, high: u64) -> u64 {
    if low >= high {
        high
    } else {
        rand::rng().random_range(low..=high)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Answers every connection with `status` and `body` after `delay`.
    /// Returns the base URL and a counter of requests served.
    async fn serve(
        status: u16,
        body: &'static str,
        delay: Duration,
    ) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let mut request: Vec<u8> = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    tokio::time::sleep(delay).await;
                    let reason = StatusCode::from_u16(status)
                        .ok()
                        .and_then(|s| s.canonical_reason())
                        .unwrap_or("Unknown");
                    let response = format!(
                        "HTTP/1.1 {status} {reason}\r\n\
                         content-length: {}\r\n\
                         connection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (format!("http://{addr}/en/fifa22/players"), hits)
    }

    fn policy(timeout_secs: u64, cooldown_secs: u64, jitter_ms: (u64, u64)) -> FetchPolicy {
        FetchPolicy {
            timeout_secs,
            cooldown_secs,
            jitter_ms,
            ..FetchPolicy::default()
        }
    }

    #[tokio::test]
    async fn test_http_success_returns_body_after_jitter() {
        let (url, hits) = serve(200, "<html>ok</html>", Duration::ZERO).await;
        let fetcher = HttpFetcher::new(policy(5, 0, (150, 150))).unwrap();

        let started = Instant::now();
        let request =
            FetchRequest::new(&url).with_query(vec![("page".to_string(), "0".to_string())]);
        let body = fetcher.fetch_text(&request).await.unwrap();

        assert_eq!(body, "<html>ok</html>");
        assert!(started.elapsed() >= Duration::from_millis(150));
        assert_eq!(fetcher.fetch_bytes(&url).await.unwrap(), b"<html>ok</html>");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_http_429_cools_down_once_and_does_not_retry() {
        let (url, hits) = serve(429, "slow down", Duration::ZERO).await;
        let fetcher = HttpFetcher::new(policy(5, 1, (0, 0))).unwrap();

        let started = Instant::now();
        let err = fetcher.fetch_text(&FetchRequest::new(&url)).await.unwrap_err();

        assert!(matches!(err, FetchError::RateLimited { .. }), "{err}");
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_http_error_status_skips_jitter() {
        let (url, hits) = serve(500, "boom", Duration::ZERO).await;
        let fetcher = HttpFetcher::new(policy(5, 0, (2000, 2000))).unwrap();

        let started = Instant::now();
        let err = fetcher.fetch_bytes(&url).await.unwrap_err();

        match err {
            FetchError::Status { status, .. } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR)
            }
            other => panic!("expected status error, got {other}"),
        }
        assert!(started.elapsed() < Duration::from_millis(2000));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_http_slow_response_times_out() {
        let (url, _) = serve(200, "late", Duration::from_secs(3)).await;
        let fetcher = HttpFetcher::new(policy(1, 0, (2000, 2000))).unwrap();

        let started = Instant::now();
        let err = fetcher.fetch_text(&FetchRequest::new(&url)).await.unwrap_err();

        assert!(matches!(err, FetchError::Timeout { .. }), "{err}");
        assert!(started.elapsed() < Duration::from_millis(2900));
    }

    #[test]
    fn test_request_url_encodes_query() {
        let request = FetchRequest::new("https://www.futwiz.com/en/fifa22/players")
            .with_query(vec![
                ("page".to_string(), "3".to_string()),
                ("leagues[]".to_string(), "13".to_string()),
            ]);
        let url = request.to_url().unwrap();
        assert_eq!(url.path(), "/en/fifa22/players");
        assert_eq!(url.query(), Some("page=3&leagues%5B%5D=13"));
        assert_eq!(request.param("page"), Some("3"));
        assert_eq!(request.param("release"), None);
    }

    #[test]
    fn test_request_rejects_bad_base() {
        let request = FetchRequest::new("not a url");
        assert!(matches!(request.to_url(), Err(FetchError::InvalidUrl { .. })));
    }

    #[test]
    fn test_client_builds_from_default_policy() {
        assert!(HttpFetcher::new(FetchPolicy::default()).is_ok());
    }

    #[test]
    fn test_jitter_stays_in_range() {
        for _ in 0..100 {
            let millis = jitter_millis(500, 1000);
            assert!((500..=1000).contains(&millis));
        }
        assert_eq!(jitter_millis(700, 700), 700);
    }

    #[tokio::test]
    async fn test_zero_pause_returns_immediately() {
        let started = std::time::Instant::now();
        pause((0, 0)).await;
        assert!(started.elapsed() < Duration::from_millis(50));
    }
}
