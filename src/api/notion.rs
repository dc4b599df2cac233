//! Implements the `Source` trait with `reqwest` against the Notion REST API.

use crate::api::{Page, Source};
use crate::error::ErrorType;
use crate::{Config, Error, Result};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, trace, warn};
use url::Url;

const NOTION_VERSION: &str = "2022-06-28";
const PAGE_SIZE: u32 = 100;
/// Upper bound on a server-requested wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Queries a Notion database with a bearer token. Connection failures, timeouts, rate limiting
/// and server errors are retried with exponential backoff, or after the `Retry-After` delay when
/// rate limited. A rejected token is not retried.
pub struct NotionSource {
    client: reqwest::Client,
    base_url: Url,
    credential: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl NotionSource {
    /// # Errors
    /// A `Config` error when there is no credential or the API base URL is not a URL.
    pub fn new(config: &Config) -> Result<Self> {
        let credential = config.credential()?.to_string();
        let base_url = Url::parse(config.api_base_url()).map_err(|e| {
            Error::new(
                ErrorType::Config,
                anyhow::Error::new(e).context(format!(
                    "Invalid API base URL '{}'",
                    config.api_base_url()
                )),
            )
        })?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::new(ErrorType::Internal, e))?;
        Ok(Self {
            client,
            base_url,
            credential,
            max_retries: config.max_retries(),
            retry_delay: config.retry_delay(),
        })
    }

    fn query_url(&self, data_source_id: &str) -> Result<Url> {
        self.base_url
            .join(&format!("v1/databases/{data_source_id}/query"))
            .map_err(|e| Error::new(ErrorType::Config, e))
    }

    /// Makes one request, classifying whatever goes wrong.
    async fn attempt(
        &self,
        url: &Url,
        body: &serde_json::Value,
    ) -> std::result::Result<Page, Failure> {
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(&self.credential)
            .header("Notion-Version", NOTION_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                Error::new(
                    ErrorType::Network,
                    anyhow::Error::new(e).context("Failed to send query to Notion"),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = if status == StatusCode::TOO_MANY_REQUESTS {
                retry_after(response.headers())
            } else {
                None
            };
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(Failure {
                error: Error::msg(
                    classify(status),
                    format!("Notion query failed with status {status}: {text}"),
                ),
                retry_after,
            });
        }

        let page = response.json::<Page>().await.map_err(|e| {
            let error_type = if e.is_timeout() {
                ErrorType::Network
            } else {
                ErrorType::Remote
            };
            Error::new(
                error_type,
                anyhow::Error::new(e).context("Failed to parse Notion query response"),
            )
        })?;
        Ok(page)
    }
}

/// A failed attempt, with the wait the server asked for when it rate limited us.
struct Failure {
    error: Error,
    retry_after: Option<Duration>,
}

impl From<Error> for Failure {
    fn from(error: Error) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

#[async_trait::async_trait]
impl Source for NotionSource {
    async fn query(&mut self, data_source_id: &str, cursor: Option<&str>) -> Result<Page> {
        let url = self.query_url(data_source_id)?;
        let body = query_body(cursor);
        trace!("POST {url} {body}");

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.attempt(&url, &body).await {
                Ok(page) => return Ok(page),
                Err(f) if f.error.is_transient() && attempt <= self.max_retries => {
                    let delay = f
                        .retry_after
                        .unwrap_or_else(|| backoff(self.retry_delay, attempt));
                    warn!("Attempt {attempt} failed, retrying in {delay:?}: {}", f.error);
                    tokio::time::sleep(delay).await;
                }
                Err(f) => {
                    debug!("Giving up after {attempt} attempt(s)");
                    return Err(f.error);
                }
            }
        }
    }
}

fn query_body(cursor: Option<&str>) -> serde_json::Value {
    let mut body = serde_json::json!({ "page_size": PAGE_SIZE });
    if let Some(cursor) = cursor {
        body["start_cursor"] = cursor.into();
    }
    body
}

/// Maps a failed HTTP status to the kind of error it represents.
fn classify(status: StatusCode) -> ErrorType {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
            ErrorType::Authentication
        }
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => ErrorType::Network,
        s if s.is_server_error() => ErrorType::Network,
        _ => ErrorType::Remote,
    }
}

/// The delay in a `Retry-After` header given in seconds, capped at `MAX_RETRY_AFTER`.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let seconds = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse::<f64>().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(seconds.min(MAX_RETRY_AFTER.as_secs_f64())))
}

/// `base`, doubled for every attempt after the first.
fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Overrides;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_classify() {
        assert_eq!(classify(StatusCode::UNAUTHORIZED), ErrorType::Authentication);
        assert_eq!(classify(StatusCode::NOT_FOUND), ErrorType::Authentication);
        assert_eq!(classify(StatusCode::TOO_MANY_REQUESTS), ErrorType::Network);
        assert_eq!(classify(StatusCode::BAD_GATEWAY), ErrorType::Network);
        assert_eq!(classify(StatusCode::BAD_REQUEST), ErrorType::Remote);
    }

    #[test]
    fn test_backoff() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff(base, 1), Duration::from_millis(100));
        assert_eq!(backoff(base, 2), Duration::from_millis(200));
        assert_eq!(backoff(base, 4), Duration::from_millis(800));
    }

    #[test]
    fn test_query_body() {
        assert_eq!(query_body(None), serde_json::json!({"page_size": 100}));
        assert_eq!(
            query_body(Some("c1")),
            serde_json::json!({"page_size": 100, "start_cursor": "c1"})
        );
    }

    async fn serve(responses: Vec<(u16, String)>) -> (String, Arc<Mutex<Vec<String>>>) {
        serve_with_headers(responses.into_iter().map(|(s, b)| (s, "", b)).collect()).await
    }

    /// Serves one canned HTTP response per connection and records each request. The middle
    /// element of each response holds extra header lines, each ending in `\r\n`.
    async fn serve_with_headers(
        responses: Vec<(u16, &'static str, String)>,
    ) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        tokio::spawn(async move {
            for (status, headers, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                log.lock().unwrap().push(request);
                let response = format!(
                    "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\n{headers}\
                    content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });
        (format!("http://{addr}/"), seen)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.eq_ignore_ascii_case("content-length")
                            .then(|| v.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    async fn source_for(base_url: &str, dir: &TempDir) -> NotionSource {
        source_with_delay(base_url, dir, 1).await
    }

    async fn source_with_delay(base_url: &str, dir: &TempDir, retry_delay_ms: u64) -> NotionSource {
        let json = format!(
            r#"{{"app_name":"finanzas","config_version":1,"api_base_url":"{base_url}",
            "retry_delay_ms":{retry_delay_ms},"max_retries":2,"request_timeout_secs":5}}"#
        );
        std::fs::write(dir.path().join("config.json"), json).unwrap();
        let overrides = Overrides {
            token: Some("secret_xyz".into()),
            database_id: Some("db1".into()),
        };
        let config = Config::load(dir.path(), overrides).await.unwrap();
        NotionSource::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_query_sends_auth_and_cursor() {
        let body =
            r#"{"object":"list","results":[{"id":"p1"}],"has_more":false,"next_cursor":null}"#;
        let (url, seen) = serve(vec![(200, body.to_string())]).await;
        let dir = TempDir::new().unwrap();
        let mut source = source_for(&url, &dir).await;

        let page = source.query("db1", Some("c1")).await.unwrap();
        assert_eq!(page.results.len(), 1);
        assert!(!page.has_more);

        let requests = seen.lock().unwrap();
        let request = requests[0].to_lowercase();
        assert!(request.starts_with("post /v1/databases/db1/query"), "{request}");
        assert!(request.contains("authorization: bearer secret_xyz"), "{request}");
        assert!(request.contains("notion-version: 2022-06-28"), "{request}");
        assert!(request.contains(r#""start_cursor":"c1""#), "{request}");
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let (url, seen) = serve(vec![(401, r#"{"code":"unauthorized"}"#.into())]).await;
        let dir = TempDir::new().unwrap();
        let mut source = source_for(&url, &dir).await;

        let err = source.query("db1", None).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Authentication);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let ok = r#"{"results":[],"has_more":false}"#;
        let (url, seen) = serve(vec![
            (503, "{}".into()),
            (429, "{}".into()),
            (200, ok.into()),
        ])
        .await;
        let dir = TempDir::new().unwrap();
        let mut source = source_for(&url, &dir).await;

        let page = source.query("db1", None).await.unwrap();
        assert!(page.results.is_empty());
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_waits_as_told() {
        let ok = r#"{"results":[],"has_more":false}"#;
        let (url, seen) = serve_with_headers(vec![
            (429, "retry-after: 0\r\n", "{}".into()),
            (200, "", ok.into()),
        ])
        .await;
        let dir = TempDir::new().unwrap();
        // Backing off on the configured schedule would take a minute.
        let mut source = source_with_delay(&url, &dir, 60_000).await;

        let page = tokio::time::timeout(Duration::from_secs(10), source.query("db1", None))
            .await
            .expect("the Retry-After delay was not used")
            .unwrap();
        assert!(page.results.is_empty());
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert(RETRY_AFTER, "2".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(2)));
        headers.insert(RETRY_AFTER, "0.5".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(Duration::from_millis(500)));
        headers.insert(RETRY_AFTER, "86400".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(MAX_RETRY_AFTER));
        headers.insert(RETRY_AFTER, "Wed, 21 Oct 2026 07:28:00 GMT".parse().unwrap());
        assert_eq!(retry_after(&headers), None);
        headers.insert(RETRY_AFTER, "-3".parse().unwrap());
        assert_eq!(retry_after(&headers), None);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let (url, seen) = serve(vec![
            (500, "{}".into()),
            (500, "{}".into()),
            (500, "{}".into()),
        ])
        .await;
        let dir = TempDir::new().unwrap();
        let mut source = source_for(&url, &dir).await;

        let err = source.query("db1", None).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Network);
        // One attempt plus max_retries (2).
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unreachable_is_network_error() {
        // Bind and drop so that nothing is listening on the port.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);
        let dir = TempDir::new().unwrap();
        let mut source = source_for(&url, &dir).await;

        let err = source.query("db1", None).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Network);
    }

    #[tokio::test]
    async fn test_missing_credential() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path(), Overrides::default()).await.unwrap();
        let err = NotionSource::new(&config).err().unwrap();
        assert_eq!(err.error_type(), ErrorType::Config);
    }
}
