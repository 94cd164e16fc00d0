//! HTTP client for the shortener REST API.

use crate::config::ClientConfig;
use crate::models::{
    AccessLog, LastAccessResponse, ShortenRequest, ShortenedLink, ShortenerEnvelope,
    TopAgentsResponse, UniqueIpsResponse,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("URL cannot be empty")]
    EmptyUrl,

    #[error("Invalid API URL: {0}")]
    InvalidBaseUrl(String),
}

/// Sent with every request, so client visits show up in the insights.
pub const USER_AGENT: &str = concat!("urlsh/", env!("CARGO_PKG_VERSION"));

pub type ClientResult<T> = Result<T, ClientError>;

/// Operations of the shortener API used by the view-models.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShortenerApi: Send + Sync {
    /// Create a short link
    async fn shorten(&self, request: ShortenRequest) -> ClientResult<ShortenedLink>;

    /// Current snapshot of a link
    async fn get_stats(&self, short_code: &str) -> ClientResult<ShortenedLink>;

    /// Look a link up by short URL or short code
    async fn find(&self, query: &str) -> ClientResult<ShortenedLink>;

    /// Count a visit without following the redirect
    async fn record_visit(&self, short_code: &str) -> ClientResult<()>;

    async fn last_access(&self, query: &str) -> ClientResult<Option<AccessLog>>;

    async fn top_agents(&self, query: &str) -> ClientResult<Vec<String>>;

    async fn unique_ips(&self, query: &str) -> ClientResult<Vec<String>>;
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// reqwest-backed [`ShortenerApi`].
///
/// Holds no state between requests beyond the connection pool.
#[derive(Clone)]
pub struct UrlShortenerClient {
    http: Client,
    base_url: Url,
}

impl UrlShortenerClient {
    pub fn new(api_url: &str, timeout: Duration) -> ClientResult<Self> {
        let base_url =
            Url::parse(api_url).map_err(|e| ClientError::InvalidBaseUrl(format!("{}: {}", api_url, e)))?;

        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(api_url.to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { http, base_url })
    }

    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        Self::new(&config.api_url, Duration::from_secs(config.timeout_seconds))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute endpoint URL; each segment is percent-encoded.
    fn endpoint(&self, segments: &[&str], query: Option<&str>) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ClientError::InvalidBaseUrl(self.base_url.to_string()))?;
            path.pop_if_empty();
            path.extend(segments);
        }

        if let Some(q) = query {
            url.query_pairs_mut().append_pair("q", q);
        }

        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str], query: Option<&str>) -> ClientResult<RequestBuilder> {
        let url = self.endpoint(segments, query)?;
        tracing::debug!(%method, %url, "API request");
        Ok(self.http.request(method, url))
    }

    async fn send(builder: RequestBuilder) -> ClientResult<Response> {
        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });

        tracing::warn!(status = status.as_u16(), %message, "API request failed");

        Err(ClientError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str], query: Option<&str>) -> ClientResult<T> {
        let response = Self::send(self.request(Method::GET, segments, query)?).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ShortenerApi for UrlShortenerClient {
    async fn shorten(&self, request: ShortenRequest) -> ClientResult<ShortenedLink> {
        if request.url.trim().is_empty() {
            return Err(ClientError::EmptyUrl);
        }

        let builder = self.request(Method::POST, &["v1", "shorten"], None)?.json(&request);
        let envelope: ShortenerEnvelope = Self::send(builder).await?.json().await?;
        Ok(envelope.shortener)
    }

    async fn get_stats(&self, short_code: &str) -> ClientResult<ShortenedLink> {
        let envelope: ShortenerEnvelope = self.get_json(&["v1", "shorten", short_code], None).await?;
        Ok(envelope.shortener)
    }

    async fn find(&self, query: &str) -> ClientResult<ShortenedLink> {
        let envelope: ShortenerEnvelope = self.get_json(&["v1", "shorten", "find"], Some(query)).await?;
        Ok(envelope.shortener)
    }

    async fn record_visit(&self, short_code: &str) -> ClientResult<()> {
        Self::send(self.request(Method::PUT, &["v1", "shorten", short_code], None)?).await?;
        Ok(())
    }

    async fn last_access(&self, query: &str) -> ClientResult<Option<AccessLog>> {
        let body: LastAccessResponse = self.get_json(&["v1", "shorten", "last"], Some(query)).await?;
        Ok(body.last_accessed)
    }

    async fn top_agents(&self, query: &str) -> ClientResult<Vec<String>> {
        let body: TopAgentsResponse = self
            .get_json(&["v1", "shorten", "top-agents"], Some(query))
            .await?;
        Ok(body.top_user_agents)
    }

    async fn unique_ips(&self, query: &str) -> ClientResult<Vec<String>> {
        let body: UniqueIpsResponse = self.get_json(&["v1", "shorten", "ips"], Some(query)).await?;
        Ok(body.unique_ips)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> UrlShortenerClient {
        UrlShortenerClient::new(base, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_endpoint_percent_encodes_segments_and_query() {
        let client = client("http://localhost:8090");

        let url = client.endpoint(&["v1", "shorten", "a b/c"], None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8090/v1/shorten/a%20b%2Fc");

        let url = client
            .endpoint(&["v1", "shorten", "find"], Some("http://localhost:8090/abc?x=1&y"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8090/v1/shorten/find?q=http%3A%2F%2Flocalhost%3A8090%2Fabc%3Fx%3D1%26y"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = client("https://api.example.com/shortener/");
        let url = client.endpoint(&["v1", "shorten"], None).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/shortener/v1/shorten");
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(matches!(
            UrlShortenerClient::new("not a url", Duration::from_secs(1)),
            Err(ClientError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            UrlShortenerClient::new("mailto:someone@example.com", Duration::from_secs(1)),
            Err(ClientError::InvalidBaseUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_url_is_rejected_without_network() {
        // Nothing listens on port 9; reaching the network would yield Http
        let client = client("http://127.0.0.1:9");

        let result = client.shorten(ShortenRequest::new("   ")).await;
        assert!(matches!(result, Err(ClientError::EmptyUrl)));
    }
}
