use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{HeaderValue, ACCEPT, RANGE};
use thiserror::Error;

pub const DEFAULT_USER_AGENT: &str = concat!("tunefeed/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_BYTES: usize = 10 * 1024 * 1024; // 10MB

/// Browser-like Accept header; some hosts refuse requests that do not ask for XML.
const FEED_ACCEPT: &str =
    "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.8, */*;q=0.5";

/// Errors that can occur while retrieving a feed document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP response with a non-2xx status code
    #[error("HTTP error: status {status} for {url}")]
    Status { status: u16, url: String },
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// Request exceeded the configured timeout
    #[error("Request to {url} timed out")]
    Timeout { url: String },
    /// Response body exceeded the size limit
    #[error("Response from {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },
    /// Received fewer bytes than Content-Length announced
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    Incomplete { expected: u64, received: usize },
    /// The HTTP client itself could not be built
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    /// Failure class reported in ingestion failures.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Status { .. } => "http_status",
            FetchError::Network { .. }
            | FetchError::Timeout { .. }
            | FetchError::Incomplete { .. }
            | FetchError::Client(_) => "network",
            FetchError::TooLarge { .. } => "too_large",
        }
    }
}

/// Settings for [`FeedFetcher`].
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub max_bytes: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

/// HTTP retrieval of raw feed documents.
///
/// A single attempt per call: the caller decides what a failure means.
/// Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
}

impl FeedFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            timeout: config.timeout,
            max_bytes: config.max_bytes,
        })
    }

    /// Fetch the full document at `url`.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Status`] - Non-2xx HTTP response
    /// - [`FetchError::Network`] - Connection, DNS or TLS errors
    /// - [`FetchError::Timeout`] - Request exceeded the configured timeout
    /// - [`FetchError::TooLarge`] - Body exceeded the size limit
    /// - [`FetchError::Incomplete`] - Body shorter than Content-Length
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.fetch_range(url, None).await
    }

    /// Fetch with an optional `Range` header passed through verbatim.
    /// A `206 Partial Content` answer counts as success.
    pub async fn fetch_range(&self, url: &str, range: Option<&str>) -> Result<Vec<u8>, FetchError> {
        tokio::time::timeout(self.timeout, self.fetch_once(url, range))
            .await
            .map_err(|_| FetchError::Timeout { url: url.to_string() })?
    }

    async fn fetch_once(&self, url: &str, range: Option<&str>) -> Result<Vec<u8>, FetchError> {
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, HeaderValue::from_static(FEED_ACCEPT));
        if let Some(range) = range {
            request = request.header(RANGE, range);
        }

        let response = request.send().await.map_err(|e| network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = read_limited_bytes(response, url, self.max_bytes).await?;
        tracing::debug!(url = %url, status = status.as_u16(), bytes = bytes.len(), "Fetched feed");
        Ok(bytes)
    }
}

fn network(url: &str, source: reqwest::Error) -> FetchError {
    if source.is_timeout() {
        FetchError::Timeout { url: url.to_string() }
    } else {
        FetchError::Network {
            url: url.to_string(),
            source,
        }
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    url: &str,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let too_large = || FetchError::TooLarge {
        url: url.to_string(),
        limit,
    };
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(too_large());
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| network(url, e))?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(too_large());
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::Incomplete {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
