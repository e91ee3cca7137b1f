//! HTTP fetch collaborator with timeouts and a private-address guard.
//!
//! ### URL handling
//! - Trim whitespace, require `http`/`https`, drop fragments
//!
//! ### Safety gates
//! - Resolve the host and refuse private/reserved addresses (configurable)
//! - Redirect targets are re-checked before each hop
//! - Max redirects: 5 (configurable)
//! - Max body bytes: 5MB (configurable), enforced while streaming
//! - The timeout covers the host lookup as well as the request
//!
//! Both the fingerprint resolver and the embedding strategies go through the
//! [`Fetcher`] trait, so tests can swap the network for a canned responder.

pub mod ssrf;
pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use reqwest::{Client, StatusCode, header};
use std::future::Future;
use std::time::{Duration, Instant};

pub use self::ssrf::{SsrfError, check_host, check_literal_host, validate_ip};
pub use self::url::{UrlError, parse_fetch_url};

use feedsift_core::{AppConfig, Error};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "feedsift/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 10s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Refuse hosts resolving to private or reserved addresses (default: true)
    pub block_private_addresses: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "feedsift/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(10_000),
            max_redirects: 5,
            block_private_addresses: true,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
            block_private_addresses: config.block_private_addresses,
        }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes
    pub bytes: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Network access used by fingerprinting and enrichment.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url` and return its body.
    async fn fetch(&self, url: &str) -> Result<FetchResponse, Error>;

    /// Content type of `url` without downloading the body where possible.
    async fn content_type(&self, url: &str) -> Result<Option<String>, Error>;
}

/// Why a redirect hop was refused.
#[derive(Debug, thiserror::Error)]
pub enum RedirectError {
    #[error("more than {0} redirects")]
    TooMany(usize),

    #[error(transparent)]
    Blocked(#[from] SsrfError),
}

/// Decide whether to follow a redirect to `target` after `hops` requests.
pub fn vet_redirect(target: &Url, hops: usize, max_redirects: usize, block_private: bool) -> Result<(), RedirectError> {
    if hops > max_redirects {
        return Err(RedirectError::TooMany(max_redirects));
    }
    if block_private {
        check_literal_host(target)?;
    }
    Ok(())
}

fn redirect_policy(config: &FetchConfig) -> reqwest::redirect::Policy {
    let max_redirects = config.max_redirects;
    let block_private = config.block_private_addresses;
    reqwest::redirect::Policy::custom(move |attempt| {
        let verdict = vet_redirect(attempt.url(), attempt.previous().len(), max_redirects, block_private);
        match verdict {
            Ok(()) => attempt.follow(),
            Err(e) => {
                tracing::debug!("refusing redirect to {}: {}", attempt.url(), e);
                attempt.error(e)
            }
        }
    })
}

/// Run `fut` under `limit`, reporting expiry as a timeout on `url`.
async fn within<T>(limit: Duration, url: &Url, fut: impl Future<Output = T>) -> Result<T, Error> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Error::FetchTimeout(format!("{} after {:?}", url, limit)))
}

/// Append `chunk` to `body` unless that would pass `max_bytes`.
fn append_capped(body: &mut Vec<u8>, chunk: &[u8], max_bytes: usize) -> Result<(), Error> {
    let len = body.len() + chunk.len();
    if len > max_bytes {
        return Err(Error::FetchTooLarge(format!("more than {} bytes (read {})", max_bytes, len)));
    }
    body.extend_from_slice(chunk);
    Ok(())
}

/// HTTP fetch client with safety checks.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(redirect_policy(&config))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn prepare(&self, url_str: &str) -> Result<Url, Error> {
        let url = parse_fetch_url(url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        if self.config.block_private_addresses {
            within(self.config.timeout, &url, check_host(&url))
                .await?
                .map_err(|e| Error::SsrfBlocked(e.to_string()))?;
        }
        Ok(url)
    }

    fn send_error(&self, url: &Url, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            return Error::FetchTimeout(format!("{} after {:?}", url, self.config.timeout));
        }

        let mut source = std::error::Error::source(&err);
        while let Some(inner) = source {
            if let Some(RedirectError::Blocked(blocked)) = inner.downcast_ref::<RedirectError>() {
                return Error::SsrfBlocked(format!("redirect from {}: {}", url, blocked));
            }
            source = inner.source();
        }

        Error::HttpError(format!("network error: {}", err))
    }

    fn too_large(&self, len: u64) -> Option<Error> {
        (len > self.config.max_bytes as u64)
            .then(|| Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)))
    }
}

fn content_type_of(headers: &header::HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, url_str: &str) -> Result<FetchResponse, Error> {
        let start = Instant::now();
        let url = self.prepare(url_str).await?;

        let mut response = self
            .http
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| self.send_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpError(format!("status {} for {}", status.as_u16(), url)));
        }

        if let Some(err) = response.content_length().and_then(|len| self.too_large(len)) {
            return Err(err);
        }

        let final_url = response.url().clone();
        let content_type = content_type_of(response.headers());

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.send_error(&url, e))? {
            append_capped(&mut body, &chunk, self.config.max_bytes)?;
        }
        let bytes = Bytes::from(body);

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} -> {} in {}ms ({} bytes)",
            url,
            final_url,
            fetch_ms,
            bytes.len()
        );

        Ok(FetchResponse { url, final_url, status, content_type, bytes, fetch_ms })
    }

    async fn content_type(&self, url_str: &str) -> Result<Option<String>, Error> {
        let url = self.prepare(url_str).await?;

        let response = self
            .http
            .head(url.as_str())
            .send()
            .await
            .map_err(|e| self.send_error(&url, e))?;

        let status = response.status();
        if status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_IMPLEMENTED {
            tracing::debug!("HEAD unsupported for {}, falling back to GET", url);
            return self.fetch(url.as_str()).await.map(|r| r.content_type);
        }
        if !status.is_success() {
            return Err(Error::HttpError(format!("status {} for {}", status.as_u16(), url)));
        }

        Ok(content_type_of(response.headers()))
    }
}
