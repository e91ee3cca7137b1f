//! Unified error types for feedsift.
//!
//! Cache load/save failures are fatal to a run. Everything else describes a
//! single item's degradation and is absorbed by the worker that produced it.

use std::path::PathBuf;

/// Unified error types for the feedsift pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A snapshot exists but could not be decoded.
    #[error("CACHE_LOAD_FAILED: {cache} cache at {}: {reason}", .path.display())]
    CacheLoad { cache: String, path: PathBuf, reason: String },

    /// A snapshot could not be written back to disk.
    #[error("CACHE_SAVE_FAILED: {cache} cache at {}: {reason}", .path.display())]
    CacheSave { cache: String, path: PathBuf, reason: String },

    /// Invalid input parameters (e.g., an empty feed link).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// SSRF blocked - private/internal address not allowed.
    #[error("SSRF_BLOCKED: {0}")]
    SsrfBlocked(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// HTTP error response or network failure.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Malformed upstream payload (oEmbed JSON, scraped HTML, cached value).
    #[error("DECODE_FAILED: {0}")]
    Decode(String),
}

impl Error {
    /// Whether this error must abort the whole run.
    ///
    /// Losing a snapshot would silently discard dedup history, so load and
    /// save failures are the only fatal kinds.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::CacheLoad { .. } | Error::CacheSave { .. })
    }
}
