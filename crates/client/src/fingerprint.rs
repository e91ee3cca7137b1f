//! Memoized URL → content fingerprint resolution.
//!
//! The resolver consults the fingerprint cache first and only fetches on a
//! miss. Concurrent callers for the same URL share one in-flight fetch, so a
//! feed listing a link twice costs a single request.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OnceCell;

use crate::fetch::Fetcher;
use crate::workers::map_bounded;
use feedsift_core::FingerprintMode;
use feedsift_core::StringCache;
use feedsift_core::cache::hash::{content_fingerprint, url_fingerprint};

type Inflight = Arc<OnceCell<Option<String>>>;

/// Resolves fingerprints for item URLs through a shared cache.
pub struct FingerprintResolver {
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<dyn StringCache>,
    mode: FingerprintMode,
    inflight: Mutex<HashMap<String, Inflight>>,
}

impl FingerprintResolver {
    pub fn new(fetcher: Arc<dyn Fetcher>, cache: Arc<dyn StringCache>, mode: FingerprintMode) -> Self {
        Self { fetcher, cache, mode, inflight: Mutex::new(HashMap::new()) }
    }

    /// Fingerprint of `url`, or `None` when its content could not be fetched.
    ///
    /// Fetch failures are logged and never cached, so a later run retries.
    pub async fn resolve(&self, url: &str) -> Option<String> {
        if self.mode == FingerprintMode::Url {
            return Some(url_fingerprint(url));
        }

        if let Some(hit) = self.cache.get(url) {
            tracing::trace!(url, "fingerprint cache hit");
            return Some(hit);
        }

        let cell = {
            let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(inflight.entry(url.to_string()).or_default())
        };

        cell.get_or_init(|| self.fetch_fingerprint(url)).await.clone()
    }

    async fn fetch_fingerprint(&self, url: &str) -> Option<String> {
        match self.fetcher.fetch(url).await {
            Ok(response) => {
                let fingerprint = content_fingerprint(&response.bytes);
                self.cache.set(url, fingerprint.clone());
                tracing::debug!(url, fingerprint = %fingerprint, "fingerprinted");
                Some(fingerprint)
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "fingerprint fetch failed");
                None
            }
        }
    }

    /// Resolve every URL with at most `max_concurrency` fetches in flight.
    ///
    /// The result is index-aligned with `urls`.
    pub async fn resolve_all(self: &Arc<Self>, urls: Vec<String>, max_concurrency: usize) -> Vec<Option<String>> {
        map_bounded(urls, max_concurrency, |url| {
            let resolver = Arc::clone(self);
            async move { resolver.resolve(&url).await }
        })
        .await
        .into_iter()
        .map(Option::flatten)
        .collect()
    }
}
