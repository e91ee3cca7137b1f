//! Canned [`Fetcher`] for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use url::Url;

use crate::fetch::{FetchResponse, Fetcher};
use feedsift_core::Error;

#[derive(Clone)]
struct Canned {
    content_type: Option<String>,
    body: Bytes,
}

/// Serves registered URLs and answers 404 for everything else, counting
/// every call per URL.
#[derive(Default)]
pub struct MockFetcher {
    responses: HashMap<String, Canned>,
    delay: Option<Duration>,
    fetches: Mutex<HashMap<String, usize>>,
    probes: Mutex<HashMap<String, usize>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, content_type: &str, body: impl Into<Bytes>) -> Self {
        self.responses.insert(
            url.to_string(),
            Canned { content_type: Some(content_type.to_string()), body: body.into() },
        );
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn probe_count(&self, url: &str) -> usize {
        self.probes.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        let fetches: usize = self.fetches.lock().unwrap().values().sum();
        let probes: usize = self.probes.lock().unwrap().values().sum();
        fetches + probes
    }

    async fn lookup(&self, url: &str) -> Result<Canned, Error> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| Error::HttpError(format!("status 404 for {url}")))
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, Error> {
        *self.fetches.lock().unwrap().entry(url.to_string()).or_default() += 1;
        let canned = self.lookup(url).await?;
        let parsed = Url::parse(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(FetchResponse {
            url: parsed.clone(),
            final_url: parsed,
            status: StatusCode::OK,
            content_type: canned.content_type,
            bytes: canned.body,
            fetch_ms: 0,
        })
    }

    async fn content_type(&self, url: &str) -> Result<Option<String>, Error> {
        *self.probes.lock().unwrap().entry(url.to_string()).or_default() += 1;
        Ok(self.lookup(url).await?.content_type)
    }
}
