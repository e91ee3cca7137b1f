//! Link enrichment: turn an item's link into embeddable markup.
//!
//! Strategies are tried in a fixed order and the first one that produces
//! non-empty markup wins:
//!
//! 1. direct image (content type probe)
//! 2. the same link with `.png` appended
//! 3. imgur gallery pages with the `/gallery` segment stripped
//! 4. quickmeme page scrape
//! 5. reddit self posts, with linked images inlined
//! 6. oEmbed providers, then Embedly when a key is configured
//!
//! Results are memoized in the embed cache under a key that also encodes
//! the rendering options. When nothing matches the item still gets a plain
//! link, which is never cached.

pub mod image;
pub mod markup;
pub mod oembed;
pub mod selfpost;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::fetch::Fetcher;
use crate::workers::map_bounded;
use feedsift_core::cache::hash::embed_cache_key;
use feedsift_core::{EmbedConfig, Error, StringCache};

pub use image::{DirectImage, ExtensionlessImage, ImgurGallery, Quickmeme};
pub use oembed::OembedProvider;
pub use selfpost::RedditSelfPost;

/// Renderable markup for a link.
///
/// `url` is the resource the markup shows, which may differ from the item
/// link (an image behind a meme page, an oEmbed photo URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedResult {
    pub url: String,
    pub html: String,
}

/// What a single strategy made of a link.
#[derive(Debug)]
pub enum Outcome {
    Matched(EmbedResult),
    /// The link is not something this strategy handles.
    NotApplicable,
    /// The strategy applied but its request or parse failed.
    Failed(Error),
}

/// One way of rendering a link.
#[async_trait]
pub trait EmbedStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn resolve(&self, url: &str) -> Outcome;
}

/// Run `strategies` in order and return the first non-empty match.
pub async fn first_match(strategies: &[Arc<dyn EmbedStrategy>], url: &str) -> Option<EmbedResult> {
    for strategy in strategies {
        match strategy.resolve(url).await {
            Outcome::Matched(result) if !result.html.trim().is_empty() => {
                tracing::debug!(url, strategy = strategy.name(), "embed matched");
                return Some(result);
            }
            Outcome::Matched(_) => {
                tracing::debug!(url, strategy = strategy.name(), "embed matched with empty markup");
            }
            Outcome::NotApplicable => {
                tracing::trace!(url, strategy = strategy.name(), "embed not applicable");
            }
            Outcome::Failed(e) => {
                tracing::warn!(url, strategy = strategy.name(), error = %e, "embed strategy failed");
            }
        }
    }
    None
}

/// Where a resolved embed came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedSource {
    Cache,
    Strategy,
    Fallback,
}

/// A resolved embed and its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub result: EmbedResult,
    pub source: EmbedSource,
}

/// Ordered strategy chain with a memoizing cache in front.
pub struct EnrichmentPipeline {
    strategies: Vec<Arc<dyn EmbedStrategy>>,
    cache: Arc<dyn StringCache>,
    config: EmbedConfig,
}

impl EnrichmentPipeline {
    /// The standard chain, all strategies sharing `fetcher`.
    pub fn new(fetcher: Arc<dyn Fetcher>, cache: Arc<dyn StringCache>, config: EmbedConfig) -> Self {
        let strategies = standard_strategies(&fetcher, &config);
        Self::with_strategies(strategies, cache, config)
    }

    pub fn with_strategies(
        strategies: Vec<Arc<dyn EmbedStrategy>>, cache: Arc<dyn StringCache>, config: EmbedConfig,
    ) -> Self {
        Self { strategies, cache, config }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Markup for `url`. Always yields something: the plain-link fallback
    /// when every strategy declines.
    pub async fn resolve(&self, url: &str) -> Resolution {
        let key = embed_cache_key(url, &self.config);

        if let Some(packed) = self.cache.get(&key) {
            match serde_json::from_str::<EmbedResult>(&packed) {
                Ok(result) => return Resolution { result, source: EmbedSource::Cache },
                Err(e) => tracing::warn!(url, error = %e, "discarding undecodable cached embed"),
            }
        }

        match first_match(&self.strategies, url).await {
            Some(result) => {
                match serde_json::to_string(&result) {
                    Ok(packed) => self.cache.set(&key, packed),
                    Err(e) => tracing::warn!(url, error = %e, "embed not cached"),
                }
                Resolution { result, source: EmbedSource::Strategy }
            }
            None => {
                tracing::info!(url, "no embed strategy matched, using plain link");
                Resolution { result: fallback(url), source: EmbedSource::Fallback }
            }
        }
    }

    /// Resolve every URL with at most `max_concurrency` in flight, in input
    /// order.
    pub async fn resolve_all(self: &Arc<Self>, urls: Vec<String>, max_concurrency: usize) -> Vec<Resolution> {
        let resolved = map_bounded(urls.clone(), max_concurrency, |url| {
            let pipeline = Arc::clone(self);
            async move { pipeline.resolve(&url).await }
        })
        .await;

        resolved
            .into_iter()
            .zip(urls)
            .map(|(resolution, url)| {
                resolution.unwrap_or_else(|| Resolution { result: fallback(&url), source: EmbedSource::Fallback })
            })
            .collect()
    }
}

/// Plain-link markup for `url`.
pub fn fallback(url: &str) -> EmbedResult {
    EmbedResult { url: url.to_string(), html: markup::link(url) }
}

/// The image strategies, in order.
pub fn image_strategies(fetcher: &Arc<dyn Fetcher>) -> Vec<Arc<dyn EmbedStrategy>> {
    vec![
        Arc::new(DirectImage::new(Arc::clone(fetcher))),
        Arc::new(ExtensionlessImage::new(Arc::clone(fetcher))),
        Arc::new(ImgurGallery::new(Arc::clone(fetcher))),
        Arc::new(Quickmeme::new(Arc::clone(fetcher))),
    ]
}

/// The full chain: images, self posts, then oEmbed providers.
pub fn standard_strategies(fetcher: &Arc<dyn Fetcher>, config: &EmbedConfig) -> Vec<Arc<dyn EmbedStrategy>> {
    let images = image_strategies(fetcher);
    let mut strategies = images.clone();
    strategies.push(Arc::new(RedditSelfPost::new(Arc::clone(fetcher), images)));
    for provider in OembedProvider::standard(fetcher, config) {
        strategies.push(Arc::new(provider));
    }
    strategies
}
