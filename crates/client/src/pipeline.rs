//! One feed run, end to end.
//!
//! Every cache is loaded before any work starts and saved after all of it
//! finishes. In between: fingerprint every item, classify against the three
//! dedup tiers, then enrich the survivors. Per-item failures degrade that
//! item only; a cache that cannot be loaded or saved fails the run.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::embed::{EmbedResult, EmbedSource, EnrichmentPipeline};
use crate::fetch::{FetchClient, FetchConfig, Fetcher};
use crate::fingerprint::FingerprintResolver;
use feedsift_core::{
    AppConfig, Classification, DedupReport, Error, Feed, FeedIdentity, FeedItem, SnapshotStore, StringCache,
};

/// A surviving item with its rendered link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedItem {
    #[serde(flatten)]
    pub item: FeedItem,
    pub fingerprint: Option<String>,
    pub classification: Classification,
    pub embed: EmbedResult,
    pub embed_source: EmbedSource,
}

/// Per-embed-source counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmbedReport {
    pub cached: usize,
    pub resolved: usize,
    pub fallback: usize,
}

/// Summary of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub identity: String,
    pub nsfw_skipped: usize,
    pub dedup: DedupReport,
    pub embeds: EmbedReport,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub items: Vec<EnrichedItem>,
    pub report: RunReport,
}

/// Drives feed runs against one snapshot directory.
pub struct FeedRunner {
    config: AppConfig,
    store: SnapshotStore,
    fetcher: Arc<dyn Fetcher>,
}

impl FeedRunner {
    pub fn new(config: AppConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let store = SnapshotStore::from_config(&config);
        Self { config, store, fetcher }
    }

    /// Runner backed by a real HTTP client built from `config`.
    pub fn from_config(config: AppConfig) -> Result<Self, Error> {
        let fetcher = FetchClient::new(FetchConfig::from(&config))?;
        Ok(Self::new(config, Arc::new(fetcher)))
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Fingerprint, deduplicate and enrich `feed` under `tag`.
    pub async fn run(&self, feed: Feed, tag: &str) -> Result<RunOutput, Error> {
        let identity = FeedIdentity::new(tag, &feed.link)?;
        let total = feed.items.len();
        let feed = feed.without_nsfw();
        let nsfw_skipped = total - feed.items.len();

        let fingerprints = Arc::new(self.store.load_fingerprints()?);
        let embeds = Arc::new(self.store.load_embeds()?);
        let tiers = self.store.load_tiers(&identity)?;

        tracing::info!(
            identity = %identity,
            items = feed.items.len(),
            fingerprints = fingerprints.cache().len(),
            embeds = embeds.cache().len(),
            "run started"
        );

        let concurrency = self.config.max_concurrency;

        let fingerprint_cache: Arc<dyn StringCache> = fingerprints.clone();
        let resolver = Arc::new(FingerprintResolver::new(
            Arc::clone(&self.fetcher),
            fingerprint_cache,
            self.config.fingerprint_mode,
        ));
        let urls = feed.items.iter().map(|item| item.url.clone()).collect();
        let hashes = resolver.resolve_all(urls, concurrency).await;

        let (survivors, dedup) = {
            let mut engine = tiers.engine();
            let survivors = engine.classify(feed.items, hashes);
            (survivors, engine.report())
        };

        let embed_cache: Arc<dyn StringCache> = embeds.clone();
        let enrichment = Arc::new(EnrichmentPipeline::new(
            Arc::clone(&self.fetcher),
            embed_cache,
            self.config.embed.clone(),
        ));
        let urls = survivors.iter().map(|s| s.item.url.clone()).collect();
        let resolutions = enrichment.resolve_all(urls, concurrency).await;

        fingerprints.save()?;
        embeds.save()?;
        tiers.save()?;

        let mut embed_report = EmbedReport::default();
        let items: Vec<EnrichedItem> = survivors
            .into_iter()
            .zip(resolutions)
            .map(|(survivor, resolution)| {
                match resolution.source {
                    EmbedSource::Cache => embed_report.cached += 1,
                    EmbedSource::Strategy => embed_report.resolved += 1,
                    EmbedSource::Fallback => embed_report.fallback += 1,
                }
                EnrichedItem {
                    item: survivor.item,
                    fingerprint: survivor.fingerprint,
                    classification: survivor.classification,
                    embed: resolution.result,
                    embed_source: resolution.source,
                }
            })
            .collect();

        let report = RunReport {
            identity: identity.to_string(),
            nsfw_skipped,
            dedup,
            embeds: embed_report,
            finished_at: Utc::now(),
        };

        tracing::info!(
            identity = %identity,
            kept = items.len(),
            new = dedup.new,
            recent = dedup.recent,
            stale = dedup.stale,
            in_batch = dedup.in_batch,
            unresolved = dedup.unresolved,
            fallbacks = embed_report.fallback,
            "run finished"
        );

        Ok(RunOutput { items, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::markup;
    use crate::testing::MockFetcher;
    use chrono::TimeZone;
    use feedsift_core::cache::PersistentCache;
    use feedsift_core::dedup::Tier;
    use std::collections::BTreeSet;
    use std::path::Path;
    use tempfile::TempDir;

    const IMAGE: &str = "https://i.example.com/a.png";
    const MIRROR: &str = "https://mirror.example.com/a";
    const ARTICLE: &str = "https://blog.example.com/posts/b";
    const GONE: &str = "https://blog.example.com/gone";

    fn item(url: &str, minute: u32) -> FeedItem {
        FeedItem {
            url: url.to_string(),
            title: format!("item {minute}"),
            published_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
            nsfw: false,
        }
    }

    fn feed() -> Feed {
        Feed {
            link: "https://www.reddit.com/r/pics".to_string(),
            items: vec![item(IMAGE, 0), item(ARTICLE, 1), item(MIRROR, 2), item(GONE, 3)],
        }
    }

    fn fetcher() -> Arc<MockFetcher> {
        Arc::new(
            MockFetcher::new()
                .with(IMAGE, "image/png", "same-bytes")
                .with(MIRROR, "text/html", "same-bytes")
                .with(ARTICLE, "text/html", "<p>article</p>"),
        )
    }

    fn runner(dir: &Path, fetcher: Arc<MockFetcher>) -> FeedRunner {
        let config = AppConfig { cache_dir: dir.to_path_buf(), max_concurrency: 3, ..Default::default() };
        FeedRunner::new(config, fetcher)
    }

    fn tier_keys(store: &SnapshotStore, tier: Tier) -> BTreeSet<String> {
        let identity = FeedIdentity::new("test", "https://www.reddit.com/r/pics").unwrap();
        let path = store.tier_path(&identity, tier).unwrap();
        PersistentCache::load("check", path, u64::MAX)
            .unwrap()
            .cache()
            .items()
            .into_iter()
            .map(|(k, _)| k)
            .collect()
    }

    #[tokio::test]
    async fn test_first_run_classifies_and_enriches() {
        let dir = TempDir::new().unwrap();
        let runner = runner(dir.path(), fetcher());

        let out = runner.run(feed(), "test").await.unwrap();

        let dedup = out.report.dedup;
        assert_eq!((dedup.new, dedup.recent, dedup.stale, dedup.in_batch, dedup.unresolved), (2, 0, 0, 1, 1));

        let urls: Vec<&str> = out.items.iter().map(|i| i.item.url.as_str()).collect();
        assert_eq!(urls, vec![IMAGE, ARTICLE, GONE]);

        assert_eq!(out.items[0].classification, Classification::New);
        assert_eq!(out.items[0].embed.html, markup::image(IMAGE));
        assert_eq!(out.items[1].embed_source, EmbedSource::Fallback);
        assert_eq!(out.items[2].classification, Classification::Unresolved);
        assert!(out.items[2].fingerprint.is_none());
        assert_eq!(out.report.embeds, EmbedReport { cached: 0, resolved: 1, fallback: 2 });

        assert!(runner.store().fingerprint_path().exists());
        assert!(runner.store().embed_path().exists());
        assert_eq!(tier_keys(runner.store(), Tier::AllTime).len(), 2);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher();

        runner(dir.path(), fetcher.clone()).run(feed(), "test").await.unwrap();
        let config = AppConfig { cache_dir: dir.path().to_path_buf(), ..Default::default() };
        let store = SnapshotStore::from_config(&config);
        let recent_before = tier_keys(&store, Tier::Recent);
        let all_time_before = tier_keys(&store, Tier::AllTime);

        let out = runner(dir.path(), fetcher.clone()).run(feed(), "test").await.unwrap();

        assert_eq!(out.report.dedup.new, 0);
        assert!(
            out.items
                .iter()
                .all(|i| matches!(i.classification, Classification::Recent | Classification::Unresolved))
        );
        assert_eq!(tier_keys(&store, Tier::Recent), recent_before);
        assert_eq!(tier_keys(&store, Tier::AllTime), all_time_before);

        // Fingerprints and the image embed came from snapshots.
        assert_eq!(fetcher.fetch_count(IMAGE), 1);
        assert_eq!(fetcher.probe_count(IMAGE), 1);
        assert_eq!(out.report.embeds.cached, 1);
    }

    #[tokio::test]
    async fn test_nsfw_items_never_fetched() {
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher();
        let mut feed = feed();
        feed.items[1].nsfw = true;

        let out = runner(dir.path(), fetcher.clone()).run(feed, "test").await.unwrap();

        assert_eq!(out.report.nsfw_skipped, 1);
        assert_eq!(fetcher.fetch_count(ARTICLE), 0);
        assert!(out.items.iter().all(|i| i.item.url != ARTICLE));
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_fails_before_fetching() {
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher();
        let runner = runner(dir.path(), fetcher.clone());
        std::fs::write(runner.store().fingerprint_path(), b"garbage").unwrap();

        let err = runner.run(feed(), "test").await.unwrap_err();

        assert!(matches!(err, Error::CacheLoad { .. }));
        assert!(err.is_fatal());
        assert_eq!(fetcher.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_unwritable_snapshot_fails_run() {
        let dir = TempDir::new().unwrap();
        let runner = runner(dir.path(), fetcher());

        // A directory squatting on the temp path makes the embed save fail.
        let mut blocker = runner.store().embed_path().into_os_string();
        blocker.push(".tmp");
        std::fs::create_dir_all(&blocker).unwrap();

        let err = runner.run(feed(), "test").await.unwrap_err();

        assert!(matches!(err, Error::CacheSave { ref cache, .. } if cache == "embeds"));
        assert!(err.is_fatal());
        assert!(!runner.store().embed_path().exists());

        let identity = FeedIdentity::new("test", "https://www.reddit.com/r/pics").unwrap();
        assert!(!runner.store().tier_path(&identity, Tier::AllTime).unwrap().exists());
    }

    #[tokio::test]
    async fn test_invalid_tag_rejected() {
        let dir = TempDir::new().unwrap();
        let err = runner(dir.path(), fetcher()).run(feed(), "../etc").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_tags_keep_separate_history() {
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher();

        runner(dir.path(), fetcher.clone()).run(feed(), "morning").await.unwrap();
        let out = runner(dir.path(), fetcher).run(feed(), "evening").await.unwrap();

        assert_eq!(out.report.dedup.new, 2);
    }
}
