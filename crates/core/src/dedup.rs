//! Three-tier fingerprint deduplication.
//!
//! Each feed identity owns two persisted tiers:
//!
//! - `recent`: fingerprints surfaced by the previous runs that are still in
//!   the feed's active window (small capacity)
//! - `all-time`: every fingerprint ever accepted as new (large capacity)
//!
//! A third tier, `in-batch`, lives only for one classification pass and
//! catches an upstream source repeating the same link within a batch.
//!
//! Classification of each fingerprint, in item order:
//!
//! 1. already in `in-batch` → duplicate within this pass, drop
//! 2. in `recent` → still active, keep (tiers are not rewritten)
//! 3. in `all-time` → stale repost, drop
//! 4. otherwise → new, keep and record in all three tiers
//!
//! `recent` is consulted before `all-time` because a fingerprint sits in both
//! while it is active. Items without a fingerprint pass through and are never
//! recorded.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::cache::{PersistentCache, StringCache};
use crate::feed::FeedItem;

static NON_ALPHA: LazyLock<Regex> = LazyLock::new(|| Regex::new("[^a-zA-Z]+").expect("static regex"));

/// Identity selecting which tier snapshots apply to a feed.
///
/// Built from a caller tag plus the feed's canonical link with every run of
/// non-alphabetic characters collapsed to `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedIdentity(String);

impl FeedIdentity {
    pub fn new(tag: &str, link: &str) -> Result<Self, Error> {
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(Error::InvalidInput(format!("tag must be non-empty [A-Za-z0-9_-], got {tag:?}")));
        }
        let normalized = NON_ALPHA.replace_all(link.trim(), "-");
        let normalized = normalized.trim_matches('-');
        if normalized.is_empty() {
            return Err(Error::InvalidInput(format!("feed link has no usable characters: {link:?}")));
        }
        Ok(Self(format!("{tag}-{normalized}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the fingerprint key-spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Recent,
    AllTime,
    InBatch,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Recent => "recent",
            Tier::AllTime => "all-time",
            Tier::InBatch => "in-batch",
        }
    }
}

/// Outcome for a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Never seen; recorded in every tier.
    New,
    /// Surfaced recently and still active.
    Recent,
    /// Seen in an earlier run but no longer recent.
    Stale,
    /// Already accepted earlier in this pass.
    InBatchDuplicate,
    /// No fingerprint could be computed.
    Unresolved,
}

impl Classification {
    /// Whether the item survives pruning.
    pub fn keeps(self) -> bool {
        matches!(self, Classification::New | Classification::Recent | Classification::Unresolved)
    }
}

/// Per-run classification counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupReport {
    pub new: usize,
    pub recent: usize,
    pub stale: usize,
    pub in_batch: usize,
    pub unresolved: usize,
}

impl DedupReport {
    fn record(&mut self, classification: Classification) {
        match classification {
            Classification::New => self.new += 1,
            Classification::Recent => self.recent += 1,
            Classification::Stale => self.stale += 1,
            Classification::InBatchDuplicate => self.in_batch += 1,
            Classification::Unresolved => self.unresolved += 1,
        }
    }

    pub fn survivors(&self) -> usize {
        self.new + self.recent + self.unresolved
    }

    pub fn dropped(&self) -> usize {
        self.stale + self.in_batch
    }
}

/// An item kept by the engine, with what it was classified as.
#[derive(Debug, Clone, PartialEq)]
pub struct Survivor {
    pub item: FeedItem,
    pub fingerprint: Option<String>,
    pub classification: Classification,
}

/// Classifier over one feed's `recent` and `all-time` tiers.
///
/// Depends only on the [`StringCache`] capability, so in-memory caches can
/// stand in for persisted ones. The `in-batch` tier is owned by the engine and
/// dropped with it.
pub struct DedupEngine<'a> {
    recent: &'a dyn StringCache,
    all_time: &'a dyn StringCache,
    in_batch: HashSet<String>,
    report: DedupReport,
}

impl<'a> DedupEngine<'a> {
    pub fn new(recent: &'a dyn StringCache, all_time: &'a dyn StringCache) -> Self {
        Self { recent, all_time, in_batch: HashSet::new(), report: DedupReport::default() }
    }

    /// Classify one fingerprint. `url` is stored as the tier value for new
    /// fingerprints so snapshots stay inspectable.
    pub fn classify_one(&mut self, fingerprint: Option<&str>, url: &str) -> Classification {
        let classification = match fingerprint {
            None => Classification::Unresolved,
            Some(f) if self.in_batch.contains(f) => Classification::InBatchDuplicate,
            Some(f) if self.recent.get(f).is_some() => {
                self.in_batch.insert(f.to_string());
                Classification::Recent
            }
            Some(f) if self.all_time.get(f).is_some() => Classification::Stale,
            Some(f) => {
                self.recent.set(f, url.to_string());
                self.all_time.set(f, url.to_string());
                self.in_batch.insert(f.to_string());
                Classification::New
            }
        };

        tracing::debug!(url, ?classification, "classified");
        self.report.record(classification);
        classification
    }

    /// Prune `items`, keeping survivors in their original order.
    ///
    /// `fingerprints[i]` belongs to `items[i]`; a missing entry counts as
    /// unresolved.
    pub fn classify(&mut self, items: Vec<FeedItem>, fingerprints: Vec<Option<String>>) -> Vec<Survivor> {
        let mut fingerprints = fingerprints.into_iter();
        let mut survivors = Vec::with_capacity(items.len());

        for item in items {
            let fingerprint = fingerprints.next().flatten();
            let classification = self.classify_one(fingerprint.as_deref(), &item.url);
            if classification.keeps() {
                survivors.push(Survivor { item, fingerprint, classification });
            }
        }

        survivors
    }

    pub fn report(&self) -> DedupReport {
        self.report
    }
}

/// The persisted tiers of one feed identity.
#[derive(Debug)]
pub struct DedupTiers {
    pub recent: PersistentCache,
    pub all_time: PersistentCache,
}

impl DedupTiers {
    /// A fresh engine over these tiers with an empty `in-batch` tier.
    pub fn engine(&self) -> DedupEngine<'_> {
        DedupEngine::new(&self.recent, &self.all_time)
    }

    /// Persist `all-time` then `recent`.
    pub fn save(&self) -> Result<(), Error> {
        self.all_time.save()?;
        self.recent.save()
    }
}
