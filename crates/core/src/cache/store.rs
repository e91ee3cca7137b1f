//! Snapshot locations and load lifecycle.
//!
//! Every snapshot lives under one injected directory:
//!
//! - `fingerprints.snap`: URL -> content fingerprint
//! - `embeds.snap`: enrichment results
//! - `dedup-<identity>-recent.snap` / `dedup-<identity>-all-time.snap`

use std::path::{Path, PathBuf};

use super::persistent::PersistentCache;
use crate::Error;
use crate::config::AppConfig;
use crate::dedup::{DedupTiers, FeedIdentity, Tier};

const FINGERPRINT_CACHE: &str = "fingerprints";
const EMBED_CACHE: &str = "embeds";

/// Byte capacities for each cache kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacities {
    pub fingerprints: u64,
    pub embeds: u64,
    pub all_time: u64,
    pub recent: u64,
}

impl From<&AppConfig> for Capacities {
    fn from(config: &AppConfig) -> Self {
        Self {
            fingerprints: config.fingerprint_capacity,
            embeds: config.embed_capacity,
            all_time: config.all_time_capacity,
            recent: config.recent_capacity,
        }
    }
}

/// Explicit handle on the on-disk cache state of one process.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    capacities: Capacities,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>, capacities: Capacities) -> Self {
        Self { dir: dir.into(), capacities }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.cache_dir.clone(), Capacities::from(config))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn fingerprint_path(&self) -> PathBuf {
        self.dir.join(format!("{FINGERPRINT_CACHE}.snap"))
    }

    pub fn embed_path(&self) -> PathBuf {
        self.dir.join(format!("{EMBED_CACHE}.snap"))
    }

    /// Snapshot path of a persisted tier. `in-batch` is never persisted.
    pub fn tier_path(&self, identity: &FeedIdentity, tier: Tier) -> Option<PathBuf> {
        match tier {
            Tier::Recent | Tier::AllTime => Some(self.dir.join(format!("dedup-{identity}-{}.snap", tier.as_str()))),
            Tier::InBatch => None,
        }
    }

    fn load_tier(&self, identity: &FeedIdentity, tier: Tier, capacity: u64) -> Result<PersistentCache, Error> {
        let path = self.tier_path(identity, tier).ok_or_else(|| {
            Error::InvalidInput(format!("{} tier has no snapshot", tier.as_str()))
        })?;
        PersistentCache::load(format!("{identity} {}", tier.as_str()), path, capacity)
    }

    pub fn load_fingerprints(&self) -> Result<PersistentCache, Error> {
        PersistentCache::load(FINGERPRINT_CACHE, self.fingerprint_path(), self.capacities.fingerprints)
    }

    pub fn load_embeds(&self) -> Result<PersistentCache, Error> {
        PersistentCache::load(EMBED_CACHE, self.embed_path(), self.capacities.embeds)
    }

    pub fn load_tiers(&self, identity: &FeedIdentity) -> Result<DedupTiers, Error> {
        Ok(DedupTiers {
            recent: self.load_tier(identity, Tier::Recent, self.capacities.recent)?,
            all_time: self.load_tier(identity, Tier::AllTime, self.capacities.all_time)?,
        })
    }
}
