//! Core types and shared functionality for feedsift.
//!
//! This crate provides:
//! - Weight-bounded LRU caches with durable snapshots
//! - Three-tier fingerprint deduplication
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod dedup;
pub mod error;
pub mod feed;

pub use cache::{MemoryCache, PersistentCache, SnapshotStore, StringCache};
pub use config::{AppConfig, EmbedConfig, FingerprintMode};
pub use dedup::{Classification, DedupEngine, DedupReport, DedupTiers, FeedIdentity, Survivor};
pub use error::Error;
pub use feed::{Feed, FeedItem};
