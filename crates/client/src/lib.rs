//! Network-facing stages of feedsift.
//!
//! This crate provides the HTTP fetch client, fingerprint resolution, link
//! enrichment and the run orchestration used by the CLI.

pub mod embed;
pub mod fetch;
pub mod fingerprint;
pub mod pipeline;
pub mod workers;

#[cfg(test)]
mod testing;

pub use embed::{EmbedResult, EmbedSource, EmbedStrategy, EnrichmentPipeline, Outcome, Resolution};
pub use fetch::{FetchClient, FetchConfig, FetchResponse, Fetcher};
pub use fingerprint::FingerprintResolver;
pub use pipeline::{EmbedReport, EnrichedItem, FeedRunner, RunOutput, RunReport};
