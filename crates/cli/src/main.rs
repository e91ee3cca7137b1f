//! feedsift command-line entry point.
//!
//! `run` deduplicates and enriches one feed document, `inspect` dumps a cache
//! snapshot, `identity` shows which dedup snapshots a feed maps to.
//! Logs go to stderr as JSON; stdout carries only the JSON result.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use feedsift_client::FeedRunner;
use feedsift_core::cache::decode_snapshot;
use feedsift_core::dedup::Tier;
use feedsift_core::{AppConfig, Feed, FeedIdentity, SnapshotStore};

/// Deduplicate and enrich link feeds.
#[derive(Parser, Debug)]
#[command(name = "feedsift", version)]
struct Cli {
    /// TOML configuration file (overrides FEEDSIFT_CONFIG_FILE).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Deduplicate and enrich a feed document, printing surviving items.
    Run {
        /// JSON feed document: `{"link": ..., "items": [...]}`.
        #[arg(long)]
        feed: PathBuf,

        /// Caller tag; separates dedup history between consumers of one feed.
        #[arg(long)]
        tag: String,
    },
    /// List a snapshot's entries, least-recently-used first.
    Inspect {
        snapshot: PathBuf,
    },
    /// Print the feed identity and dedup snapshot paths for a tag and link.
    Identity {
        #[arg(long)]
        tag: String,

        #[arg(long)]
        link: String,
    },
}

#[derive(Serialize)]
struct SnapshotEntry {
    key: String,
    value: String,
    bytes: usize,
}

#[derive(Serialize)]
struct SnapshotDump {
    path: PathBuf,
    entries: Vec<SnapshotEntry>,
    size: usize,
}

#[derive(Serialize)]
struct IdentityInfo {
    identity: String,
    recent: Option<PathBuf>,
    all_time: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => AppConfig::load_from(Some(path)),
        None => AppConfig::load(),
    }
    .context("loading configuration")?;

    tracing::debug!(command = ?cli.command, cache_dir = %config.cache_dir.display(), "starting");

    match cli.command {
        Command::Run { feed, tag } => run(config, &feed, &tag).await,
        Command::Inspect { snapshot } => inspect(&snapshot),
        Command::Identity { tag, link } => identity(&config, &tag, &link),
    }
}

async fn run(config: AppConfig, feed_path: &Path, tag: &str) -> Result<()> {
    let raw = std::fs::read(feed_path).with_context(|| format!("reading {}", feed_path.display()))?;
    let feed: Feed = serde_json::from_slice(&raw).with_context(|| format!("parsing {}", feed_path.display()))?;

    let runner = FeedRunner::from_config(config)?;
    let output = runner.run(feed, tag).await?;

    print_json(&output)
}

fn inspect(path: &Path) -> Result<()> {
    let raw = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let items = decode_snapshot(&raw).with_context(|| format!("decoding {}", path.display()))?;

    let entries: Vec<SnapshotEntry> = items
        .into_iter()
        .map(|(key, value)| SnapshotEntry { bytes: value.len(), key, value })
        .collect();
    let size = entries.iter().map(|e| e.bytes).sum();

    print_json(&SnapshotDump { path: path.to_path_buf(), entries, size })
}

fn identity(config: &AppConfig, tag: &str, link: &str) -> Result<()> {
    let identity = FeedIdentity::new(tag, link)?;
    let store = SnapshotStore::from_config(config);

    print_json(&IdentityInfo {
        recent: store.tier_path(&identity, Tier::Recent),
        all_time: store.tier_path(&identity, Tier::AllTime),
        identity: identity.to_string(),
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
