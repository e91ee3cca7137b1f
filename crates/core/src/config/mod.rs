//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (FEEDSIFT_*)
//! 2. TOML config file (if FEEDSIFT_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// How an item's fingerprint is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintMode {
    /// Fetch the item URL and digest the response body.
    #[default]
    Content,
    /// Digest the URL string itself; no network access.
    Url,
}

/// Options passed to the embedding strategies.
///
/// Any change here changes the enrichment cache key, so cached markup
/// rendered under different options is never reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedConfig {
    /// Width hint forwarded to oEmbed providers as `maxwidth`.
    #[serde(default = "default_max_width")]
    pub max_width: Option<u32>,

    /// Embedly key; enables the catch-all oEmbed provider when set.
    ///
    /// Set via FEEDSIFT_EMBED__EMBEDLY_API_KEY environment variable.
    #[serde(default)]
    pub embedly_api_key: Option<String>,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (FEEDSIFT_*)
/// 2. TOML config file (if FEEDSIFT_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding every cache snapshot.
    ///
    /// Set via FEEDSIFT_CACHE_DIR environment variable.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of redirects to follow.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Refuse to fetch hosts resolving to private or reserved addresses.
    #[serde(default = "default_true")]
    pub block_private_addresses: bool,

    /// Number of items processed concurrently within a stage.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Fingerprint derivation mode.
    #[serde(default)]
    pub fingerprint_mode: FingerprintMode,

    /// Capacity in bytes of the URL -> fingerprint cache.
    #[serde(default = "default_fingerprint_capacity")]
    pub fingerprint_capacity: u64,

    /// Capacity in bytes of the enrichment cache.
    #[serde(default = "default_embed_capacity")]
    pub embed_capacity: u64,

    /// Capacity in bytes of each feed's all-time tier.
    #[serde(default = "default_all_time_capacity")]
    pub all_time_capacity: u64,

    /// Capacity in bytes of each feed's recent tier.
    #[serde(default = "default_recent_capacity")]
    pub recent_capacity: u64,

    /// Embedding strategy options.
    #[serde(default)]
    pub embed: EmbedConfig,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./feedsift-cache")
}

fn default_user_agent() -> String {
    "feedsift/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_redirects() -> usize {
    5
}

fn default_true() -> bool {
    true
}

fn default_max_concurrency() -> usize {
    8
}

fn default_fingerprint_capacity() -> u64 {
    1024 * 1024
}

fn default_embed_capacity() -> u64 {
    4 * 1024 * 1024
}

fn default_all_time_capacity() -> u64 {
    8 * 1024 * 1024
}

fn default_recent_capacity() -> u64 {
    64 * 1024
}

fn default_max_width() -> Option<u32> {
    Some(768)
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self { max_width: default_max_width(), embedly_api_key: None }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            block_private_addresses: true,
            max_concurrency: default_max_concurrency(),
            fingerprint_mode: FingerprintMode::Content,
            fingerprint_capacity: default_fingerprint_capacity(),
            embed_capacity: default_embed_capacity(),
            all_time_capacity: default_all_time_capacity(),
            recent_capacity: default_recent_capacity(),
            embed: EmbedConfig::default(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `FEEDSIFT_` (`__` separates nested keys)
    /// 2. TOML file from `FEEDSIFT_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(std::env::var_os("FEEDSIFT_CONFIG_FILE").map(PathBuf::from))
    }

    /// Same layering as [`AppConfig::load`] with an explicit TOML file.
    pub fn load_from(file: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_path) = file {
            figment = figment.merge(Toml::file(config_path));
        }

        figment = figment.merge(
            Env::prefixed("FEEDSIFT_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
