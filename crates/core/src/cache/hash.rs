//! Fingerprints and cache keys.

use sha2::{Digest, Sha256};

use crate::config::EmbedConfig;

/// Fingerprint of fetched content.
pub fn content_fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Fingerprint of a URL string, used when content is not fetched.
pub fn url_fingerprint(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"url\n");
    hasher.update(url.trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// Enrichment cache key: the URL followed by the canonical JSON form of the
/// options that influence the rendered markup.
///
/// The Embedly key itself is never written into snapshots; only whether one
/// is configured.
pub fn embed_cache_key(url: &str, config: &EmbedConfig) -> String {
    let options = serde_json::json!({
        "embedly": config.embedly_api_key.is_some(),
        "max_width": config.max_width,
    });
    format!("{url}{options}")
}
