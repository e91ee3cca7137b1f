//! Parsing of item links before they reach the network.

use url::Url;

/// Error type for rejected links.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Parse a feed link into a fetchable URL.
///
/// Links come from feeds fully qualified, so unlike user input no scheme is
/// assumed. Only `http` and `https` pass. The fragment is dropped since it
/// never reaches the server; the query is kept verbatim.
pub fn parse_fetch_url(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    parsed.set_fragment(None);
    Ok(parsed)
}
