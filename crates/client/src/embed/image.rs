//! Strategies that render a link as one or more inline images.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;

use super::{EmbedResult, EmbedStrategy, Outcome, markup};
use crate::fetch::Fetcher;
use feedsift_core::Error;

static QUICKMEME_HOST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://(www\.)?(quickmeme\.com|qkme\.me)/").expect("static regex"));

static QUICKMEME_IMG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"id="img"[^>]*?src="([^"]+)""#).expect("static regex"));

static IMGUR_GALLERY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<a name=['"](\w+)['"]"#).expect("static regex"));

/// Matches when the link itself serves an `image/*` content type.
pub struct DirectImage {
    fetcher: Arc<dyn Fetcher>,
}

impl DirectImage {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    async fn probe(&self, url: &str) -> Outcome {
        match self.fetcher.content_type(url).await {
            Ok(Some(content_type)) if content_type.trim_start().starts_with("image/") => {
                Outcome::Matched(EmbedResult { url: url.to_string(), html: markup::image(url) })
            }
            Ok(_) => Outcome::NotApplicable,
            Err(e) => Outcome::Failed(e),
        }
    }
}

#[async_trait]
impl EmbedStrategy for DirectImage {
    fn name(&self) -> &'static str {
        "direct-image"
    }

    async fn resolve(&self, url: &str) -> Outcome {
        self.probe(url).await
    }
}

/// Retries [`DirectImage`] with `.png` appended, for hosts that serve images
/// at extensionless paths.
pub struct ExtensionlessImage {
    direct: DirectImage,
}

impl ExtensionlessImage {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { direct: DirectImage::new(fetcher) }
    }

    fn candidate(url: &str) -> Option<String> {
        let trimmed = url.trim_end_matches('/');
        let last = trimmed.rsplit('/').next().unwrap_or_default();
        (!last.contains('.') && !trimmed.contains('?')).then(|| format!("{trimmed}.png"))
    }
}

#[async_trait]
impl EmbedStrategy for ExtensionlessImage {
    fn name(&self) -> &'static str {
        "extensionless-image"
    }

    async fn resolve(&self, url: &str) -> Outcome {
        match Self::candidate(url) {
            Some(candidate) => self.direct.probe(&candidate).await,
            None => Outcome::NotApplicable,
        }
    }
}

/// Imgur gallery pages: drop the `/gallery` segment and retry as an image.
pub struct ImgurGallery {
    extensionless: ExtensionlessImage,
}

impl ImgurGallery {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { extensionless: ExtensionlessImage::new(fetcher) }
    }

    fn candidate(url: &str) -> Option<String> {
        url.contains("imgur.com/gallery/").then(|| url.replacen("/gallery", "", 1))
    }
}

#[async_trait]
impl EmbedStrategy for ImgurGallery {
    fn name(&self) -> &'static str {
        "imgur-gallery"
    }

    async fn resolve(&self, url: &str) -> Outcome {
        match Self::candidate(url) {
            Some(candidate) => self.extensionless.resolve(&candidate).await,
            None => Outcome::NotApplicable,
        }
    }
}

/// Meme pages: scrape the page for the main image.
pub struct Quickmeme {
    fetcher: Arc<dyn Fetcher>,
}

impl Quickmeme {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl EmbedStrategy for Quickmeme {
    fn name(&self) -> &'static str {
        "quickmeme"
    }

    async fn resolve(&self, url: &str) -> Outcome {
        if !QUICKMEME_HOST.is_match(url) {
            return Outcome::NotApplicable;
        }

        let page = match self.fetcher.fetch(url).await {
            Ok(response) => response.text(),
            Err(e) => return Outcome::Failed(e),
        };

        match QUICKMEME_IMG.captures(&page).and_then(|c| c.get(1)) {
            Some(src) => {
                let src = src.as_str();
                Outcome::Matched(EmbedResult { url: src.to_string(), html: markup::image(src) })
            }
            None => Outcome::NotApplicable,
        }
    }
}

/// Every image of an imgur album page, stacked.
///
/// Returns an empty string when the page lists no images.
pub async fn imgur_album(fetcher: &dyn Fetcher, url: &str) -> Result<String, Error> {
    let page = fetcher.fetch(url).await?.text();
    let srcs: Vec<String> = IMGUR_GALLERY_ID
        .captures_iter(&page)
        .map(|c| format!("https://i.imgur.com/{}.png", &c[1]))
        .collect();
    Ok(markup::gallery(srcs.iter().map(String::as_str)))
}
