//! oEmbed providers.
//!
//! Each provider claims links by pattern and is asked for a JSON oEmbed
//! document. Embedly, when a key is configured, goes last and claims
//! everything.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use url::Url;

use super::image::imgur_album;
use super::{EmbedResult, EmbedStrategy, Outcome, markup};
use crate::fetch::Fetcher;
use feedsift_core::{EmbedConfig, Error};

/// Built-in providers: name, endpoint, link pattern.
const PROVIDERS: &[(&str, &str, &str)] = &[
    ("imgur", "https://api.imgur.com/oembed", r"imgur\.com/"),
    ("youtube", "https://www.youtube.com/oembed", r"(youtube\.com/|youtu\.be/)"),
    ("flickr", "https://www.flickr.com/services/oembed", r"(flickr\.com/|flic\.kr/)"),
    ("vimeo", "https://vimeo.com/api/oembed.json", r"vimeo\.com/"),
    ("hulu", "https://www.hulu.com/api/oembed.json", r"hulu\.com/watch"),
    ("viddler", "https://www.viddler.com/oembed/", r"viddler\.com/"),
    ("collegehumor", "https://www.collegehumor.com/oembed.json", r"collegehumor\.com/video"),
];

const EMBEDLY_ENDPOINT: &str = "https://api.embed.ly/1/oembed";

#[derive(Debug, Default, Deserialize)]
struct OembedDocument {
    #[serde(rename = "type")]
    kind: Option<String>,
    url: Option<String>,
    html: Option<String>,
    description: Option<String>,
    provider_name: Option<String>,
}

/// One oEmbed endpoint.
pub struct OembedProvider {
    name: &'static str,
    endpoint: Url,
    pattern: Regex,
    fetcher: Arc<dyn Fetcher>,
    max_width: Option<u32>,
}

impl OembedProvider {
    pub fn new(
        name: &'static str, endpoint: Url, pattern: Regex, fetcher: Arc<dyn Fetcher>, max_width: Option<u32>,
    ) -> Self {
        Self { name, endpoint, pattern, fetcher, max_width }
    }

    /// The built-in providers in priority order, then Embedly if a key is set.
    pub fn standard(fetcher: &Arc<dyn Fetcher>, config: &EmbedConfig) -> Vec<Self> {
        let mut providers: Vec<Self> = PROVIDERS
            .iter()
            .filter_map(|&(name, endpoint, pattern)| {
                let provider = Self::new(
                    name,
                    Url::parse(endpoint).ok()?,
                    Regex::new(pattern).ok()?,
                    Arc::clone(fetcher),
                    config.max_width,
                );
                Some(provider)
            })
            .collect();

        if let Some(key) = &config.embedly_api_key
            && let Ok(mut endpoint) = Url::parse(EMBEDLY_ENDPOINT)
            && let Ok(pattern) = Regex::new(".*")
        {
            endpoint.query_pairs_mut().append_pair("key", key);
            providers.push(Self::new("embedly", endpoint, pattern, Arc::clone(fetcher), config.max_width));
        }

        providers
    }

    fn request_url(&self, url: &str) -> Url {
        let mut request = self.endpoint.clone();
        {
            let mut query = request.query_pairs_mut();
            query.append_pair("format", "json").append_pair("url", url);
            if let Some(width) = self.max_width {
                query.append_pair("maxwidth", &width.to_string());
            }
        }
        request
    }

    async fn render(&self, url: &str, doc: OembedDocument) -> Result<Option<EmbedResult>, Error> {
        let kind = doc.kind.as_deref().unwrap_or_default();
        let result_url = doc.url.clone().unwrap_or_else(|| url.to_string());

        if kind == "rich" && doc.provider_name.as_deref().is_some_and(|p| p.eq_ignore_ascii_case("imgur")) {
            let html = imgur_album(self.fetcher.as_ref(), url).await?;
            return Ok(Some(EmbedResult { url: result_url, html }));
        }

        let html = if let Some(html) = doc.html {
            // Provider snippets use http: links; make them scheme-relative.
            html.replace("http:", "")
        } else if kind == "photo"
            && let Some(src) = &doc.url
        {
            markup::image(src)
        } else if let Some(description) = doc.description {
            description
        } else {
            return Ok(None);
        };

        Ok(Some(EmbedResult { url: result_url, html }))
    }
}

#[async_trait]
impl EmbedStrategy for OembedProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn resolve(&self, url: &str) -> Outcome {
        if !self.pattern.is_match(url) {
            return Outcome::NotApplicable;
        }

        let request = self.request_url(url);
        let response = match self.fetcher.fetch(request.as_str()).await {
            Ok(response) => response,
            Err(e) => return Outcome::Failed(e),
        };

        let doc: OembedDocument = match serde_json::from_slice(&response.bytes) {
            Ok(doc) => doc,
            Err(e) => return Outcome::Failed(Error::Decode(format!("{} oembed: {}", self.name, e))),
        };

        match self.render(url, doc).await {
            Ok(Some(result)) => Outcome::Matched(result),
            Ok(None) => Outcome::NotApplicable,
            Err(e) => Outcome::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;

    fn provider(fetcher: Arc<MockFetcher>) -> OembedProvider {
        OembedProvider::new(
            "youtube",
            Url::parse("https://www.youtube.com/oembed").unwrap(),
            Regex::new(r"youtube\.com/").unwrap(),
            fetcher,
            Some(640),
        )
    }

    #[test]
    fn test_request_url() {
        let p = provider(Arc::new(MockFetcher::new()));
        assert_eq!(
            p.request_url("https://www.youtube.com/watch?v=abc").as_str(),
            concat!(
                "https://www.youtube.com/oembed?format=json",
                "&url=https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3Dabc&maxwidth=640",
            )
        );
    }

    #[test]
    fn test_standard_providers() {
        let fetcher: Arc<dyn Fetcher> = Arc::new(MockFetcher::new());

        let without_key = OembedProvider::standard(&fetcher, &EmbedConfig::default());
        assert_eq!(without_key.len(), PROVIDERS.len());
        assert_eq!(without_key[0].name(), "imgur");

        let config = EmbedConfig { embedly_api_key: Some("k3y".into()), ..Default::default() };
        let with_key = OembedProvider::standard(&fetcher, &config);
        let embedly = with_key.last().unwrap();
        assert_eq!(embedly.name(), "embedly");
        assert!(embedly.pattern.is_match("https://anything.example/"));
        assert!(embedly.request_url("https://x.example/").as_str().starts_with(
            "https://api.embed.ly/1/oembed?key=k3y&format=json"
        ));
    }

    #[tokio::test]
    async fn test_video_html_is_scheme_relative() {
        let link = "https://www.youtube.com/watch?v=abc";
        let p = provider(Arc::new(MockFetcher::new()));
        let body = r#"{"type":"video","html":"<iframe src=\"http://www.youtube.com/embed/abc\"></iframe>"}"#;
        let fetcher = Arc::new(MockFetcher::new().with(p.request_url(link).as_str(), "application/json", body));
        let p = provider(fetcher);

        match p.resolve(link).await {
            Outcome::Matched(result) => {
                assert_eq!(result.url, link);
                assert_eq!(result.html, r#"<iframe src="//www.youtube.com/embed/abc"></iframe>"#);
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_photo_and_description() {
        let p = provider(Arc::new(MockFetcher::new()));

        let photo = OembedDocument {
            kind: Some("photo".into()),
            url: Some("https://img.example/p.jpg".into()),
            ..Default::default()
        };
        let result = p.render("https://www.youtube.com/x", photo).await.unwrap().unwrap();
        assert_eq!(result.url, "https://img.example/p.jpg");
        assert_eq!(result.html, markup::image("https://img.example/p.jpg"));

        let described = OembedDocument { description: Some("just words".into()), ..Default::default() };
        let result = p.render("https://www.youtube.com/y", described).await.unwrap().unwrap();
        assert_eq!(result.html, "just words");

        assert!(p.render("https://www.youtube.com/z", OembedDocument::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_imgur_rich_rescrapes_album() {
        let link = "https://imgur.com/a/album";
        let fetcher = Arc::new(MockFetcher::new().with(link, "text/html", r#"<a name="q1"></a>"#));
        let p = OembedProvider::new(
            "imgur",
            Url::parse("https://api.imgur.com/oembed").unwrap(),
            Regex::new(r"imgur\.com/").unwrap(),
            fetcher,
            None,
        );
        let doc = OembedDocument {
            kind: Some("rich".into()),
            provider_name: Some("Imgur".into()),
            html: Some("<blockquote>ignored</blockquote>".into()),
            ..Default::default()
        };

        let result = p.render(link, doc).await.unwrap().unwrap();
        assert_eq!(result.html, markup::image("https://i.imgur.com/q1.png"));
    }

    #[tokio::test]
    async fn test_bad_json_fails() {
        let link = "https://www.youtube.com/watch?v=bad";
        let p = provider(Arc::new(MockFetcher::new()));
        let fetcher = Arc::new(MockFetcher::new().with(p.request_url(link).as_str(), "text/html", "<html>"));
        let outcome = provider(fetcher).resolve(link).await;
        assert!(matches!(outcome, Outcome::Failed(Error::Decode(_))));
    }

    #[tokio::test]
    async fn test_unclaimed_link_makes_no_request() {
        let fetcher = Arc::new(MockFetcher::new());
        let outcome = provider(fetcher.clone()).resolve("https://vimeo.com/1").await;
        assert!(matches!(outcome, Outcome::NotApplicable));
        assert_eq!(fetcher.total_calls(), 0);
    }
}
