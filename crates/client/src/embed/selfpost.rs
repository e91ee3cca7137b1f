//! Reddit self posts: inline the post body, with linked images expanded.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};

use super::{EmbedResult, EmbedStrategy, Outcome, first_match};
use crate::fetch::Fetcher;

static SELF_POST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://([a-z]+\.)?reddit\.com/r/[^/]+/comments/").expect("static regex"));

/// A scraped self-post body and the anchors inside it.
#[derive(Debug, PartialEq)]
struct SelfText {
    body: String,
    anchors: Vec<Anchor>,
}

#[derive(Debug, PartialEq)]
struct Anchor {
    outer_html: String,
    href: String,
}

/// Pull the first self-text body out of a post page.
///
/// Kept synchronous: the parsed document is not `Send` and must be gone
/// before the caller awaits anything.
fn extract_self_text(page: &str) -> Option<SelfText> {
    let document = Html::parse_document(page);
    let body_selector = Selector::parse(".expando .usertext-body").expect("invalid selector");
    let anchor_selector = Selector::parse("a[href]").expect("invalid selector");

    let body = document.select(&body_selector).next()?;
    let anchors = body
        .select(&anchor_selector)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            Some(Anchor { outer_html: a.html(), href: href.to_string() })
        })
        .collect();

    Some(SelfText { body: body.inner_html().trim().to_string(), anchors })
}

/// Renders a self post's body, replacing image links with inline images
/// found by the image strategies.
pub struct RedditSelfPost {
    fetcher: Arc<dyn Fetcher>,
    images: Vec<Arc<dyn EmbedStrategy>>,
}

impl RedditSelfPost {
    pub fn new(fetcher: Arc<dyn Fetcher>, images: Vec<Arc<dyn EmbedStrategy>>) -> Self {
        Self { fetcher, images }
    }
}

#[async_trait]
impl EmbedStrategy for RedditSelfPost {
    fn name(&self) -> &'static str {
        "reddit-self-post"
    }

    async fn resolve(&self, url: &str) -> Outcome {
        if !SELF_POST.is_match(url) {
            return Outcome::NotApplicable;
        }

        let page = match self.fetcher.fetch(url).await {
            Ok(response) => response.text(),
            Err(e) => return Outcome::Failed(e),
        };

        let Some(SelfText { mut body, anchors }) = extract_self_text(&page) else {
            return Outcome::NotApplicable;
        };

        for anchor in anchors {
            if let Some(image) = first_match(&self.images, &anchor.href).await {
                body = body.replacen(&anchor.outer_html, &image.html, 1);
            }
        }

        Outcome::Matched(EmbedResult { url: url.to_string(), html: body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::image::DirectImage;
    use crate::embed::markup;
    use crate::testing::MockFetcher;

    const POST: &str = "https://www.reddit.com/r/rust/comments/abc/title/";

    fn page(body: &str) -> String {
        format!(
            concat!(
                r#"<html><body><div class="entry"><div class="expando"><form>"#,
                r#"<div class="usertext-body"><div class="md">{body}</div></div>"#,
                r#"</form></div></div></body></html>"#,
            ),
            body = body
        )
    }

    #[test]
    fn test_extract_self_text() {
        let html = page(r#"<p>see <a href="https://i.example/x.png">this</a></p>"#);
        let text = extract_self_text(&html).unwrap();
        assert!(text.body.starts_with("<div class=\"md\"><p>see"));
        assert_eq!(text.anchors.len(), 1);
        assert_eq!(text.anchors[0].href, "https://i.example/x.png");
        assert_eq!(text.anchors[0].outer_html, r#"<a href="https://i.example/x.png">this</a>"#);
    }

    #[test]
    fn test_extract_self_text_link_post() {
        assert!(extract_self_text("<html><body><a href='x'>link post</a></body></html>").is_none());
    }

    #[tokio::test]
    async fn test_inlines_linked_images() {
        let body = r#"<p>look <a href="https://i.example/x.png">pic</a> and <a href="https://e.com/page">page</a></p>"#;
        let fetcher = Arc::new(
            MockFetcher::new()
                .with(POST, "text/html", page(body))
                .with("https://i.example/x.png", "image/png", "")
                .with("https://e.com/page", "text/html", ""),
        );
        let images: Vec<Arc<dyn EmbedStrategy>> = vec![Arc::new(DirectImage::new(fetcher.clone()))];
        let strategy = RedditSelfPost::new(fetcher, images);

        match strategy.resolve(POST).await {
            Outcome::Matched(result) => {
                assert_eq!(result.url, POST);
                assert!(result.html.contains(&markup::image("https://i.example/x.png")));
                assert!(!result.html.contains(">pic</a>"));
                assert!(result.html.contains(r#"<a href="https://e.com/page">page</a>"#));
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ignores_other_hosts() {
        let fetcher = Arc::new(MockFetcher::new());
        let strategy = RedditSelfPost::new(fetcher.clone(), Vec::new());
        assert!(matches!(strategy.resolve("https://e.com/r/rust/comments/x").await, Outcome::NotApplicable));
        assert_eq!(fetcher.total_calls(), 0);
    }
}
