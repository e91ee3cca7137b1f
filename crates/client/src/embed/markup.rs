//! HTML fragments produced by strategies.

/// Escape text for a single-quoted attribute or element body.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&#39;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Inline image scaled to its container.
pub fn image(src: &str) -> String {
    format!("<img style='max-width:100%' src='{}'/>", escape(src))
}

/// Plain link, used when no strategy matched.
pub fn link(url: &str) -> String {
    let url = escape(url);
    format!("<a href='{url}'>{url}</a>")
}

/// Images stacked with blank lines between them.
pub fn gallery<'a>(srcs: impl IntoIterator<Item = &'a str>) -> String {
    srcs.into_iter().map(image).collect::<Vec<_>>().join("<br/><br/>")
}
