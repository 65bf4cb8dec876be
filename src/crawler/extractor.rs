//! HTML extraction: indexable metadata and outbound links

use scraper::{Html, Selector};
use url::Url;

/// Description fallback length when no meta description exists
const DESCRIPTION_FALLBACK_CHARS: usize = 200;

/// File extensions that never lead to indexable HTML
const INVALID_EXTENSIONS: &[&str] = &[
    ".css", ".js", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".woff", ".pdf", ".zip", ".mp4",
    ".mp3", ".exe",
];

/// Indexable metadata extracted from one page
#[derive(Debug, Clone, Default)]
pub struct PageSummary {
    pub title: String,
    pub description: String,
    pub keywords: String,
    /// Page declared a `noindex` robots directive
    pub noindex: bool,
}

/// Parses a page into its summary and outbound links
///
/// The document is parsed once; both results are owned so nothing borrowed
/// from the DOM escapes into async code.
pub fn parse_page(html: &str, base_url: &Url) -> (PageSummary, Vec<Url>) {
    let document = Html::parse_document(html);
    let summary = extract_summary(&document);
    let links = extract_links(&document, base_url);
    (summary, links)
}

fn extract_summary(document: &Html) -> PageSummary {
    let title = Selector::parse("title")
        .ok()
        .and_then(|sel| {
            document
                .select(&sel)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
        })
        .unwrap_or_default();

    let mut description = meta_content(document, "description").unwrap_or_default();
    if description.is_empty() {
        description = visible_text_excerpt(document);
    }

    let keywords = meta_content(document, "keywords").unwrap_or_default();

    let noindex = meta_content(document, "robots")
        .map(|robots| robots.to_lowercase().contains("noindex"))
        .unwrap_or(false);

    PageSummary {
        title,
        description,
        keywords,
        noindex,
    }
}

/// Gets a `<meta name=...>` content attribute, trimmed
fn meta_content(document: &Html, name: &str) -> Option<String> {
    let selector = Selector::parse(&format!("meta[name='{}']", name)).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
}

/// First ~200 characters of paragraph/preformatted text, the description
/// fallback for pages without a meta description
fn visible_text_excerpt(document: &Html) -> String {
    let Ok(selector) = Selector::parse("p, pre") else {
        return String::new();
    };

    let mut text = String::new();
    for element in document.select(&selector) {
        for piece in element.text() {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(piece);
            if text.len() >= DESCRIPTION_FALLBACK_CHARS {
                break;
            }
        }
        if text.len() >= DESCRIPTION_FALLBACK_CHARS {
            break;
        }
    }

    let mut end = text.len().min(DESCRIPTION_FALLBACK_CHARS);
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut links = Vec::new();
    for element in document.select(&selector) {
        if let Some(href) = element.value().attr("href") {
            if let Some(url) = resolve_link(href, base_url) {
                links.push(url);
            }
        }
    }
    links
}

/// Resolves an href into a followable absolute URL
///
/// Returns None for non-HTTP(S) schemes, same-page anchors, and targets
/// whose extension marks them as binary or media assets.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let url = base_url.join(href).ok()?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    if !is_valid_link(url.path()) {
        return None;
    }

    Some(url)
}

/// Filters out links to non-HTML assets by extension
fn is_valid_link(path: &str) -> bool {
    let lower = path.to_lowercase();
    !INVALID_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}
