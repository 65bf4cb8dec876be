//! Favicon resolution
//!
//! Resolves one icon per domain: probe the domain's home page for a
//! `<link rel~="icon">`, fall back to `/favicon.ico`, and keep the result
//! only when it answers 200 with a recognized image content type. The
//! stable identifier is a hash of the icon URL, so re-resolving an
//! unchanged icon rewrites the same file and returns the same id.

use crate::request;
use reqwest::Client;
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

/// Recognized icon content types and their file extensions
const EXTENSIONS: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/svg+xml", "svg"),
    ("image/x-icon", "ico"),
    ("image/vnd.microsoft.icon", "ico"),
    ("image/webp", "webp"),
    ("image/avif", "avif"),
    ("image/gif", "gif"),
];

/// Resolves and downloads site icons with bounded concurrency
pub struct FaviconResolver {
    client: Client,
    dir: PathBuf,
    max_concurrent: usize,
    scheme: String,
}

impl FaviconResolver {
    /// Creates a resolver writing icons into `dir` (created if missing)
    pub fn new(client: Client, dir: PathBuf, max_concurrent: usize) -> crate::Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            client,
            dir,
            max_concurrent: max_concurrent.max(1),
            scheme: "https".to_string(),
        })
    }

    /// Overrides the scheme used to reach domain home pages. Production
    /// resolution is HTTPS-only; tests point this at plain-HTTP servers.
    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    /// Resolves an icon for each domain; domains without a usable icon are
    /// absent from the result
    pub async fn resolve(&self, domains: HashSet<String>) -> HashMap<String, String> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        for domain in domains {
            let semaphore = Arc::clone(&semaphore);
            let client = self.client.clone();
            let dir = self.dir.clone();
            let scheme = self.scheme.clone();

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return (domain, None);
                };
                let hash = resolve_domain(&client, &dir, &scheme, &domain).await;
                (domain, hash)
            });
        }

        let mut updates = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            if let Ok((domain, Some(hash))) = joined {
                updates.insert(domain, hash);
            }
        }
        updates
    }
}

async fn resolve_domain(client: &Client, dir: &Path, scheme: &str, domain: &str) -> Option<String> {
    let home = Url::parse(&format!("{}://{}", scheme, domain)).ok()?;

    let icon_url = discover_icon_url(client, &home).await;

    let response = client
        .get(icon_url.clone())
        .headers(request::headers(false, None))
        .send()
        .await
        .ok()?;

    if response.status().as_u16() != 200 {
        tracing::debug!("no favicon for {} ({})", domain, response.status());
        return None;
    }

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    if content_type.starts_with("text/html") {
        tracing::debug!("HTML answer instead of an icon for {}", domain);
        return None;
    }

    let Some(ext) = extension_for(&content_type) else {
        tracing::debug!("unknown favicon type for {}: {}", domain, content_type);
        return None;
    };

    let bytes = response.bytes().await.ok()?;
    let hash = hash_icon_url(icon_url.as_str());

    let path = dir.join(format!("{}.{}", hash, ext));
    if let Err(e) = std::fs::write(&path, &bytes) {
        tracing::error!("failed to write {}: {}", path.display(), e);
        return None;
    }

    tracing::debug!("downloaded favicon for {}", domain);
    Some(hash)
}

/// Finds the icon URL for a domain: the home page's `link[rel~="icon"]`
/// resolved against the domain, else `/favicon.ico`
async fn discover_icon_url(client: &Client, home: &Url) -> Url {
    let fallback = home
        .join("/favicon.ico")
        .unwrap_or_else(|_| home.clone());

    let response = client
        .get(home.clone())
        .headers(request::headers(false, None))
        .send()
        .await;

    match response {
        Ok(response) if response.status().as_u16() == 200 => match response.text().await {
            Ok(body) => icon_link_from_html(&body, home).unwrap_or(fallback),
            Err(_) => fallback,
        },
        _ => fallback,
    }
}

fn icon_link_from_html(html: &str, base: &Url) -> Option<Url> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"link[rel~="icon"]"#).ok()?;

    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .find_map(|href| base.join(href.trim()).ok())
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    EXTENSIONS
        .iter()
        .find(|(ct, _)| *ct == content_type)
        .map(|(_, ext)| *ext)
}

fn hash_icon_url(icon_url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(icon_url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_table() {
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("image/svg+xml"), Some("svg"));
        assert_eq!(extension_for("image/x-icon"), Some("ico"));
        assert_eq!(extension_for("image/vnd.microsoft.icon"), Some("ico"));
        assert_eq!(extension_for("image/webp"), Some("webp"));
        assert_eq!(extension_for("image/avif"), Some("avif"));
        assert_eq!(extension_for("image/gif"), Some("gif"));
        assert_eq!(extension_for("application/octet-stream"), None);
    }

    #[test]
    fn test_icon_link_resolved_against_domain() {
        let base = Url::parse("https://example.com").unwrap();
        let html = r#"<html><head><link rel="icon" href="/static/fav.png"></head></html>"#;

        let icon = icon_link_from_html(html, &base).unwrap();
        assert_eq!(icon.as_str(), "https://example.com/static/fav.png");
    }

    #[test]
    fn test_shortcut_icon_rel_matches() {
        let base = Url::parse("https://example.com").unwrap();
        let html = r#"<html><head><link rel="shortcut icon" href="fav.ico"></head></html>"#;

        let icon = icon_link_from_html(html, &base).unwrap();
        assert_eq!(icon.as_str(), "https://example.com/fav.ico");
    }

    #[test]
    fn test_no_icon_link_yields_none() {
        let base = Url::parse("https://example.com").unwrap();
        let html = r#"<html><head><link rel="stylesheet" href="s.css"></head></html>"#;
        assert!(icon_link_from_html(html, &base).is_none());
    }

    #[test]
    fn test_hash_is_stable_and_hex() {
        let a = hash_icon_url("https://example.com/favicon.ico");
        let b = hash_icon_url("https://example.com/favicon.ico");
        let c = hash_icon_url("https://example.com/other.ico");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
