//! Request policy: HTTP identities, headers, and the rate-limit retry rule
//!
//! Two request profiles exist. The default profile announces the crawler
//! honestly with a fixed identity string. Stealth mode rotates through a
//! pool of realistic browser identities and adds navigation metadata headers
//! so rate-limit-happy sites treat the fetch like an ordinary page view.

use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use std::time::Duration;

/// Identity announced in the default (non-stealth) profile
pub const DEFAULT_USER_AGENT: &str = "NovaCrawler/1.1";

/// Referrer sent in stealth mode when the crawl has no referrer yet
pub const DEFAULT_REFERRER: &str = "https://novasearch.xyz";

/// Browser identity pool for stealth mode
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/117.0",
    "Dalvik/2.1.0 (Linux; U; Android 11; Pixel 3a XL Build/RQ2A.210305.006)",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36",
];

/// Retry rule applied when a fetch answers HTTP 429
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total request attempts per URL, including the first
    pub max_attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Builds the header set for one outbound request
///
/// Non-stealth requests carry the fixed crawler identity. Stealth requests
/// pick a random identity from the pool, set a referrer (the linking page,
/// or the default site when none is known), and add browser-like fetch
/// metadata headers.
pub fn headers(stealth_mode: bool, referrer: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Accept-Language", HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(
        "Accept",
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));

    if stealth_mode {
        let identity = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);
        headers.insert("User-Agent", HeaderValue::from_static(identity));
        headers.insert("DNT", HeaderValue::from_static("1"));

        let referer = referrer.unwrap_or(DEFAULT_REFERRER);
        if let Ok(value) = HeaderValue::from_str(referer) {
            headers.insert("Referer", value);
        }

        headers.insert("Cache-Control", HeaderValue::from_static("max-age=0"));
        headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
        headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
        headers.insert("Sec-Fetch-Site", HeaderValue::from_static("none"));
        headers.insert("Sec-Fetch-User", HeaderValue::from_static("?1"));
    } else {
        headers.insert("User-Agent", HeaderValue::from_static(DEFAULT_USER_AGENT));
        headers.insert("DNT", HeaderValue::from_static("0"));
    }

    headers
}

/// Builds the shared HTTP client
///
/// Every outbound request carries this bounded timeout; gzip and brotli
/// responses are decoded transparently.
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .gzip(true)
        .brotli(true)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_headers_carry_crawler_identity() {
        let headers = headers(false, None);
        assert_eq!(headers.get("User-Agent").unwrap(), DEFAULT_USER_AGENT);
        assert_eq!(headers.get("DNT").unwrap(), "0");
        assert!(headers.get("Referer").is_none());
        assert!(headers.get("Sec-Fetch-Mode").is_none());
    }

    #[test]
    fn test_stealth_identity_comes_from_pool() {
        let headers = headers(true, None);
        let ua = headers.get("User-Agent").unwrap().to_str().unwrap();
        assert!(USER_AGENTS.contains(&ua), "unexpected identity: {}", ua);
    }

    #[test]
    fn test_stealth_referrer_falls_back_to_default() {
        let headers = headers(true, None);
        assert_eq!(headers.get("Referer").unwrap(), DEFAULT_REFERRER);
    }

    #[test]
    fn test_stealth_referrer_uses_linking_page() {
        let headers = headers(true, Some("https://example.com/from"));
        assert_eq!(headers.get("Referer").unwrap(), "https://example.com/from");
    }

    #[test]
    fn test_stealth_adds_fetch_metadata() {
        let headers = headers(true, None);
        assert_eq!(headers.get("Sec-Fetch-Dest").unwrap(), "document");
        assert_eq!(headers.get("Sec-Fetch-Mode").unwrap(), "navigate");
        assert_eq!(headers.get("DNT").unwrap(), "1");
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(Duration::from_secs(10));
        assert!(client.is_ok());
    }

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(5));
    }
}
