//! HTTP fetcher and response classification
//!
//! One fetch maps every response onto the crawl taxonomy:
//! - 200 + HTML body: parse and persist
//! - 429: bounded retry (fixed pause), then abandon with no state change
//! - other 4xx: the page is permanently gone, delete its row
//! - anything else non-200 or non-HTML: skip, no store mutation
//! - timeout / connection failure: skip, logged, never task-fatal

use crate::request::{self, RetryPolicy};
use reqwest::Client;
use url::Url;

/// Classified result of fetching one URL
#[derive(Debug)]
pub enum FetchOutcome {
    /// 200 with an HTML body
    Success { body: String },

    /// Rate limited on every attempt; the URL is abandoned
    RateLimited { attempts: u32 },

    /// Client error other than 429; the page is treated as removed
    Gone { status: u16 },

    /// Non-200 or non-HTML response; skipped silently
    ContentMismatch { status: u16, content_type: String },

    /// Timeout, refused connection, or read failure; skipped
    NetworkError { error: String },
}

/// Fetches a URL under the retry rule
///
/// Stealth requests rebuild their headers on every attempt so the rotating
/// identity actually rotates. On HTTP 429 the fetch pauses for the policy
/// delay and retries, up to `max_attempts` total requests.
pub async fn fetch_page(
    client: &Client,
    url: &Url,
    stealth_mode: bool,
    referrer: Option<&str>,
    retry: &RetryPolicy,
) -> FetchOutcome {
    let mut attempt = 0;

    loop {
        attempt += 1;

        let headers = request::headers(stealth_mode, referrer);
        let response = match client.get(url.clone()).headers(headers).send().await {
            Ok(response) => response,
            Err(e) => {
                let error = if e.is_timeout() {
                    "request timeout".to_string()
                } else if e.is_connect() {
                    "connection failed".to_string()
                } else {
                    e.to_string()
                };
                return FetchOutcome::NetworkError { error };
            }
        };

        let status = response.status().as_u16();

        if status == 429 {
            if attempt < retry.max_attempts {
                tracing::debug!("429 for {}, retrying in {:?}", url, retry.delay);
                tokio::time::sleep(retry.delay).await;
                continue;
            }
            return FetchOutcome::RateLimited { attempts: attempt };
        }

        if (400..500).contains(&status) {
            return FetchOutcome::Gone { status };
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if status != 200 || !content_type.contains("text/html") {
            return FetchOutcome::ContentMismatch {
                status,
                content_type,
            };
        }

        return match response.text().await {
            Ok(body) => FetchOutcome::Success { body },
            Err(e) => FetchOutcome::NetworkError {
                error: e.to_string(),
            },
        };
    }
}
