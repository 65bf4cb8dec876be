//! Stale-refresh pass
//!
//! Re-fetches every page whose last successful fetch is older than the
//! freshness window (or was never recorded) and rewrites its metadata and
//! timestamp. The pass prints one progress line per URL on stdout: when the
//! orchestrator runs it as a subprocess, that stream is what gets forwarded
//! to the log sink, and terminating the process is how it gets canceled.

use crate::config::Config;
use crate::crawler::extractor::parse_page;
use crate::crawler::fetcher::{fetch_page, FetchOutcome};
use crate::request::RetryPolicy;
use crate::storage::{RefreshOutcome, SqliteStore, Store};
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

/// Counts from one refresh pass
#[derive(Debug, Default)]
pub struct RefreshStats {
    pub total: usize,
    pub updated: usize,
    pub saved: usize,
    pub removed: usize,
    pub skipped: usize,
}

/// Runs one refresh pass over every stale page
pub async fn refresh_pass(
    store: Arc<Mutex<SqliteStore>>,
    client: Client,
    config: &Config,
) -> crate::Result<RefreshStats> {
    let cutoff = (Utc::now() - ChronoDuration::days(config.refresh.freshness_days)).to_rfc3339();
    let stale = {
        let store = store.lock().unwrap();
        store.stale_urls(&cutoff)?
    };

    println!("Found {} stale pages to re-crawl", stale.len());

    let retry = RetryPolicy {
        max_attempts: config.crawler.retry_attempts,
        delay: Duration::from_millis(config.crawler.retry_delay_ms),
    };
    let semaphore = Arc::new(Semaphore::new(config.crawler.workers.max(1)));
    let updated = Arc::new(AtomicUsize::new(0));
    let saved = Arc::new(AtomicUsize::new(0));
    let removed = Arc::new(AtomicUsize::new(0));
    let skipped = Arc::new(AtomicUsize::new(0));

    let mut tasks = JoinSet::new();
    let total = stale.len();

    for url in stale {
        let semaphore = Arc::clone(&semaphore);
        let store = Arc::clone(&store);
        let client = client.clone();
        let updated = Arc::clone(&updated);
        let saved = Arc::clone(&saved);
        let removed = Arc::clone(&removed);
        let skipped = Arc::clone(&skipped);

        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return;
            };
            refresh_one(&store, &client, &retry, &url, &updated, &saved, &removed, &skipped).await;
        });
    }
    while tasks.join_next().await.is_some() {}

    Ok(RefreshStats {
        total,
        updated: updated.load(Ordering::Relaxed),
        saved: saved.load(Ordering::Relaxed),
        removed: removed.load(Ordering::Relaxed),
        skipped: skipped.load(Ordering::Relaxed),
    })
}

#[allow(clippy::too_many_arguments)]
async fn refresh_one(
    store: &Arc<Mutex<SqliteStore>>,
    client: &Client,
    retry: &RetryPolicy,
    url: &str,
    updated: &AtomicUsize,
    saved: &AtomicUsize,
    removed: &AtomicUsize,
    skipped: &AtomicUsize,
) {
    let Ok(parsed) = Url::parse(url) else {
        skipped.fetch_add(1, Ordering::Relaxed);
        println!("Skipping: {} (unparseable)", url);
        return;
    };

    // Stealth headers: refreshes hit many domains quickly and should look
    // like ordinary page views.
    match fetch_page(client, &parsed, true, None, retry).await {
        FetchOutcome::RateLimited { .. } => {
            skipped.fetch_add(1, Ordering::Relaxed);
            println!("Max retries reached for {}. Skipping.", url);
        }
        FetchOutcome::Gone { status } => {
            let deleted = {
                let mut store = store.lock().unwrap();
                store.delete_page(url)
            };
            match deleted {
                Ok(_) => {
                    removed.fetch_add(1, Ordering::Relaxed);
                    println!("Removed: {} (status: {})", url, status);
                }
                Err(e) => println!("Error removing {}: {}", url, e),
            }
        }
        FetchOutcome::ContentMismatch { status, .. } => {
            skipped.fetch_add(1, Ordering::Relaxed);
            println!("Skipping: {} (status: {})", url, status);
        }
        FetchOutcome::NetworkError { error } => {
            skipped.fetch_add(1, Ordering::Relaxed);
            println!("Error crawling {}: {}", url, error);
        }
        FetchOutcome::Success { body } => {
            let (summary, _links) = parse_page(&body, &parsed);
            let outcome = {
                let mut store = store.lock().unwrap();
                store.record_refreshed(url, &summary.title, &summary.description, &summary.keywords)
            };
            match outcome {
                Ok(RefreshOutcome::Updated) => {
                    updated.fetch_add(1, Ordering::Relaxed);
                    println!("Updated: {}", url);
                }
                Ok(RefreshOutcome::Inserted) => {
                    saved.fetch_add(1, Ordering::Relaxed);
                    println!("Saved: {}", url);
                }
                Err(e) => println!("Error saving {}: {}", url, e),
            }
        }
    }
}
