//! Crawl engine: frontier, worker pool, fetch/extract pipeline, refresh pass
//!
//! A crawl pass seeds the frontier with one URL, fans out across a bounded
//! worker pool under depth and domain constraints, and finishes by handing
//! the newly saved URLs to the favicon resolver. The refresh pass re-fetches
//! stale pages without expanding links.

mod extractor;
mod fetcher;
mod frontier;
mod refresh;
mod worker;

pub use extractor::{parse_page, PageSummary};
pub use fetcher::{fetch_page, FetchOutcome};
pub use frontier::{Frontier, FrontierEntry, PopResult};
pub use refresh::{refresh_pass, RefreshStats};
pub use worker::{crawl_pass, never_canceled, priority_delta, CancelCheck, CrawlOutcome, CrawlParams};

use crate::config::Config;
use crate::favicon::FaviconResolver;
use crate::output::LogBuffer;
use crate::request;
use crate::storage::{SqliteStore, Store};
use crate::url::extract_domain;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Runs a full crawl: the worker-pool pass, then favicon resolution for
/// every domain that gained a page
pub async fn run_crawl(
    store: Arc<Mutex<SqliteStore>>,
    config: &Config,
    params: CrawlParams,
    cancel_check: CancelCheck,
    log: Arc<LogBuffer>,
) -> crate::Result<CrawlOutcome> {
    let client =
        request::build_http_client(Duration::from_secs(config.crawler.request_timeout_secs))?;

    log.push(&format!(
        "Crawling {} (depth {}, same-domain: {}, stealth: {})",
        params.seed, params.max_depth, params.same_domain, params.stealth_mode
    ));

    let outcome = crawl_pass(
        Arc::clone(&store),
        client.clone(),
        &config.crawler,
        params,
        cancel_check,
        Arc::clone(&log),
    )
    .await;

    log.push(&format!(
        "Crawl pass finished: {} saved, {} updated, {} removed, {} URLs visited",
        outcome.pages_saved, outcome.pages_updated, outcome.pages_deleted, outcome.urls_claimed
    ));

    if !outcome.canceled && !outcome.newly_saved.is_empty() {
        resolve_favicons(&store, config, &client, &outcome.newly_saved, &log).await?;
    }

    Ok(outcome)
}

async fn resolve_favicons(
    store: &Arc<Mutex<SqliteStore>>,
    config: &Config,
    client: &reqwest::Client,
    newly_saved: &HashSet<String>,
    log: &LogBuffer,
) -> crate::Result<()> {
    let domains: HashSet<String> = newly_saved
        .iter()
        .filter_map(|url| Url::parse(url).ok())
        .filter_map(|url| extract_domain(&url))
        .collect();

    if domains.is_empty() {
        return Ok(());
    }

    log.push(&format!("Resolving favicons for {} domains", domains.len()));

    let resolver = FaviconResolver::new(
        client.clone(),
        PathBuf::from(&config.store.favicon_dir),
        config.favicons.max_concurrent,
    )?;
    let updates = resolver.resolve(domains).await;

    let resolved = updates.len();
    for (domain, hash) in updates {
        let result = {
            let mut store = store.lock().unwrap();
            store.set_favicon(&domain, &hash)
        };
        if let Err(e) = result {
            tracing::error!("failed to record favicon for {}: {}", domain, e);
        }
    }

    log.push(&format!("Resolved {} favicons", resolved));
    Ok(())
}
