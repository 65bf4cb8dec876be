//! Crawl worker pool
//!
//! A bounded pool of workers drains the shared frontier. Each entry runs
//! through the same pipeline: depth and domain checks, the exactly-once
//! visited claim, a cancellation checkpoint, fetch, classification,
//! extraction, scoring, upsert, and link expansion. Per-URL failures are
//! logged and never escape the worker that hit them; the pass ends when the
//! frontier is exhausted or cancellation drains the pool.

use crate::config::CrawlerConfig;
use crate::crawler::extractor::{parse_page, PageSummary};
use crate::crawler::fetcher::{fetch_page, FetchOutcome};
use crate::crawler::frontier::{Frontier, FrontierEntry, PopResult};
use crate::output::LogBuffer;
use crate::request::RetryPolicy;
use crate::storage::{SqliteStore, Store, UpsertOutcome};
use crate::url::{is_home_page, normalize_url};
use reqwest::Client;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinSet;
use url::Url;

/// Pause while the queue is empty but entries are still in flight
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Cooperative cancellation probe, checked at frontier-entry boundaries and
/// before link expansion
pub type CancelCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// A cancel check that never fires, for direct CLI crawls
pub fn never_canceled() -> CancelCheck {
    Arc::new(|| false)
}

/// Parameters of one crawl pass
#[derive(Debug, Clone)]
pub struct CrawlParams {
    pub seed: Url,
    pub max_depth: u32,
    pub same_domain: bool,
    pub stealth_mode: bool,
}

/// What one crawl pass did
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    pub pages_saved: usize,
    pub pages_updated: usize,
    pub pages_deleted: usize,
    pub urls_claimed: usize,
    pub canceled: bool,
    /// Canonical URLs whose rows were newly inserted, for favicon resolution
    pub newly_saved: HashSet<String>,
}

struct WorkerCtx {
    frontier: Frontier,
    store: Arc<Mutex<SqliteStore>>,
    client: Client,
    retry: RetryPolicy,
    stealth_mode: bool,
    same_domain: bool,
    seed_authority: Option<(String, Option<u16>)>,
    cancel_check: CancelCheck,
    canceled: AtomicBool,
    saved: AtomicUsize,
    updated: AtomicUsize,
    deleted: AtomicUsize,
    log: Arc<LogBuffer>,
}

/// Runs one breadth-bounded crawl pass over the worker pool
pub async fn crawl_pass(
    store: Arc<Mutex<SqliteStore>>,
    client: Client,
    config: &CrawlerConfig,
    params: CrawlParams,
    cancel_check: CancelCheck,
    log: Arc<LogBuffer>,
) -> CrawlOutcome {
    let ctx = Arc::new(WorkerCtx {
        frontier: Frontier::new(params.seed.clone(), params.max_depth),
        store,
        client,
        retry: RetryPolicy {
            max_attempts: config.retry_attempts,
            delay: Duration::from_millis(config.retry_delay_ms),
        },
        stealth_mode: params.stealth_mode,
        same_domain: params.same_domain,
        seed_authority: authority(&params.seed),
        cancel_check,
        canceled: AtomicBool::new(false),
        saved: AtomicUsize::new(0),
        updated: AtomicUsize::new(0),
        deleted: AtomicUsize::new(0),
        log,
    });

    let mut workers = JoinSet::new();
    for _ in 0..config.workers.max(1) {
        let ctx = Arc::clone(&ctx);
        workers.spawn(async move { worker_loop(ctx).await });
    }
    while workers.join_next().await.is_some() {}

    CrawlOutcome {
        pages_saved: ctx.saved.load(Ordering::Relaxed),
        pages_updated: ctx.updated.load(Ordering::Relaxed),
        pages_deleted: ctx.deleted.load(Ordering::Relaxed),
        urls_claimed: ctx.frontier.visited_count(),
        canceled: ctx.canceled.load(Ordering::Relaxed),
        newly_saved: ctx.frontier.take_saved(),
    }
}

async fn worker_loop(ctx: Arc<WorkerCtx>) {
    loop {
        if ctx.canceled.load(Ordering::Relaxed) {
            break;
        }

        match ctx.frontier.pop() {
            PopResult::Exhausted => break,
            PopResult::Idle => tokio::time::sleep(IDLE_POLL).await,
            PopResult::Entry(entry) => {
                process_entry(&ctx, entry).await;
                ctx.frontier.done();
            }
        }
    }
}

async fn process_entry(ctx: &WorkerCtx, entry: FrontierEntry) {
    if entry.remaining_depth == 0 {
        return;
    }

    if ctx.same_domain && authority(&entry.url) != ctx.seed_authority {
        return;
    }

    let canonical = normalize_url(&entry.url);

    // Claim before fetch: two workers racing on one URL resolve to one fetch.
    if !ctx.frontier.claim(&canonical) {
        return;
    }

    if (ctx.cancel_check)() {
        ctx.canceled.store(true, Ordering::Relaxed);
        return;
    }

    let fetch_url = match Url::parse(&canonical) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!("unfetchable canonical URL {}: {}", canonical, e);
            return;
        }
    };

    let outcome = fetch_page(
        &ctx.client,
        &fetch_url,
        ctx.stealth_mode,
        entry.referrer.as_deref(),
        &ctx.retry,
    )
    .await;

    match outcome {
        FetchOutcome::RateLimited { attempts } => {
            ctx.log.push(&format!(
                "Giving up on {} after {} rate-limited attempts",
                canonical, attempts
            ));
        }
        FetchOutcome::Gone { status } => {
            let deleted = {
                let mut store = ctx.store.lock().unwrap();
                store.delete_page(&canonical)
            };
            match deleted {
                Ok(true) => {
                    ctx.deleted.fetch_add(1, Ordering::Relaxed);
                    ctx.log
                        .push(&format!("Removed: {} (status: {})", canonical, status));
                }
                Ok(false) => tracing::debug!("{} gone ({}), no row to remove", canonical, status),
                Err(e) => tracing::error!("failed to remove {}: {}", canonical, e),
            }
        }
        FetchOutcome::ContentMismatch {
            status,
            content_type,
        } => {
            tracing::debug!(
                "Skipping {} (status: {}, content-type: {})",
                canonical,
                status,
                content_type
            );
        }
        FetchOutcome::NetworkError { error } => {
            ctx.log
                .push(&format!("Error crawling {}: {}", canonical, error));
        }
        FetchOutcome::Success { body } => {
            let (summary, links) = parse_page(&body, &fetch_url);
            persist_and_expand(ctx, &entry, &canonical, &fetch_url, summary, links);
        }
    }
}

fn persist_and_expand(
    ctx: &WorkerCtx,
    entry: &FrontierEntry,
    canonical: &str,
    fetch_url: &Url,
    summary: PageSummary,
    links: Vec<Url>,
) {
    if summary.noindex {
        tracing::debug!("Skipping {} (noindex directive)", canonical);
        return;
    }

    if summary.title.contains("404") {
        ctx.log
            .push(&format!("Skipping 404 page: {} (found 404 in title)", canonical));
        return;
    }

    let persisted = {
        let mut store = ctx.store.lock().unwrap();
        match store.get_page(canonical) {
            Ok(existing) => {
                let delta = priority_delta(is_home_page(fetch_url), &summary, existing.is_some());
                store.upsert_crawled(
                    canonical,
                    &summary.title,
                    &summary.description,
                    &summary.keywords,
                    delta,
                )
            }
            Err(e) => Err(e),
        }
    };

    match persisted {
        Ok(UpsertOutcome::Inserted) => {
            ctx.saved.fetch_add(1, Ordering::Relaxed);
            ctx.frontier.record_saved(canonical.to_string());
            ctx.log.push(&format!("Saved: {}", canonical));
        }
        Ok(UpsertOutcome::Updated) => {
            ctx.updated.fetch_add(1, Ordering::Relaxed);
            ctx.log.push(&format!("Updated: {}", canonical));
        }
        Ok(UpsertOutcome::Unchanged) => {
            ctx.updated.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Confirmed: {}", canonical);
        }
        Err(e) => {
            tracing::error!("failed to persist {}: {}", canonical, e);
            return;
        }
    }

    if (ctx.cancel_check)() {
        ctx.canceled.store(true, Ordering::Relaxed);
        return;
    }

    if entry.remaining_depth > 1 {
        for link in links {
            ctx.frontier.push(FrontierEntry {
                url: link,
                remaining_depth: entry.remaining_depth - 1,
                referrer: Some(canonical.to_string()),
            });
        }
    }
}

/// Lowercase host plus explicit port: the "domain" the same-domain
/// constraint compares, so two sites on one host but different ports stay
/// distinct
fn authority(url: &Url) -> Option<(String, Option<u16>)> {
    url.host_str().map(|h| (h.to_lowercase(), url.port()))
}

/// Signed priority adjustment for one successful parse
///
/// Home pages gain, pages missing a title or description lose, keywords gain
/// a point, and a page that already has a row earns one extra point for
/// confirming freshness.
pub fn priority_delta(home_page: bool, summary: &PageSummary, exists: bool) -> i64 {
    let mut delta = 0;
    if home_page {
        delta += 5;
    }
    if summary.title.is_empty() {
        delta -= 5;
    }
    if summary.description.is_empty() {
        delta -= 3;
    }
    if !summary.keywords.is_empty() {
        delta += 1;
    }
    if exists {
        delta += 1;
    }
    delta
}
