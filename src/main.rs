//! NovaCrawler main entry point
//!
//! Command-line interface for the crawler: direct crawl passes, the
//! stale-refresh pass, the task orchestrator, and task monitoring.

use anyhow::Result;
use clap::{Parser, Subcommand};
use novacrawler::config::{load_config_or_default, Config};
use novacrawler::crawler::{self, never_canceled, CrawlParams};
use novacrawler::output::LogBuffer;
use novacrawler::request;
use novacrawler::storage::{SqliteStore, Store};
use novacrawler::tasks::Orchestrator;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;

/// NovaCrawler: a polite, resumable web crawler
#[derive(Parser, Debug)]
#[command(name = "novacrawler")]
#[command(version)]
#[command(about = "A polite, resumable web crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "novacrawler.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Crawl from a seed URL
    Crawl {
        /// URL to start crawling from
        #[arg(short, long)]
        url: String,

        /// Crawl depth (defaults to the configured depth)
        #[arg(short, long)]
        depth: Option<u32>,

        /// Rotate browser identities and spoof navigation headers
        #[arg(short, long)]
        stealth: bool,

        /// Never leave the seed's domain
        #[arg(long)]
        same_domain: bool,

        /// Number of crawl workers
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Re-fetch stale pages (one progress line per URL on stdout)
    Refresh,

    /// Run the task orchestrator (dispatcher + periodic stale refresh)
    Serve,

    /// Show recent tasks
    Tasks {
        /// Number of tasks to show
        #[arg(short, long, default_value = "15")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Crawl {
            url,
            depth,
            stealth,
            same_domain,
            workers,
        } => handle_crawl(config, url, depth, stealth, same_domain, workers).await,
        Commands::Refresh => handle_refresh(config).await,
        Commands::Serve => handle_serve(config).await,
        Commands::Tasks { limit } => handle_tasks(config, limit),
    }
}

/// Sets up the tracing subscriber
///
/// Logs go to stderr: stdout belongs to the refresh pass's line-stream
/// protocol and must stay clean.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("novacrawler=info,warn"),
            1 => EnvFilter::new("novacrawler=debug,info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Opens the store, prompting before creating a missing database
///
/// Declining creation is the one unrecoverable startup failure: the process
/// exits non-zero without touching anything.
fn open_store_checked(config: &Config) -> Result<Arc<Mutex<SqliteStore>>> {
    let path = Path::new(&config.store.database_path);

    if !path.exists() {
        eprintln!("Warning: database {} does not exist.", path.display());
        eprint!("Do you want to create it? (yes/no): ");
        std::io::stderr().flush().ok();

        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if answer.trim().to_lowercase() != "yes" {
            eprintln!("Stopping crawler.");
            std::process::exit(1);
        }
    }

    Ok(Arc::new(Mutex::new(SqliteStore::open(path)?)))
}

/// Opens the store, creating the database silently (daemon paths)
fn open_store(config: &Config) -> Result<Arc<Mutex<SqliteStore>>> {
    let path = Path::new(&config.store.database_path);
    Ok(Arc::new(Mutex::new(SqliteStore::open(path)?)))
}

async fn handle_crawl(
    mut config: Config,
    url: String,
    depth: Option<u32>,
    stealth: bool,
    same_domain: bool,
    workers: Option<usize>,
) -> Result<()> {
    let store = open_store_checked(&config)?;

    if let Some(workers) = workers {
        config.crawler.workers = workers;
    }

    let params = CrawlParams {
        seed: Url::parse(&url)?,
        max_depth: depth.unwrap_or(config.crawler.default_depth),
        same_domain,
        stealth_mode: stealth,
    };

    let log = Arc::new(LogBuffer::default());
    let outcome = crawler::run_crawl(store, &config, params, never_canceled(), log).await?;

    println!(
        "Crawl complete: {} saved, {} updated, {} removed ({} URLs visited)",
        outcome.pages_saved, outcome.pages_updated, outcome.pages_deleted, outcome.urls_claimed
    );

    Ok(())
}

async fn handle_refresh(config: Config) -> Result<()> {
    let store = open_store(&config)?;
    let client =
        request::build_http_client(Duration::from_secs(config.crawler.request_timeout_secs))?;

    let stats = crawler::refresh_pass(store, client, &config).await?;

    println!(
        "Refresh complete: {} updated, {} saved, {} removed, {} skipped of {} stale pages",
        stats.updated, stats.saved, stats.removed, stats.skipped, stats.total
    );

    Ok(())
}

async fn handle_serve(config: Config) -> Result<()> {
    let store = open_store(&config)?;

    tracing::info!(
        "Starting orchestrator (refresh every {} minutes)",
        config.refresh.interval_mins
    );

    let (orchestrator, _handle) = Orchestrator::new(store, config);
    orchestrator.run().await?;

    Ok(())
}

fn handle_tasks(config: Config, limit: usize) -> Result<()> {
    let store = open_store_checked(&config)?;

    let tasks = {
        let store = store.lock().unwrap();
        store.list_recent_tasks(limit)?
    };

    if tasks.is_empty() {
        println!("No tasks recorded.");
        return Ok(());
    }

    for task in tasks {
        let target = match &task.kind {
            novacrawler::TaskKind::Crawl { url, depth, .. } => {
                format!("crawl {} (depth {})", url, depth)
            }
            novacrawler::TaskKind::StaleRefresh => "stale refresh".to_string(),
        };
        println!(
            "#{:<5} {:<30} created {}  status {}",
            task.id,
            target,
            task.created_at,
            task.status.to_db_string()
        );
    }

    Ok(())
}
