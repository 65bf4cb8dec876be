//! Task orchestrator: durable FIFO, single dispatcher, periodic scheduler
//!
//! Tasks are rows first and queue entries second: submission inserts a
//! `pending` row, then pushes the id onto an in-process FIFO. A single
//! dispatcher drains the FIFO in submission order, so exactly one
//! crawl-or-refresh job runs at a time; each job fans out internally.
//! On startup every task left `pending` or `running` by a previous process
//! is force-failed before new dispatch begins.

use crate::config::Config;
use crate::crawler::{self, CrawlParams};
use crate::output::LogBuffer;
use crate::storage::{SqliteStore, Store, TaskRecord};
use crate::tasks::registry::CancellationRegistry;
use crate::tasks::{TaskKind, TaskStatus};
use crate::CrawlError;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use url::Url;

/// How often a running refresh subprocess is checked for cancellation
const CANCEL_POLL: Duration = Duration::from_millis(250);

/// Shared handle for submitting, cancelling, and observing tasks
///
/// This is the surface the dashboard layer embeds; it stays usable while
/// the dispatcher owns the receiving end of the FIFO.
#[derive(Clone)]
pub struct OrchestratorHandle {
    store: Arc<Mutex<SqliteStore>>,
    registry: Arc<CancellationRegistry>,
    log: Arc<LogBuffer>,
    queue_tx: mpsc::UnboundedSender<i64>,
}

impl OrchestratorHandle {
    /// Inserts a pending crawl task and enqueues it
    pub fn submit(
        &self,
        url: &str,
        depth: u32,
        same_domain: bool,
        stealth_mode: bool,
    ) -> crate::Result<i64> {
        self.submit_kind(TaskKind::Crawl {
            url: url.to_string(),
            depth,
            same_domain,
            stealth_mode,
        })
    }

    /// Inserts a pending stale-refresh task and enqueues it
    pub fn submit_refresh(&self) -> crate::Result<i64> {
        self.submit_kind(TaskKind::StaleRefresh)
    }

    fn submit_kind(&self, kind: TaskKind) -> crate::Result<i64> {
        let task_id = {
            let mut store = self.store.lock().unwrap();
            store.insert_task(&kind)?
        };
        self.log
            .push(&format!("Task {} submitted ({})", task_id, kind.type_str()));
        // Send fails only when the dispatcher is gone; the row remains and
        // will be repaired as interrupted on the next startup.
        let _ = self.queue_tx.send(task_id);
        Ok(task_id)
    }

    /// Requests cancellation of a task
    ///
    /// Idempotent: terminal tasks are left untouched. A `pending` or
    /// `running` task is eagerly marked `canceled` and its id registered so
    /// the running job observes the request at its next checkpoint.
    pub fn cancel(&self, task_id: i64) -> crate::Result<()> {
        let mut store = self.store.lock().unwrap();
        let task = store
            .get_task(task_id)?
            .ok_or(CrawlError::TaskNotFound(task_id))?;

        if matches!(task.status, TaskStatus::Pending | TaskStatus::Running) {
            self.registry.request(task_id);
            store.set_task_status(task_id, &TaskStatus::Canceled)?;
            self.log.push(&format!("Task {} canceled", task_id));
        }
        Ok(())
    }

    /// Most recent tasks by creation time, descending
    pub fn list_recent(&self, limit: usize) -> crate::Result<Vec<TaskRecord>> {
        let store = self.store.lock().unwrap();
        Ok(store.list_recent_tasks(limit)?)
    }

    /// Snapshot of the progress log ring buffer
    pub fn stream_logs(&self) -> Vec<String> {
        self.log.snapshot()
    }
}

/// Single-dispatcher task orchestrator
pub struct Orchestrator {
    store: Arc<Mutex<SqliteStore>>,
    config: Config,
    registry: Arc<CancellationRegistry>,
    log: Arc<LogBuffer>,
    queue_rx: mpsc::UnboundedReceiver<i64>,
    handle: OrchestratorHandle,
}

impl Orchestrator {
    /// Creates the orchestrator and its shareable handle
    pub fn new(store: Arc<Mutex<SqliteStore>>, config: Config) -> (Self, OrchestratorHandle) {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(CancellationRegistry::new());
        let log = Arc::new(LogBuffer::default());

        let handle = OrchestratorHandle {
            store: Arc::clone(&store),
            registry: Arc::clone(&registry),
            log: Arc::clone(&log),
            queue_tx,
        };

        let orchestrator = Self {
            store,
            config,
            registry,
            log,
            queue_rx,
            handle: handle.clone(),
        };

        (orchestrator, handle)
    }

    /// Repairs tasks left over from a crashed run
    ///
    /// A task found `pending` or `running` at startup is never trusted:
    /// its process is gone, so the row is force-transitioned to failed.
    pub fn recover(&self) -> crate::Result<usize> {
        let repaired = {
            let mut store = self.store.lock().unwrap();
            store.fail_interrupted_tasks()?
        };
        if repaired > 0 {
            self.log.push(&format!(
                "Startup recovery: {} interrupted tasks marked failed",
                repaired
            ));
        }
        Ok(repaired)
    }

    /// Drains the task FIFO forever, injecting a stale-refresh task on the
    /// configured interval
    ///
    /// Recovery runs before the first dispatch. A task failure never
    /// terminates this loop.
    pub async fn run(mut self) -> crate::Result<()> {
        self.recover()?;

        let period = Duration::from_secs(self.config.refresh.interval_mins * 60);
        let mut refresh_timer =
            tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        refresh_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                maybe_id = self.queue_rx.recv() => {
                    match maybe_id {
                        Some(task_id) => self.dispatch(task_id).await,
                        None => break,
                    }
                }
                _ = refresh_timer.tick() => {
                    if let Err(e) = self.handle.submit_refresh() {
                        tracing::error!("failed to schedule stale refresh: {}", e);
                    }
                }
            }
        }

        Ok(())
    }

    /// Runs one task to a terminal status; never propagates its failure
    async fn dispatch(&self, task_id: i64) {
        let task = {
            let store = self.store.lock().unwrap();
            store.get_task(task_id)
        };

        let task = match task {
            Ok(Some(task)) => task,
            Ok(None) => {
                tracing::warn!("task {} vanished before dispatch", task_id);
                self.registry.clear(task_id);
                return;
            }
            Err(e) => {
                tracing::error!("failed to load task {}: {}", task_id, e);
                self.registry.clear(task_id);
                return;
            }
        };

        // A concurrent cancellation may have resolved the task while it sat
        // in the queue.
        if task.status != TaskStatus::Pending {
            self.log.push(&format!(
                "Skipping task {} (already {})",
                task_id,
                task.status.to_db_string()
            ));
            self.registry.clear(task_id);
            return;
        }

        self.set_status(task_id, &TaskStatus::Running);
        self.log.push(&format!(
            "Task {} running ({})",
            task_id,
            task.kind.type_str()
        ));

        let result = match &task.kind {
            TaskKind::Crawl {
                url,
                depth,
                same_domain,
                stealth_mode,
            } => {
                self.run_crawl_task(task_id, url, *depth, *same_domain, *stealth_mode)
                    .await
            }
            TaskKind::StaleRefresh => self.run_refresh_task(task_id).await,
        };

        let final_status = if self.registry.is_requested(task_id) {
            TaskStatus::Canceled
        } else {
            match result {
                Ok(()) => TaskStatus::Completed,
                Err(e) => TaskStatus::Failed(e.to_string()),
            }
        };

        self.log.push(&format!(
            "Task {} finished: {}",
            task_id,
            final_status.to_db_string()
        ));
        self.set_status(task_id, &final_status);
        self.registry.clear(task_id);
    }

    async fn run_crawl_task(
        &self,
        task_id: i64,
        url: &str,
        depth: u32,
        same_domain: bool,
        stealth_mode: bool,
    ) -> crate::Result<()> {
        let seed = Url::parse(url)?;
        let params = CrawlParams {
            seed,
            max_depth: depth,
            same_domain,
            stealth_mode,
        };

        let registry = Arc::clone(&self.registry);
        let cancel_check: crawler::CancelCheck = Arc::new(move || registry.is_requested(task_id));

        crawler::run_crawl(
            Arc::clone(&self.store),
            &self.config,
            params,
            cancel_check,
            Arc::clone(&self.log),
        )
        .await?;

        Ok(())
    }

    /// Spawns the refresh collaborator and forwards its line stream
    ///
    /// The subprocess is a black box: one progress line per unit of work on
    /// stdout, terminated early if the task gets canceled, exit status
    /// awaited but not interpreted.
    async fn run_refresh_task(&self, task_id: i64) -> crate::Result<()> {
        let command = self.refresh_command();
        let (program, args) = command.split_first().ok_or_else(|| {
            CrawlError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "empty refresh command",
            ))
        })?;

        let mut child = tokio::process::Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| {
            CrawlError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "refresh stdout unavailable",
            ))
        })?;
        let mut lines = BufReader::new(stdout).lines();
        let mut cancel_poll = tokio::time::interval(CANCEL_POLL);

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line? {
                        Some(line) => self.log.push(&line),
                        None => break,
                    }
                }
                _ = cancel_poll.tick() => {
                    if self.registry.is_requested(task_id) {
                        self.log.push(&format!("Terminating refresh task {}", task_id));
                        child.start_kill()?;
                    }
                }
            }
        }

        child.wait().await?;
        Ok(())
    }

    fn refresh_command(&self) -> Vec<String> {
        if !self.config.refresh.command.is_empty() {
            return self.config.refresh.command.clone();
        }

        // Default collaborator: this binary's own refresh subcommand.
        let program = std::env::current_exe()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "novacrawler".to_string());
        vec![program, "refresh".to_string()]
    }

    fn set_status(&self, task_id: i64, status: &TaskStatus) {
        let result = {
            let mut store = self.store.lock().unwrap();
            store.set_task_status(task_id, status)
        };
        if let Err(e) = result {
            tracing::error!("failed to set task {} status: {}", task_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_orchestrator() -> (Orchestrator, OrchestratorHandle) {
        let store = Arc::new(Mutex::new(SqliteStore::open_in_memory().unwrap()));
        Orchestrator::new(store, Config::default())
    }

    #[tokio::test]
    async fn test_submit_creates_pending_task() {
        let (_orchestrator, handle) = make_orchestrator();

        let id = handle.submit("https://example.com", 2, true, false).unwrap();
        let tasks = handle.list_recent(10).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, id);
        assert_eq!(tasks[0].status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_cancel_pending_task_resolves_to_canceled() {
        let (orchestrator, handle) = make_orchestrator();

        let id = handle.submit("https://example.com", 2, false, false).unwrap();
        handle.cancel(id).unwrap();

        let task = handle.list_recent(1).unwrap().remove(0);
        assert_eq!(task.status, TaskStatus::Canceled);
        assert!(orchestrator.registry.is_requested(id));

        // The dispatcher sees the canceled row, skips it, and clears the id.
        orchestrator.dispatch(id).await;
        assert!(!orchestrator.registry.is_requested(id));
        let task = handle.list_recent(1).unwrap().remove(0);
        assert_eq!(task.status, TaskStatus::Canceled);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent_on_terminal_tasks() {
        let (_orchestrator, handle) = make_orchestrator();

        let id = handle.submit("https://example.com", 2, false, false).unwrap();
        {
            let mut store = handle.store.lock().unwrap();
            store.set_task_status(id, &TaskStatus::Completed).unwrap();
        }

        handle.cancel(id).unwrap();
        let task = handle.list_recent(1).unwrap().remove(0);
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_cancel_unknown_task_errors() {
        let (_orchestrator, handle) = make_orchestrator();
        assert!(matches!(
            handle.cancel(999),
            Err(CrawlError::TaskNotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_recover_fails_interrupted_tasks() {
        let (orchestrator, handle) = make_orchestrator();

        let pending = handle.submit("https://example.com", 1, false, false).unwrap();
        let running = handle.submit_refresh().unwrap();
        {
            let mut store = handle.store.lock().unwrap();
            store.set_task_status(running, &TaskStatus::Running).unwrap();
        }

        let repaired = orchestrator.recover().unwrap();
        assert_eq!(repaired, 2);

        for task in handle.list_recent(10).unwrap() {
            assert!(
                matches!(task.status, TaskStatus::Failed(_)),
                "task {} should be failed, is {:?}",
                task.id,
                task.status
            );
        }
        let _ = pending;
    }

    #[tokio::test]
    async fn test_dispatch_invalid_seed_fails_task() {
        let (orchestrator, handle) = make_orchestrator();

        let id = handle.submit("not a url", 1, false, false).unwrap();
        orchestrator.dispatch(id).await;

        let task = handle.list_recent(1).unwrap().remove(0);
        assert!(matches!(task.status, TaskStatus::Failed(_)));
        assert!(task.completed_at.is_some());
        assert!(!orchestrator.registry.is_requested(id));
    }

    #[tokio::test]
    async fn test_logs_are_streamed() {
        let (_orchestrator, handle) = make_orchestrator();
        handle.submit("https://example.com", 1, false, false).unwrap();

        let logs = handle.stream_logs();
        assert!(!logs.is_empty());
        assert!(logs.iter().any(|line| line.contains("submitted")));
    }
}
