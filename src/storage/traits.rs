//! Storage trait and error types

use crate::storage::{PageRecord, RefreshOutcome, TaskRecord, UpsertOutcome};
use crate::tasks::{TaskKind, TaskStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for the page/task store backend
///
/// Every write is a single transaction; callers share the store behind a
/// mutex, so writers are serialized while the WAL journal keeps readers
/// concurrent.
pub trait Store {
    // ===== Pages =====

    /// Gets a page row by canonical URL
    fn get_page(&self, url: &str) -> StorageResult<Option<PageRecord>>;

    /// Applies a crawl result to the page row in one transaction.
    ///
    /// Existing row: metadata fields and `last_crawled` change only when
    /// title/description/keywords differ from the stored values; the signed
    /// priority delta is applied unconditionally. Missing row: inserted with
    /// the delta as its initial priority.
    fn upsert_crawled(
        &mut self,
        url: &str,
        title: &str,
        description: &str,
        keywords: &str,
        priority_delta: i64,
    ) -> StorageResult<UpsertOutcome>;

    /// Applies a refresh result: metadata and timestamp are written
    /// unconditionally, inserting the row if it vanished since discovery
    fn record_refreshed(
        &mut self,
        url: &str,
        title: &str,
        description: &str,
        keywords: &str,
    ) -> StorageResult<RefreshOutcome>;

    /// Deletes a page row; returns true if a row existed
    fn delete_page(&mut self, url: &str) -> StorageResult<bool>;

    /// Stamps every page belonging to a domain with a favicon identifier
    fn set_favicon(&mut self, domain: &str, favicon_id: &str) -> StorageResult<usize>;

    /// URLs never fetched or last fetched before the cutoff (RFC 3339)
    fn stale_urls(&self, cutoff: &str) -> StorageResult<Vec<String>>;

    /// Total number of page rows
    fn count_pages(&self) -> StorageResult<u64>;

    // ===== Tasks =====

    /// Inserts a pending task row and returns its id
    fn insert_task(&mut self, kind: &TaskKind) -> StorageResult<i64>;

    /// Gets a task row by id
    fn get_task(&self, task_id: i64) -> StorageResult<Option<TaskRecord>>;

    /// Most recent tasks by creation time, descending
    fn list_recent_tasks(&self, limit: usize) -> StorageResult<Vec<TaskRecord>>;

    /// Sets a task's status; terminal statuses also stamp `completed_at`
    fn set_task_status(&mut self, task_id: i64, status: &TaskStatus) -> StorageResult<()>;

    /// Force-fails every task left `pending` or `running` by a previous
    /// process; returns how many rows were repaired
    fn fail_interrupted_tasks(&mut self) -> StorageResult<usize>;
}
