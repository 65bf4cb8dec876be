//! Storage module for page metadata and task rows
//!
//! All database access for the crawler lives here:
//! - SQLite initialization with versioned, idempotent migrations
//! - transactional page upserts with signed priority deltas
//! - the durable task queue rows and their lifecycle updates
//! - crash recovery for tasks interrupted by a previous run

mod schema;
mod sqlite;
mod traits;

pub use schema::{run_migrations, schema_version};
pub use sqlite::SqliteStore;
pub use traits::{Store, StorageError, StorageResult};

use crate::tasks::{TaskKind, TaskStatus};

/// One row of the `pages` table
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub url: String,
    pub title: String,
    pub description: String,
    pub keywords: String,
    pub favicon_id: Option<String>,
    pub priority: i64,
    pub last_crawled: Option<String>,
}

/// One row of the `tasks` table
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub id: i64,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub created_at: String,
    pub completed_at: Option<String>,
}

/// What a crawl upsert did to the page row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No row existed; one was inserted
    Inserted,
    /// Row existed and its metadata changed
    Updated,
    /// Row existed and its metadata was already current (delta still applied)
    Unchanged,
}

/// What a refresh write did to the page row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Inserted,
    Updated,
}
