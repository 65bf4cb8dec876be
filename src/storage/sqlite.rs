//! SQLite store implementation

use crate::storage::schema::run_migrations;
use crate::storage::traits::{Store, StorageResult};
use crate::storage::{PageRecord, RefreshOutcome, TaskRecord, UpsertOutcome};
use crate::tasks::{TaskKind, TaskStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the database at the given path
    ///
    /// WAL journaling keeps readers concurrent while the mutex around this
    /// store serializes writers. Migrations run before the store is handed
    /// to any component.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let mut conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        run_migrations(&mut conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory store (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let mut conn = Connection::open_in_memory()?;
        run_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
        Ok(PageRecord {
            url: row.get(0)?,
            title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            keywords: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            favicon_id: row.get(4)?,
            priority: row.get(5)?,
            last_crawled: row.get(6)?,
        })
    }

    fn task_from_row(row: &Row<'_>) -> rusqlite::Result<TaskRecord> {
        let task_type: Option<String> = row.get(8)?;
        let kind = match task_type.as_deref() {
            Some("stale_refresh") => TaskKind::StaleRefresh,
            _ => TaskKind::Crawl {
                url: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                depth: row.get::<_, Option<i64>>(2)?.unwrap_or(0) as u32,
                same_domain: row.get::<_, Option<bool>>(3)?.unwrap_or(false),
                stealth_mode: row.get::<_, Option<bool>>(4)?.unwrap_or(false),
            },
        };

        let status_str: String = row.get(5)?;
        let status = TaskStatus::from_db_string(&status_str)
            .unwrap_or_else(|| TaskStatus::Failed(format!("unknown status '{}'", status_str)));

        Ok(TaskRecord {
            id: row.get(0)?,
            kind,
            status,
            created_at: row.get(6)?,
            completed_at: row.get(7)?,
        })
    }
}

const TASK_COLUMNS: &str =
    "id, url, depth, same_domain, stealth_mode, status, created_at, completed_at, task_type";

impl Store for SqliteStore {
    // ===== Pages =====

    fn get_page(&self, url: &str) -> StorageResult<Option<PageRecord>> {
        let page = self
            .conn
            .query_row(
                "SELECT url, title, description, keywords, favicon_id, priority, last_crawled
                 FROM pages WHERE url = ?1",
                params![url],
                Self::page_from_row,
            )
            .optional()?;
        Ok(page)
    }

    fn upsert_crawled(
        &mut self,
        url: &str,
        title: &str,
        description: &str,
        keywords: &str,
        priority_delta: i64,
    ) -> StorageResult<UpsertOutcome> {
        let tx = self.conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        let existing: Option<(String, String, String)> = tx
            .query_row(
                "SELECT title, description, keywords FROM pages WHERE url = ?1",
                params![url],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                        row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    ))
                },
            )
            .optional()?;

        let outcome = match existing {
            Some((stored_title, stored_description, stored_keywords)) => {
                let changed = stored_title != title
                    || stored_description != description
                    || stored_keywords != keywords;
                if changed {
                    tx.execute(
                        "UPDATE pages
                         SET title = ?1, description = ?2, keywords = ?3, last_crawled = ?4
                         WHERE url = ?5",
                        params![title, description, keywords, now, url],
                    )?;
                }
                tx.execute(
                    "UPDATE pages SET priority = priority + ?1 WHERE url = ?2",
                    params![priority_delta, url],
                )?;
                if changed {
                    UpsertOutcome::Updated
                } else {
                    UpsertOutcome::Unchanged
                }
            }
            None => {
                tx.execute(
                    "INSERT INTO pages (url, title, description, keywords, priority, last_crawled)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![url, title, description, keywords, priority_delta, now],
                )?;
                UpsertOutcome::Inserted
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    fn record_refreshed(
        &mut self,
        url: &str,
        title: &str,
        description: &str,
        keywords: &str,
    ) -> StorageResult<RefreshOutcome> {
        let tx = self.conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        let updated = tx.execute(
            "UPDATE pages
             SET title = ?1, description = ?2, keywords = ?3, last_crawled = ?4
             WHERE url = ?5",
            params![title, description, keywords, now, url],
        )?;

        let outcome = if updated > 0 {
            RefreshOutcome::Updated
        } else {
            tx.execute(
                "INSERT INTO pages (url, title, description, keywords, priority, last_crawled)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                params![url, title, description, keywords, now],
            )?;
            RefreshOutcome::Inserted
        };

        tx.commit()?;
        Ok(outcome)
    }

    fn delete_page(&mut self, url: &str) -> StorageResult<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM pages WHERE url = ?1", params![url])?;
        Ok(deleted > 0)
    }

    fn set_favicon(&mut self, domain: &str, favicon_id: &str) -> StorageResult<usize> {
        let pattern = format!("%{}%", domain);
        let updated = self.conn.execute(
            "UPDATE pages SET favicon_id = ?1 WHERE url LIKE ?2",
            params![favicon_id, pattern],
        )?;
        Ok(updated)
    }

    fn stale_urls(&self, cutoff: &str) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT url FROM pages WHERE last_crawled IS NULL OR last_crawled < ?1",
        )?;
        let urls = stmt
            .query_map(params![cutoff], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(urls)
    }

    fn count_pages(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Tasks =====

    fn insert_task(&mut self, kind: &TaskKind) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        match kind {
            TaskKind::Crawl {
                url,
                depth,
                same_domain,
                stealth_mode,
            } => {
                self.conn.execute(
                    "INSERT INTO tasks (url, depth, same_domain, stealth_mode, status, created_at, task_type)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        url,
                        depth,
                        same_domain,
                        stealth_mode,
                        TaskStatus::Pending.to_db_string(),
                        now,
                        kind.type_str()
                    ],
                )?;
            }
            TaskKind::StaleRefresh => {
                self.conn.execute(
                    "INSERT INTO tasks (status, created_at, task_type) VALUES (?1, ?2, ?3)",
                    params![TaskStatus::Pending.to_db_string(), now, kind.type_str()],
                )?;
            }
        }
        Ok(self.conn.last_insert_rowid())
    }

    fn get_task(&self, task_id: i64) -> StorageResult<Option<TaskRecord>> {
        let task = self
            .conn
            .query_row(
                &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
                params![task_id],
                Self::task_from_row,
            )
            .optional()?;
        Ok(task)
    }

    fn list_recent_tasks(&self, limit: usize) -> StorageResult<Vec<TaskRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM tasks ORDER BY created_at DESC, id DESC LIMIT ?1",
            TASK_COLUMNS
        ))?;
        let tasks = stmt
            .query_map(params![limit as i64], Self::task_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    fn set_task_status(&mut self, task_id: i64, status: &TaskStatus) -> StorageResult<()> {
        if status.is_terminal() {
            let now = Utc::now().to_rfc3339();
            self.conn.execute(
                "UPDATE tasks SET status = ?1, completed_at = ?2 WHERE id = ?3",
                params![status.to_db_string(), now, task_id],
            )?;
        } else {
            self.conn.execute(
                "UPDATE tasks SET status = ?1 WHERE id = ?2",
                params![status.to_db_string(), task_id],
            )?;
        }
        Ok(())
    }

    fn fail_interrupted_tasks(&mut self) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let repaired = self.conn.execute(
            "UPDATE tasks SET status = ?1, completed_at = ?2
             WHERE status IN ('pending', 'running')",
            params![
                TaskStatus::Failed("interrupted by restart".to_string()).to_db_string(),
                now
            ],
        )?;
        Ok(repaired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crawl_kind(url: &str) -> TaskKind {
        TaskKind::Crawl {
            url: url.to_string(),
            depth: 2,
            same_domain: true,
            stealth_mode: false,
        }
    }

    #[test]
    fn test_open_in_memory() {
        assert!(SqliteStore::open_in_memory().is_ok());
    }

    #[test]
    fn test_upsert_inserts_new_page() {
        let mut store = SqliteStore::open_in_memory().unwrap();

        let outcome = store
            .upsert_crawled("https://example.com/a", "Title", "Desc", "kw", 6)
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);

        let page = store.get_page("https://example.com/a").unwrap().unwrap();
        assert_eq!(page.title, "Title");
        assert_eq!(page.priority, 6);
        assert!(page.last_crawled.is_some());
    }

    #[test]
    fn test_upsert_applies_delta_without_metadata_change() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_crawled("https://example.com/a", "Title", "Desc", "kw", 6)
            .unwrap();
        let first_crawl = store
            .get_page("https://example.com/a")
            .unwrap()
            .unwrap()
            .last_crawled;

        let outcome = store
            .upsert_crawled("https://example.com/a", "Title", "Desc", "kw", 7)
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Unchanged);

        let page = store.get_page("https://example.com/a").unwrap().unwrap();
        assert_eq!(page.priority, 13);
        assert_eq!(page.last_crawled, first_crawl, "timestamp must not move");
    }

    #[test]
    fn test_upsert_updates_changed_metadata() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_crawled("https://example.com/a", "Old", "Desc", "kw", 1)
            .unwrap();

        let outcome = store
            .upsert_crawled("https://example.com/a", "New", "Desc", "kw", 2)
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);

        let page = store.get_page("https://example.com/a").unwrap().unwrap();
        assert_eq!(page.title, "New");
        assert_eq!(page.priority, 3);
    }

    #[test]
    fn test_negative_delta_allowed() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_crawled("https://example.com/a", "", "", "", -8)
            .unwrap();
        let page = store.get_page("https://example.com/a").unwrap().unwrap();
        assert_eq!(page.priority, -8);
    }

    #[test]
    fn test_record_refreshed_always_bumps_timestamp() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_crawled("https://example.com/a", "Title", "Desc", "kw", 0)
            .unwrap();

        let outcome = store
            .record_refreshed("https://example.com/a", "Title", "Desc", "kw")
            .unwrap();
        assert_eq!(outcome, RefreshOutcome::Updated);
        assert!(store
            .get_page("https://example.com/a")
            .unwrap()
            .unwrap()
            .last_crawled
            .is_some());
    }

    #[test]
    fn test_delete_page() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_crawled("https://example.com/a", "T", "", "", 0)
            .unwrap();

        assert!(store.delete_page("https://example.com/a").unwrap());
        assert!(store.get_page("https://example.com/a").unwrap().is_none());
        assert!(!store.delete_page("https://example.com/a").unwrap());
    }

    #[test]
    fn test_set_favicon_updates_domain_rows() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_crawled("https://example.com/a", "", "", "", 0)
            .unwrap();
        store
            .upsert_crawled("https://example.com/b", "", "", "", 0)
            .unwrap();
        store
            .upsert_crawled("https://other.org/c", "", "", "", 0)
            .unwrap();

        let updated = store.set_favicon("example.com", "abc123").unwrap();
        assert_eq!(updated, 2);

        let page = store.get_page("https://other.org/c").unwrap().unwrap();
        assert!(page.favicon_id.is_none());
    }

    #[test]
    fn test_stale_urls_includes_never_crawled() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO pages (url, priority) VALUES ('https://example.com/never', 0)",
                [],
            )
            .unwrap();
        store
            .upsert_crawled("https://example.com/fresh", "T", "", "", 0)
            .unwrap();

        let cutoff = Utc::now()
            .checked_sub_signed(chrono::Duration::days(14))
            .unwrap()
            .to_rfc3339();
        let stale = store.stale_urls(&cutoff).unwrap();
        assert_eq!(stale, vec!["https://example.com/never".to_string()]);
    }

    #[test]
    fn test_task_roundtrip() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let id = store.insert_task(&crawl_kind("https://example.com")).unwrap();

        let task = store.get_task(id).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.kind, crawl_kind("https://example.com"));
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn test_refresh_task_roundtrip() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let id = store.insert_task(&TaskKind::StaleRefresh).unwrap();

        let task = store.get_task(id).unwrap().unwrap();
        assert_eq!(task.kind, TaskKind::StaleRefresh);
    }

    #[test]
    fn test_terminal_status_stamps_completed_at() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let id = store.insert_task(&TaskKind::StaleRefresh).unwrap();

        store.set_task_status(id, &TaskStatus::Running).unwrap();
        assert!(store.get_task(id).unwrap().unwrap().completed_at.is_none());

        store.set_task_status(id, &TaskStatus::Completed).unwrap();
        assert!(store.get_task(id).unwrap().unwrap().completed_at.is_some());
    }

    #[test]
    fn test_list_recent_tasks_descending() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let first = store.insert_task(&TaskKind::StaleRefresh).unwrap();
        let second = store.insert_task(&crawl_kind("https://example.com")).unwrap();

        let tasks = store.list_recent_tasks(10).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, second);
        assert_eq!(tasks[1].id, first);

        let limited = store.list_recent_tasks(1).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_fail_interrupted_tasks() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let pending = store.insert_task(&TaskKind::StaleRefresh).unwrap();
        let running = store.insert_task(&crawl_kind("https://example.com")).unwrap();
        let done = store.insert_task(&TaskKind::StaleRefresh).unwrap();
        store.set_task_status(running, &TaskStatus::Running).unwrap();
        store.set_task_status(done, &TaskStatus::Completed).unwrap();

        let repaired = store.fail_interrupted_tasks().unwrap();
        assert_eq!(repaired, 2);

        for id in [pending, running] {
            let task = store.get_task(id).unwrap().unwrap();
            assert!(matches!(task.status, TaskStatus::Failed(_)));
            assert!(task.completed_at.is_some());
        }
        assert_eq!(
            store.get_task(done).unwrap().unwrap().status,
            TaskStatus::Completed
        );
    }
}
