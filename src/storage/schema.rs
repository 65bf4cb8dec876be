//! Database schema and versioned migrations
//!
//! Migrations are applied once each, tracked through `PRAGMA user_version`,
//! and safe to run on every boot. Never edit an existing migration; append a
//! new one.

use rusqlite::Connection;

/// Ordered migrations; index + 1 is the schema version after applying
const MIGRATIONS: &[&str] = &[
    // v1: page metadata rows, one per canonical URL
    r#"
    CREATE TABLE pages (
        url TEXT PRIMARY KEY,
        title TEXT,
        description TEXT,
        keywords TEXT,
        favicon_id TEXT,
        priority INTEGER DEFAULT 0,
        last_crawled TIMESTAMP
    );
    "#,
    // v2: task queue rows, retained as history
    r#"
    CREATE TABLE tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT NULL,
        depth INTEGER NULL,
        same_domain BOOLEAN NULL,
        stealth_mode BOOLEAN NULL,
        status TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL,
        completed_at TIMESTAMP,
        task_type TEXT DEFAULT 'crawl'
    );
    CREATE INDEX idx_tasks_created ON tasks(created_at);
    "#,
];

/// Applies any migrations the database has not seen yet
pub fn run_migrations(conn: &mut Connection) -> Result<(), rusqlite::Error> {
    let version: usize =
        conn.query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))? as usize;

    for (index, migration) in MIGRATIONS.iter().enumerate().skip(version) {
        let tx = conn.transaction()?;
        tx.execute_batch(migration)?;
        tx.pragma_update(None, "user_version", index as i64 + 1)?;
        tx.commit()?;
    }

    Ok(())
}

/// Schema version the binary expects after migration
pub fn schema_version() -> usize {
    MIGRATIONS.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_apply_to_empty_db() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();

        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version as usize, schema_version());
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();

        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version as usize, schema_version());
    }

    #[test]
    fn test_tables_exist_after_migration() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();

        for table in ["pages", "tasks"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "table {} should exist", table);
        }
    }

    #[test]
    fn test_partial_migration_resumes() {
        let mut conn = Connection::open_in_memory().unwrap();

        // Apply only v1 by hand, then let the migrator catch up.
        let tx = conn.transaction().unwrap();
        tx.execute_batch(MIGRATIONS[0]).unwrap();
        tx.pragma_update(None, "user_version", 1).unwrap();
        tx.commit().unwrap();

        run_migrations(&mut conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='tasks'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
