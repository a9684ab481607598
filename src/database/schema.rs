/*!
 * Database schema definitions and migrations.
 *
 * Tables cover the import side (batches, chapter drafts, pricing profiles),
 * the workflow side (tasks and per-chapter progress records) and the catalog
 * the workflow publishes into (volumes and chapters).
 */

use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    // Foreign keys are a per-connection setting
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Initializing database schema v{}", SCHEMA_VERSION);
        create_all_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!(
            "Migrating database schema from v{} to v{}",
            current_version, SCHEMA_VERSION
        );
        migrate_schema(conn, current_version)?;
    } else {
        debug!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get the current schema version from the database
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .context("Failed to check schema_version table existence")?;

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version in the database
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version, updated_at) VALUES (1, ?1, datetime('now'))",
        [version],
    )?;
    Ok(())
}

/// Create all database tables
fn create_all_tables(conn: &Connection) -> Result<()> {
    // WAL keeps readers unblocked while a step writes
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    // One submission of source text for a novel
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS import_batches (
            id TEXT PRIMARY KEY,
            novel_id INTEGER NOT NULL,
            admin_id TEXT,
            source_hash TEXT NOT NULL,
            import_config TEXT NOT NULL,
            chapter_count INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'draft',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_batches_novel ON import_batches(novel_id);
        "#,
    )?;

    // In-flight chapters; the chapter number is unique per novel
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS chapter_drafts (
            id TEXT PRIMARY KEY,
            novel_id INTEGER NOT NULL,
            batch_id TEXT NOT NULL,
            chapter_number INTEGER NOT NULL,
            raw_title TEXT NOT NULL,
            raw_content TEXT NOT NULL,
            clean_title TEXT,
            clean_content TEXT,
            translated_title TEXT,
            translated_content TEXT,
            word_count INTEGER NOT NULL DEFAULT 0,
            volume_number INTEGER NOT NULL DEFAULT 1,
            unlock_price INTEGER NOT NULL DEFAULT 0,
            key_cost INTEGER NOT NULL DEFAULT 0,
            is_free INTEGER NOT NULL DEFAULT 0,
            release_at TEXT NOT NULL,
            is_released INTEGER NOT NULL DEFAULT 0,
            is_advance INTEGER NOT NULL DEFAULT 0,
            has_issue INTEGER NOT NULL DEFAULT 0,
            issue_tags TEXT NOT NULL DEFAULT '[]',
            issue_summary TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'pending',
            error_message TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(novel_id, chapter_number),
            FOREIGN KEY (batch_id) REFERENCES import_batches(id)
        );

        CREATE INDEX IF NOT EXISTS idx_drafts_batch ON chapter_drafts(batch_id);
        "#,
    )?;

    // Resumable workflow runs, one per confirmed batch
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS translation_tasks (
            id TEXT PRIMARY KEY,
            novel_id INTEGER NOT NULL,
            batch_id TEXT NOT NULL,
            total_chapters INTEGER NOT NULL DEFAULT 0,
            completed_chapters INTEGER NOT NULL DEFAULT 0,
            failed_chapters INTEGER NOT NULL DEFAULT 0,
            current_step TEXT NOT NULL DEFAULT 'segmenting',
            checkpoint TEXT NOT NULL DEFAULT '{}',
            status TEXT NOT NULL DEFAULT 'pending',
            error_message TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (batch_id) REFERENCES import_batches(id)
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_batch ON translation_tasks(batch_id);
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS chapter_translation_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id TEXT NOT NULL,
            draft_id TEXT NOT NULL,
            chapter_number INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            error_message TEXT,
            catalog_chapter_id INTEGER,
            updated_at TEXT NOT NULL,
            UNIQUE(task_id, draft_id),
            FOREIGN KEY (task_id) REFERENCES translation_tasks(id) ON DELETE CASCADE,
            FOREIGN KEY (draft_id) REFERENCES chapter_drafts(id)
        );

        CREATE INDEX IF NOT EXISTS idx_records_task_status
            ON chapter_translation_records(task_id, status);
        "#,
    )?;

    // Published catalog
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS volumes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            novel_id INTEGER NOT NULL,
            volume_number INTEGER NOT NULL,
            title TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(novel_id, volume_number)
        );

        CREATE TABLE IF NOT EXISTS catalog_chapters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            novel_id INTEGER NOT NULL,
            volume_id INTEGER NOT NULL,
            chapter_number INTEGER NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            word_count INTEGER NOT NULL,
            unlock_price INTEGER NOT NULL,
            key_cost INTEGER NOT NULL,
            is_free INTEGER NOT NULL,
            release_at TEXT NOT NULL,
            is_released INTEGER NOT NULL,
            is_advance INTEGER NOT NULL,
            draft_id TEXT,
            created_at TEXT NOT NULL,
            UNIQUE(novel_id, chapter_number),
            FOREIGN KEY (volume_id) REFERENCES volumes(id)
        );

        CREATE TABLE IF NOT EXISTS pricing_profiles (
            novel_id INTEGER PRIMARY KEY,
            price_per_thousand_words INTEGER NOT NULL,
            key_cost_divisor INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )?;

    debug!("All database tables created successfully");
    Ok(())
}

/// Migrate schema from an older version
fn migrate_schema(conn: &Connection, from_version: i32) -> Result<()> {
    // Future migrations go here, one arm per version step
    if from_version < SCHEMA_VERSION {
        set_schema_version(conn, SCHEMA_VERSION)?;
    }
    Ok(())
}

/// Drop all tables (for testing purposes)
#[cfg(test)]
pub fn drop_all_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DROP TABLE IF EXISTS catalog_chapters;
        DROP TABLE IF EXISTS volumes;
        DROP TABLE IF EXISTS chapter_translation_records;
        DROP TABLE IF EXISTS translation_tasks;
        DROP TABLE IF EXISTS chapter_drafts;
        DROP TABLE IF EXISTS import_batches;
        DROP TABLE IF EXISTS pricing_profiles;
        DROP TABLE IF EXISTS schema_version;
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_count(conn: &Connection) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            [],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_initializeSchema_shouldCreateAllTables() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
        assert_eq!(table_count(&conn), 8);
    }

    #[test]
    fn test_initializeSchema_twice_shouldBeIdempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        initialize_schema(&conn).unwrap();
        assert_eq!(table_count(&conn), 8);
    }

    #[test]
    fn test_dropAllTables_shouldResetVersion() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        drop_all_tables(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 0);
    }

    #[test]
    fn test_chapterDrafts_shouldRejectDuplicateChapterNumber() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO import_batches (id, novel_id, source_hash, import_config, created_at, updated_at)
             VALUES ('b1', 7, 'h', '{}', 'now', 'now')",
            [],
        )
        .unwrap();

        let insert = |id: &str| {
            conn.execute(
                "INSERT INTO chapter_drafts (id, novel_id, batch_id, chapter_number, raw_title, raw_content, release_at, created_at, updated_at)
                 VALUES (?1, 7, 'b1', 1, 't', 'c', 'now', 'now', 'now')",
                [id],
            )
        };

        assert!(insert("d1").is_ok());
        assert!(insert("d2").is_err());
    }
}
