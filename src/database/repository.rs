/*!
 * Repository layer for database operations.
 *
 * This module provides a high-level API for all database operations,
 * abstracting away the SQL details and providing type-safe access.
 * Multi-row writes that must land together (draft sets, title batches,
 * body translations) run in a single transaction.
 */

use anyhow::{Context, Result};
use log::debug;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::Value;

use super::connection::DatabaseConnection;
use super::models::{
    CatalogChapterRecord, ChapterDraftRecord, ChapterTranslationRecord, DraftStatus,
    ImportBatchRecord, ImportBatchStatus, PricingProfileRecord, RecordStatus, TaskCounts,
    TaskStatus, TranslationTaskRecord, VolumeRecord,
};
use crate::app_config::PricingConfig;
use crate::workflow::WorkflowStep;

/// Translated title to store for one chapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleUpdate {
    /// Progress record to advance
    pub record_id: i64,
    /// Draft receiving the title
    pub draft_id: String,
    /// Translated title
    pub translated_title: String,
}

const DRAFT_COLUMNS: &str = "id, novel_id, batch_id, chapter_number, raw_title, raw_content, \
     clean_title, clean_content, translated_title, translated_content, word_count, volume_number, \
     unlock_price, key_cost, is_free, release_at, is_released, is_advance, issue_tags, \
     issue_summary, status, error_message, created_at, updated_at";

const TASK_COLUMNS: &str = "id, novel_id, batch_id, total_chapters, completed_chapters, \
     failed_chapters, current_step, checkpoint, status, error_message, created_at, updated_at";

const RECORD_COLUMNS: &str =
    "id, task_id, draft_id, chapter_number, status, error_message, catalog_chapter_id, updated_at";

const CATALOG_COLUMNS: &str = "id, novel_id, volume_id, chapter_number, title, content, word_count, \
     unlock_price, key_cost, is_free, release_at, is_released, is_advance, draft_id, created_at";

/// Repository for database operations
#[derive(Clone, Debug)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        let db = DatabaseConnection::new_default()?;
        Ok(Self::new(db))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// Underlying connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // =========================================================================
    // Import Batch Operations
    // =========================================================================

    /// Create a new import batch
    pub async fn create_batch(&self, batch: &ImportBatchRecord) -> Result<()> {
        let batch = batch.clone();
        let config = serde_json::to_string(&batch.config).context("Failed to serialize import config")?;

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO import_batches (
                        id, novel_id, admin_id, source_hash, import_config,
                        chapter_count, status, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    "#,
                    params![
                        batch.id,
                        batch.novel_id,
                        batch.admin_id,
                        batch.source_hash,
                        config,
                        batch.chapter_count,
                        batch.status.to_string(),
                        batch.created_at,
                        batch.updated_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Get an import batch by ID
    pub async fn get_batch(&self, batch_id: &str) -> Result<Option<ImportBatchRecord>> {
        let batch_id = batch_id.to_string();

        self.db
            .execute_async(move |conn| {
                let batch = conn
                    .query_row(
                        r#"
                        SELECT id, novel_id, admin_id, source_hash, import_config,
                               chapter_count, status, created_at, updated_at
                        FROM import_batches WHERE id = ?1
                        "#,
                        params![batch_id],
                        |row| {
                            let config: String = row.get(4)?;
                            let status: String = row.get(6)?;
                            Ok(ImportBatchRecord {
                                id: row.get(0)?,
                                novel_id: row.get(1)?,
                                admin_id: row.get(2)?,
                                source_hash: row.get(3)?,
                                config: serde_json::from_str(&config).unwrap_or_default(),
                                chapter_count: row.get(5)?,
                                status: status.parse().unwrap_or(ImportBatchStatus::Draft),
                                created_at: row.get(7)?,
                                updated_at: row.get(8)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(batch)
            })
            .await
    }

    /// Update an import batch's status
    pub async fn update_batch_status(&self, batch_id: &str, status: ImportBatchStatus) -> Result<()> {
        let batch_id = batch_id.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "UPDATE import_batches SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    params![status.to_string(), now, batch_id],
                )?;
                Ok(())
            })
            .await
    }

    // =========================================================================
    // Chapter Draft Operations
    // =========================================================================

    /// Insert or update a set of drafts atomically
    pub async fn save_drafts(&self, drafts: Vec<ChapterDraftRecord>) -> Result<usize> {
        if drafts.is_empty() {
            return Ok(0);
        }

        self.db
            .transaction_async(move |tx| {
                for draft in &drafts {
                    Self::upsert_draft_sync(tx, draft)?;
                }
                debug!("Saved {} chapter drafts", drafts.len());
                Ok(drafts.len())
            })
            .await
    }

    /// Insert or update a single draft
    pub async fn update_draft(&self, draft: &ChapterDraftRecord) -> Result<()> {
        let draft = draft.clone();
        self.db
            .execute_async(move |conn| Self::upsert_draft_sync(conn, &draft))
            .await
    }

    /// Get a draft by ID
    pub async fn get_draft(&self, draft_id: &str) -> Result<Option<ChapterDraftRecord>> {
        let draft_id = draft_id.to_string();

        self.db
            .execute_async(move |conn| {
                let sql = format!("SELECT {} FROM chapter_drafts WHERE id = ?1", DRAFT_COLUMNS);
                Ok(conn.query_row(&sql, params![draft_id], draft_from_row).optional()?)
            })
            .await
    }

    /// Get the draft holding a chapter number of a novel
    pub async fn find_draft(&self, novel_id: i64, chapter_number: i64) -> Result<Option<ChapterDraftRecord>> {
        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM chapter_drafts WHERE novel_id = ?1 AND chapter_number = ?2",
                    DRAFT_COLUMNS
                );
                Ok(conn
                    .query_row(&sql, params![novel_id, chapter_number], draft_from_row)
                    .optional()?)
            })
            .await
    }

    /// All drafts of a novel, ordered by chapter number
    pub async fn list_drafts_for_novel(&self, novel_id: i64) -> Result<Vec<ChapterDraftRecord>> {
        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM chapter_drafts WHERE novel_id = ?1 ORDER BY chapter_number",
                    DRAFT_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let drafts = stmt
                    .query_map(params![novel_id], draft_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(drafts)
            })
            .await
    }

    /// Drafts last touched by a batch, ordered by chapter number
    pub async fn list_drafts_for_batch(&self, batch_id: &str) -> Result<Vec<ChapterDraftRecord>> {
        let batch_id = batch_id.to_string();

        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM chapter_drafts WHERE batch_id = ?1 ORDER BY chapter_number",
                    DRAFT_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let drafts = stmt
                    .query_map(params![batch_id], draft_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(drafts)
            })
            .await
    }

    /// Set a draft's status and error message
    pub async fn update_draft_status(
        &self,
        draft_id: &str,
        status: DraftStatus,
        error_message: Option<String>,
    ) -> Result<()> {
        let draft_id = draft_id.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "UPDATE chapter_drafts SET status = ?1, error_message = ?2, updated_at = ?3 WHERE id = ?4",
                    params![status.to_string(), error_message, now, draft_id],
                )?;
                Ok(())
            })
            .await
    }

    /// Store one batch of translated titles and advance their records together
    pub async fn apply_title_translations(&self, updates: Vec<TitleUpdate>) -> Result<usize> {
        if updates.is_empty() {
            return Ok(0);
        }
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .transaction_async(move |tx| {
                for update in &updates {
                    tx.execute(
                        "UPDATE chapter_drafts SET translated_title = ?1, updated_at = ?2 WHERE id = ?3",
                        params![update.translated_title, now, update.draft_id],
                    )?;
                    Self::update_record_sync(tx, update.record_id, RecordStatus::TitleTranslated, None, &now)?;
                }
                Ok(updates.len())
            })
            .await
    }

    /// Store a translated chapter and advance its record together
    pub async fn save_body_translation(
        &self,
        record_id: i64,
        draft_id: &str,
        translated_title: &str,
        translated_content: &str,
    ) -> Result<()> {
        let draft_id = draft_id.to_string();
        let title = translated_title.to_string();
        let content = translated_content.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .transaction_async(move |tx| {
                tx.execute(
                    r#"
                    UPDATE chapter_drafts
                    SET translated_title = ?1, translated_content = ?2, status = ?3,
                        error_message = NULL, updated_at = ?4
                    WHERE id = ?5
                    "#,
                    params![title, content, DraftStatus::Translated.to_string(), now, draft_id],
                )?;
                Self::update_record_sync(tx, record_id, RecordStatus::BodyTranslated, None, &now)?;
                Ok(())
            })
            .await
    }

    // =========================================================================
    // Translation Task Operations
    // =========================================================================

    /// Create a new translation task
    pub async fn create_task(&self, task: &TranslationTaskRecord) -> Result<()> {
        let task = task.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO translation_tasks (
                        id, novel_id, batch_id, total_chapters, completed_chapters,
                        failed_chapters, current_step, checkpoint, status, error_message,
                        created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                    "#,
                    params![
                        task.id,
                        task.novel_id,
                        task.batch_id,
                        task.total_chapters,
                        task.completed_chapters,
                        task.failed_chapters,
                        task.current_step.as_str(),
                        task.checkpoint.to_string(),
                        task.status.to_string(),
                        task.error_message,
                        task.created_at,
                        task.updated_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Get a task by ID
    pub async fn get_task(&self, task_id: &str) -> Result<Option<TranslationTaskRecord>> {
        let task_id = task_id.to_string();

        self.db
            .execute_async(move |conn| {
                let sql = format!("SELECT {} FROM translation_tasks WHERE id = ?1", TASK_COLUMNS);
                Ok(conn.query_row(&sql, params![task_id], task_from_row).optional()?)
            })
            .await
    }

    /// Most recent task created for a batch
    pub async fn find_task_for_batch(&self, batch_id: &str) -> Result<Option<TranslationTaskRecord>> {
        let batch_id = batch_id.to_string();

        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM translation_tasks WHERE batch_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                    TASK_COLUMNS
                );
                Ok(conn.query_row(&sql, params![batch_id], task_from_row).optional()?)
            })
            .await
    }

    /// Persist the next step and merge a checkpoint patch into the stored one
    pub async fn update_task_step(
        &self,
        task_id: &str,
        step: WorkflowStep,
        checkpoint: Option<Value>,
    ) -> Result<()> {
        let task_id = task_id.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .transaction_async(move |tx| {
                let stored: Option<String> = tx
                    .query_row(
                        "SELECT checkpoint FROM translation_tasks WHERE id = ?1",
                        params![task_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                let stored = stored.ok_or_else(|| anyhow::anyhow!("Translation task not found: {}", task_id))?;

                let mut merged: Value =
                    serde_json::from_str(&stored).unwrap_or_else(|_| Value::Object(Default::default()));
                if let Some(patch) = checkpoint {
                    merge_checkpoint(&mut merged, patch);
                }

                tx.execute(
                    "UPDATE translation_tasks SET current_step = ?1, checkpoint = ?2, updated_at = ?3 WHERE id = ?4",
                    params![step.as_str(), merged.to_string(), now, task_id],
                )?;
                Ok(())
            })
            .await
    }

    /// Set a task's status, optionally its step, and its error message
    pub async fn update_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        step: Option<WorkflowStep>,
        error_message: Option<String>,
    ) -> Result<()> {
        let task_id = task_id.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    UPDATE translation_tasks
                    SET status = ?1, current_step = COALESCE(?2, current_step),
                        error_message = ?3, updated_at = ?4
                    WHERE id = ?5
                    "#,
                    params![status.to_string(), step.map(|s| s.as_str()), error_message, now, task_id],
                )?;
                Ok(())
            })
            .await
    }

    /// Recompute a task's counters from its records and store them
    pub async fn refresh_task_counts(&self, task_id: &str) -> Result<TaskCounts> {
        let task_id = task_id.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT status, COUNT(*) FROM chapter_translation_records WHERE task_id = ?1 GROUP BY status",
                )?;
                let rows = stmt
                    .query_map(params![task_id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                let mut counts = TaskCounts::default();
                for (status, count) in rows {
                    counts.total += count;
                    match status.parse::<RecordStatus>() {
                        Ok(status) if status.is_done() => counts.completed += count,
                        Ok(status) if status.is_failure() => counts.failed += count,
                        _ => {}
                    }
                }

                conn.execute(
                    r#"
                    UPDATE translation_tasks
                    SET total_chapters = ?1, completed_chapters = ?2, failed_chapters = ?3, updated_at = ?4
                    WHERE id = ?5
                    "#,
                    params![counts.total, counts.completed, counts.failed, now, task_id],
                )?;
                Ok(counts)
            })
            .await
    }

    // =========================================================================
    // Chapter Translation Record Operations
    // =========================================================================

    /// Create missing records for `(draft_id, chapter_number)` pairs; returns how many were new
    pub async fn ensure_records(&self, task_id: &str, drafts: Vec<(String, i64)>) -> Result<usize> {
        let task_id = task_id.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .transaction_async(move |tx| {
                let mut inserted = 0;
                for (draft_id, chapter_number) in &drafts {
                    inserted += tx.execute(
                        r#"
                        INSERT OR IGNORE INTO chapter_translation_records
                            (task_id, draft_id, chapter_number, status, updated_at)
                        VALUES (?1, ?2, ?3, ?4, ?5)
                        "#,
                        params![task_id, draft_id, chapter_number, RecordStatus::Pending.as_str(), now],
                    )?;
                }
                Ok(inserted)
            })
            .await
    }

    /// Records of a task in any of the given statuses, ordered by chapter number
    pub async fn list_records_by_status(
        &self,
        task_id: &str,
        statuses: &[RecordStatus],
    ) -> Result<Vec<ChapterTranslationRecord>> {
        let task_id = task_id.to_string();
        let statuses: Vec<RecordStatus> = statuses.to_vec();

        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM chapter_translation_records WHERE task_id = ?1 ORDER BY chapter_number",
                    RECORD_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let records = stmt
                    .query_map(params![task_id], record_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(records.into_iter().filter(|r| statuses.contains(&r.status)).collect())
            })
            .await
    }

    /// All records of a task, ordered by chapter number
    pub async fn list_records(&self, task_id: &str) -> Result<Vec<ChapterTranslationRecord>> {
        let task_id = task_id.to_string();

        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM chapter_translation_records WHERE task_id = ?1 ORDER BY chapter_number",
                    RECORD_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let records = stmt
                    .query_map(params![task_id], record_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(records)
            })
            .await
    }

    /// Set a record's status and error message
    pub async fn update_record(
        &self,
        record_id: i64,
        status: RecordStatus,
        error_message: Option<String>,
    ) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.db
            .execute_async(move |conn| Self::update_record_sync(conn, record_id, status, error_message, &now))
            .await
    }

    /// Link a record to the catalog chapter holding its chapter
    pub async fn link_record_to_catalog(
        &self,
        record_id: i64,
        status: RecordStatus,
        catalog_chapter_id: i64,
    ) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    UPDATE chapter_translation_records
                    SET status = ?1, catalog_chapter_id = ?2, error_message = NULL, updated_at = ?3
                    WHERE id = ?4
                    "#,
                    params![status.as_str(), catalog_chapter_id, now, record_id],
                )?;
                Ok(())
            })
            .await
    }

    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Volume ID for `(novel, volume_number)`, creating the volume on first use
    pub async fn ensure_volume(&self, novel_id: i64, volume_number: i64) -> Result<i64> {
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO volumes (novel_id, volume_number, title, created_at)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(novel_id, volume_number) DO NOTHING
                    "#,
                    params![novel_id, volume_number, format!("Volume {}", volume_number), now],
                )?;
                let id: i64 = conn.query_row(
                    "SELECT id FROM volumes WHERE novel_id = ?1 AND volume_number = ?2",
                    params![novel_id, volume_number],
                    |row| row.get(0),
                )?;
                Ok(id)
            })
            .await
    }

    /// All volumes of a novel
    pub async fn list_volumes(&self, novel_id: i64) -> Result<Vec<VolumeRecord>> {
        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, novel_id, volume_number, title, created_at
                    FROM volumes WHERE novel_id = ?1 ORDER BY volume_number
                    "#,
                )?;
                let volumes = stmt
                    .query_map(params![novel_id], |row| {
                        Ok(VolumeRecord {
                            id: row.get(0)?,
                            novel_id: row.get(1)?,
                            volume_number: row.get(2)?,
                            title: row.get(3)?,
                            created_at: row.get(4)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(volumes)
            })
            .await
    }

    /// Catalog chapter at `(novel, chapter_number)`, if published
    pub async fn find_catalog_chapter(
        &self,
        novel_id: i64,
        chapter_number: i64,
    ) -> Result<Option<CatalogChapterRecord>> {
        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM catalog_chapters WHERE novel_id = ?1 AND chapter_number = ?2",
                    CATALOG_COLUMNS
                );
                Ok(conn
                    .query_row(&sql, params![novel_id, chapter_number], catalog_from_row)
                    .optional()?)
            })
            .await
    }

    /// Insert a catalog chapter and return its ID
    pub async fn insert_catalog_chapter(&self, chapter: &CatalogChapterRecord) -> Result<i64> {
        let chapter = chapter.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO catalog_chapters (
                        novel_id, volume_id, chapter_number, title, content, word_count,
                        unlock_price, key_cost, is_free, release_at, is_released, is_advance,
                        draft_id, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                    "#,
                    params![
                        chapter.novel_id,
                        chapter.volume_id,
                        chapter.chapter_number,
                        chapter.title,
                        chapter.content,
                        chapter.word_count,
                        chapter.unlock_price,
                        chapter.key_cost,
                        chapter.is_free,
                        chapter.release_at,
                        chapter.is_released,
                        chapter.is_advance,
                        chapter.draft_id,
                        chapter.created_at,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
    }

    /// All catalog chapters of a novel, ordered by chapter number
    pub async fn list_catalog_chapters(&self, novel_id: i64) -> Result<Vec<CatalogChapterRecord>> {
        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM catalog_chapters WHERE novel_id = ?1 ORDER BY chapter_number",
                    CATALOG_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let chapters = stmt
                    .query_map(params![novel_id], catalog_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(chapters)
            })
            .await
    }

    // =========================================================================
    // Pricing Profile Operations
    // =========================================================================

    /// Get a novel's pricing profile
    pub async fn get_pricing_profile(&self, novel_id: i64) -> Result<Option<PricingProfileRecord>> {
        self.db
            .execute_async(move |conn| Self::get_pricing_profile_sync(conn, novel_id))
            .await
    }

    /// Get a novel's pricing profile, provisioning one from `defaults` when absent
    pub async fn ensure_pricing_profile(
        &self,
        novel_id: i64,
        defaults: &PricingConfig,
    ) -> Result<PricingProfileRecord> {
        let defaults = defaults.clone();
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                let inserted = conn.execute(
                    r#"
                    INSERT OR IGNORE INTO pricing_profiles
                        (novel_id, price_per_thousand_words, key_cost_divisor, created_at)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                    params![novel_id, defaults.price_per_thousand_words, defaults.key_cost_divisor, now],
                )?;
                if inserted > 0 {
                    debug!("Provisioned default pricing profile for novel {}", novel_id);
                }
                Self::get_pricing_profile_sync(conn, novel_id)?
                    .ok_or_else(|| anyhow::anyhow!("Pricing profile missing for novel {}", novel_id))
            })
            .await
    }

    // =========================================================================
    // Sync Helpers
    // =========================================================================

    fn upsert_draft_sync(conn: &Connection, draft: &ChapterDraftRecord) -> Result<()> {
        let tags = serde_json::to_string(&draft.issue_tags)?;
        let now = chrono::Utc::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO chapter_drafts (
                id, novel_id, batch_id, chapter_number, raw_title, raw_content,
                clean_title, clean_content, translated_title, translated_content,
                word_count, volume_number, unlock_price, key_cost, is_free,
                release_at, is_released, is_advance, has_issue, issue_tags,
                issue_summary, status, error_message, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                      ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)
            ON CONFLICT(id) DO UPDATE SET
                batch_id = excluded.batch_id,
                chapter_number = excluded.chapter_number,
                raw_title = excluded.raw_title,
                raw_content = excluded.raw_content,
                clean_title = excluded.clean_title,
                clean_content = excluded.clean_content,
                translated_title = excluded.translated_title,
                translated_content = excluded.translated_content,
                word_count = excluded.word_count,
                volume_number = excluded.volume_number,
                unlock_price = excluded.unlock_price,
                key_cost = excluded.key_cost,
                is_free = excluded.is_free,
                release_at = excluded.release_at,
                is_released = excluded.is_released,
                is_advance = excluded.is_advance,
                has_issue = excluded.has_issue,
                issue_tags = excluded.issue_tags,
                issue_summary = excluded.issue_summary,
                status = excluded.status,
                error_message = excluded.error_message,
                updated_at = excluded.updated_at
            "#,
            params![
                draft.id,
                draft.novel_id,
                draft.batch_id,
                draft.chapter_number,
                draft.raw_title,
                draft.raw_content,
                draft.clean_title,
                draft.clean_content,
                draft.translated_title,
                draft.translated_content,
                draft.word_count,
                draft.volume_number,
                draft.unlock_price,
                draft.key_cost,
                draft.is_free,
                draft.release_at,
                draft.is_released,
                draft.is_advance,
                draft.has_issue(),
                tags,
                draft.issue_summary,
                draft.status.to_string(),
                draft.error_message,
                draft.created_at,
                now,
            ],
        )
        .with_context(|| format!("Failed to save draft for chapter {}", draft.chapter_number))?;
        Ok(())
    }

    fn update_record_sync(
        conn: &Connection,
        record_id: i64,
        status: RecordStatus,
        error_message: Option<String>,
        now: &str,
    ) -> Result<()> {
        conn.execute(
            "UPDATE chapter_translation_records SET status = ?1, error_message = ?2, updated_at = ?3 WHERE id = ?4",
            params![status.as_str(), error_message, now, record_id],
        )?;
        Ok(())
    }

    fn get_pricing_profile_sync(conn: &Connection, novel_id: i64) -> Result<Option<PricingProfileRecord>> {
        let profile = conn
            .query_row(
                r#"
                SELECT novel_id, price_per_thousand_words, key_cost_divisor, created_at
                FROM pricing_profiles WHERE novel_id = ?1
                "#,
                params![novel_id],
                |row| {
                    Ok(PricingProfileRecord {
                        novel_id: row.get(0)?,
                        price_per_thousand_words: row.get(1)?,
                        key_cost_divisor: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }
}

/// Merge `patch` into `base` key by key; non-object values are replaced
pub fn merge_checkpoint(base: &mut Value, patch: Value) {
    match (base.as_object_mut(), patch) {
        (Some(base), Value::Object(patch)) => {
            for (key, value) in patch {
                base.insert(key, value);
            }
        }
        (_, patch @ Value::Object(_)) => *base = patch,
        _ => {}
    }
}

fn draft_from_row(row: &Row<'_>) -> rusqlite::Result<ChapterDraftRecord> {
    let tags: String = row.get(18)?;
    let status: String = row.get(20)?;
    Ok(ChapterDraftRecord {
        id: row.get(0)?,
        novel_id: row.get(1)?,
        batch_id: row.get(2)?,
        chapter_number: row.get(3)?,
        raw_title: row.get(4)?,
        raw_content: row.get(5)?,
        clean_title: row.get(6)?,
        clean_content: row.get(7)?,
        translated_title: row.get(8)?,
        translated_content: row.get(9)?,
        word_count: row.get(10)?,
        volume_number: row.get(11)?,
        unlock_price: row.get(12)?,
        key_cost: row.get(13)?,
        is_free: row.get(14)?,
        release_at: row.get(15)?,
        is_released: row.get(16)?,
        is_advance: row.get(17)?,
        issue_tags: serde_json::from_str(&tags).unwrap_or_default(),
        issue_summary: row.get(19)?,
        status: status.parse().unwrap_or(DraftStatus::Pending),
        error_message: row.get(21)?,
        created_at: row.get(22)?,
        updated_at: row.get(23)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<TranslationTaskRecord> {
    let step: String = row.get(6)?;
    let checkpoint: String = row.get(7)?;
    let status: String = row.get(8)?;
    Ok(TranslationTaskRecord {
        id: row.get(0)?,
        novel_id: row.get(1)?,
        batch_id: row.get(2)?,
        total_chapters: row.get(3)?,
        completed_chapters: row.get(4)?,
        failed_chapters: row.get(5)?,
        current_step: step.parse().unwrap_or(WorkflowStep::FIRST),
        checkpoint: serde_json::from_str(&checkpoint).unwrap_or_else(|_| Value::Object(Default::default())),
        status: status.parse().unwrap_or(TaskStatus::Pending),
        error_message: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ChapterTranslationRecord> {
    let status: String = row.get(4)?;
    Ok(ChapterTranslationRecord {
        id: row.get(0)?,
        task_id: row.get(1)?,
        draft_id: row.get(2)?,
        chapter_number: row.get(3)?,
        status: status.parse().unwrap_or(RecordStatus::Pending),
        error_message: row.get(5)?,
        catalog_chapter_id: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn catalog_from_row(row: &Row<'_>) -> rusqlite::Result<CatalogChapterRecord> {
    Ok(CatalogChapterRecord {
        id: row.get(0)?,
        novel_id: row.get(1)?,
        volume_id: row.get(2)?,
        chapter_number: row.get(3)?,
        title: row.get(4)?,
        content: row.get(5)?,
        word_count: row.get(6)?,
        unlock_price: row.get(7)?,
        key_cost: row.get(8)?,
        is_free: row.get(9)?,
        release_at: row.get(10)?,
        is_released: row.get(11)?,
        is_advance: row.get(12)?,
        draft_id: row.get(13)?,
        created_at: row.get(14)?,
    })
}
