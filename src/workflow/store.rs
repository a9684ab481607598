/*!
 * Durable store seam used by the workflow orchestrator.
 *
 * `Repository` is the production implementation; tests can swap in anything
 * that keeps the same per-call atomicity.
 */

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::database::Repository;
use crate::database::models::{
    CatalogChapterRecord, ChapterDraftRecord, ChapterTranslationRecord, DraftStatus,
    ImportBatchRecord, ImportBatchStatus, RecordStatus, TaskCounts, TaskStatus,
    TranslationTaskRecord,
};
use crate::database::repository::TitleUpdate;
use crate::workflow::WorkflowStep;

/// Everything the orchestrator reads and writes
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    // Tasks
    async fn get_task(&self, task_id: &str) -> Result<Option<TranslationTaskRecord>>;
    async fn update_task_step(&self, task_id: &str, step: WorkflowStep, checkpoint: Option<Value>) -> Result<()>;
    async fn update_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        step: Option<WorkflowStep>,
        error_message: Option<String>,
    ) -> Result<()>;
    async fn refresh_task_counts(&self, task_id: &str) -> Result<TaskCounts>;

    // Batches and drafts
    async fn get_batch(&self, batch_id: &str) -> Result<Option<ImportBatchRecord>>;
    async fn update_batch_status(&self, batch_id: &str, status: ImportBatchStatus) -> Result<()>;
    async fn list_batch_drafts(&self, batch_id: &str) -> Result<Vec<ChapterDraftRecord>>;
    async fn get_draft(&self, draft_id: &str) -> Result<Option<ChapterDraftRecord>>;
    async fn update_draft(&self, draft: &ChapterDraftRecord) -> Result<()>;
    async fn update_draft_status(&self, draft_id: &str, status: DraftStatus, error_message: Option<String>) -> Result<()>;

    // Records
    async fn ensure_records(&self, task_id: &str, drafts: Vec<(String, i64)>) -> Result<usize>;
    async fn list_records_by_status(&self, task_id: &str, statuses: &[RecordStatus]) -> Result<Vec<ChapterTranslationRecord>>;
    async fn update_record(&self, record_id: i64, status: RecordStatus, error_message: Option<String>) -> Result<()>;
    async fn link_record_to_catalog(&self, record_id: i64, status: RecordStatus, catalog_chapter_id: i64) -> Result<()>;
    async fn apply_title_translations(&self, updates: Vec<TitleUpdate>) -> Result<usize>;
    async fn save_body_translation(&self, record_id: i64, draft_id: &str, title: &str, content: &str) -> Result<()>;

    // Catalog
    async fn find_catalog_chapter(&self, novel_id: i64, chapter_number: i64) -> Result<Option<CatalogChapterRecord>>;
    async fn insert_catalog_chapter(&self, chapter: &CatalogChapterRecord) -> Result<i64>;
    async fn ensure_volume(&self, novel_id: i64, volume_number: i64) -> Result<i64>;
}

#[async_trait]
impl WorkflowStore for Repository {
    async fn get_task(&self, task_id: &str) -> Result<Option<TranslationTaskRecord>> {
        Repository::get_task(self, task_id).await
    }

    async fn update_task_step(&self, task_id: &str, step: WorkflowStep, checkpoint: Option<Value>) -> Result<()> {
        Repository::update_task_step(self, task_id, step, checkpoint).await
    }

    async fn update_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        step: Option<WorkflowStep>,
        error_message: Option<String>,
    ) -> Result<()> {
        Repository::update_task_status(self, task_id, status, step, error_message).await
    }

    async fn refresh_task_counts(&self, task_id: &str) -> Result<TaskCounts> {
        Repository::refresh_task_counts(self, task_id).await
    }

    async fn get_batch(&self, batch_id: &str) -> Result<Option<ImportBatchRecord>> {
        Repository::get_batch(self, batch_id).await
    }

    async fn update_batch_status(&self, batch_id: &str, status: ImportBatchStatus) -> Result<()> {
        Repository::update_batch_status(self, batch_id, status).await
    }

    async fn list_batch_drafts(&self, batch_id: &str) -> Result<Vec<ChapterDraftRecord>> {
        self.list_drafts_for_batch(batch_id).await
    }

    async fn get_draft(&self, draft_id: &str) -> Result<Option<ChapterDraftRecord>> {
        Repository::get_draft(self, draft_id).await
    }

    async fn update_draft(&self, draft: &ChapterDraftRecord) -> Result<()> {
        Repository::update_draft(self, draft).await
    }

    async fn update_draft_status(&self, draft_id: &str, status: DraftStatus, error_message: Option<String>) -> Result<()> {
        Repository::update_draft_status(self, draft_id, status, error_message).await
    }

    async fn ensure_records(&self, task_id: &str, drafts: Vec<(String, i64)>) -> Result<usize> {
        Repository::ensure_records(self, task_id, drafts).await
    }

    async fn list_records_by_status(&self, task_id: &str, statuses: &[RecordStatus]) -> Result<Vec<ChapterTranslationRecord>> {
        Repository::list_records_by_status(self, task_id, statuses).await
    }

    async fn update_record(&self, record_id: i64, status: RecordStatus, error_message: Option<String>) -> Result<()> {
        Repository::update_record(self, record_id, status, error_message).await
    }

    async fn link_record_to_catalog(&self, record_id: i64, status: RecordStatus, catalog_chapter_id: i64) -> Result<()> {
        Repository::link_record_to_catalog(self, record_id, status, catalog_chapter_id).await
    }

    async fn apply_title_translations(&self, updates: Vec<TitleUpdate>) -> Result<usize> {
        Repository::apply_title_translations(self, updates).await
    }

    async fn save_body_translation(&self, record_id: i64, draft_id: &str, title: &str, content: &str) -> Result<()> {
        Repository::save_body_translation(self, record_id, draft_id, title, content).await
    }

    async fn find_catalog_chapter(&self, novel_id: i64, chapter_number: i64) -> Result<Option<CatalogChapterRecord>> {
        Repository::find_catalog_chapter(self, novel_id, chapter_number).await
    }

    async fn insert_catalog_chapter(&self, chapter: &CatalogChapterRecord) -> Result<i64> {
        Repository::insert_catalog_chapter(self, chapter).await
    }

    async fn ensure_volume(&self, novel_id: i64, volume_number: i64) -> Result<i64> {
        Repository::ensure_volume(self, novel_id, volume_number).await
    }
}
