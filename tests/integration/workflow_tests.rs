/*!
 * Workflow orchestration: resume after interruption, single-flight runs,
 * batch-level failures and per-chapter failure isolation.
 */

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tomeport::database::Repository;
use tomeport::database::models::{
    CatalogChapterRecord, ChapterDraftRecord, ChapterTranslationRecord, DraftStatus, ImportBatchRecord,
    ImportBatchStatus, RecordStatus, TaskCounts, TaskStatus, TranslationTaskRecord,
};
use tomeport::database::repository::TitleUpdate;
use tomeport::errors::{ProviderError, WorkflowError};
use tomeport::providers::mock::MockProvider;
use tomeport::workflow::{RunOutcome, WorkflowStep, WorkflowStore};

use crate::common::stub_providers::{RequestKind, request_kind, title_translation_calls, uppercase_answer, uppercase_provider};
use crate::common::{NOVEL_ID, release_start, test_controller, test_orchestrator, two_chapter_source};

/// Repository wrapper whose body saves fail while `fail_body_saves` is set
struct InterruptingStore {
    inner: Repository,
    fail_body_saves: AtomicBool,
}

#[async_trait]
impl WorkflowStore for InterruptingStore {
    async fn get_task(&self, task_id: &str) -> Result<Option<TranslationTaskRecord>> {
        self.inner.get_task(task_id).await
    }

    async fn update_task_step(&self, task_id: &str, step: WorkflowStep, checkpoint: Option<Value>) -> Result<()> {
        self.inner.update_task_step(task_id, step, checkpoint).await
    }

    async fn update_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        step: Option<WorkflowStep>,
        error_message: Option<String>,
    ) -> Result<()> {
        self.inner.update_task_status(task_id, status, step, error_message).await
    }

    async fn refresh_task_counts(&self, task_id: &str) -> Result<TaskCounts> {
        self.inner.refresh_task_counts(task_id).await
    }

    async fn get_batch(&self, batch_id: &str) -> Result<Option<ImportBatchRecord>> {
        self.inner.get_batch(batch_id).await
    }

    async fn update_batch_status(&self, batch_id: &str, status: ImportBatchStatus) -> Result<()> {
        self.inner.update_batch_status(batch_id, status).await
    }

    async fn list_batch_drafts(&self, batch_id: &str) -> Result<Vec<ChapterDraftRecord>> {
        self.inner.list_drafts_for_batch(batch_id).await
    }

    async fn get_draft(&self, draft_id: &str) -> Result<Option<ChapterDraftRecord>> {
        self.inner.get_draft(draft_id).await
    }

    async fn update_draft(&self, draft: &ChapterDraftRecord) -> Result<()> {
        self.inner.update_draft(draft).await
    }

    async fn update_draft_status(&self, draft_id: &str, status: DraftStatus, error_message: Option<String>) -> Result<()> {
        self.inner.update_draft_status(draft_id, status, error_message).await
    }

    async fn ensure_records(&self, task_id: &str, drafts: Vec<(String, i64)>) -> Result<usize> {
        self.inner.ensure_records(task_id, drafts).await
    }

    async fn list_records_by_status(&self, task_id: &str, statuses: &[RecordStatus]) -> Result<Vec<ChapterTranslationRecord>> {
        self.inner.list_records_by_status(task_id, statuses).await
    }

    async fn update_record(&self, record_id: i64, status: RecordStatus, error_message: Option<String>) -> Result<()> {
        self.inner.update_record(record_id, status, error_message).await
    }

    async fn link_record_to_catalog(&self, record_id: i64, status: RecordStatus, catalog_chapter_id: i64) -> Result<()> {
        self.inner.link_record_to_catalog(record_id, status, catalog_chapter_id).await
    }

    async fn apply_title_translations(&self, updates: Vec<TitleUpdate>) -> Result<usize> {
        self.inner.apply_title_translations(updates).await
    }

    async fn save_body_translation(&self, record_id: i64, draft_id: &str, title: &str, content: &str) -> Result<()> {
        if self.fail_body_saves.load(Ordering::SeqCst) {
            return Err(anyhow!("database is locked (injected)"));
        }
        self.inner.save_body_translation(record_id, draft_id, title, content).await
    }

    async fn find_catalog_chapter(&self, novel_id: i64, chapter_number: i64) -> Result<Option<CatalogChapterRecord>> {
        self.inner.find_catalog_chapter(novel_id, chapter_number).await
    }

    async fn insert_catalog_chapter(&self, chapter: &CatalogChapterRecord) -> Result<i64> {
        self.inner.insert_catalog_chapter(chapter).await
    }

    async fn ensure_volume(&self, novel_id: i64, volume_number: i64) -> Result<i64> {
        self.inner.ensure_volume(novel_id, volume_number).await
    }
}

#[tokio::test]
async fn test_run_freshBatch_shouldPublishEveryChapter() {
    let controller = test_controller(uppercase_provider());
    let repo = controller.repository();
    let outcome = controller
        .create_import_batch_from_text(NOVEL_ID, &two_chapter_source(), Some("editor".into()), None)
        .await
        .unwrap();
    assert_eq!(outcome.drafts.len(), 2);
    let task = controller.mark_batch_ready_for_translation(&outcome.batch.id).await.unwrap();

    assert_eq!(controller.run_novel_translation_workflow(&task.id).await.unwrap(), RunOutcome::Completed);

    let chapters = repo.list_catalog_chapters(NOVEL_ID).await.unwrap();
    assert_eq!(chapters.len(), 2);
    for (chapter, draft) in chapters.iter().zip(outcome.drafts.iter()) {
        assert_eq!(chapter.chapter_number, draft.chapter_number);
        assert_eq!(chapter.word_count, draft.word_count);
        assert_eq!(chapter.draft_id.as_deref(), Some(draft.id.as_str()));
        assert!(!chapter.title.is_empty());
        assert_eq!(chapter.title, chapter.title.to_uppercase());
        let words: Vec<&str> = chapter.content.split_whitespace().collect();
        let expected = draft.raw_content.to_uppercase();
        assert_eq!(words, expected.split_whitespace().collect::<Vec<_>>());
    }

    let first_release = chrono::DateTime::parse_from_rfc3339(&chapters[0].release_at).unwrap();
    let second_release = chrono::DateTime::parse_from_rfc3339(&chapters[1].release_at).unwrap();
    assert_eq!(first_release, release_start());
    assert_eq!(second_release, release_start() + chrono::Duration::days(1));
    assert!(chapters[0].is_free);
    assert!(!chapters[1].is_free);
    assert!(chapters[1].is_advance);
    assert!(!chapters[1].is_released);

    let volumes = repo.list_volumes(NOVEL_ID).await.unwrap();
    assert_eq!(volumes.len(), 1);
    assert_eq!(volumes[0].title, "Volume 1");

    let report = controller.task_status(&task.id).await.unwrap();
    assert_eq!(report.task.completed_chapters, 2);
    assert_eq!(report.task.failed_chapters, 0);
    assert!(report.records.iter().all(|r| r.status == RecordStatus::Imported && r.catalog_chapter_id.is_some()));
    let batch = repo.get_batch(&outcome.batch.id).await.unwrap().unwrap();
    assert_eq!(batch.status, ImportBatchStatus::Completed);
    for draft in repo.list_drafts_for_batch(&outcome.batch.id).await.unwrap() {
        assert_eq!(draft.status, DraftStatus::Imported);
    }
}

#[tokio::test]
async fn test_run_interruptedAfterTitles_shouldResumeWithoutRetranslatingTitles() {
    let controller = test_controller(uppercase_provider());
    let repo = controller.repository().clone();
    let outcome = controller
        .create_import_batch_from_text(NOVEL_ID, &two_chapter_source(), None, None)
        .await
        .unwrap();
    let task = controller.mark_batch_ready_for_translation(&outcome.batch.id).await.unwrap();

    let store = Arc::new(InterruptingStore { inner: repo.clone(), fail_body_saves: AtomicBool::new(true) });
    let first_provider = uppercase_provider();
    let interrupted = test_orchestrator(store, &repo, first_provider.clone());

    let result = interrupted.run(&task.id).await;

    assert!(matches!(result, Err(WorkflowError::StepFailed { step: WorkflowStep::TranslatingBodies, .. })));
    assert_eq!(title_translation_calls(&first_provider), 1);
    let failed = repo.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);
    assert_eq!(failed.current_step, WorkflowStep::TranslatingBodies);
    assert!(failed.error_message.unwrap().contains("injected"));
    assert_eq!(failed.checkpoint["last_completed_step"], "translating_titles");
    let records = repo.list_records(&task.id).await.unwrap();
    assert!(records.iter().all(|r| r.status == RecordStatus::TitleTranslated));
    assert_eq!(repo.get_batch(&outcome.batch.id).await.unwrap().unwrap().status, ImportBatchStatus::Failed);

    let spy = uppercase_provider();
    let resumed = test_orchestrator(Arc::new(repo.clone()), &repo, spy.clone());

    assert_eq!(resumed.run(&task.id).await.unwrap(), RunOutcome::Completed);
    assert_eq!(title_translation_calls(&spy), 0);
    assert!(spy.requests().iter().all(|r| request_kind(r) == RequestKind::Chunk));
    assert!(spy.request_count() > 0);

    let done = repo.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(done.current_step, WorkflowStep::Completed);
    assert_eq!(done.completed_chapters, 2);
    assert!(done.error_message.is_none());
    assert!(done.checkpoint.get("translating_titles").is_some());
    assert!(done.checkpoint.get("importing").is_some());
}

#[tokio::test]
async fn test_run_completedTask_shouldBeNoOp() {
    let provider = uppercase_provider();
    let controller = test_controller(provider.clone());
    let outcome = controller
        .create_import_batch_from_text(NOVEL_ID, &two_chapter_source(), None, None)
        .await
        .unwrap();
    let task = controller.mark_batch_ready_for_translation(&outcome.batch.id).await.unwrap();

    assert_eq!(controller.run_novel_translation_workflow(&task.id).await.unwrap(), RunOutcome::Completed);
    let calls = provider.request_count();

    assert_eq!(
        controller.run_novel_translation_workflow(&task.id).await.unwrap(),
        RunOutcome::Skipped(TaskStatus::Completed)
    );
    assert_eq!(provider.request_count(), calls);
}

#[tokio::test]
async fn test_run_concurrentTriggers_shouldRunOnce() {
    let controller = test_controller(uppercase_provider());
    let outcome = controller
        .create_import_batch_from_text(NOVEL_ID, &two_chapter_source(), None, None)
        .await
        .unwrap();
    let task = controller.mark_batch_ready_for_translation(&outcome.batch.id).await.unwrap();

    let (first, second) = tokio::join!(
        controller.run_novel_translation_workflow(&task.id),
        controller.run_novel_translation_workflow(&task.id)
    );

    let mut outcomes = vec![first.unwrap(), second.unwrap()];
    outcomes.sort_by_key(|o| *o == RunOutcome::Completed);
    assert_eq!(outcomes, vec![RunOutcome::AlreadyRunning, RunOutcome::Completed]);
    assert_eq!(controller.repository().list_catalog_chapters(NOVEL_ID).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_run_withUnparsableTitleBatch_shouldFailTaskAtTitleStep() {
    let provider = MockProvider::with_responder(|request| match request_kind(request) {
        RequestKind::TitleBatch => Ok("Sorry, I cannot help with that.".to_string()),
        _ => Ok(uppercase_answer(request)),
    });
    let controller = test_controller(provider);
    let outcome = controller
        .create_import_batch_from_text(NOVEL_ID, &two_chapter_source(), None, None)
        .await
        .unwrap();
    let task = controller.mark_batch_ready_for_translation(&outcome.batch.id).await.unwrap();

    let result = controller.run_novel_translation_workflow(&task.id).await;

    assert!(matches!(result, Err(WorkflowError::StepFailed { step: WorkflowStep::TranslatingTitles, .. })));
    let report = controller.task_status(&task.id).await.unwrap();
    assert_eq!(report.task.status, TaskStatus::Failed);
    assert_eq!(report.task.current_step, WorkflowStep::TranslatingTitles);
    assert!(report.records.iter().all(|r| r.status == RecordStatus::Pending));
    assert!(controller.repository().list_catalog_chapters(NOVEL_ID).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_run_withOneFailingChapter_shouldCompleteAndRecordTheFailure() {
    let provider = MockProvider::with_responder(|request| {
        if request_kind(request) == RequestKind::Chunk && request.user.contains("mill") {
            return Err(ProviderError::ApiError { status_code: 400, message: "content rejected".into() });
        }
        Ok(uppercase_answer(request))
    });
    let controller = test_controller(provider);
    let outcome = controller
        .create_import_batch_from_text(NOVEL_ID, &two_chapter_source(), None, None)
        .await
        .unwrap();
    let task = controller.mark_batch_ready_for_translation(&outcome.batch.id).await.unwrap();

    assert_eq!(controller.run_novel_translation_workflow(&task.id).await.unwrap(), RunOutcome::Completed);

    let report = controller.task_status(&task.id).await.unwrap();
    assert_eq!(report.task.status, TaskStatus::Completed);
    assert_eq!(report.task.completed_chapters, 1);
    assert_eq!(report.task.failed_chapters, 1);
    let failed = report.records.iter().find(|r| r.chapter_number == 2).unwrap();
    assert_eq!(failed.status, RecordStatus::Failed);
    assert!(failed.error_message.as_deref().unwrap().contains("content rejected"));

    let draft = controller.repository().find_draft(NOVEL_ID, 2).await.unwrap().unwrap();
    assert_eq!(draft.status, DraftStatus::Failed);
    assert_eq!(controller.repository().list_catalog_chapters(NOVEL_ID).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_run_withUntranslatedBody_shouldRejectInQa() {
    // Echoes Han text back, so the body still reads as source script
    let provider = MockProvider::with_responder(|request| match request_kind(request) {
        RequestKind::Chunk => Ok("他推开门走了出去，雨一直在下，没有人说话。".to_string()),
        _ => Ok(uppercase_answer(request)),
    });
    let controller = test_controller(provider);
    let outcome = controller
        .create_import_batch_from_text(NOVEL_ID, &two_chapter_source(), None, None)
        .await
        .unwrap();
    let task = controller.mark_batch_ready_for_translation(&outcome.batch.id).await.unwrap();

    assert_eq!(controller.run_novel_translation_workflow(&task.id).await.unwrap(), RunOutcome::Completed);

    let report = controller.task_status(&task.id).await.unwrap();
    assert!(report.records.iter().all(|r| r.status == RecordStatus::QaFailed));
    assert!(report.records[0].error_message.as_deref().unwrap().contains("untranslated_ratio"));
    assert_eq!(report.task.failed_chapters, 2);
    assert!(controller.repository().list_catalog_chapters(NOVEL_ID).await.unwrap().is_empty());
}
