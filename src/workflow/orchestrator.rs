/*!
 * Resumable translation workflow.
 *
 * A task walks the step chain from its stored `current_step` until it reaches
 * `Completed` or a step fails. The next step is persisted (with a checkpoint
 * patch) after every success, so a restarted run picks up where the last one
 * stopped. Steps only select records whose status still needs that step,
 * which makes each of them safe to run again.
 *
 * Failure granularity:
 * - a chapter that fails to translate or import is recorded on its own record
 * - a failed title batch or a storage error fails the whole step, and with it the task
 */

use anyhow::{Result, anyhow};
use chrono::Utc;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::sync::Arc;

use super::WorkflowStep;
use super::store::WorkflowStore;
use crate::app_config::PipelineConfig;
use crate::database::models::{
    CatalogChapterRecord, ChapterDraftRecord, ChapterTranslationRecord, DraftStatus, ImportBatchRecord,
    ImportBatchStatus, RecordStatus, TaskStatus,
};
use crate::database::repository::TitleUpdate;
use crate::errors::WorkflowError;
use crate::import::ChapterPlanner;
use crate::import::review::apply_review;
use crate::language_utils::truncate_chars;
use crate::translation::client::{TitleItem, TranslationClient};
use crate::translation::quality::{BodyQa, ContentRules, QualityChecker, TitleCheckItem, body};

/// Longest error message stored on a task or record
const MAX_ERROR_CHARS: usize = 1000;

/// How a call to `run` ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step ran; individual chapters may still have failed
    Completed,
    /// Another run of the same task is in progress in this process
    AlreadyRunning,
    /// The task was paused or already completed
    Skipped(TaskStatus),
}

/// Size limits for title translation batches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitleBatchLimits {
    pub max_chars: usize,
    pub max_items: usize,
}

impl Default for TitleBatchLimits {
    fn default() -> Self {
        Self::from_pipeline(&PipelineConfig::default())
    }
}

impl TitleBatchLimits {
    pub fn from_pipeline(pipeline: &PipelineConfig) -> Self {
        Self {
            max_chars: pipeline.title_batch_max_chars,
            max_items: pipeline.title_batch_max_items,
        }
    }
}

/// Task ids with a run in progress
type RunningSet = Arc<Mutex<HashSet<String>>>;

/// Removes the task id from the running set when the run ends, however it ends
struct RunGuard {
    running: RunningSet,
    task_id: String,
}

impl RunGuard {
    fn acquire(running: &RunningSet, task_id: &str) -> Option<Self> {
        if !running.lock().insert(task_id.to_string()) {
            return None;
        }
        Some(Self {
            running: Arc::clone(running),
            task_id: task_id.to_string(),
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.lock().remove(&self.task_id);
    }
}

/// Drives translation tasks through the step chain
pub struct WorkflowOrchestrator {
    store: Arc<dyn WorkflowStore>,
    client: TranslationClient,
    checker: QualityChecker,
    planner: ChapterPlanner,
    rules: ContentRules,
    body_qa: BodyQa,
    title_limits: TitleBatchLimits,
    running: RunningSet,
}

impl WorkflowOrchestrator {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        client: TranslationClient,
        checker: QualityChecker,
        planner: ChapterPlanner,
        rules: ContentRules,
        body_qa: BodyQa,
        title_limits: TitleBatchLimits,
    ) -> Self {
        Self {
            store,
            client,
            checker,
            planner,
            rules,
            body_qa,
            title_limits,
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Whether a run of `task_id` is in progress in this process
    pub fn is_running(&self, task_id: &str) -> bool {
        self.running.lock().contains(task_id)
    }

    /// Run a task from its current step to completion
    pub async fn run(&self, task_id: &str) -> Result<RunOutcome, WorkflowError> {
        let Some(_guard) = RunGuard::acquire(&self.running, task_id) else {
            warn!("Task {} is already running, ignoring second trigger", task_id);
            return Ok(RunOutcome::AlreadyRunning);
        };

        let task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or_else(|| WorkflowError::TaskNotFound(task_id.to_string()))?;

        if !task.is_runnable() {
            info!("Task {} is {}, nothing to run", task_id, task.status);
            return Ok(RunOutcome::Skipped(task.status));
        }

        let batch = self
            .store
            .get_batch(&task.batch_id)
            .await?
            .ok_or_else(|| anyhow!("Import batch {} of task {} not found", task.batch_id, task_id))?;

        self.store.update_task_status(task_id, TaskStatus::Running, None, None).await?;
        self.store.update_batch_status(&batch.id, ImportBatchStatus::Translating).await?;
        info!("Running task {} from step {}", task_id, task.current_step);

        let mut step = task.current_step;
        while let Some(next) = step.next_step() {
            let stats = match self.execute_step(step, task_id, &batch).await {
                Ok(stats) => stats,
                Err(e) => return Err(self.fail(task_id, &batch.id, step, e).await),
            };

            let mut patch = Map::new();
            patch.insert("last_completed_step".into(), json!(step.as_str()));
            patch.insert("last_completed_at".into(), json!(Utc::now().to_rfc3339()));
            patch.insert(step.as_str().into(), stats);
            self.store.update_task_step(task_id, next, Some(Value::Object(patch))).await?;
            let counts = self.store.refresh_task_counts(task_id).await?;
            debug!(
                "Task {} finished {}: {}/{} done, {} failed",
                task_id, step, counts.completed, counts.total, counts.failed
            );
            step = next;
        }

        self.store
            .update_task_status(task_id, TaskStatus::Completed, Some(WorkflowStep::Completed), None)
            .await?;
        self.store.update_batch_status(&batch.id, ImportBatchStatus::Completed).await?;
        let counts = self.store.refresh_task_counts(task_id).await?;
        info!(
            "Task {} completed: {} of {} chapters done, {} failed",
            task_id, counts.completed, counts.total, counts.failed
        );

        Ok(RunOutcome::Completed)
    }

    async fn fail(&self, task_id: &str, batch_id: &str, step: WorkflowStep, e: anyhow::Error) -> WorkflowError {
        let message = truncate_chars(&format!("{:#}", e), MAX_ERROR_CHARS);
        error!("Task {} failed at {}: {}", task_id, step, message);

        if let Err(e) = self
            .store
            .update_task_status(task_id, TaskStatus::Failed, Some(step), Some(message.clone()))
            .await
        {
            error!("Could not mark task {} as failed: {}", task_id, e);
        }
        if let Err(e) = self.store.update_batch_status(batch_id, ImportBatchStatus::Failed).await {
            error!("Could not mark batch {} as failed: {}", batch_id, e);
        }

        WorkflowError::StepFailed { step, message }
    }

    async fn execute_step(&self, step: WorkflowStep, task_id: &str, batch: &ImportBatchRecord) -> Result<Value> {
        match step {
            WorkflowStep::Segmenting => self.segment(task_id, batch).await,
            WorkflowStep::AnalyzingTitles => self.analyze_titles(batch).await,
            WorkflowStep::TranslatingTitles => self.translate_titles(task_id).await,
            WorkflowStep::TranslatingBodies => self.translate_bodies(task_id).await,
            WorkflowStep::QualityChecking => self.check_bodies(task_id).await,
            WorkflowStep::Importing => self.import_chapters(task_id, batch).await,
            WorkflowStep::Completed => Ok(Value::Null),
        }
    }

    // =========================================================================
    // Steps
    // =========================================================================

    async fn segment(&self, task_id: &str, batch: &ImportBatchRecord) -> Result<Value> {
        let drafts = self.store.list_batch_drafts(&batch.id).await?;
        let pairs = drafts.iter().map(|d| (d.id.clone(), d.chapter_number)).collect();
        let created = self.store.ensure_records(task_id, pairs).await?;

        info!("Task {}: {} chapters, {} new progress records", task_id, drafts.len(), created);
        Ok(json!({ "chapters": drafts.len(), "new_records": created }))
    }

    async fn analyze_titles(&self, batch: &ImportBatchRecord) -> Result<Value> {
        let mut drafts: Vec<ChapterDraftRecord> = self
            .store
            .list_batch_drafts(&batch.id)
            .await?
            .into_iter()
            .filter(|d| d.clean_title.is_none())
            .collect();
        if drafts.is_empty() {
            debug!("All titles of batch {} already reviewed", batch.id);
            return Ok(json!({ "reviewed": 0 }));
        }

        let items: Vec<TitleCheckItem> = drafts
            .iter()
            .map(|d| TitleCheckItem { chapter_number: d.chapter_number, title: d.raw_title.clone() })
            .collect();
        let results = self.checker.check_titles(&items).await;

        let mut auto_fixed = 0;
        for (draft, result) in drafts.iter_mut().zip(results.iter()) {
            if apply_review(draft, result, &self.rules).auto_fixed {
                auto_fixed += 1;
            }
            self.store.update_draft(draft).await?;
        }

        Ok(json!({ "reviewed": drafts.len(), "auto_fixed": auto_fixed }))
    }

    async fn translate_titles(&self, task_id: &str) -> Result<Value> {
        let records = self.store.list_records_by_status(task_id, &[RecordStatus::Pending]).await?;

        let mut targets = Vec::with_capacity(records.len());
        let mut items = Vec::with_capacity(records.len());
        for record in &records {
            let Some(draft) = self.store.get_draft(&record.draft_id).await? else {
                warn!("Draft {} of record {} is gone, skipping its title", record.draft_id, record.id);
                continue;
            };
            items.push(TitleItem { index: targets.len(), source_title: draft.best_title().to_string() });
            targets.push((record.id, draft.id));
        }

        let batches = self
            .client
            .plan_title_batches(items, self.title_limits.max_chars, self.title_limits.max_items);
        let batch_count = batches.len();

        let mut translated = 0;
        let mut missing = 0;
        for batch in batches {
            let results = self
                .client
                .translate_title_batch(&batch)
                .await
                .map_err(|e| anyhow!("title batch of {} items failed: {}", batch.len(), e))?;

            missing += batch.len() - results.len();
            if results.len() < batch.len() {
                warn!(
                    "Title batch returned {} of {} titles; the rest keep their source titles for now",
                    results.len(),
                    batch.len()
                );
            }

            let updates = results
                .into_iter()
                .filter_map(|t| {
                    targets.get(t.index).map(|(record_id, draft_id)| TitleUpdate {
                        record_id: *record_id,
                        draft_id: draft_id.clone(),
                        translated_title: t.translated_title,
                    })
                })
                .collect();
            translated += self.store.apply_title_translations(updates).await?;
        }

        info!("Task {}: translated {} titles in {} batches", task_id, translated, batch_count);
        Ok(json!({ "batches": batch_count, "translated": translated, "missing": missing }))
    }

    async fn translate_bodies(&self, task_id: &str) -> Result<Value> {
        let records = self
            .store
            .list_records_by_status(task_id, &[RecordStatus::Pending, RecordStatus::TitleTranslated])
            .await?;

        let mut translated = 0;
        let mut failed = 0;
        // One chapter at a time: the rate limiter is shared with every other task
        for record in &records {
            let Some(draft) = self.store.get_draft(&record.draft_id).await? else {
                self.fail_record(record, "chapter draft no longer exists").await?;
                failed += 1;
                continue;
            };

            let title = match draft.translated_title.as_deref().map(str::trim) {
                Some(title) if !title.is_empty() => title.to_string(),
                _ => self.client.translate_title(draft.best_title(), Some(draft.best_content())).await,
            };

            match self.client.translate_long_text(draft.best_content(), None).await {
                Ok(content) => {
                    self.store.save_body_translation(record.id, &draft.id, &title, &content).await?;
                    translated += 1;
                    debug!("Translated chapter {}", record.chapter_number);
                }
                Err(e) => {
                    let message = format!("body translation failed: {}", e);
                    warn!("Chapter {}: {}", record.chapter_number, message);
                    self.fail_record(record, &message).await?;
                    self.store
                        .update_draft_status(&draft.id, DraftStatus::Failed, Some(truncate_chars(&message, MAX_ERROR_CHARS)))
                        .await?;
                    failed += 1;
                }
            }
        }

        info!("Task {}: {} bodies translated, {} failed", task_id, translated, failed);
        Ok(json!({ "translated": translated, "failed": failed }))
    }

    async fn check_bodies(&self, task_id: &str) -> Result<Value> {
        let records = self.store.list_records_by_status(task_id, &[RecordStatus::BodyTranslated]).await?;

        let mut passed = 0;
        let mut rejected = 0;
        for record in &records {
            let Some(draft) = self.store.get_draft(&record.draft_id).await? else {
                self.fail_record(record, "chapter draft no longer exists").await?;
                rejected += 1;
                continue;
            };

            let violations = self.body_qa.check(
                draft.translated_title.as_deref().unwrap_or_default(),
                draft.translated_content.as_deref().unwrap_or_default(),
            );
            if violations.is_empty() {
                self.store.update_record(record.id, RecordStatus::ReadyToImport, None).await?;
                passed += 1;
            } else {
                let message = body::describe(&violations);
                info!("Chapter {} rejected by QA: {}", record.chapter_number, message);
                self.store.update_record(record.id, RecordStatus::QaFailed, Some(message)).await?;
                rejected += 1;
            }
        }

        Ok(json!({ "passed": passed, "rejected": rejected }))
    }

    async fn import_chapters(&self, task_id: &str, batch: &ImportBatchRecord) -> Result<Value> {
        let records = self.store.list_records_by_status(task_id, &[RecordStatus::ReadyToImport]).await?;

        let mut imported = 0;
        let mut skipped = 0;
        let mut failed = 0;
        for record in &records {
            match self.import_record(record, batch).await {
                Ok(RecordStatus::Skipped) => skipped += 1,
                Ok(_) => imported += 1,
                Err(e) => {
                    let message = format!("import failed: {:#}", e);
                    warn!("Chapter {}: {}", record.chapter_number, message);
                    self.fail_record(record, &message).await?;
                    failed += 1;
                }
            }
        }

        info!(
            "Task {}: {} chapters imported, {} already in catalog, {} failed",
            task_id, imported, skipped, failed
        );
        Ok(json!({ "imported": imported, "skipped": skipped, "failed": failed }))
    }

    /// Promote one chapter; returns the status its record ended with
    async fn import_record(&self, record: &ChapterTranslationRecord, batch: &ImportBatchRecord) -> Result<RecordStatus> {
        let draft = self
            .store
            .get_draft(&record.draft_id)
            .await?
            .ok_or_else(|| anyhow!("chapter draft {} no longer exists", record.draft_id))?;

        if let Some(existing) = self.store.find_catalog_chapter(draft.novel_id, draft.chapter_number).await? {
            debug!(
                "Chapter {} of novel {} already in catalog as {}",
                draft.chapter_number, draft.novel_id, existing.id
            );
            self.store.link_record_to_catalog(record.id, RecordStatus::Skipped, existing.id).await?;
            return Ok(RecordStatus::Skipped);
        }

        let now = Utc::now();
        let plan = self
            .planner
            .plan(&batch.config, draft.novel_id, draft.chapter_number, draft.word_count, now)
            .await?;
        let volume_id = self.store.ensure_volume(draft.novel_id, plan.volume_number).await?;

        let chapter = CatalogChapterRecord {
            id: 0,
            novel_id: draft.novel_id,
            volume_id,
            chapter_number: draft.chapter_number,
            title: draft.translated_title.clone().unwrap_or_else(|| draft.best_title().to_string()),
            content: draft.translated_content.clone().unwrap_or_default(),
            word_count: draft.word_count,
            unlock_price: plan.unlock_price,
            key_cost: plan.key_cost,
            is_free: plan.is_free,
            release_at: plan.release_at.to_rfc3339(),
            is_released: plan.is_released,
            is_advance: plan.is_advance,
            draft_id: Some(draft.id.clone()),
            created_at: now.to_rfc3339(),
        };
        let catalog_id = self.store.insert_catalog_chapter(&chapter).await?;

        self.store.link_record_to_catalog(record.id, RecordStatus::Imported, catalog_id).await?;
        self.store.update_draft_status(&draft.id, DraftStatus::Imported, None).await?;
        Ok(RecordStatus::Imported)
    }

    async fn fail_record(&self, record: &ChapterTranslationRecord, message: &str) -> Result<()> {
        self.store
            .update_record(record.id, RecordStatus::Failed, Some(truncate_chars(message, MAX_ERROR_CHARS)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runGuard_shouldRejectSecondHolderUntilDropped() {
        let running: RunningSet = Arc::new(Mutex::new(HashSet::new()));

        let first = RunGuard::acquire(&running, "task-1");
        assert!(first.is_some());
        assert!(RunGuard::acquire(&running, "task-1").is_none());
        assert!(RunGuard::acquire(&running, "task-2").is_some());

        drop(first);
        assert!(RunGuard::acquire(&running, "task-1").is_some());
    }

    #[test]
    fn test_titleBatchLimits_shouldFollowPipelineConfig() {
        let pipeline = PipelineConfig { title_batch_max_chars: 500, title_batch_max_items: 7, ..Default::default() };
        assert_eq!(TitleBatchLimits::from_pipeline(&pipeline), TitleBatchLimits { max_chars: 500, max_items: 7 });
    }
}
