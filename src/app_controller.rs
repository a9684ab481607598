use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::Config;
use crate::database::models::{
    ChapterDraftRecord, ChapterTranslationRecord, ImportBatchStatus, TaskStatus, TranslationTaskRecord,
};
use crate::database::{DatabaseConnection, Repository};
use crate::errors::{ImportError, WorkflowError};
use crate::file_utils::FileManager;
use crate::import::{
    ChapterPlanner, ChapterUpdate, ImportConfig, ImportOutcome, ImportReconciler, PrecheckSummary,
    ProfilePricing,
};
use crate::providers::{Provider, build_provider};
use crate::translation::client::{ClientSettings, TranslationClient};
use crate::translation::quality::{BodyQa, ContentRules, QualityChecker};
use crate::translation::rate_limiter::{DEFAULT_WINDOW, RateLimiter};
use crate::workflow::{RunOutcome, TitleBatchLimits, WorkflowOrchestrator};

// @module: Application controller: the caller-facing import and workflow operations

/// A task with its per-chapter progress
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task: TranslationTaskRecord,
    pub records: Vec<ChapterTranslationRecord>,
}

/// Main application controller
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Durable store shared by every component
    repo: Repository,
    reconciler: ImportReconciler,
    orchestrator: Arc<WorkflowOrchestrator>,
}

impl Controller {
    // @method: Open the configured database and provider
    pub fn from_config(config: Config, database_override: Option<PathBuf>) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;

        let db_path = database_override.unwrap_or_else(|| config.database_path());
        let db = DatabaseConnection::new(&db_path)
            .with_context(|| format!("Failed to open database at {:?}", db_path))?;
        let provider = build_provider(&config.translation)?;
        info!("Using {} with model {}", provider.name(), config.translation.get_model());

        Self::with_components(config, Repository::new(db), provider)
    }

    // @method: Wire every component around an existing store and provider
    pub fn with_components(config: Config, repo: Repository, provider: Arc<dyn Provider>) -> Result<Self> {
        let common = &config.translation.common;
        // One limiter for the whole process: every task shares the provider budget
        let limiter = Arc::new(RateLimiter::with_window(
            config.translation.get_concurrent_requests(),
            config.translation.get_rate_limit(),
            DEFAULT_WINDOW,
            Duration::from_millis(common.admission_margin_ms),
        ));
        let client = TranslationClient::new(provider, limiter, ClientSettings::from_config(&config));
        let checker = QualityChecker::new(client.clone());
        let planner = ChapterPlanner::new(Arc::new(ProfilePricing::new(repo.clone(), config.pricing.clone())));

        let reconciler = ImportReconciler::new(
            repo.clone(),
            planner.clone(),
            checker.clone(),
            &config.quality,
            config.pipeline.max_title_chars,
        );
        let orchestrator = WorkflowOrchestrator::new(
            Arc::new(repo.clone()),
            client,
            checker,
            planner,
            ContentRules::from_config(&config.quality),
            BodyQa::new(&config.quality, &config.target_language)?,
            TitleBatchLimits::from_pipeline(&config.pipeline),
        );

        Ok(Self {
            config,
            repo,
            reconciler,
            orchestrator: Arc::new(orchestrator),
        })
    }

    /// The active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying store
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Segment and reconcile `source`; `import_config` defaults to the configured one
    pub async fn create_import_batch_from_text(
        &self,
        novel_id: i64,
        source: &str,
        admin_id: Option<String>,
        import_config: Option<ImportConfig>,
    ) -> Result<ImportOutcome, ImportError> {
        let import_config = import_config.unwrap_or_else(|| self.config.import.clone());
        self.reconciler
            .create_drafts_from_text(novel_id, source, admin_id, &import_config)
            .await
    }

    // @method: Read a source file and import it
    pub async fn import_source_file<P: AsRef<Path>>(
        &self,
        novel_id: i64,
        path: P,
        admin_id: Option<String>,
    ) -> Result<ImportOutcome> {
        let source = FileManager::read_source_text(&path)?;
        debug!("Read {} chars from {:?}", source.chars().count(), path.as_ref());
        Ok(self.create_import_batch_from_text(novel_id, &source, admin_id, None).await?)
    }

    /// Apply operator edits to drafts of a batch
    pub async fn update_import_chapters(
        &self,
        batch_id: &str,
        updates: Vec<(String, ChapterUpdate)>,
    ) -> Result<Vec<ChapterDraftRecord>, ImportError> {
        self.reconciler.update_chapters(batch_id, updates).await
    }

    /// Review titles and flag issues for every chapter of the batch's novel
    pub async fn run_import_chapter_precheck(&self, batch_id: &str) -> Result<PrecheckSummary, ImportError> {
        self.reconciler.run_precheck(batch_id).await
    }

    /// Confirm a batch and return its translation task, creating it on first call
    pub async fn mark_batch_ready_for_translation(&self, batch_id: &str) -> Result<TranslationTaskRecord, ImportError> {
        let batch = self
            .repo
            .get_batch(batch_id)
            .await?
            .ok_or_else(|| ImportError::BatchNotFound(batch_id.to_string()))?;

        if matches!(batch.status, ImportBatchStatus::Translating | ImportBatchStatus::Completed) {
            return Err(ImportError::InvalidBatchState {
                batch_id: batch.id,
                status: batch.status.to_string(),
                expected: "draft, confirmed or failed".to_string(),
            });
        }

        let task = match self.repo.find_task_for_batch(batch_id).await? {
            Some(task) if task.status != TaskStatus::Completed => {
                debug!("Batch {} already has task {}", batch_id, task.id);
                task
            }
            _ => {
                let drafts = self.repo.list_drafts_for_batch(batch_id).await?;
                let task = TranslationTaskRecord::new(batch.novel_id, batch.id.clone(), drafts.len() as i64);
                self.repo.create_task(&task).await?;
                info!("Created task {} for batch {} ({} chapters)", task.id, batch_id, drafts.len());
                task
            }
        };

        self.repo.update_batch_status(batch_id, ImportBatchStatus::Confirmed).await?;
        Ok(task)
    }

    /// Run (or resume) a translation task
    pub async fn run_novel_translation_workflow(&self, task_id: &str) -> Result<RunOutcome, WorkflowError> {
        self.orchestrator.run(task_id).await
    }

    /// Stop a task from being picked up again; a step already running finishes
    pub async fn pause_task(&self, task_id: &str) -> Result<TranslationTaskRecord, WorkflowError> {
        let task = self.load_task(task_id).await?;
        match task.status {
            TaskStatus::Completed | TaskStatus::Paused => {
                warn!("Task {} is {}, not pausing", task_id, task.status);
            }
            _ => {
                self.repo
                    .update_task_status(task_id, TaskStatus::Paused, None, task.error_message.clone())
                    .await?;
                info!("Paused task {} at step {}", task_id, task.current_step);
            }
        }
        self.load_task(task_id).await
    }

    /// Make a paused task runnable again
    pub async fn resume_task(&self, task_id: &str) -> Result<TranslationTaskRecord, WorkflowError> {
        let task = self.load_task(task_id).await?;
        if task.status == TaskStatus::Paused {
            self.repo.update_task_status(task_id, TaskStatus::Pending, None, None).await?;
            info!("Resumed task {}, next step {}", task_id, task.current_step);
        } else {
            warn!("Task {} is {}, nothing to resume", task_id, task.status);
        }
        self.load_task(task_id).await
    }

    /// Task state with every per-chapter record
    pub async fn task_status(&self, task_id: &str) -> Result<TaskReport, WorkflowError> {
        let task = self.load_task(task_id).await?;
        let records = self.repo.list_records(task_id).await?;
        Ok(TaskReport { task, records })
    }

    async fn load_task(&self, task_id: &str) -> Result<TranslationTaskRecord, WorkflowError> {
        self.repo
            .get_task(task_id)
            .await?
            .ok_or_else(|| WorkflowError::TaskNotFound(task_id.to_string()))
    }
}
