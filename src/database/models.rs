/*!
 * Database entity models.
 *
 * These structures map directly to database tables. Timestamps are stored as
 * RFC 3339 strings; issue tags and checkpoints as JSON.
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

use crate::import::ImportConfig;
use crate::workflow::WorkflowStep;

/// Import batch lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportBatchStatus {
    /// Drafts created, still editable
    Draft,
    /// Approved for translation
    Confirmed,
    /// Workflow running
    Translating,
    /// Workflow finished
    Completed,
    /// Workflow failed
    Failed,
}

impl fmt::Display for ImportBatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportBatchStatus::Draft => write!(f, "draft"),
            ImportBatchStatus::Confirmed => write!(f, "confirmed"),
            ImportBatchStatus::Translating => write!(f, "translating"),
            ImportBatchStatus::Completed => write!(f, "completed"),
            ImportBatchStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for ImportBatchStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(ImportBatchStatus::Draft),
            "confirmed" => Ok(ImportBatchStatus::Confirmed),
            "translating" => Ok(ImportBatchStatus::Translating),
            "completed" => Ok(ImportBatchStatus::Completed),
            "failed" => Ok(ImportBatchStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid batch status: {}", s)),
        }
    }
}

/// Chapter draft lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    /// Segmented, not yet reviewed
    Pending,
    /// Title review applied
    Checked,
    /// Title and body translated
    Translated,
    /// Promoted into the catalog
    Imported,
    /// Translation or import failed; the error is kept on the draft
    Failed,
}

impl fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftStatus::Pending => write!(f, "pending"),
            DraftStatus::Checked => write!(f, "checked"),
            DraftStatus::Translated => write!(f, "translated"),
            DraftStatus::Imported => write!(f, "imported"),
            DraftStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for DraftStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(DraftStatus::Pending),
            "checked" => Ok(DraftStatus::Checked),
            "translated" => Ok(DraftStatus::Translated),
            "imported" => Ok(DraftStatus::Imported),
            "failed" => Ok(DraftStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid draft status: {}", s)),
        }
    }
}

/// Issue flags attached to a draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueTag {
    /// Heading token disagrees with the chapter's position
    ChapterNumberMismatch,
    /// Far longer than the batch mean
    WordCountAbnormal,
    /// Body contains the next chapter's heading
    PossibleMergedChapters,
    /// The catalog already has this chapter number
    CatalogDuplicate,
    /// Title review judged the title unreasonable
    TitleSuspect,
    /// Title review rewrote the title
    TitleAutoFixed,
    /// Advertising keywords or URLs
    AdContent,
    /// Implausibly short or long
    LengthExtreme,
    /// No usable title
    EmptyTitle,
}

impl IssueTag {
    /// Tags owned by the title precheck, recomputed on every precheck run
    pub const PRECHECK: [IssueTag; 5] = [
        IssueTag::TitleSuspect,
        IssueTag::TitleAutoFixed,
        IssueTag::AdContent,
        IssueTag::LengthExtreme,
        IssueTag::EmptyTitle,
    ];
}

impl fmt::Display for IssueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssueTag::ChapterNumberMismatch => "chapter_number_mismatch",
            IssueTag::WordCountAbnormal => "word_count_abnormal",
            IssueTag::PossibleMergedChapters => "possible_merged_chapters",
            IssueTag::CatalogDuplicate => "catalog_duplicate",
            IssueTag::TitleSuspect => "title_suspect",
            IssueTag::TitleAutoFixed => "title_auto_fixed",
            IssueTag::AdContent => "ad_content",
            IssueTag::LengthExtreme => "length_extreme",
            IssueTag::EmptyTitle => "empty_title",
        };
        f.write_str(name)
    }
}

/// Translation task lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, never run (or resumed after a pause)
    Pending,
    /// A run is in progress
    Running,
    /// Blocked by an operator
    Paused,
    /// All steps done
    Completed,
    /// A step failed at infrastructure or batch level
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Paused => write!(f, "paused"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "paused" => Ok(TaskStatus::Paused),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid task status: {}", s)),
        }
    }
}

/// Per-chapter workflow progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    TitleTranslated,
    BodyTranslated,
    QaFailed,
    ReadyToImport,
    Imported,
    Skipped,
    Failed,
}

impl RecordStatus {
    /// Storage string
    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::TitleTranslated => "title_translated",
            RecordStatus::BodyTranslated => "body_translated",
            RecordStatus::QaFailed => "qa_failed",
            RecordStatus::ReadyToImport => "ready_to_import",
            RecordStatus::Imported => "imported",
            RecordStatus::Skipped => "skipped",
            RecordStatus::Failed => "failed",
        }
    }

    /// Whether the chapter reached the catalog (or already was there)
    pub fn is_done(self) -> bool {
        matches!(self, RecordStatus::Imported | RecordStatus::Skipped)
    }

    /// Whether the chapter stopped short of the catalog
    pub fn is_failure(self) -> bool {
        matches!(self, RecordStatus::Failed | RecordStatus::QaFailed)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RecordStatus::Pending),
            "title_translated" => Ok(RecordStatus::TitleTranslated),
            "body_translated" => Ok(RecordStatus::BodyTranslated),
            "qa_failed" => Ok(RecordStatus::QaFailed),
            "ready_to_import" => Ok(RecordStatus::ReadyToImport),
            "imported" => Ok(RecordStatus::Imported),
            "skipped" => Ok(RecordStatus::Skipped),
            "failed" => Ok(RecordStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid record status: {}", s)),
        }
    }
}

/// One submission of source text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatchRecord {
    /// Batch ID (UUID)
    pub id: String,
    /// Novel the chapters belong to
    pub novel_id: i64,
    /// Operator who submitted the text
    pub admin_id: Option<String>,
    /// SHA-256 of the submitted text
    pub source_hash: String,
    /// Settings used for every chapter of the batch
    pub config: ImportConfig,
    /// Chapters found by segmentation
    pub chapter_count: i64,
    /// Lifecycle state
    pub status: ImportBatchStatus,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl ImportBatchRecord {
    /// Create a new batch in `draft` state
    pub fn new(
        novel_id: i64,
        admin_id: Option<String>,
        source_hash: String,
        config: ImportConfig,
        chapter_count: i64,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            novel_id,
            admin_id,
            source_hash,
            config,
            chapter_count,
            status: ImportBatchStatus::Draft,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// A chapter on its way from source text to the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterDraftRecord {
    /// Draft ID (UUID)
    pub id: String,
    pub novel_id: i64,
    /// Batch that last touched this draft
    pub batch_id: String,
    /// Unique per novel
    pub chapter_number: i64,
    pub raw_title: String,
    pub raw_content: String,
    pub clean_title: Option<String>,
    pub clean_content: Option<String>,
    pub translated_title: Option<String>,
    pub translated_content: Option<String>,
    /// Always recomputed from content
    pub word_count: i64,
    pub volume_number: i64,
    pub unlock_price: i64,
    pub key_cost: i64,
    pub is_free: bool,
    /// RFC 3339 scheduled release
    pub release_at: String,
    pub is_released: bool,
    pub is_advance: bool,
    pub issue_tags: BTreeSet<IssueTag>,
    pub issue_summary: String,
    pub status: DraftStatus,
    /// Last translation or import error
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ChapterDraftRecord {
    /// Create a new draft; plan fields start zeroed until the planner fills them
    pub fn new(
        novel_id: i64,
        batch_id: String,
        chapter_number: i64,
        raw_title: String,
        raw_content: String,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            novel_id,
            batch_id,
            chapter_number,
            raw_title,
            raw_content,
            clean_title: None,
            clean_content: None,
            translated_title: None,
            translated_content: None,
            word_count: 0,
            volume_number: 1,
            unlock_price: 0,
            key_cost: 0,
            is_free: false,
            release_at: now.clone(),
            is_released: false,
            is_advance: false,
            issue_tags: BTreeSet::new(),
            issue_summary: String::new(),
            status: DraftStatus::Pending,
            error_message: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Whether any issue is flagged
    pub fn has_issue(&self) -> bool {
        !self.issue_tags.is_empty()
    }

    /// Cleaned title if the review ran, else the raw one
    pub fn best_title(&self) -> &str {
        self.clean_title.as_deref().unwrap_or(&self.raw_title)
    }

    /// Cleaned body if the review ran, else the raw one
    pub fn best_content(&self) -> &str {
        self.clean_content.as_deref().unwrap_or(&self.raw_content)
    }

    /// Flag an issue and append its explanation to the summary
    pub fn flag(&mut self, tag: IssueTag, note: impl AsRef<str>) {
        self.issue_tags.insert(tag);
        // "; " separates notes in the summary
        let note = note.as_ref().trim().replace("; ", ", ");
        if note.is_empty() {
            return;
        }
        if !self.issue_summary.is_empty() {
            self.issue_summary.push_str("; ");
        }
        self.issue_summary.push_str(&note);
    }

    /// Remove `tags` and every summary note starting with `note_prefix`
    pub fn clear_issues_from(&mut self, tags: &[IssueTag], note_prefix: &str) {
        for tag in tags {
            self.issue_tags.remove(tag);
        }
        self.issue_summary = self
            .issue_summary
            .split("; ")
            .filter(|note| !note.is_empty() && !note.starts_with(note_prefix))
            .collect::<Vec<_>>()
            .join("; ");
    }

    /// Drop every flag and the summary
    pub fn clear_issues(&mut self) {
        self.issue_tags.clear();
        self.issue_summary.clear();
    }
}

/// A resumable workflow run over one batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationTaskRecord {
    /// Task ID (UUID)
    pub id: String,
    pub novel_id: i64,
    pub batch_id: String,
    pub total_chapters: i64,
    /// Imported or skipped
    pub completed_chapters: i64,
    /// Failed or rejected by QA
    pub failed_chapters: i64,
    /// Next step to run
    pub current_step: WorkflowStep,
    /// JSON object, merged key by key on every write
    pub checkpoint: Value,
    pub status: TaskStatus,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TranslationTaskRecord {
    /// Create a new pending task at the first step
    pub fn new(novel_id: i64, batch_id: String, total_chapters: i64) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            novel_id,
            batch_id,
            total_chapters,
            completed_chapters: 0,
            failed_chapters: 0,
            current_step: WorkflowStep::FIRST,
            checkpoint: Value::Object(serde_json::Map::new()),
            status: TaskStatus::Pending,
            error_message: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Whether a run would do anything
    pub fn is_runnable(&self) -> bool {
        !matches!(self.status, TaskStatus::Paused | TaskStatus::Completed)
    }

    /// Calculate completion percentage
    pub fn completion_percentage(&self) -> f64 {
        if self.total_chapters == 0 {
            return 0.0;
        }
        (self.completed_chapters as f64 / self.total_chapters as f64) * 100.0
    }
}

/// Per-chapter progress within a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterTranslationRecord {
    /// Database ID
    pub id: i64,
    pub task_id: String,
    pub draft_id: String,
    pub chapter_number: i64,
    pub status: RecordStatus,
    pub error_message: Option<String>,
    /// Catalog chapter created for (or already holding) this chapter
    pub catalog_chapter_id: Option<i64>,
    pub updated_at: String,
}

/// Task progress counters derived from its records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub total: i64,
    pub completed: i64,
    pub failed: i64,
}

/// A catalog volume
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeRecord {
    pub id: i64,
    pub novel_id: i64,
    pub volume_number: i64,
    pub title: String,
    pub created_at: String,
}

/// A published chapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogChapterRecord {
    /// Database ID (0 before insertion)
    pub id: i64,
    pub novel_id: i64,
    pub volume_id: i64,
    pub chapter_number: i64,
    pub title: String,
    pub content: String,
    pub word_count: i64,
    pub unlock_price: i64,
    pub key_cost: i64,
    pub is_free: bool,
    pub release_at: String,
    pub is_released: bool,
    pub is_advance: bool,
    /// Draft the chapter was promoted from
    pub draft_id: Option<String>,
    pub created_at: String,
}

/// Per-novel pricing inputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingProfileRecord {
    pub novel_id: i64,
    pub price_per_thousand_words: i64,
    pub key_cost_divisor: i64,
    pub created_at: String,
}
