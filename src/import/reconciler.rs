/*!
 * Import reconciliation.
 *
 * Turns submitted source text into chapter drafts for a novel without ever
 * creating a second draft for a chapter number the novel already has:
 * - a stored draft whose title carries the right chapter-number token is
 *   taken as already correct and reused untouched
 * - a stored draft without that token is a correction: its raw fields are
 *   replaced, derived fields cleared and the chapter flagged
 *
 * Every draft written by a run is saved in one transaction, and callers get
 * the novel's complete draft set back, not just the delta.
 */

use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::planner::{ChapterPlan, ChapterPlanner};
use super::review::apply_review;
use super::ImportConfig;
use crate::app_config::QualityConfig;
use crate::database::Repository;
use crate::database::models::{
    ChapterDraftRecord, DraftStatus, ImportBatchRecord, ImportBatchStatus, IssueTag,
};
use crate::errors::ImportError;
use crate::file_utils::source_hash;
use crate::language_utils::{count_words, truncate_chars};
use crate::segmenter::{Segment, TextSegmenter, heading_marker, heading_number};
use crate::translation::quality::{ContentRules, QualityChecker, TitleCheckItem};

/// Prefix of notes about chapter numbering
const NUMBERING_NOTE: &str = "numbering: ";
/// Prefix of notes about catalog collisions
const CATALOG_NOTE: &str = "catalog: ";
/// Prefix of notes about suspicious lengths
const LENGTH_NOTE: &str = "length: ";

/// How each segmented chapter was reconciled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// New drafts
    pub created: usize,
    /// Stored drafts reused as already correct
    pub duplicates: usize,
    /// Stored drafts overwritten and flagged
    pub corrected: usize,
}

/// Result of an import
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub batch: ImportBatchRecord,
    /// Every draft of the novel, ordered by chapter number
    pub drafts: Vec<ChapterDraftRecord>,
    pub report: ReconcileReport,
}

/// Fields an operator may edit on a draft
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterUpdate {
    #[serde(default)]
    pub chapter_number: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Aggregate counts from a precheck run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecheckSummary {
    pub total: usize,
    pub issue_count: usize,
    pub suspect_count: usize,
    pub auto_fixed_count: usize,
}

/// Draft creation, edits and precheck for import batches
#[derive(Debug, Clone)]
pub struct ImportReconciler {
    repo: Repository,
    segmenter: TextSegmenter,
    planner: ChapterPlanner,
    checker: QualityChecker,
    rules: ContentRules,
    anomaly_multiplier: f64,
    max_title_chars: usize,
}

impl ImportReconciler {
    pub fn new(
        repo: Repository,
        planner: ChapterPlanner,
        checker: QualityChecker,
        quality: &QualityConfig,
        max_title_chars: usize,
    ) -> Self {
        Self {
            repo,
            segmenter: TextSegmenter::new(max_title_chars),
            planner,
            checker,
            rules: ContentRules::from_config(quality),
            anomaly_multiplier: quality.word_count_anomaly_multiplier,
            max_title_chars,
        }
    }

    /// Segment `source`, reconcile it against the novel's drafts and persist the result
    pub async fn create_drafts_from_text(
        &self,
        novel_id: i64,
        source: &str,
        admin_id: Option<String>,
        config: &ImportConfig,
    ) -> Result<ImportOutcome, ImportError> {
        config.validate().map_err(|e| ImportError::InvalidConfig(e.to_string()))?;

        let segments = self.segmenter.segment(source);
        if segments.is_empty() {
            return Err(ImportError::EmptySource);
        }

        let now = Utc::now();
        let config = config.resolved(now);
        let batch = ImportBatchRecord::new(
            novel_id,
            admin_id,
            source_hash(source),
            config.clone(),
            segments.len() as i64,
        );
        self.repo.create_batch(&batch).await?;
        info!(
            "Import batch {} for novel {}: {} chapters segmented",
            batch.id,
            novel_id,
            segments.len()
        );

        let existing: HashMap<i64, ChapterDraftRecord> = self
            .repo
            .list_drafts_for_novel(novel_id)
            .await?
            .into_iter()
            .map(|d| (d.chapter_number, d))
            .collect();

        let word_counts: Vec<i64> = segments.iter().map(|s| count_words(&s.content)).collect();
        let mean = word_counts.iter().sum::<i64>() as f64 / word_counts.len() as f64;
        let abnormal_above = mean * self.anomaly_multiplier;

        let mut report = ReconcileReport::default();
        let mut touched = Vec::with_capacity(segments.len());

        for (i, segment) in segments.iter().enumerate() {
            let number = segment.chapter_number;

            let mut draft = match existing.get(&number) {
                Some(stored) if heading_number(&stored.raw_title) == Some(number) => {
                    debug!("Chapter {} already imported, reusing stored draft", number);
                    report.duplicates += 1;
                    let mut stored = stored.clone();
                    stored.batch_id = batch.id.clone();
                    touched.push(stored);
                    continue;
                }
                Some(stored) => {
                    report.corrected += 1;
                    correct_draft(stored, &batch.id, segment)
                }
                None => {
                    report.created += 1;
                    new_draft(novel_id, &batch.id, segment)
                }
            };

            draft.word_count = word_counts[i];
            if (draft.word_count as f64) > abnormal_above {
                draft.flag(
                    IssueTag::WordCountAbnormal,
                    format!(
                        "{}{} words, more than {:.1}x the batch mean of {:.0}",
                        LENGTH_NOTE, draft.word_count, self.anomaly_multiplier, mean
                    ),
                );
            }
            if let Some(token) = merged_heading(&draft.raw_content, number, segments.get(i + 1)) {
                draft.flag(
                    IssueTag::PossibleMergedChapters,
                    format!("{}body contains the next chapter heading '{}'", LENGTH_NOTE, token),
                );
            }

            let plan = self.planner.plan(&config, novel_id, number, draft.word_count, now).await?;
            apply_plan(&mut draft, &plan);
            touched.push(draft);
        }

        self.repo.save_drafts(touched.clone()).await?;
        info!(
            "Reconciled novel {}: {} created, {} duplicates, {} corrected",
            novel_id, report.created, report.duplicates, report.corrected
        );

        let mut merged: BTreeMap<i64, ChapterDraftRecord> = self
            .repo
            .list_drafts_for_novel(novel_id)
            .await?
            .into_iter()
            .map(|d| (d.chapter_number, d))
            .collect();
        for draft in touched {
            merged.insert(draft.chapter_number, draft);
        }

        Ok(ImportOutcome {
            batch,
            drafts: merged.into_values().collect(),
            report,
        })
    }

    /// Edit a draft, re-validating whatever the edit could have broken
    pub async fn update_chapter(
        &self,
        draft_id: &str,
        update: ChapterUpdate,
    ) -> Result<ChapterDraftRecord, ImportError> {
        let mut draft = self
            .repo
            .get_draft(draft_id)
            .await?
            .ok_or_else(|| ImportError::ChapterNotFound(draft_id.to_string()))?;
        let batch = self.editable_batch(&draft.batch_id).await?;

        let mut renumbered = false;
        let mut rewritten = false;

        if let Some(number) = update.chapter_number.filter(|&n| n != draft.chapter_number) {
            if let Some(other) = self.repo.find_draft(draft.novel_id, number).await? {
                if other.id != draft.id {
                    return Err(ImportError::ChapterNumberConflict {
                        chapter_number: number,
                        existing_id: other.id,
                    });
                }
            }
            draft.chapter_number = number;
            renumbered = true;
        }

        if let Some(title) = update.title {
            let title = truncate_chars(title.trim(), self.max_title_chars);
            if title != draft.raw_title {
                draft.raw_title = title;
                draft.translated_title = None;
                rewritten = true;
            }
        }

        if let Some(content) = update.content {
            let content = content.trim().to_string();
            if content != draft.raw_content {
                draft.raw_content = content;
                draft.translated_content = None;
                draft.word_count = count_words(&draft.raw_content);
                draft.clear_issues_from(
                    &[IssueTag::WordCountAbnormal, IssueTag::PossibleMergedChapters],
                    LENGTH_NOTE,
                );
                rewritten = true;
            }
        }

        if rewritten {
            // Review has to run again on the new text
            draft.clean_title = None;
            draft.clean_content = None;
            draft.status = DraftStatus::Pending;
        }

        if renumbered || rewritten {
            draft.clear_issues_from(&[IssueTag::ChapterNumberMismatch], NUMBERING_NOTE);
            if let Some(heading) = heading_number(&draft.raw_title).filter(|&h| h != draft.chapter_number) {
                draft.flag(
                    IssueTag::ChapterNumberMismatch,
                    format!(
                        "{}heading says chapter {} but the draft is chapter {}",
                        NUMBERING_NOTE, heading, draft.chapter_number
                    ),
                );
            }
        }

        if renumbered {
            draft.clear_issues_from(&[IssueTag::CatalogDuplicate], CATALOG_NOTE);
            if self
                .repo
                .find_catalog_chapter(draft.novel_id, draft.chapter_number)
                .await?
                .is_some()
            {
                draft.flag(
                    IssueTag::CatalogDuplicate,
                    format!("{}chapter {} is already published", CATALOG_NOTE, draft.chapter_number),
                );
            }
        }

        if renumbered || rewritten {
            let plan = self
                .planner
                .plan(&batch.config, draft.novel_id, draft.chapter_number, draft.word_count, Utc::now())
                .await?;
            apply_plan(&mut draft, &plan);
        }

        self.repo.update_draft(&draft).await?;
        debug!("Updated draft {} (chapter {})", draft.id, draft.chapter_number);
        Ok(draft)
    }

    /// Apply several edits to drafts of one batch; returns the batch's drafts afterwards
    pub async fn update_chapters(
        &self,
        batch_id: &str,
        updates: Vec<(String, ChapterUpdate)>,
    ) -> Result<Vec<ChapterDraftRecord>, ImportError> {
        self.editable_batch(batch_id).await?;

        for (draft_id, update) in updates {
            let draft = self
                .repo
                .get_draft(&draft_id)
                .await?
                .filter(|d| d.batch_id == batch_id)
                .ok_or_else(|| ImportError::ChapterNotFound(draft_id.clone()))?;
            self.update_chapter(&draft.id, update).await?;
        }

        Ok(self.repo.list_drafts_for_batch(batch_id).await?)
    }

    /// Review every chapter title of the batch's novel and apply fixes and rules
    pub async fn run_precheck(&self, batch_id: &str) -> Result<PrecheckSummary, ImportError> {
        let batch = self
            .repo
            .get_batch(batch_id)
            .await?
            .ok_or_else(|| ImportError::BatchNotFound(batch_id.to_string()))?;

        let mut drafts = self.repo.list_drafts_for_novel(batch.novel_id).await?;
        let items: Vec<TitleCheckItem> = drafts
            .iter()
            .map(|d| TitleCheckItem { chapter_number: d.chapter_number, title: d.raw_title.clone() })
            .collect();

        let results = self.checker.check_titles(&items).await;

        let mut summary = PrecheckSummary { total: drafts.len(), ..Default::default() };
        for (draft, result) in drafts.iter_mut().zip(results.iter()) {
            let outcome = apply_review(draft, result, &self.rules);
            if outcome.auto_fixed {
                summary.auto_fixed_count += 1;
            }
            if outcome.suspect {
                summary.suspect_count += 1;
            }
        }
        summary.issue_count = drafts.iter().filter(|d| d.has_issue()).count();

        self.repo.save_drafts(drafts).await?;
        info!(
            "Precheck for batch {}: {} chapters, {} with issues, {} suspect, {} auto-fixed",
            batch_id, summary.total, summary.issue_count, summary.suspect_count, summary.auto_fixed_count
        );
        Ok(summary)
    }

    async fn editable_batch(&self, batch_id: &str) -> Result<ImportBatchRecord, ImportError> {
        let batch = self
            .repo
            .get_batch(batch_id)
            .await?
            .ok_or_else(|| ImportError::BatchNotFound(batch_id.to_string()))?;

        match batch.status {
            ImportBatchStatus::Draft | ImportBatchStatus::Confirmed | ImportBatchStatus::Failed => Ok(batch),
            status => Err(ImportError::InvalidBatchState {
                batch_id: batch.id,
                status: status.to_string(),
                expected: "draft, confirmed or failed".to_string(),
            }),
        }
    }
}

fn new_draft(novel_id: i64, batch_id: &str, segment: &Segment) -> ChapterDraftRecord {
    let mut draft = ChapterDraftRecord::new(
        novel_id,
        batch_id.to_string(),
        segment.chapter_number,
        segment.title.clone(),
        segment.content.clone(),
    );
    if let Some(heading) = heading_number(&segment.title).filter(|&h| h != segment.chapter_number) {
        draft.flag(
            IssueTag::ChapterNumberMismatch,
            format!(
                "{}heading says chapter {} but it is chapter {} in sequence",
                NUMBERING_NOTE, heading, segment.chapter_number
            ),
        );
    }
    draft
}

/// Overwrite a stored draft's raw fields and drop everything derived from them
fn correct_draft(stored: &ChapterDraftRecord, batch_id: &str, segment: &Segment) -> ChapterDraftRecord {
    let mut draft = stored.clone();
    draft.batch_id = batch_id.to_string();
    draft.raw_title = segment.title.clone();
    draft.raw_content = segment.content.clone();
    draft.clean_title = None;
    draft.clean_content = None;
    draft.translated_title = None;
    draft.translated_content = None;
    draft.status = DraftStatus::Pending;
    draft.error_message = None;
    draft.clear_issues();
    draft.flag(
        IssueTag::ChapterNumberMismatch,
        format!(
            "{}stored title '{}' does not carry chapter number {}, replaced by re-imported text",
            NUMBERING_NOTE, stored.raw_title, segment.chapter_number
        ),
    );
    draft
}

/// Next chapter's heading tokens found inside `content`, if any
fn merged_heading(content: &str, number: i64, next: Option<&Segment>) -> Option<String> {
    let mut tokens = vec![format!("第{}章", number + 1), format!("Chapter {}", number + 1)];
    if let Some(marker) = next.and_then(|s| heading_marker(&s.title)) {
        tokens.push(marker);
    }
    tokens.into_iter().find(|token| content.contains(token.as_str()))
}

fn apply_plan(draft: &mut ChapterDraftRecord, plan: &ChapterPlan) {
    draft.volume_number = plan.volume_number;
    draft.unlock_price = plan.unlock_price;
    draft.key_cost = plan.key_cost;
    draft.is_free = plan.is_free;
    draft.release_at = plan.release_at.to_rfc3339();
    draft.is_released = plan.is_released;
    draft.is_advance = plan.is_advance;
}
