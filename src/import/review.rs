/*!
 * Applying a title review and the content rules to a draft.
 *
 * Shared by the import precheck and the workflow's title-analysis step so a
 * chapter ends up with the same clean fields whichever path reviewed it.
 * Clean fields are always derived from the raw ones, so re-applying a review
 * is idempotent.
 */

use crate::database::models::{ChapterDraftRecord, DraftStatus, IssueTag};
use crate::language_utils::count_words;
use crate::translation::quality::{ContentRules, TitleCheckResult};

/// Prefix of every summary note written by a review
pub const PRECHECK_NOTE: &str = "precheck: ";

/// What a review changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub auto_fixed: bool,
    pub suspect: bool,
}

/// Store the review's clean fields on `draft` and recompute its precheck flags
pub fn apply_review(
    draft: &mut ChapterDraftRecord,
    result: &TitleCheckResult,
    rules: &ContentRules,
) -> ReviewOutcome {
    draft.clear_issues_from(&IssueTag::PRECHECK, PRECHECK_NOTE);
    let mut outcome = ReviewOutcome::default();

    if result.is_modified {
        draft.clean_title = Some(result.cleaned_title.clone());
        draft.clean_content = Some(prepend_to_body(&result.move_to_body_prefix, &draft.raw_content));
        draft.flag(
            IssueTag::TitleAutoFixed,
            format!(
                "{}title fixed from '{}' to '{}'",
                PRECHECK_NOTE, result.original_title, result.cleaned_title
            ),
        );
        outcome.auto_fixed = true;
    } else {
        draft.clean_title = Some(draft.raw_title.clone());
        draft.clean_content = Some(draft.raw_content.clone());
    }
    draft.word_count = count_words(draft.best_content());

    if !result.is_reasonable {
        let reason = if result.reason.is_empty() { "no reason given" } else { result.reason.as_str() };
        draft.flag(IssueTag::TitleSuspect, format!("{}suspect title ({})", PRECHECK_NOTE, reason));
        outcome.suspect = true;
    }

    let violations = {
        let mut bodies = vec![draft.raw_content.as_str()];
        bodies.extend(draft.translated_content.as_deref());
        rules.evaluate(draft.best_title(), draft.word_count, &bodies)
    };
    for violation in violations {
        draft.flag(violation.tag, format!("{}{}", PRECHECK_NOTE, violation.note));
    }

    if draft.status == DraftStatus::Pending {
        draft.status = DraftStatus::Checked;
    }

    outcome
}

fn prepend_to_body(prefix: &str, body: &str) -> String {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        body.to_string()
    } else {
        format!("{}\n\n{}", prefix, body)
    }
}
