/*!
 * Import precheck: title review, auto-fix and content rules over a batch
 */

use serde_json::json;

use tomeport::database::models::{DraftStatus, IssueTag};
use tomeport::errors::{ImportError, ProviderError};
use tomeport::providers::mock::MockProvider;

use crate::common::stub_providers::{RequestKind, request_kind, uppercase_answer};
use crate::common::{NOVEL_ID, test_controller, two_chapter_source};

/// Chapter 2's heading swallowed the first sentence of its body
fn bleeding_source() -> String {
    two_chapter_source().replace("Chapter 2 The Mill", "Chapter 2 The Mill Smoke rose over the valley.")
}

fn reviewer_fixing_chapter_two() -> MockProvider {
    MockProvider::with_responder(|request| match request_kind(request) {
        RequestKind::TitleCheck => Ok(json!({
            "results": [{
                "chapter_number": 2,
                "cleaned_title": "Chapter 2 The Mill",
                "move_to_body_prefix": "Smoke rose over the valley.",
                "is_reasonable": false,
                "is_modified": true,
                "reason": "body text in title"
            }]
        })
        .to_string()),
        _ => Ok(uppercase_answer(request)),
    })
}

#[tokio::test]
async fn test_precheck_withBodyInTitle_shouldMovePrefixAndFlag() {
    let controller = test_controller(reviewer_fixing_chapter_two());
    let outcome = controller
        .create_import_batch_from_text(NOVEL_ID, &bleeding_source(), None, None)
        .await
        .unwrap();

    let summary = controller.run_import_chapter_precheck(&outcome.batch.id).await.unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.auto_fixed_count, 1);
    assert_eq!(summary.suspect_count, 1);
    assert_eq!(summary.issue_count, 1);

    let repo = controller.repository();
    let fixed = repo.find_draft(NOVEL_ID, 2).await.unwrap().unwrap();
    assert_eq!(fixed.clean_title.as_deref(), Some("Chapter 2 The Mill"));
    assert!(fixed.clean_content.as_deref().unwrap().starts_with("Smoke rose over the valley.\n\n"));
    assert!(fixed.issue_tags.contains(&IssueTag::TitleAutoFixed));
    assert!(fixed.issue_tags.contains(&IssueTag::TitleSuspect));
    assert_eq!(fixed.status, DraftStatus::Checked);
    assert_eq!(fixed.raw_title, "Chapter 2 The Mill Smoke rose over the valley.");

    let untouched = repo.find_draft(NOVEL_ID, 1).await.unwrap().unwrap();
    assert_eq!(untouched.clean_title.as_deref(), Some(untouched.raw_title.as_str()));
    assert!(!untouched.has_issue());
}

#[tokio::test]
async fn test_precheck_runTwice_shouldNotStackNotes() {
    let controller = test_controller(reviewer_fixing_chapter_two());
    let outcome = controller
        .create_import_batch_from_text(NOVEL_ID, &bleeding_source(), None, None)
        .await
        .unwrap();

    controller.run_import_chapter_precheck(&outcome.batch.id).await.unwrap();
    let first = controller.repository().find_draft(NOVEL_ID, 2).await.unwrap().unwrap();
    controller.run_import_chapter_precheck(&outcome.batch.id).await.unwrap();
    let second = controller.repository().find_draft(NOVEL_ID, 2).await.unwrap().unwrap();

    assert_eq!(first.issue_summary, second.issue_summary);
    assert_eq!(first.issue_tags, second.issue_tags);
    assert_eq!(second.clean_content, first.clean_content);
}

#[tokio::test]
async fn test_precheck_withReviewerDown_shouldPassTitlesThrough() {
    let provider = MockProvider::with_responder(|_| Err(ProviderError::ConnectionError("connection refused".into())));
    let controller = test_controller(provider);
    let outcome = controller
        .create_import_batch_from_text(NOVEL_ID, &two_chapter_source(), None, None)
        .await
        .unwrap();

    let summary = controller.run_import_chapter_precheck(&outcome.batch.id).await.unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.auto_fixed_count, 0);
    assert_eq!(summary.suspect_count, 0);
    for draft in controller.repository().list_drafts_for_batch(&outcome.batch.id).await.unwrap() {
        assert_eq!(draft.clean_title.as_deref(), Some(draft.raw_title.as_str()));
        assert_eq!(draft.status, DraftStatus::Checked);
    }
}

#[tokio::test]
async fn test_precheck_withAdvertisingBody_shouldFlagAdContent() {
    let source = two_chapter_source().replace(
        "by the road.",
        "by the road.\n\nRead the latest chapters at www.example-novels.test",
    );
    let controller = test_controller(MockProvider::with_responder(|request| Ok(uppercase_answer(request))));
    let outcome = controller.create_import_batch_from_text(NOVEL_ID, &source, None, None).await.unwrap();

    let summary = controller.run_import_chapter_precheck(&outcome.batch.id).await.unwrap();

    assert_eq!(summary.issue_count, 1);
    let draft = controller.repository().find_draft(NOVEL_ID, 2).await.unwrap().unwrap();
    assert!(draft.issue_tags.contains(&IssueTag::AdContent));
    assert!(draft.issue_summary.contains("www."));
}

#[tokio::test]
async fn test_precheck_withUnknownBatch_shouldFail() {
    let controller = test_controller(MockProvider::working());
    let result = controller.run_import_chapter_precheck("no-such-batch").await;
    assert!(matches!(result, Err(ImportError::BatchNotFound(_))));
}
