/*!
 * Re-import behaviour: already-correct chapters are reused, misnumbered ones
 * are corrected, and the catalog never receives a chapter twice.
 */

use tomeport::database::models::{CatalogChapterRecord, DraftStatus, IssueTag, RecordStatus};
use tomeport::errors::ImportError;
use tomeport::import::{ChapterUpdate, ReconcileReport};
use tomeport::workflow::RunOutcome;

use crate::common::stub_providers::uppercase_provider;
use crate::common::{NOVEL_ID, test_controller};

const MISNUMBERED: &str = "Chapter 1 Start\nHe opened the old door.\n\n\
                           Chapter 9 Night\nShe walked far.\n\n\
                           Chapter 3 Dawn\nThe sun rose again.";
const CORRECTED: &str = "Chapter 1 Start\nHe opened the old door.\n\n\
                         Chapter 2 Night\nShe walked a long way.\n\n\
                         Chapter 3 Dawn\nThe sun rose again.";

#[tokio::test]
async fn test_reimport_withCorrectedHeading_shouldUpdateOnlyThatChapter() {
    let controller = test_controller(uppercase_provider());

    let first = controller
        .create_import_batch_from_text(NOVEL_ID, MISNUMBERED, Some("editor".into()), None)
        .await
        .unwrap();
    assert_eq!(first.report, ReconcileReport { created: 3, duplicates: 0, corrected: 0 });
    assert!(first.drafts[1].issue_tags.contains(&IssueTag::ChapterNumberMismatch));
    let original_ids: Vec<String> = first.drafts.iter().map(|d| d.id.clone()).collect();

    let second = controller
        .create_import_batch_from_text(NOVEL_ID, CORRECTED, Some("editor".into()), None)
        .await
        .unwrap();

    assert_eq!(second.report, ReconcileReport { created: 0, duplicates: 2, corrected: 1 });
    assert_eq!(second.drafts.len(), 3);
    assert_eq!(second.drafts.iter().map(|d| d.id.clone()).collect::<Vec<_>>(), original_ids);

    let fixed = &second.drafts[1];
    assert_eq!(fixed.raw_title, "Chapter 2 Night");
    assert_eq!(fixed.raw_content, "She walked a long way.");
    assert_eq!(fixed.word_count, 18);
    assert_eq!(fixed.status, DraftStatus::Pending);
    assert!(fixed.issue_tags.contains(&IssueTag::ChapterNumberMismatch));
    assert!(fixed.issue_summary.contains("Chapter 9 Night"));
    assert_eq!(fixed.batch_id, second.batch.id);

    let untouched = &second.drafts[0];
    assert_eq!(untouched.raw_content, first.drafts[0].raw_content);
    assert_eq!(untouched.batch_id, second.batch.id);
    assert!(!untouched.has_issue());
}

#[tokio::test]
async fn test_reimport_identicalSource_shouldReportOnlyDuplicates() {
    let controller = test_controller(uppercase_provider());

    controller.create_import_batch_from_text(NOVEL_ID, CORRECTED, None, None).await.unwrap();
    let again = controller.create_import_batch_from_text(NOVEL_ID, CORRECTED, None, None).await.unwrap();

    assert_eq!(again.report, ReconcileReport { created: 0, duplicates: 3, corrected: 0 });
    assert_eq!(controller.repository().list_drafts_for_novel(NOVEL_ID).await.unwrap().len(), 3);
    assert_eq!(controller.repository().list_drafts_for_batch(&again.batch.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_reimport_afterPublishing_shouldNotDuplicateCatalogRows() {
    let controller = test_controller(uppercase_provider());

    let first = controller.create_import_batch_from_text(NOVEL_ID, CORRECTED, None, None).await.unwrap();
    let task = controller.mark_batch_ready_for_translation(&first.batch.id).await.unwrap();
    assert_eq!(controller.run_novel_translation_workflow(&task.id).await.unwrap(), RunOutcome::Completed);
    assert_eq!(controller.repository().list_catalog_chapters(NOVEL_ID).await.unwrap().len(), 3);

    let second = controller.create_import_batch_from_text(NOVEL_ID, CORRECTED, None, None).await.unwrap();
    let task = controller.mark_batch_ready_for_translation(&second.batch.id).await.unwrap();
    assert_eq!(controller.run_novel_translation_workflow(&task.id).await.unwrap(), RunOutcome::Completed);

    assert_eq!(controller.repository().list_catalog_chapters(NOVEL_ID).await.unwrap().len(), 3);
    let records = controller.repository().list_records(&task.id).await.unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.status == RecordStatus::Skipped && r.catalog_chapter_id.is_some()));
}

#[tokio::test]
async fn test_updateChapters_renumbering_shouldRevalidateNumberAndCatalog() {
    let controller = test_controller(uppercase_provider());
    let repo = controller.repository();

    let outcome = controller
        .create_import_batch_from_text(NOVEL_ID, CORRECTED, None, None)
        .await
        .unwrap();
    let draft_id = outcome.drafts[1].id.clone();

    // A chapter 7 published by some earlier import
    let volume_id = repo.ensure_volume(NOVEL_ID, 1).await.unwrap();
    repo.insert_catalog_chapter(&CatalogChapterRecord {
        id: 0,
        novel_id: NOVEL_ID,
        volume_id,
        chapter_number: 7,
        title: "Chapter 7".into(),
        content: "Published long ago.".into(),
        word_count: 17,
        unlock_price: 5,
        key_cost: 1,
        is_free: false,
        release_at: "2029-01-01T00:00:00+00:00".into(),
        is_released: true,
        is_advance: false,
        draft_id: None,
        created_at: "2029-01-01T00:00:00+00:00".into(),
    })
    .await
    .unwrap();

    let moved = controller
        .update_import_chapters(
            &outcome.batch.id,
            vec![(draft_id.clone(), ChapterUpdate { chapter_number: Some(7), ..Default::default() })],
        )
        .await
        .unwrap();
    let moved = moved.iter().find(|d| d.id == draft_id).unwrap();
    assert_eq!(moved.chapter_number, 7);
    assert!(moved.issue_tags.contains(&IssueTag::ChapterNumberMismatch));
    assert!(moved.issue_tags.contains(&IssueTag::CatalogDuplicate));

    let conflict = controller
        .update_import_chapters(
            &outcome.batch.id,
            vec![(draft_id.clone(), ChapterUpdate { chapter_number: Some(1), ..Default::default() })],
        )
        .await;
    assert!(matches!(conflict, Err(ImportError::ChapterNumberConflict { chapter_number: 1, .. })));

    let restored = controller
        .update_import_chapters(
            &outcome.batch.id,
            vec![(draft_id.clone(), ChapterUpdate { chapter_number: Some(2), ..Default::default() })],
        )
        .await
        .unwrap();
    let restored = restored.iter().find(|d| d.id == draft_id).unwrap();
    assert_eq!(restored.chapter_number, 2);
    assert!(!restored.has_issue());
    assert!(restored.issue_summary.is_empty());
}

#[tokio::test]
async fn test_createImportBatch_withInvalidConfig_shouldBeRejected() {
    let controller = test_controller(uppercase_provider());
    let mut config = controller.config().import.clone();
    config.chapters_per_day = 0;

    let result = controller.create_import_batch_from_text(NOVEL_ID, CORRECTED, None, Some(config)).await;

    assert!(matches!(result, Err(ImportError::InvalidConfig(_))));
    assert!(controller.repository().list_drafts_for_novel(NOVEL_ID).await.unwrap().is_empty());
}
