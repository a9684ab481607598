/*!
 * Tests for error types and their conversions
 */

use std::time::Duration;

use tomeport::errors::{AppError, ImportError, ProviderError, TranslationError, WorkflowError};
use tomeport::workflow::WorkflowStep;

/// Test display of API errors
#[test]
fn test_providerError_apiError_shouldDisplayStatusAndMessage() {
    let error = ProviderError::ApiError { status_code: 429, message: "slow down".to_string() };
    assert_eq!(error.to_string(), "API responded with error: 429 - slow down");
}

/// Test which provider errors warrant a retry
#[test]
fn test_providerError_classification_shouldSeparateTransientAndRateLimit() {
    assert!(ProviderError::Timeout(Duration::from_secs(1)).is_transient());
    assert!(ProviderError::ApiError { status_code: 503, message: String::new() }.is_transient());
    assert!(!ProviderError::ApiError { status_code: 400, message: String::new() }.is_transient());
    assert!(!ProviderError::AuthenticationError("bad key".into()).is_transient());

    let limited = ProviderError::RateLimitExceeded { message: "busy".into(), retry_after: None };
    assert!(limited.is_rate_limit());
    assert!(!limited.is_transient());
}

/// Test that translation errors wrap provider errors
#[test]
fn test_translationError_fromProviderError_shouldWrapCorrectly() {
    let error: TranslationError = ProviderError::ConnectionError("reset".into()).into();
    assert!(matches!(error, TranslationError::Provider(_)));
    assert!(error.to_string().contains("reset"));
}

/// Test import error messages name the offending values
#[test]
fn test_importError_conflict_shouldNameChapterAndDraft() {
    let error = ImportError::ChapterNumberConflict { chapter_number: 7, existing_id: "d-7".into() };
    assert_eq!(error.to_string(), "Chapter number 7 is already used by draft d-7");

    let state = ImportError::InvalidBatchState {
        batch_id: "b1".into(),
        status: "translating".into(),
        expected: "draft".into(),
    };
    assert!(state.to_string().contains("translating"));
}

/// Test workflow errors carry the failed step
#[test]
fn test_workflowError_stepFailed_shouldDisplayStep() {
    let error = WorkflowError::StepFailed { step: WorkflowStep::TranslatingTitles, message: "bad json".into() };
    assert_eq!(error.to_string(), "Step translating_titles failed: bad json");
}

/// Test conversions into the application error
#[test]
fn test_appError_conversions_shouldWrapEachLayer() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    assert!(matches!(AppError::from(io), AppError::File(_)));
    assert!(matches!(AppError::from(anyhow::anyhow!("boom")), AppError::Unknown(_)));
    assert!(matches!(AppError::from(ImportError::EmptySource), AppError::Import(_)));
    assert!(matches!(AppError::from(WorkflowError::TaskNotFound("t".into())), AppError::Workflow(_)));
}
