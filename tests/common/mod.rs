/*!
 * Common test utilities for the tomeport test suite
 */

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use tomeport::Controller;
use tomeport::app_config::{Config, TranslationProvider};
use tomeport::database::Repository;
use tomeport::import::{ChapterPlanner, ImportConfig, ProfilePricing};
use tomeport::providers::mock::MockProvider;
use tomeport::translation::client::{ClientSettings, TranslationClient};
use tomeport::translation::quality::{BodyQa, ContentRules, QualityChecker};
use tomeport::translation::rate_limiter::RateLimiter;
use tomeport::workflow::{TitleBatchLimits, WorkflowOrchestrator, WorkflowStore};

// Re-export the stub providers module
pub mod stub_providers;

/// Novel used by every fixture
pub const NOVEL_ID: i64 = 42;

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Release date of chapter 1 in every fixture
pub fn release_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).single().expect("valid date")
}

/// Local-provider config with small chunks and no retry delays
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.source_language = "en".to_string();
    config.target_language = "fr".to_string();
    config.translation.provider = TranslationProvider::Ollama;
    config.translation.common.retry_count = 0;
    config.translation.common.retry_backoff_ms = 1;
    config.translation.common.rate_limit_retries = 0;
    config.pipeline.max_chunk_chars = 60;
    config.pipeline.chunk_overlap_chars = 10;
    config.quality.min_word_count = 1;
    config.quality.min_body_chars = 10;
    config.import = ImportConfig {
        free_chapter_threshold: 1,
        release_start: Some(release_start()),
        chapters_per_day: 1,
        ..Default::default()
    };
    config
}

/// Route library logs to the test harness; `RUST_LOG=debug` shows them
pub fn init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

/// Controller over a fresh in-memory database
pub fn test_controller(provider: MockProvider) -> Controller {
    init_test_logger();
    Controller::with_components(test_config(), Repository::new_in_memory().expect("in-memory db"), Arc::new(provider))
        .expect("controller")
}

/// Orchestrator over an arbitrary store, wired like the controller does it
pub fn test_orchestrator(store: Arc<dyn WorkflowStore>, repo: &Repository, provider: MockProvider) -> WorkflowOrchestrator {
    init_test_logger();
    let config = test_config();
    let client = TranslationClient::new(
        Arc::new(provider),
        Arc::new(RateLimiter::new(1, None)),
        ClientSettings::from_config(&config),
    );
    let planner = ChapterPlanner::new(Arc::new(ProfilePricing::new(repo.clone(), config.pricing.clone())));

    WorkflowOrchestrator::new(
        store,
        client.clone(),
        QualityChecker::new(client),
        planner,
        ContentRules::from_config(&config.quality),
        BodyQa::new(&config.quality, &config.target_language).expect("body qa"),
        TitleBatchLimits::from_pipeline(&config.pipeline),
    )
}

/// Two English chapters whose bodies need several chunks each
pub fn two_chapter_source() -> String {
    let first = "The rain had not stopped for three days. Mara waited by the gate.\n\n\
                 When the bell rang she walked into the square and looked for her brother.";
    let second = "Nobody in the village spoke about the fire. The mill stood black and empty.\n\n\
                  Her brother was not there, but his coat hung on the fence by the road.";
    format!("Chapter 1 The Gate\n{}\n\nChapter 2 The Mill\n{}\n", first, second)
}
