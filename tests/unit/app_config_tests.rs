/*!
 * Tests for application configuration functionality
 */

use anyhow::Result;
use tomeport::app_config::{Config, LogLevel, TranslationProvider};
use tomeport::import::PricingStrategy;

use crate::common;

/// Test default configuration values
#[test]
fn test_defaultConfig_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.source_language, "zh");
    assert_eq!(config.target_language, "en");
    assert_eq!(config.translation.provider, TranslationProvider::OpenAI);
    assert_eq!(config.log_level, LogLevel::Info);
    assert_eq!(config.pipeline.max_title_chars, 100);
    assert!(config.quality.word_count_anomaly_multiplier > 1.0);
    assert_eq!(config.import.pricing, PricingStrategy::Calculated { min_price: 5, max_price: 200 });
    assert!(config.import.release_start.is_none());
}

/// Test that the hosted default provider needs an API key
#[test]
fn test_validate_withoutApiKey_shouldRejectHostedProvider() {
    let mut config = Config::default();
    assert!(config.validate().is_err());

    config.translation.active_provider_config_mut().api_key = "sk-test".to_string();
    assert!(config.validate().is_ok());
}

/// Test validation of the pipeline and import sections
#[test]
fn test_validate_withInconsistentSettings_shouldFail() {
    let valid = common::test_config();
    assert!(valid.validate().is_ok());

    let mut config = valid.clone();
    config.pipeline.chunk_overlap_chars = config.pipeline.max_chunk_chars;
    assert!(config.validate().is_err());

    let mut config = valid.clone();
    config.target_language = "not-a-language".to_string();
    assert!(config.validate().is_err());

    let mut config = valid.clone();
    config.quality.word_count_anomaly_multiplier = 1.0;
    assert!(config.validate().is_err());

    let mut config = valid.clone();
    config.quality.untranslated_script_pattern = "(".to_string();
    assert!(config.validate().is_err());

    let mut config = valid;
    config.import.chapters_per_day = 0;
    assert!(config.validate().is_err());
}

/// Test that a missing config file is created with defaults and read back
#[test]
fn test_loadOrCreate_withMissingFile_shouldWriteDefaults() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = dir.path().join("conf.json");

    let created = Config::load_or_create(&path)?;
    assert!(path.exists());

    let loaded = Config::load_or_create(&path)?;
    assert_eq!(loaded.source_language, created.source_language);
    assert_eq!(loaded.translation.provider, created.translation.provider);
    Ok(())
}

/// Test that a partial file falls back to defaults for absent sections
#[test]
fn test_loadOrCreate_withPartialFile_shouldFillDefaults() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        dir.path(),
        "conf.json",
        r#"{
            "source_language": "ja",
            "target_language": "en",
            "translation": { "provider": "ollama" },
            "import": { "chapters_per_day": 3 }
        }"#,
    )?;

    let config = Config::load_or_create(&path)?;

    assert_eq!(config.source_language, "ja");
    assert_eq!(config.translation.provider, TranslationProvider::Ollama);
    assert_eq!(config.import.chapters_per_day, 3);
    assert_eq!(config.pipeline.max_chunk_chars, 3000);
    assert_eq!(config.quality.min_word_count, 300);
    assert!(config.validate().is_ok());
    Ok(())
}

/// Test the explicit database location wins over the platform default
#[test]
fn test_databasePath_withOverride_shouldUseIt() {
    let mut config = Config::default();
    assert!(config.database_path().ends_with("tomeport/tomeport.db"));

    config.database_path = Some("/tmp/novels.db".to_string());
    assert_eq!(config.database_path(), std::path::PathBuf::from("/tmp/novels.db"));
}
