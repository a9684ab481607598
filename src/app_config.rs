use anyhow::{Context, Result, anyhow};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::import::ImportConfig;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO)
    pub source_language: String,

    /// Target language code (ISO)
    pub target_language: String,

    /// Translation config
    pub translation: TranslationConfig,

    /// Chunking and batching limits
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Quality thresholds
    #[serde(default)]
    pub quality: QualityConfig,

    /// Default import settings for new batches
    #[serde(default)]
    pub import: ImportConfig,

    /// Default per-novel pricing profile
    #[serde(default)]
    pub pricing: PricingConfig,

    /// SQLite database path (defaults to the user's local data directory)
    #[serde(default)]
    pub database_path: Option<String>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: OpenAI (or any OpenAI-compatible server)
    #[default]
    OpenAI,
    // @provider: Anthropic
    Anthropic,
    // @provider: Ollama
    Ollama,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Ollama => "Ollama",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::OpenAI => "openai".to_string(),
            Self::Anthropic => "anthropic".to_string(),
            Self::Ollama => "ollama".to_string(),
        }
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Max concurrent requests
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Rate limit (requests per minute)
    #[serde(default)]
    pub rate_limit: Option<u32>,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        match provider_type {
            TranslationProvider::OpenAI => Self {
                provider_type: "openai".to_string(),
                model: default_openai_model(),
                api_key: String::new(),
                endpoint: default_openai_endpoint(),
                concurrent_requests: default_concurrent_requests(),
                timeout_secs: default_timeout_secs(),
                rate_limit: default_openai_rate_limit(),
            },
            TranslationProvider::Anthropic => Self {
                provider_type: "anthropic".to_string(),
                model: default_anthropic_model(),
                api_key: String::new(),
                endpoint: default_anthropic_endpoint(),
                concurrent_requests: default_concurrent_requests(),
                timeout_secs: default_anthropic_timeout_secs(),
                rate_limit: default_anthropic_rate_limit(),
            },
            TranslationProvider::Ollama => Self {
                provider_type: "ollama".to_string(),
                model: default_ollama_model(),
                api_key: String::new(),
                endpoint: default_ollama_endpoint(),
                concurrent_requests: 1,
                timeout_secs: default_anthropic_timeout_secs(),
                rate_limit: default_ollama_rate_limit(),
            },
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Common translation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Retry count for transient failures (timeouts, connection resets, 5xx)
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff in milliseconds, doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Retry count for explicit rate-limit answers
    #[serde(default = "default_rate_limit_retries")]
    pub rate_limit_retries: u32,

    /// Wait used when a rate-limit answer carries no hint
    #[serde(default = "default_rate_limit_wait_ms")]
    pub rate_limit_wait_ms: u64,

    /// Slack added to rolling-window waits
    #[serde(default = "default_admission_margin_ms")]
    pub admission_margin_ms: u64,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            rate_limit_retries: default_rate_limit_retries(),
            rate_limit_wait_ms: default_rate_limit_wait_ms(),
            admission_margin_ms: default_admission_margin_ms(),
        }
    }
}

/// Chunking and batching limits
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Maximum characters of body text per translation request
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,

    /// Characters of preceding text passed along as context
    #[serde(default = "default_chunk_overlap_chars")]
    pub chunk_overlap_chars: usize,

    /// Maximum characters of titles per batch request
    #[serde(default = "default_title_batch_max_chars")]
    pub title_batch_max_chars: usize,

    /// Maximum titles per batch request
    #[serde(default = "default_title_batch_max_items")]
    pub title_batch_max_items: usize,

    /// Maximum length of any stored title
    #[serde(default = "default_max_title_chars")]
    pub max_title_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: default_max_chunk_chars(),
            chunk_overlap_chars: default_chunk_overlap_chars(),
            title_batch_max_chars: default_title_batch_max_chars(),
            title_batch_max_items: default_title_batch_max_items(),
            max_title_chars: default_max_title_chars(),
        }
    }
}

/// Quality thresholds used by reconciliation, precheck and body QA
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QualityConfig {
    /// A chapter longer than this multiple of the batch mean is flagged
    #[serde(default = "default_word_count_anomaly_multiplier")]
    pub word_count_anomaly_multiplier: f64,

    /// Chapters shorter than this are flagged as extreme
    #[serde(default = "default_min_word_count")]
    pub min_word_count: i64,

    /// Chapters longer than this are flagged as extreme
    #[serde(default = "default_max_word_count")]
    pub max_word_count: i64,

    /// Translated bodies shorter than this fail QA
    #[serde(default = "default_min_body_chars")]
    pub min_body_chars: usize,

    /// Maximum share of source-script characters left in a translated body
    #[serde(default = "default_max_untranslated_ratio")]
    pub max_untranslated_ratio: f64,

    /// Regex matching characters of the source script
    #[serde(default = "default_untranslated_script_pattern")]
    pub untranslated_script_pattern: String,

    /// Literal fragments that mark advertising or site boilerplate
    #[serde(default = "default_ad_keywords")]
    pub ad_keywords: Vec<String>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            word_count_anomaly_multiplier: default_word_count_anomaly_multiplier(),
            min_word_count: default_min_word_count(),
            max_word_count: default_max_word_count(),
            min_body_chars: default_min_body_chars(),
            max_untranslated_ratio: default_max_untranslated_ratio(),
            untranslated_script_pattern: default_untranslated_script_pattern(),
            ad_keywords: default_ad_keywords(),
        }
    }
}

/// Default pricing profile provisioned for novels that have none
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PricingConfig {
    /// Unlock price per thousand words
    #[serde(default = "default_price_per_thousand_words")]
    pub price_per_thousand_words: i64,

    /// Key cost is the unlock price divided by this (rounded up)
    #[serde(default = "default_key_cost_divisor")]
    pub key_cost_divisor: i64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            price_per_thousand_words: default_price_per_thousand_words(),
            key_cost_divisor: default_key_cost_divisor(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Matching `log` filter
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_concurrent_requests() -> usize {
    2
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_anthropic_timeout_secs() -> u64 {
    120
}

fn default_temperature() -> f32 {
    0.3
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000 // doubled on each retry
}

fn default_rate_limit_retries() -> u32 {
    3
}

fn default_rate_limit_wait_ms() -> u64 {
    20_000
}

fn default_admission_margin_ms() -> u64 {
    50
}

fn default_max_chunk_chars() -> usize {
    3000
}

fn default_chunk_overlap_chars() -> usize {
    200
}

fn default_title_batch_max_chars() -> usize {
    2000
}

fn default_title_batch_max_items() -> usize {
    50
}

fn default_max_title_chars() -> usize {
    100
}

fn default_word_count_anomaly_multiplier() -> f64 {
    2.0
}

fn default_min_word_count() -> i64 {
    300
}

fn default_max_word_count() -> i64 {
    30_000
}

fn default_min_body_chars() -> usize {
    20
}

fn default_max_untranslated_ratio() -> f64 {
    0.1
}

fn default_untranslated_script_pattern() -> String {
    r"\p{Han}".to_string()
}

fn default_ad_keywords() -> Vec<String> {
    ["www.", "http", "QQ群", "加群", "微信", "公众号", "求月票", "求推荐票", "手机阅读", "最新章节"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_price_per_thousand_words() -> i64 {
    5
}

fn default_key_cost_divisor() -> i64 {
    10
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-5-haiku-latest".to_string()
}

fn default_ollama_model() -> String {
    "qwen2.5:7b".to_string()
}

fn default_openai_rate_limit() -> Option<u32> {
    Some(60)
}

fn default_anthropic_rate_limit() -> Option<u32> {
    // Slightly below the standard 50 requests per minute
    Some(45)
}

fn default_ollama_rate_limit() -> Option<u32> {
    None // No rate limit by default for local provider
}

impl Config {
    /// Load a config file, creating it with defaults when absent
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let file = File::open(path).with_context(|| format!("Failed to open config file: {:?}", path))?;
            let reader = BufReader::new(file);
            serde_json::from_reader(reader).with_context(|| format!("Failed to parse config file: {:?}", path))
        } else {
            warn!("Config file not found at {:?}, creating default config.", path);
            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Write the config as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        std::fs::write(path.as_ref(), json)
            .with_context(|| format!("Failed to write config to file: {:?}", path.as_ref()))
    }

    /// Resolved database location
    pub fn database_path(&self) -> PathBuf {
        match &self.database_path {
            Some(path) => PathBuf::from(path),
            None => dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("tomeport")
                .join("tomeport.db"),
        }
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        crate::language_utils::get_language_name(&self.source_language)?;
        crate::language_utils::get_language_name(&self.target_language)?;

        match self.translation.provider {
            TranslationProvider::OpenAI | TranslationProvider::Anthropic => {
                if self.translation.get_api_key().is_empty() {
                    return Err(anyhow!(
                        "Translation API key is required for {} provider",
                        self.translation.provider.display_name()
                    ));
                }
            }
            TranslationProvider::Ollama => {}
        }

        crate::providers::parse_endpoint(&self.translation.get_endpoint())?;

        if self.translation.get_concurrent_requests() == 0 {
            return Err(anyhow!("concurrent_requests must be at least 1"));
        }
        if self.translation.get_rate_limit() == Some(0) {
            return Err(anyhow!("rate_limit must be positive when set"));
        }

        let pipeline = &self.pipeline;
        if pipeline.max_chunk_chars == 0 || pipeline.title_batch_max_chars == 0 || pipeline.title_batch_max_items == 0 {
            return Err(anyhow!("pipeline limits must be positive"));
        }
        if pipeline.chunk_overlap_chars >= pipeline.max_chunk_chars {
            return Err(anyhow!(
                "chunk_overlap_chars ({}) must be smaller than max_chunk_chars ({})",
                pipeline.chunk_overlap_chars,
                pipeline.max_chunk_chars
            ));
        }
        if pipeline.max_title_chars == 0 {
            return Err(anyhow!("max_title_chars must be positive"));
        }

        if self.quality.word_count_anomaly_multiplier <= 1.0 {
            return Err(anyhow!("word_count_anomaly_multiplier must be greater than 1"));
        }
        regex::Regex::new(&self.quality.untranslated_script_pattern)
            .context("untranslated_script_pattern is not a valid regex")?;

        if self.pricing.key_cost_divisor <= 0 {
            return Err(anyhow!("key_cost_divisor must be positive"));
        }

        self.import.validate()?;

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: "zh".to_string(),
            target_language: "en".to_string(),
            translation: TranslationConfig::default(),
            pipeline: PipelineConfig::default(),
            quality: QualityConfig::default(),
            import: ImportConfig::default(),
            pricing: PricingConfig::default(),
            database_path: None,
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        let provider_str = self.provider.to_lowercase_string();
        self.available_providers.iter().find(|p| p.provider_type == provider_str)
    }

    /// Mutable access to the active provider configuration, creating it if missing
    pub fn active_provider_config_mut(&mut self) -> &mut ProviderConfig {
        let provider_str = self.provider.to_lowercase_string();
        let index = match self.available_providers.iter().position(|p| p.provider_type == provider_str) {
            Some(index) => index,
            None => {
                self.available_providers.push(ProviderConfig::new(self.provider));
                self.available_providers.len() - 1
            }
        };
        &mut self.available_providers[index]
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.model.is_empty() {
                return provider_config.model.clone();
            }
        }

        match self.provider {
            TranslationProvider::OpenAI => default_openai_model(),
            TranslationProvider::Anthropic => default_anthropic_model(),
            TranslationProvider::Ollama => default_ollama_model(),
        }
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.api_key.clone())
            .unwrap_or_default()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.endpoint.is_empty() {
                return provider_config.endpoint.clone();
            }
        }

        match self.provider {
            TranslationProvider::OpenAI => default_openai_endpoint(),
            TranslationProvider::Anthropic => default_anthropic_endpoint(),
            TranslationProvider::Ollama => default_ollama_endpoint(),
        }
    }

    /// Get the concurrency limit for the active provider
    pub fn get_concurrent_requests(&self) -> usize {
        self.get_active_provider_config()
            .map(|p| p.concurrent_requests)
            .unwrap_or_else(default_concurrent_requests)
    }

    /// Get the request timeout for the active provider
    pub fn get_timeout_secs(&self) -> u64 {
        self.get_active_provider_config()
            .map(|p| p.timeout_secs)
            .filter(|&secs| secs > 0)
            .unwrap_or_else(default_timeout_secs)
    }

    /// Get the rate limit for the active provider
    pub fn get_rate_limit(&self) -> Option<u32> {
        if let Some(provider_config) = self.get_active_provider_config() {
            return provider_config.rate_limit;
        }

        match self.provider {
            TranslationProvider::OpenAI => default_openai_rate_limit(),
            TranslationProvider::Anthropic => default_anthropic_rate_limit(),
            TranslationProvider::Ollama => default_ollama_rate_limit(),
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::OpenAI),
                ProviderConfig::new(TranslationProvider::Anthropic),
                ProviderConfig::new(TranslationProvider::Ollama),
            ],
            common: TranslationCommonConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.translation.active_provider_config_mut().api_key = "sk-test".to_string();
        config
    }

    #[test]
    fn test_validate_withDefaultsAndKey_shouldPass() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_withoutApiKey_shouldFailForHostedProvider() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let mut local = Config::default();
        local.translation.provider = TranslationProvider::Ollama;
        assert!(local.validate().is_ok());
    }

    #[test]
    fn test_validate_withOverlapNotSmallerThanChunk_shouldFail() {
        let mut config = valid_config();
        config.pipeline.chunk_overlap_chars = config.pipeline.max_chunk_chars;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_withBadLanguage_shouldFail() {
        let mut config = valid_config();
        config.target_language = "klingon".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_withMinimalJson_shouldFillDefaults() {
        let json = r#"{
            "source_language": "zh",
            "target_language": "en",
            "translation": { "provider": "ollama" }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.translation.provider, TranslationProvider::Ollama);
        assert_eq!(config.pipeline.max_chunk_chars, 3000);
        assert_eq!(config.quality.word_count_anomaly_multiplier, 2.0);
        assert_eq!(config.translation.get_model(), "qwen2.5:7b");
        assert_eq!(config.translation.get_rate_limit(), None);
    }

    #[test]
    fn test_activeProviderConfigMut_withMissingEntry_shouldCreateIt() {
        let mut translation = TranslationConfig {
            provider: TranslationProvider::Anthropic,
            available_providers: Vec::new(),
            common: TranslationCommonConfig::default(),
        };
        translation.active_provider_config_mut().model = "custom".to_string();
        assert_eq!(translation.get_model(), "custom");
        assert_eq!(translation.available_providers.len(), 1);
    }

    #[test]
    fn test_loadOrCreate_withMissingFile_shouldWriteDefaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf.json");
        let config = Config::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.source_language, "zh");

        let reloaded = Config::load_or_create(&path).unwrap();
        assert_eq!(reloaded.pipeline.max_title_chars, config.pipeline.max_title_chars);
    }

    #[test]
    fn test_providerFromStr_shouldRejectUnknown() {
        assert_eq!("Anthropic".parse::<TranslationProvider>().unwrap(), TranslationProvider::Anthropic);
        assert!("lmstudio".parse::<TranslationProvider>().is_err());
    }
}
