/*!
 * Translation client built on the shared rate limiter.
 *
 * Every provider call goes through `RateLimiter::schedule` with a per-call
 * timeout. Two independent bounded retry budgets apply around it:
 * - rate-limit answers wait for the provider hint (or the configured default)
 * - transient failures back off exponentially with random jitter
 * Waits happen outside the limiter so a sleeping caller never holds a slot.
 */

use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::Config;
use crate::errors::{ProviderError, TranslationError};
use crate::language_utils::{get_language_name, truncate_chars};
use crate::providers::{CompletionRequest, Provider};
use crate::translation::batcher::batch_by_length;
use crate::translation::chunking::{merge_translated_chunks, split_long_text};
use crate::translation::prompts::{PromptTemplate, chunk_payload, title_batch_payload, title_payload};
use crate::translation::rate_limiter::RateLimiter;
use crate::translation::response::parse_json_array;

/// Characters of chapter body passed as a summary when translating a lone title
const TITLE_SUMMARY_CHARS: usize = 300;

/// Tuning for the translation client
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Source language name used in prompts
    pub source_language: String,
    /// Target language name used in prompts
    pub target_language: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Deadline for a single provider call
    pub request_timeout: Duration,
    /// Retries for transient failures
    pub retry_count: u32,
    /// Base delay for transient retries
    pub retry_backoff: Duration,
    /// Retries for rate-limit answers
    pub rate_limit_retries: u32,
    /// Wait used when a rate-limit answer has no hint
    pub rate_limit_wait: Duration,
    /// Maximum characters per body request
    pub max_chunk_chars: usize,
    /// Characters of context carried into the next chunk
    pub chunk_overlap_chars: usize,
    /// Maximum length of translated titles
    pub max_title_chars: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            source_language: "Chinese".to_string(),
            target_language: "English".to_string(),
            temperature: 0.3,
            request_timeout: Duration::from_secs(60),
            retry_count: 3,
            retry_backoff: Duration::from_millis(1000),
            rate_limit_retries: 3,
            rate_limit_wait: Duration::from_secs(20),
            max_chunk_chars: 3000,
            chunk_overlap_chars: 200,
            max_title_chars: 100,
        }
    }
}

impl ClientSettings {
    /// Settings derived from the application config
    pub fn from_config(config: &Config) -> Self {
        let common = &config.translation.common;
        Self {
            source_language: get_language_name(&config.source_language)
                .unwrap_or_else(|_| config.source_language.clone()),
            target_language: get_language_name(&config.target_language)
                .unwrap_or_else(|_| config.target_language.clone()),
            temperature: common.temperature,
            request_timeout: Duration::from_secs(config.translation.get_timeout_secs()),
            retry_count: common.retry_count,
            retry_backoff: Duration::from_millis(common.retry_backoff_ms),
            rate_limit_retries: common.rate_limit_retries,
            rate_limit_wait: Duration::from_millis(common.rate_limit_wait_ms),
            max_chunk_chars: config.pipeline.max_chunk_chars,
            chunk_overlap_chars: config.pipeline.chunk_overlap_chars,
            max_title_chars: config.pipeline.max_title_chars,
        }
    }
}

/// A title queued for batch translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleItem {
    /// Caller-chosen key, echoed back in the result
    pub index: usize,
    /// Title in the source language
    pub source_title: String,
}

/// A translated title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleTranslation {
    /// Key of the originating `TitleItem`
    pub index: usize,
    /// Translated title, length-capped
    pub translated_title: String,
}

/// Rate-limited translation operations
#[derive(Debug, Clone)]
pub struct TranslationClient {
    provider: Arc<dyn Provider>,
    limiter: Arc<RateLimiter>,
    settings: ClientSettings,
}

impl TranslationClient {
    /// Create a client over a provider and the process-wide limiter
    pub fn new(provider: Arc<dyn Provider>, limiter: Arc<RateLimiter>, settings: ClientSettings) -> Self {
        Self { provider, limiter, settings }
    }

    /// Client settings
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Shared limiter
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Send one request, retrying rate-limit answers and transient failures
    pub async fn complete(&self, request: CompletionRequest) -> Result<String, TranslationError> {
        let mut transient_attempts = 0u32;
        let mut rate_limit_attempts = 0u32;
        let timeout = self.settings.request_timeout;

        loop {
            let provider = self.provider.clone();
            let attempt = request.clone();
            let result = self
                .limiter
                .schedule(|| async move {
                    match tokio::time::timeout(timeout, provider.complete(attempt)).await {
                        Ok(result) => result,
                        Err(_) => Err(ProviderError::Timeout(timeout)),
                    }
                })
                .await;

            let error = match result {
                Ok(response) => return Ok(response.text),
                Err(error) => error,
            };

            if error.is_rate_limit() && rate_limit_attempts < self.settings.rate_limit_retries {
                rate_limit_attempts += 1;
                let wait = match &error {
                    ProviderError::RateLimitExceeded { retry_after: Some(hint), .. } => *hint,
                    _ => self.settings.rate_limit_wait,
                };
                warn!(
                    "{} rate limited, waiting {:?} (retry {}/{})",
                    self.provider.name(),
                    wait,
                    rate_limit_attempts,
                    self.settings.rate_limit_retries
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if error.is_transient() && transient_attempts < self.settings.retry_count {
                transient_attempts += 1;
                let delay = backoff_delay(self.settings.retry_backoff, transient_attempts);
                warn!(
                    "{} request failed: {}. Retrying in {:?} (attempt {}/{})",
                    self.provider.name(),
                    error,
                    delay,
                    transient_attempts,
                    self.settings.retry_count
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            return Err(error.into());
        }
    }

    fn system_prompt(&self, template: &str) -> String {
        PromptTemplate::new(template).render(&self.settings.source_language, &self.settings.target_language)
    }

    /// Request with the rendered `template` as system instruction
    pub fn request(&self, template: &str, user: String) -> CompletionRequest {
        CompletionRequest::new(self.system_prompt(template), user).temperature(self.settings.temperature)
    }

    /// Translate one chunk of body text
    pub async fn translate_chunk(&self, text: &str, context_hint: Option<&str>) -> Result<String, TranslationError> {
        let request = self.request(PromptTemplate::CHUNK_TRANSLATOR, chunk_payload(text, context_hint));
        let translated = self.complete(request).await?;
        let translated = translated.trim();
        if translated.is_empty() {
            return Err(TranslationError::EmptyResponse);
        }
        Ok(translated.to_string())
    }

    /// Translate a body of any length: split, translate chunk by chunk, merge
    pub async fn translate_long_text(&self, text: &str, context_hint: Option<&str>) -> Result<String, TranslationError> {
        let chunks = split_long_text(text, self.settings.max_chunk_chars, self.settings.chunk_overlap_chars);
        debug!("Translating {} chars in {} chunk(s)", text.chars().count(), chunks.len());

        let mut pieces = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.into_iter().enumerate() {
            if chunk.text.trim().is_empty() {
                pieces.push((chunk, String::new()));
                continue;
            }
            let hint = if i == 0 { context_hint } else { Some(chunk.context.as_str()) };
            let translated = self.translate_chunk(&chunk.text, hint).await?;
            pieces.push((chunk, translated));
        }

        Ok(merge_translated_chunks(&pieces))
    }

    /// Translate a single title; falls back to the capped original on any failure
    pub async fn translate_title(&self, title: &str, summary: Option<&str>) -> String {
        let fallback = truncate_chars(title.trim(), self.settings.max_title_chars);
        if title.trim().is_empty() {
            return fallback;
        }

        let summary = summary.map(|s| truncate_chars(s, TITLE_SUMMARY_CHARS));
        let request = self.request(PromptTemplate::TITLE_TRANSLATOR, title_payload(title, summary.as_deref()));

        match self.complete(request).await {
            Ok(text) => match clean_title_line(&text) {
                Some(line) => truncate_chars(&line, self.settings.max_title_chars),
                None => {
                    warn!("Empty title translation for '{}', keeping original", fallback);
                    fallback
                }
            },
            Err(e) => {
                warn!("Title translation failed for '{}': {}", fallback, e);
                fallback
            }
        }
    }

    /// Group titles into request-sized batches
    pub fn plan_title_batches(
        &self,
        items: Vec<TitleItem>,
        max_chars_per_batch: usize,
        max_items_per_batch: usize,
    ) -> Vec<Vec<TitleItem>> {
        batch_by_length(
            items,
            |item| item.source_title.clone(),
            max_chars_per_batch,
            Some(max_items_per_batch),
        )
    }

    /// Translate one batch of titles in a single request.
    ///
    /// Elements with an unknown index, a duplicate index, or an empty title
    /// are dropped. Items the model skipped are simply absent from the result.
    pub async fn translate_title_batch(&self, items: &[TitleItem]) -> Result<Vec<TitleTranslation>, TranslationError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let payload = title_batch_payload(items.iter().map(|i| (i.index, i.source_title.as_str())));
        let wanted: HashSet<usize> = items.iter().map(|i| i.index).collect();

        let mut last_error = String::new();
        for attempt in 1..=2 {
            let request = self.request(PromptTemplate::TITLE_BATCH_TRANSLATOR, payload.clone());
            let response = self.complete(request).await?;

            match parse_json_array::<serde_json::Value>(&response) {
                Ok(elements) => return Ok(self.accept_titles(elements, &wanted)),
                Err(e) => {
                    warn!("Title batch response unparsable (attempt {}/2): {}", attempt, e);
                    last_error = e.to_string();
                }
            }
        }

        Err(TranslationError::MalformedResponse(last_error))
    }

    fn accept_titles(&self, elements: Vec<serde_json::Value>, wanted: &HashSet<usize>) -> Vec<TitleTranslation> {
        let mut seen = HashSet::new();
        let mut accepted = Vec::new();

        for element in elements {
            let parsed: TitleTranslation = match serde_json::from_value(element) {
                Ok(parsed) => parsed,
                Err(e) => {
                    debug!("Skipping malformed title element: {}", e);
                    continue;
                }
            };
            if !wanted.contains(&parsed.index) || !seen.insert(parsed.index) {
                debug!("Skipping unexpected or duplicate title index {}", parsed.index);
                continue;
            }
            let Some(title) = clean_title_line(&parsed.translated_title) else {
                continue;
            };
            accepted.push(TitleTranslation {
                index: parsed.index,
                translated_title: truncate_chars(&title, self.settings.max_title_chars),
            });
        }

        accepted
    }

    /// Translate many titles through length-bounded batches, sorted by index
    pub async fn batch_translate_titles(
        &self,
        items: Vec<TitleItem>,
        max_chars_per_batch: usize,
        max_items_per_batch: usize,
    ) -> Result<Vec<TitleTranslation>, TranslationError> {
        let mut results = Vec::with_capacity(items.len());
        for batch in self.plan_title_batches(items, max_chars_per_batch, max_items_per_batch) {
            results.extend(self.translate_title_batch(&batch).await?);
        }
        results.sort_by_key(|t| t.index);
        Ok(results)
    }
}

/// First non-empty line with surrounding quotes removed
fn clean_title_line(text: &str) -> Option<String> {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line.trim_matches(|c| matches!(c, '"' | '\'' | '“' | '”' | '「' | '」')).trim();
    (!line.is_empty()).then(|| line.to_string())
}

/// Exponential backoff from `base` with up to 50% random jitter
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
    let jitter_cap = (exp.as_millis() / 2) as u64;
    let jitter = if jitter_cap == 0 { 0 } else { rand::rng().random_range(0..=jitter_cap) };
    exp + Duration::from_millis(jitter)
}
