/*!
 * Provider implementations for the language-model services.
 *
 * This module contains client implementations for the supported services:
 * - OpenAI: chat completions API (and compatible local servers)
 * - Anthropic: messages API
 * - Ollama: local LLM server
 * - Mock: scripted behaviour for tests and dry runs
 *
 * Every provider speaks the same single request/response shape: a system
 * instruction plus one user payload in, free-form text out.
 */

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::app_config::{TranslationConfig, TranslationProvider};
use crate::errors::ProviderError;

pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod openai;

/// One completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System instruction
    pub system: String,
    /// User payload
    pub user: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Create a request with the default temperature and token budget
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.3,
            max_tokens: 4096,
        }
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the token budget
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Text returned by a provider, with token usage when reported
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionResponse {
    /// Generated text
    pub text: String,
    /// Prompt tokens consumed
    pub prompt_tokens: Option<u64>,
    /// Completion tokens generated
    pub completion_tokens: Option<u64>,
}

impl CompletionResponse {
    /// Response carrying only text
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Default::default() }
    }
}

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably behind the translation client.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Complete a request using this provider
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;

    /// Short provider name for logs
    fn name(&self) -> &str;
}

/// Build the configured provider
pub fn build_provider(config: &TranslationConfig) -> Result<Arc<dyn Provider>> {
    let model = config.get_model();
    let endpoint = parse_endpoint(&config.get_endpoint())?.to_string();
    let endpoint = endpoint.trim_end_matches('/').to_string();
    let timeout = Duration::from_secs(config.get_timeout_secs());

    let provider: Arc<dyn Provider> = match config.provider {
        TranslationProvider::OpenAI => {
            let api_key = config.get_api_key();
            if api_key.is_empty() {
                return Err(anyhow!("OpenAI provider requires an API key"));
            }
            Arc::new(openai::OpenAI::new(api_key, endpoint, model, timeout))
        }
        TranslationProvider::Anthropic => {
            let api_key = config.get_api_key();
            if api_key.is_empty() {
                return Err(anyhow!("Anthropic provider requires an API key"));
            }
            Arc::new(anthropic::Anthropic::new(api_key, endpoint, model, timeout))
        }
        TranslationProvider::Ollama => Arc::new(ollama::Ollama::new(endpoint, model, timeout)),
    };

    Ok(provider)
}

/// Parse a configured endpoint; a bare `host:port` is taken as plain HTTP
pub fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(anyhow!("Endpoint cannot be empty"));
    }

    let url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Url::parse(endpoint)
    } else {
        Url::parse(&format!("http://{}", endpoint))
    }
    .with_context(|| format!("Invalid endpoint: {}", endpoint))?;

    if url.host_str().is_none() {
        return Err(anyhow!("Invalid host in endpoint: {}", endpoint));
    }
    Ok(url)
}

/// Map a non-success HTTP status to the provider error taxonomy
pub(crate) fn status_to_error(status: StatusCode, headers: &HeaderMap, body: String) -> ProviderError {
    match status.as_u16() {
        429 => ProviderError::RateLimitExceeded {
            message: body,
            retry_after: retry_after(headers),
        },
        401 | 403 => ProviderError::AuthenticationError(body),
        code => ProviderError::ApiError { status_code: code, message: body },
    }
}

/// Map a transport failure to the provider error taxonomy
pub(crate) fn transport_error(error: reqwest::Error, timeout: Duration) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(timeout)
    } else if error.is_connect() {
        ProviderError::ConnectionError(error.to_string())
    } else if error.is_decode() {
        ProviderError::ParseError(error.to_string())
    } else {
        ProviderError::RequestFailed(error.to_string())
    }
}

/// Wait hint from a `retry-after` header (seconds, possibly fractional)
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}
