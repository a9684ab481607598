/*!
 * Error types for the tomeport pipeline.
 *
 * This module contains custom error types for the different layers of the
 * application, using the thiserror crate for ergonomic error definitions.
 * Storage code below these seams reports `anyhow::Error`, which is treated as
 * an infrastructure failure wherever it surfaces.
 */

use std::time::Duration;
use thiserror::Error;

use crate::workflow::WorkflowStep;

/// Errors that can occur when talking to a language-model provider
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The call did not finish within its deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded {
        /// Message from the provider
        message: String,
        /// Wait hint supplied by the provider, if any
        retry_after: Option<Duration>,
    },

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl ProviderError {
    /// Whether a bounded backoff retry is worthwhile for this error
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionError(_) | Self::Timeout(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }

    /// Whether the provider told us to slow down
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimitExceeded { .. })
    }
}

/// Errors that can occur during translation
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The model answered, but not in the shape we asked for
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The model answered with nothing usable
    #[error("Empty response from provider")]
    EmptyResponse,
}

/// Errors raised by the import reconciler and the caller-facing import API
#[derive(Error, Debug)]
pub enum ImportError {
    /// No import batch with this id
    #[error("Import batch not found: {0}")]
    BatchNotFound(String),

    /// No chapter draft with this id
    #[error("Chapter draft not found: {0}")]
    ChapterNotFound(String),

    /// Segmentation produced nothing to import
    #[error("Source text contains no chapters")]
    EmptySource,

    /// Import settings the planner cannot work with
    #[error("Invalid import config: {0}")]
    InvalidConfig(String),

    /// An edit would move a draft onto a chapter number another draft already owns
    #[error("Chapter number {chapter_number} is already used by draft {existing_id}")]
    ChapterNumberConflict {
        /// Requested chapter number
        chapter_number: i64,
        /// Draft that currently owns the number
        existing_id: String,
    },

    /// The batch is not in a state that allows the requested operation
    #[error("Import batch {batch_id} is {status}, expected {expected}")]
    InvalidBatchState {
        /// Batch id
        batch_id: String,
        /// Current status
        status: String,
        /// Status required by the operation
        expected: String,
    },

    /// Durable store failure
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Errors raised by the workflow orchestrator
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// No translation task with this id
    #[error("Translation task not found: {0}")]
    TaskNotFound(String),

    /// A step failed at infrastructure or batch level; the task is marked failed
    #[error("Step {step} failed: {message}")]
    StepFailed {
        /// Step that failed
        step: WorkflowStep,
        /// Length-capped error message
        message: String,
    },

    /// Durable store failure outside of a step
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Error from the import layer
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Error from the workflow layer
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
