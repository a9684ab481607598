/*!
 * Prompt engineering for novel translation.
 *
 * This module provides:
 * - System prompt templates for chunk, title, title-batch and title-check requests
 * - User payload builders matching each template's expected input
 */

pub mod templates;

// Re-export main types
pub use templates::{
    PromptTemplate, chunk_payload, title_batch_payload, title_check_payload, title_payload,
};
