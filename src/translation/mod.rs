/*!
 * Translation layer for novel chapters.
 *
 * Every call to the language-model service goes through one shared
 * `RateLimiter`. On top of it, `TranslationClient` provides chunked body
 * translation and batched title translation, and `quality` reviews titles and
 * translated bodies.
 *
 * - `batcher`: length-bounded greedy bin packing
 * - `chunking`: splitting long bodies and re-joining translated chunks
 * - `rate_limiter`: concurrency and rolling-window admission
 * - `client`: translation operations with retry and backoff
 * - `prompts`: system prompts and user payloads
 * - `response`: permissive JSON extraction from model output
 * - `quality`: title review, content rules and body QA
 */

pub mod batcher;
pub mod chunking;
pub mod client;
pub mod prompts;
pub mod quality;
pub mod rate_limiter;
pub mod response;

// Re-export main types for easier usage
pub use self::batcher::batch_by_length;
pub use self::chunking::{TextChunk, merge_translated_chunks, split_long_text};
pub use self::client::{ClientSettings, TitleItem, TitleTranslation, TranslationClient};
pub use self::prompts::PromptTemplate;
pub use self::quality::{BodyQa, ContentRules, QualityChecker, TitleCheckItem, TitleCheckResult};
pub use self::rate_limiter::RateLimiter;
