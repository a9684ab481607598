/*!
 * # tomeport - batch AI translation and import of web novels
 *
 * A Rust library that takes the raw text of a novel, cuts it into chapters,
 * translates titles and bodies through a rate-limited language-model client,
 * reviews the result and publishes it into a chapter catalog with
 * deterministic volume, pricing and release planning.
 *
 * ## Features
 *
 * - Heading-based chapter segmentation (Chinese and Latin conventions)
 * - Duplicate-safe re-imports: chapters already stored correctly are reused,
 *   misnumbered ones are corrected and flagged
 * - Title review with auto-fix, ad and length rules
 * - Batched title translation and chunked body translation under one shared
 *   concurrency and requests-per-minute budget
 * - A resumable, step-by-step workflow persisted in SQLite
 * - Providers:
 *   - Ollama (local LLM)
 *   - OpenAI API (and compatible servers)
 *   - Anthropic API
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `segmenter`: Chapter detection in raw text
 * - `import`: Draft reconciliation, planning and precheck
 * - `translation`: Rate limiting, the translation client and quality checks
 * - `workflow`: Step chain, store seam and the orchestrator
 * - `database`: SQLite persistence
 * - `providers`: Client implementations for the supported services
 * - `app_controller`: Caller-facing operations used by the CLI
 * - `file_utils`: Source file intake
 * - `language_utils`: ISO language code and text measurement helpers
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod database;
pub mod errors;
pub mod file_utils;
pub mod import;
pub mod language_utils;
pub mod providers;
pub mod segmenter;
pub mod translation;
pub mod workflow;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::Controller;
pub use database::Repository;
pub use errors::{AppError, ImportError, ProviderError, TranslationError, WorkflowError};
pub use import::{ChapterUpdate, ImportConfig, ImportOutcome, ImportReconciler, PrecheckSummary};
pub use language_utils::{get_language_name, language_codes_match, normalize_to_part2t};
pub use segmenter::{Segment, TextSegmenter};
pub use workflow::{RunOutcome, WorkflowOrchestrator, WorkflowStep};
