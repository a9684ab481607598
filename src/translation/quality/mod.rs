/*!
 * Quality checks for imported and translated chapters.
 *
 * - **Titles**: batched model review of extracted titles with auto-fix proposals
 * - **Rules**: deterministic ad, length and empty-title checks on drafts
 * - **Body**: deterministic QA on translated bodies before catalog import
 */

pub mod body;
pub mod rules;
pub mod titles;

// Re-export main types
pub use body::{BodyQa, BodyViolation};
pub use rules::{ContentRules, RuleViolation};
pub use titles::{QualityChecker, TitleCheckItem, TitleCheckResult};
