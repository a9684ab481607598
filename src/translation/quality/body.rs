/*!
 * Deterministic QA for translated chapter bodies.
 */

use anyhow::{Context, Result};
use regex::Regex;
use std::fmt;

use crate::app_config::QualityConfig;
use crate::language_utils::{count_words, is_cjk_language, script_ratio};

/// A failed body check
#[derive(Debug, Clone, PartialEq)]
pub enum BodyViolation {
    EmptyContent,
    TooShort { chars: usize, min: usize },
    Untranslated { ratio: f64, max: f64 },
    EmptyTitle,
}

impl fmt::Display for BodyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyViolation::EmptyContent => write!(f, "empty_content"),
            BodyViolation::TooShort { chars, min } => write!(f, "too_short ({} < {})", chars, min),
            BodyViolation::Untranslated { ratio, max } => {
                write!(f, "untranslated_ratio ({:.2} > {:.2})", ratio, max)
            }
            BodyViolation::EmptyTitle => write!(f, "empty_title"),
        }
    }
}

/// Body checks configured for one target language
#[derive(Debug, Clone)]
pub struct BodyQa {
    min_body_chars: usize,
    max_untranslated_ratio: f64,
    /// `None` when the target itself is written in the source script
    source_script: Option<Regex>,
}

impl BodyQa {
    pub fn new(config: &QualityConfig, target_language: &str) -> Result<Self> {
        let source_script = if is_cjk_language(target_language) {
            None
        } else {
            Some(
                Regex::new(&config.untranslated_script_pattern)
                    .context("untranslated_script_pattern is not a valid regex")?,
            )
        };

        Ok(Self {
            min_body_chars: config.min_body_chars,
            max_untranslated_ratio: config.max_untranslated_ratio,
            source_script,
        })
    }

    /// Every check the chapter fails; empty means it passes
    pub fn check(&self, title: &str, content: &str) -> Vec<BodyViolation> {
        let mut violations = Vec::new();

        let chars = count_words(content) as usize;
        if chars == 0 {
            violations.push(BodyViolation::EmptyContent);
        } else if chars < self.min_body_chars {
            violations.push(BodyViolation::TooShort { chars, min: self.min_body_chars });
        }

        if let Some(script) = &self.source_script {
            let ratio = script_ratio(content, script);
            if ratio > self.max_untranslated_ratio {
                violations.push(BodyViolation::Untranslated { ratio, max: self.max_untranslated_ratio });
            }
        }

        if title.trim().is_empty() {
            violations.push(BodyViolation::EmptyTitle);
        }

        violations
    }
}

/// Violations joined for storage on a record
pub fn describe(violations: &[BodyViolation]) -> String {
    violations.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
}
