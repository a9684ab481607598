/*!
 * Deterministic content rules layered on top of the title review.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use crate::app_config::QualityConfig;
use crate::database::models::IssueTag;

/// Links and bare site domains commonly pasted into pirated chapters
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(https?://\S+|www\.\S+|\b[a-z0-9-]+\.(com|net|org|cc|info|xyz|top|la)\b)")
        .expect("Invalid URL regex")
});

/// One rule hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleViolation {
    pub tag: IssueTag,
    pub note: String,
}

/// Ad, length and empty-title rules
#[derive(Debug, Clone)]
pub struct ContentRules {
    ad_keywords: Vec<String>,
    min_word_count: i64,
    max_word_count: i64,
}

impl ContentRules {
    pub fn new(ad_keywords: Vec<String>, min_word_count: i64, max_word_count: i64) -> Self {
        Self {
            ad_keywords: ad_keywords.into_iter().filter(|k| !k.trim().is_empty()).collect(),
            min_word_count,
            max_word_count,
        }
    }

    pub fn from_config(config: &QualityConfig) -> Self {
        Self::new(config.ad_keywords.clone(), config.min_word_count, config.max_word_count)
    }

    /// First ad keyword or URL found in `text`
    pub fn find_ad(&self, text: &str) -> Option<String> {
        if let Some(keyword) = self.ad_keywords.iter().find(|k| text.contains(k.as_str())) {
            return Some(keyword.clone());
        }
        URL_PATTERN.find(text).map(|m| m.as_str().to_string())
    }

    /// Check a chapter; `bodies` is every body version available (source, cleaned, translated)
    pub fn evaluate(&self, title: &str, word_count: i64, bodies: &[&str]) -> Vec<RuleViolation> {
        let mut violations = Vec::new();

        if title.trim().is_empty() {
            violations.push(RuleViolation {
                tag: IssueTag::EmptyTitle,
                note: "title is empty".to_string(),
            });
        }

        let ad = std::iter::once(title)
            .chain(bodies.iter().copied())
            .find_map(|text| self.find_ad(text));
        if let Some(hit) = ad {
            violations.push(RuleViolation {
                tag: IssueTag::AdContent,
                note: format!("advertising content: {}", hit),
            });
        }

        if word_count < self.min_word_count || word_count > self.max_word_count {
            violations.push(RuleViolation {
                tag: IssueTag::LengthExtreme,
                note: format!(
                    "word count {} outside {}..={}",
                    word_count, self.min_word_count, self.max_word_count
                ),
            });
        }

        violations
    }
}
