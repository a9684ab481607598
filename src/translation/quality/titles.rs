/*!
 * Batched title review with auto-fix proposals.
 *
 * One request covers the whole input set. The answer is parsed permissively
 * (a `{"results": [...]}` object, falling back to a bare array) and matched
 * back to the input by chapter number. The output always has exactly one
 * result per input item, in input order: anything the model skipped, mangled,
 * or failed to answer gets a pass-through default with a reason.
 */

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::language_utils::truncate_chars;
use crate::translation::client::TranslationClient;
use crate::translation::prompts::{PromptTemplate, title_check_payload};
use crate::translation::response::{parse_json_array, parse_json_object};

/// A title to review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleCheckItem {
    /// Chapter number the title belongs to
    pub chapter_number: i64,
    /// Title as extracted from the source
    pub title: String,
}

/// Review outcome for one title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleCheckResult {
    /// Chapter number of the reviewed title
    pub chapter_number: i64,
    /// Title as submitted
    pub original_title: String,
    /// Proposed title (the original when nothing needs fixing)
    pub cleaned_title: String,
    /// Text to move from the title into the start of the body
    pub move_to_body_prefix: String,
    /// Whether the title looks acceptable
    pub is_reasonable: bool,
    /// Whether a fix was proposed
    pub is_modified: bool,
    /// Explanation from the reviewer, or why no review happened
    pub reason: String,
}

impl TitleCheckResult {
    /// Neutral result that keeps the title as is
    pub fn pass_through(item: &TitleCheckItem, reason: impl Into<String>) -> Self {
        Self {
            chapter_number: item.chapter_number,
            original_title: item.title.clone(),
            cleaned_title: item.title.clone(),
            move_to_body_prefix: String::new(),
            is_reasonable: true,
            is_modified: false,
            reason: reason.into(),
        }
    }
}

/// Title anomaly detector and auto-fixer
#[derive(Debug, Clone)]
pub struct QualityChecker {
    client: TranslationClient,
}

impl QualityChecker {
    /// Create a checker on top of a translation client
    pub fn new(client: TranslationClient) -> Self {
        Self { client }
    }

    /// Review every title in one request; never fails
    pub async fn check_titles(&self, items: &[TitleCheckItem]) -> Vec<TitleCheckResult> {
        if items.is_empty() {
            return Vec::new();
        }

        let payload = title_check_payload(items.iter().map(|i| (i.chapter_number, i.title.as_str())));

        let mut failure = String::new();
        for attempt in 1..=2 {
            let request = self.client.request(PromptTemplate::TITLE_CHECKER, payload.clone()).temperature(0.0);
            let response = match self.client.complete(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Title check request failed: {}", e);
                    failure = format!("title check unavailable: {}", e);
                    break;
                }
            };

            match parse_results(&response) {
                Ok(elements) => return self.match_results(items, elements),
                Err(e) => {
                    warn!("Title check response unparsable (attempt {}/2): {}", attempt, e);
                    failure = format!("title check response unparsable: {}", e);
                }
            }
        }

        items.iter().map(|item| TitleCheckResult::pass_through(item, failure.clone())).collect()
    }

    fn match_results(&self, items: &[TitleCheckItem], elements: Vec<Value>) -> Vec<TitleCheckResult> {
        let mut by_number: HashMap<i64, Value> = HashMap::new();
        for element in elements {
            match element.get("chapter_number").and_then(as_i64) {
                Some(number) => {
                    by_number.entry(number).or_insert(element);
                }
                None => debug!("Skipping title check element without chapter_number"),
            }
        }

        let max_title_chars = self.client.settings().max_title_chars;
        items
            .iter()
            .map(|item| match by_number.get(&item.chapter_number) {
                Some(element) => normalize(item, element, max_title_chars),
                None => TitleCheckResult::pass_through(item, "no result returned for this chapter"),
            })
            .collect()
    }
}

fn parse_results(response: &str) -> anyhow::Result<Vec<Value>> {
    if let Ok(object) = parse_json_object::<Value>(response) {
        if let Some(results) = object.get("results").and_then(Value::as_array) {
            return Ok(results.clone());
        }
    }
    parse_json_array::<Value>(response)
}

fn as_i64(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn string_field(element: &Value, key: &str) -> String {
    element.get(key).and_then(Value::as_str).map(|s| s.trim().to_string()).unwrap_or_default()
}

/// Fill safe defaults: reasonable unless told otherwise, never an empty title
fn normalize(item: &TitleCheckItem, element: &Value, max_title_chars: usize) -> TitleCheckResult {
    let original = item.title.clone();
    let cleaned = match string_field(element, "cleaned_title") {
        title if title.is_empty() => original.clone(),
        title => truncate_chars(&title, max_title_chars),
    };
    let prefix = string_field(element, "move_to_body_prefix");
    let is_reasonable = element.get("is_reasonable").and_then(Value::as_bool).unwrap_or(true);
    let is_modified = element.get("is_modified").and_then(Value::as_bool).unwrap_or(false)
        || cleaned != original
        || !prefix.is_empty();

    TitleCheckResult {
        chapter_number: item.chapter_number,
        original_title: original,
        cleaned_title: cleaned,
        move_to_body_prefix: prefix,
        is_reasonable,
        is_modified,
        reason: string_field(element, "reason"),
    }
}
