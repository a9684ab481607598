/*!
 * Stub language-model answers for end-to-end tests.
 *
 * The stub recognises each request kind by its system prompt and answers in
 * the shape the pipeline expects, "translating" by upper-casing the input.
 * Every stub is a `MockProvider`, so clones double as call spies.
 */

use serde_json::{Value, json};

use tomeport::providers::CompletionRequest;
use tomeport::providers::mock::MockProvider;

/// Kind of request, told apart by its system prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    TitleCheck,
    TitleBatch,
    Title,
    Chunk,
}

pub fn request_kind(request: &CompletionRequest) -> RequestKind {
    if request.system.contains("You review chapter titles") {
        RequestKind::TitleCheck
    } else if request.system.contains("\"translated_title\"") {
        RequestKind::TitleBatch
    } else if request.system.contains("You translate chapter titles") {
        RequestKind::Title
    } else {
        RequestKind::Chunk
    }
}

/// Number of title translation calls (single or batched) seen by `provider`
pub fn title_translation_calls(provider: &MockProvider) -> usize {
    provider
        .requests()
        .iter()
        .filter(|r| matches!(request_kind(r), RequestKind::Title | RequestKind::TitleBatch))
        .count()
}

/// Answer every request kind by upper-casing the text to translate
pub fn uppercase_answer(request: &CompletionRequest) -> String {
    match request_kind(request) {
        RequestKind::TitleCheck => r#"{"results": []}"#.to_string(),
        RequestKind::TitleBatch => {
            let items: Vec<Value> = serde_json::from_str(&request.user).unwrap_or_default();
            let answers: Vec<Value> = items
                .iter()
                .map(|item| {
                    json!({
                        "index": item["index"],
                        "translated_title": item["title"].as_str().unwrap_or_default().to_uppercase(),
                    })
                })
                .collect();
            Value::Array(answers).to_string()
        }
        RequestKind::Title => {
            let title = request.user.rsplit("Title:\n").next().unwrap_or(&request.user);
            title.to_uppercase()
        }
        RequestKind::Chunk => {
            let text = request.user.split_once("Translate:\n").map_or(request.user.as_str(), |(_, t)| t);
            text.to_uppercase()
        }
    }
}

/// Stub provider that upper-cases everything it is asked to translate
pub fn uppercase_provider() -> MockProvider {
    MockProvider::with_responder(|request| Ok(uppercase_answer(request)))
}
