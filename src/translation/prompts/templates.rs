/*!
 * Prompt templates for novel translation.
 *
 * Each template is a system instruction with `{source_language}` and
 * `{target_language}` placeholders. Batch templates demand a strict JSON
 * shape; the matching user payloads are built by the functions below.
 */

use serde::Serialize;

/// System prompt template
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// The template string with placeholders
    template: String,
}

impl PromptTemplate {
    /// Body chunk translation
    pub const CHUNK_TRANSLATOR: &'static str = r#"You are a professional literary translator working from {source_language} into {target_language}.

## Task
- Remove website boilerplate, advertisements, vote/ticket begging and update notices
- Translate the remaining novel text faithfully and naturally
- Preserve paragraph breaks exactly; one source paragraph becomes one translated paragraph
- If a context section is provided, use it only for continuity; never translate or repeat it

## Output Requirements
- Return ONLY the translated text
- No notes, explanations, headings or quotation marks around the result"#;

    /// Single title translation
    pub const TITLE_TRANSLATOR: &'static str = r#"You translate chapter titles of a novel from {source_language} into {target_language}.
Keep the chapter numbering convention of the target language (e.g. "Chapter 12: ...").
Return ONLY the translated title on a single line."#;

    /// Batched title translation
    pub const TITLE_BATCH_TRANSLATOR: &'static str = r#"You translate chapter titles of a novel from {source_language} into {target_language}.

## Input
A JSON array of objects: {"index": number, "title": string}

## Output Requirements
- Return ONLY a JSON array, no text before or after it
- One object per input item: {"index": <same index>, "translated_title": "<translation>"}
- Keep every index exactly as given; do not merge, split or skip items
- Keep the chapter numbering convention of the target language"#;

    /// Batched title quality check
    pub const TITLE_CHECKER: &'static str = r#"You review chapter titles extracted automatically from a {source_language} novel.

## Flag a title when it is
- empty or only a chapter number where a name is clearly missing
- malformed (broken characters, duplicated numbering)
- advertising, a URL, or site boilerplate
- polluted by body text that bled into the heading line

## Output Requirements
- Return ONLY a JSON object: {"results": [ ... ]}
- One result per input item, each of the form:
  {"chapter_number": n, "cleaned_title": "...", "move_to_body_prefix": "...", "is_reasonable": true|false, "is_modified": true|false, "reason": "..."}
- "cleaned_title" is the corrected title (or the original if it is fine)
- "move_to_body_prefix" is body text that must be moved from the title into the chapter body ("" if none)
- Do not translate anything"#;

    /// Create a new prompt template.
    pub fn new(template: &str) -> Self {
        Self { template: template.to_string() }
    }

    /// Render the template with the given languages.
    pub fn render(&self, source_language: &str, target_language: &str) -> String {
        self.template
            .replace("{source_language}", source_language)
            .replace("{target_language}", target_language)
    }
}

#[derive(Serialize)]
struct TitleInput<'a> {
    index: usize,
    title: &'a str,
}

#[derive(Serialize)]
struct TitleCheckInput<'a> {
    chapter_number: i64,
    title: &'a str,
}

/// User payload for a body chunk, with optional read-only context
pub fn chunk_payload(text: &str, context_hint: Option<&str>) -> String {
    match context_hint.map(str::trim).filter(|hint| !hint.is_empty()) {
        Some(hint) => format!("Context (preceding text, do not translate):\n{}\n\nTranslate:\n{}", hint, text),
        None => text.to_string(),
    }
}

/// User payload for a single title, with an optional chapter summary
pub fn title_payload(title: &str, summary: Option<&str>) -> String {
    match summary.map(str::trim).filter(|s| !s.is_empty()) {
        Some(summary) => format!("Chapter summary (for context only):\n{}\n\nTitle:\n{}", summary, title),
        None => title.to_string(),
    }
}

/// User payload for a title batch
pub fn title_batch_payload<'a, I>(items: I) -> String
where
    I: IntoIterator<Item = (usize, &'a str)>,
{
    let inputs: Vec<TitleInput> = items.into_iter().map(|(index, title)| TitleInput { index, title }).collect();
    serde_json::to_string(&inputs).unwrap_or_else(|_| "[]".to_string())
}

/// User payload for a title check
pub fn title_check_payload<'a, I>(items: I) -> String
where
    I: IntoIterator<Item = (i64, &'a str)>,
{
    let inputs: Vec<TitleCheckInput> = items
        .into_iter()
        .map(|(chapter_number, title)| TitleCheckInput { chapter_number, title })
        .collect();
    serde_json::to_string(&inputs).unwrap_or_else(|_| "[]".to_string())
}
