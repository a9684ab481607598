/*!
 * Permissive extraction of JSON payloads from free-form model output.
 *
 * Models wrap JSON in code fences, prefix it with chatter, or append notes
 * after it. Extraction looks inside a fenced block first, then scans for the
 * first balanced array or object, honouring string literals so brackets inside
 * titles do not confuse the scan. The result is still validated by serde
 * against a strict schema by the caller.
 */

use anyhow::{Result, anyhow};
use serde::de::DeserializeOwned;

/// First balanced JSON array in `response`
pub fn extract_json_array(response: &str) -> Option<&str> {
    extract_balanced(unfence(response), '[', ']')
}

/// First balanced JSON object in `response`
pub fn extract_json_object(response: &str) -> Option<&str> {
    extract_balanced(unfence(response), '{', '}')
}

/// Extract and deserialize the first JSON array in `response`
pub fn parse_json_array<T: DeserializeOwned>(response: &str) -> Result<Vec<T>> {
    let json = extract_json_array(response).ok_or_else(|| anyhow!("Could not find a JSON array in response"))?;
    serde_json::from_str(json).map_err(|e| anyhow!("Invalid JSON array: {}", e))
}

/// Extract and deserialize the first JSON object in `response`
pub fn parse_json_object<T: DeserializeOwned>(response: &str) -> Result<T> {
    let json = extract_json_object(response).ok_or_else(|| anyhow!("Could not find a JSON object in response"))?;
    serde_json::from_str(json).map_err(|e| anyhow!("Invalid JSON object: {}", e))
}

/// Contents of the first code fence, or the whole trimmed response
fn unfence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };

    let after = &trimmed[start + 3..];
    // Skip a language tag such as ```json
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

fn extract_balanced(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}
