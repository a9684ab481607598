/*!
 * Splitting long chapter bodies into request-sized chunks and stitching the
 * translated pieces back together.
 *
 * Chunks never overlap in their own text, so concatenating them reproduces
 * the input exactly. Continuity comes from `context`: the tail of the previous
 * chunk, sent alongside the next request as a read-only hint.
 */

/// One request-sized slice of a chapter body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Text to translate
    pub text: String,
    /// Trailing characters of the previous chunk (empty for the first chunk)
    pub context: String,
}

/// Sentence-ending punctuation accepted as a cut point
const SENTENCE_ENDINGS: &[char] = &['。', '！', '？', '；', '…', '.', '!', '?', ';'];

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Each cut is placed right after the last preferred separator inside the
/// window: paragraph break, then line break, then sentence punctuation, then
/// a space. Without any separator the window is cut hard.
pub fn split_long_text(text: &str, max_chars: usize, overlap_chars: usize) -> Vec<TextChunk> {
    let max_chars = max_chars.max(1);
    let chars: Vec<char> = text.chars().collect();

    if chars.len() <= max_chars {
        return vec![TextChunk { text: text.to_string(), context: String::new() }];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let window_end = (start + max_chars).min(chars.len());
        let cut = if window_end == chars.len() {
            window_end
        } else {
            find_cut(&chars[start..window_end]).map(|c| start + c).unwrap_or(window_end)
        };

        let context_start = start.saturating_sub(overlap_chars);
        chunks.push(TextChunk {
            text: chars[start..cut].iter().collect(),
            context: chars[context_start..start].iter().collect(),
        });
        start = cut;
    }

    chunks
}

/// Offset just past the best separator in `window`, if one leaves a non-empty chunk
fn find_cut(window: &[char]) -> Option<usize> {
    let paragraph = window
        .windows(2)
        .rposition(|pair| pair[0] == '\n' && pair[1] == '\n')
        .map(|i| i + 2);
    let line = || window.iter().rposition(|&c| c == '\n').map(|i| i + 1);
    let sentence = || window.iter().rposition(|c| SENTENCE_ENDINGS.contains(c)).map(|i| i + 1);
    let space = || window.iter().rposition(|&c| c == ' ' || c == '\u{3000}').map(|i| i + 1);

    paragraph
        .or_else(line)
        .or_else(sentence)
        .or_else(space)
        .filter(|&cut| cut > 0)
}

/// Join translated chunks, restoring the whitespace that separated the originals
pub fn merge_translated_chunks(pieces: &[(TextChunk, String)]) -> String {
    let mut merged = String::new();
    for (chunk, translated) in pieces {
        if chunk.text.trim().is_empty() {
            merged.push_str(&chunk.text);
            continue;
        }
        merged.push_str(leading_whitespace(&chunk.text));
        merged.push_str(translated.trim());
        merged.push_str(trailing_whitespace(&chunk.text));
    }
    merged.trim().to_string()
}

fn leading_whitespace(text: &str) -> &str {
    let trimmed = text.trim_start();
    &text[..text.len() - trimmed.len()]
}

fn trailing_whitespace(text: &str) -> &str {
    let trimmed = text.trim_end();
    &text[trimmed.len()..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splitLongText_withShortText_shouldReturnSingleChunk() {
        let chunks = split_long_text("short text", 100, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short text");
        assert!(chunks[0].context.is_empty());
    }

    #[test]
    fn test_splitLongText_shouldReproduceInputWhenConcatenated() {
        let text = "First paragraph here.\n\nSecond paragraph is a bit longer. It has two sentences.\nA new line follows. And more words without end";
        let chunks = split_long_text(text, 30, 5);
        let rebuilt: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rebuilt, text);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 30));
    }

    #[test]
    fn test_splitLongText_shouldPreferParagraphBreaks() {
        let text = "Para one.\n\nPara two is here. More.";
        let chunks = split_long_text(text, 20, 0);
        assert_eq!(chunks[0].text, "Para one.\n\n");
    }

    #[test]
    fn test_splitLongText_withoutParagraph_shouldFallBackToSentence() {
        let text = "他走了。她来了。天黑了。";
        let chunks = split_long_text(text, 6, 0);
        assert_eq!(chunks[0].text, "他走了。");
    }

    #[test]
    fn test_splitLongText_shouldCarryOverlapAsContext() {
        let text = "aaaa bbbb cccc dddd";
        let chunks = split_long_text(text, 10, 3);
        assert!(chunks.len() > 1);
        assert!(chunks[0].context.is_empty());
        let prefix: String = chunks[0].text.chars().rev().take(3).collect::<Vec<_>>().into_iter().rev().collect();
        assert_eq!(chunks[1].context, prefix);
    }

    #[test]
    fn test_splitLongText_withoutSeparators_shouldHardCut() {
        let text = "x".repeat(25);
        let chunks = split_long_text(&text, 10, 0);
        assert_eq!(chunks.iter().map(|c| c.text.len()).collect::<Vec<_>>(), vec![10, 10, 5]);
    }

    #[test]
    fn test_mergeTranslatedChunks_shouldRestoreSeparators() {
        let chunks = split_long_text("Para one.\n\nPara two is here.", 12, 0);
        let pieces: Vec<(TextChunk, String)> = chunks
            .into_iter()
            .map(|c| {
                let upper = c.text.to_uppercase();
                (c, upper)
            })
            .collect();
        assert_eq!(merge_translated_chunks(&pieces), "PARA ONE.\n\nPARA TWO IS HERE.");
    }

    #[test]
    fn test_mergeTranslatedChunks_withLeadingBreaks_shouldKeepThem() {
        let pieces = vec![
            (TextChunk { text: "one.\n".into(), context: String::new() }, "ONE.".to_string()),
            (TextChunk { text: "\n".into(), context: String::new() }, String::new()),
            (TextChunk { text: "\n\ntwo.".into(), context: String::new() }, " TWO. ".to_string()),
        ];
        assert_eq!(merge_translated_chunks(&pieces), "ONE.\n\n\n\nTWO.");
    }
}
