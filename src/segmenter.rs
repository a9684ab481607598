/*!
 * Chapter segmentation for raw novel text.
 *
 * Heading lines are detected with a small set of conventions:
 * - `第12章` style headings with Arabic (or full-width) digits
 * - `第十二章` style headings with Chinese numerals
 * - `Chapter 12` / `Chapter XII` style Latin headings
 *
 * Matches from every pattern are merged and ordered by source offset, and the
 * text between consecutive markers becomes one chapter. Chapter numbers are
 * assigned by discovery order, never parsed from the heading itself; the
 * heading helpers below exist so callers can compare the two.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::language_utils::truncate_chars;

/// Default maximum title length in characters
pub const DEFAULT_MAX_TITLE_CHARS: usize = 100;

static ARABIC_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t\u{3000}]*第[0-9０-９]+[章回节節][^\n]*$").expect("valid heading regex")
});

static CHINESE_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t\u{3000}]*第[零〇一二两三四五六七八九十百千万]+[章回节節][^\n]*$")
        .expect("valid heading regex")
});

static LATIN_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:Chapter|CHAPTER|Ch\.)[ \t]*(?:\d+|[IVXLCDM]+)\b[^\n]*$")
        .expect("valid heading regex")
});

/// Leading heading token of a single title line, with the number captured
static TITLE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[\s\u{3000}]*(?:(第([0-9０-９]+|[零〇一二两三四五六七八九十百千万]+)[章回节節])|((?:Chapter|CHAPTER|Ch\.)[ \t]*(\d+|[IVXLCDM]+)\b))",
    )
    .expect("valid title token regex")
});

/// One chapter cut out of the source text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// 1-based position in discovery order
    pub chapter_number: i64,
    /// First line of the span, length-capped
    pub title: String,
    /// Remainder of the span (or the whole span when the remainder is empty)
    pub content: String,
}

/// Splits raw text into chapters by heading detection
#[derive(Debug, Clone)]
pub struct TextSegmenter {
    max_title_chars: usize,
}

impl Default for TextSegmenter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TITLE_CHARS)
    }
}

impl TextSegmenter {
    /// Create a segmenter with the given title cap
    pub fn new(max_title_chars: usize) -> Self {
        Self { max_title_chars: max_title_chars.max(1) }
    }

    /// Segment `source` into ordered chapters
    pub fn segment(&self, source: &str) -> Vec<Segment> {
        if source.trim().is_empty() {
            return Vec::new();
        }

        let offsets = heading_offsets(source);
        if offsets.is_empty() {
            debug!("No chapter headings found, treating source as a single chapter");
            return vec![self.span_to_segment(1, source)];
        }

        if offsets[0] > 0 && !source[..offsets[0]].trim().is_empty() {
            debug!("Dropping {} bytes of preamble before the first heading", offsets[0]);
        }

        offsets
            .iter()
            .enumerate()
            .map(|(i, &start)| {
                let end = offsets.get(i + 1).copied().unwrap_or(source.len());
                self.span_to_segment(i as i64 + 1, &source[start..end])
            })
            .collect()
    }

    fn span_to_segment(&self, chapter_number: i64, span: &str) -> Segment {
        let span = span.trim();
        let (first_line, rest) = match span.split_once('\n') {
            Some((first, rest)) => (first, rest),
            None => (span, ""),
        };

        let rest = rest.trim();
        let content = if rest.is_empty() { span } else { rest };

        Segment {
            chapter_number,
            title: truncate_chars(first_line.trim(), self.max_title_chars),
            content: content.to_string(),
        }
    }
}

/// Byte offsets of every heading line, ascending and de-duplicated
fn heading_offsets(source: &str) -> Vec<usize> {
    let mut offsets: Vec<usize> = [&*ARABIC_HEADING, &*CHINESE_HEADING, &*LATIN_HEADING]
        .iter()
        .flat_map(|pattern| pattern.find_iter(source).map(|m| m.start()))
        .collect();
    offsets.sort_unstable();
    offsets.dedup();
    offsets
}

/// The heading marker at the start of a title (`第3章`, `Chapter 3`), if any
pub fn heading_marker(title: &str) -> Option<String> {
    let caps = TITLE_TOKEN.captures(title)?;
    caps.get(1).or_else(|| caps.get(3)).map(|m| m.as_str().to_string())
}

/// The chapter number embedded in a title's heading marker, if any
pub fn heading_number(title: &str) -> Option<i64> {
    let caps = TITLE_TOKEN.captures(title)?;
    if let Some(num) = caps.get(2) {
        let digits = num.as_str();
        return parse_arabic(digits).or_else(|| parse_chinese_numeral(digits));
    }
    let num = caps.get(4)?.as_str();
    parse_arabic(num).or_else(|| parse_roman(num))
}

fn parse_arabic(text: &str) -> Option<i64> {
    let mut value: i64 = 0;
    for c in text.chars() {
        let digit = match c {
            '0'..='9' => c as i64 - '0' as i64,
            '０'..='９' => c as i64 - '０' as i64,
            _ => return None,
        };
        value = value.checked_mul(10)?.checked_add(digit)?;
    }
    (!text.is_empty()).then_some(value)
}

/// Parse Chinese numerals such as `十二`, `一百零五`, `两千`
pub fn parse_chinese_numeral(text: &str) -> Option<i64> {
    let mut total: i64 = 0;
    let mut section: i64 = 0;
    let mut number: i64 = 0;
    let mut seen = false;

    for c in text.chars() {
        seen = true;
        match c {
            '零' | '〇' => number = 0,
            '一' => number = 1,
            '二' | '两' => number = 2,
            '三' => number = 3,
            '四' => number = 4,
            '五' => number = 5,
            '六' => number = 6,
            '七' => number = 7,
            '八' => number = 8,
            '九' => number = 9,
            '十' | '百' | '千' => {
                let unit = match c {
                    '十' => 10,
                    '百' => 100,
                    _ => 1000,
                };
                section += if number == 0 { 1 } else { number } * unit;
                number = 0;
            }
            '万' => {
                total += (section + number).max(1) * 10_000;
                section = 0;
                number = 0;
            }
            _ => return None,
        }
    }

    seen.then_some(total + section + number)
}

fn parse_roman(text: &str) -> Option<i64> {
    let value_of = |c: char| match c {
        'I' => Some(1),
        'V' => Some(5),
        'X' => Some(10),
        'L' => Some(50),
        'C' => Some(100),
        'D' => Some(500),
        'M' => Some(1000),
        _ => None,
    };

    let values: Vec<i64> = text.chars().map(value_of).collect::<Option<_>>()?;
    let mut total = 0;
    for (i, v) in values.iter().enumerate() {
        match values.get(i + 1) {
            Some(next) if next > v => total -= v,
            _ => total += v,
        }
    }
    (total > 0).then_some(total)
}
