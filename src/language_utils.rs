/*!
 * Language and text utilities.
 *
 * ISO 639 code handling for the configured language pair, plus the small
 * character-level helpers shared by the segmenter, the reconciler and the
 * quality checks (word counting, script ratios, length capping).
 */

use anyhow::{Result, anyhow};
use isolang::Language;
use regex::Regex;

/// ISO 639-2/B codes that differ from their 639-2/T form
const BIBLIOGRAPHIC_CODES: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("per", "fas"),
    ("may", "msa"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Languages whose body text is expected to be written in CJK scripts
const CJK_LANGUAGES: &[&str] = &["zho", "jpn", "kor"];

/// Normalize a language code to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    let code = code.trim().to_lowercase();

    match code.len() {
        2 => Language::from_639_1(&code)
            .map(|lang| lang.to_639_3().to_string())
            .ok_or_else(|| anyhow!("Invalid language code: {}", code)),
        3 => {
            let part2t = BIBLIOGRAPHIC_CODES
                .iter()
                .find(|(b, _)| *b == code)
                .map(|(_, t)| t.to_string())
                .unwrap_or(code);
            Language::from_639_3(&part2t)
                .map(|_| part2t.clone())
                .ok_or_else(|| anyhow!("Invalid language code: {}", part2t))
        }
        _ => Err(anyhow!("Invalid language code: {}", code)),
    }
}

/// Check if two language codes represent the same language
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (normalize_to_part2t(code1), normalize_to_part2t(code2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Get the English language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    let normalized = normalize_to_part2t(code)?;
    let lang = Language::from_639_3(&normalized)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", normalized))?;

    Ok(lang.to_name().to_string())
}

/// Whether text in this language is naturally written in a CJK script
pub fn is_cjk_language(code: &str) -> bool {
    normalize_to_part2t(code)
        .map(|c| CJK_LANGUAGES.contains(&c.as_str()))
        .unwrap_or(false)
}

/// Count "words" the way the catalog does: every non-whitespace character
pub fn count_words(text: &str) -> i64 {
    text.chars().filter(|c| !c.is_whitespace()).count() as i64
}

/// Cap a string at `max_chars` characters (not bytes)
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// Share of non-whitespace characters in `text` matched by `script`
pub fn script_ratio(text: &str, script: &Regex) -> f64 {
    let total = count_words(text);
    if total == 0 {
        return 0.0;
    }
    let matched = script.find_iter(text).map(|m| m.as_str().chars().count()).sum::<usize>();
    matched as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizeToPart2t_withBibliographicCode_shouldMapToTerminology() {
        assert_eq!(normalize_to_part2t("fre").unwrap(), "fra");
        assert_eq!(normalize_to_part2t(" EN ").unwrap(), "eng");
        assert_eq!(normalize_to_part2t("zh").unwrap(), "zho");
        assert!(normalize_to_part2t("xx").is_err());
        assert!(normalize_to_part2t("english").is_err());
    }

    #[test]
    fn test_languageCodesMatch_shouldCompareNormalizedForms() {
        assert!(language_codes_match("en", "eng"));
        assert!(language_codes_match("chi", "zh"));
        assert!(!language_codes_match("en", "fr"));
        assert!(!language_codes_match("en", "??"));
    }

    #[test]
    fn test_isCjkLanguage_shouldRecognizeChineseJapaneseKorean() {
        assert!(is_cjk_language("zh"));
        assert!(is_cjk_language("ja"));
        assert!(is_cjk_language("kor"));
        assert!(!is_cjk_language("en"));
    }

    #[test]
    fn test_countWords_shouldIgnoreWhitespace() {
        assert_eq!(count_words("第一章 开始\n  了"), 6);
        assert_eq!(count_words("a b\tc"), 3);
        assert_eq!(count_words("   "), 0);
    }

    #[test]
    fn test_truncateChars_withMultibyteText_shouldCutOnCharBoundary() {
        assert_eq!(truncate_chars("第一章开始", 3), "第一章");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn test_scriptRatio_shouldMeasureHanShare() {
        let han = Regex::new(r"\p{Han}").unwrap();
        assert_eq!(script_ratio("abcd", &han), 0.0);
        assert!((script_ratio("ab中文", &han) - 0.5).abs() < f64::EPSILON);
        assert_eq!(script_ratio("", &han), 0.0);
    }
}
