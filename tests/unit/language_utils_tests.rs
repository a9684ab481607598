/*!
 * Tests for language code and text measurement helpers
 */

use regex::Regex;
use tomeport::language_utils::{
    count_words, get_language_name, is_cjk_language, language_codes_match, normalize_to_part2t, script_ratio,
    truncate_chars,
};

/// Test normalization across ISO 639 flavours
#[test]
fn test_normalizeToPart2t_withValidCodes_shouldNormalizeCorrectly() {
    assert_eq!(normalize_to_part2t("en").unwrap(), "eng");
    assert_eq!(normalize_to_part2t("zho").unwrap(), "zho");
    assert_eq!(normalize_to_part2t("chi").unwrap(), "zho");
    assert_eq!(normalize_to_part2t("ger").unwrap(), "deu");
    assert!(normalize_to_part2t("").is_err());
    assert!(normalize_to_part2t("english").is_err());
}

/// Test that equivalent codes match
#[test]
fn test_languageCodesMatch_withEquivalentCodes_shouldReturnTrue() {
    assert!(language_codes_match("fr", "fra"));
    assert!(language_codes_match("fre", "FR"));
    assert!(!language_codes_match("fr", "en"));
    assert!(!language_codes_match("xx", "xx"));
}

/// Test English names for configured languages
#[test]
fn test_getLanguageName_withValidCodes_shouldReturnCorrectName() {
    assert_eq!(get_language_name("en").unwrap(), "English");
    assert_eq!(get_language_name("fra").unwrap(), "French");
    assert!(get_language_name("zz").is_err());
}

/// Test CJK detection used by the body checks
#[test]
fn test_isCjkLanguage_shouldRecognizeCjkTargets() {
    assert!(is_cjk_language("zh"));
    assert!(is_cjk_language("ja"));
    assert!(is_cjk_language("kor"));
    assert!(!is_cjk_language("en"));
    assert!(!is_cjk_language("??"));
}

/// Test that word counts ignore whitespace and count each character
#[test]
fn test_countWords_shouldCountNonWhitespaceChars() {
    assert_eq!(count_words("他 来了。\n"), 4);
    assert_eq!(count_words("ab cd"), 4);
    assert_eq!(count_words("  \n\t"), 0);
}

/// Test truncation on character boundaries
#[test]
fn test_truncateChars_shouldCutOnCharBoundary() {
    assert_eq!(truncate_chars("第一章开端", 3), "第一章");
    assert_eq!(truncate_chars("short", 10), "short");
    assert_eq!(truncate_chars("abc", 0), "");
}

/// Test the share of source-script characters
#[test]
fn test_scriptRatio_shouldMeasureHanShare() {
    let han = Regex::new(r"\p{Han}").unwrap();

    assert_eq!(script_ratio("", &han), 0.0);
    assert_eq!(script_ratio("abcd", &han), 0.0);
    assert!((script_ratio("ab 他们", &han) - 0.5).abs() < f64::EPSILON);
}
