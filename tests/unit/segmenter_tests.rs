/*!
 * Tests for chapter segmentation of raw source text
 */

use tomeport::segmenter::{TextSegmenter, heading_marker, heading_number};

/// Test that k detected headings give k chapters numbered by discovery order
#[test]
fn test_segment_withChineseHeadings_shouldCutOneChapterPerHeading() {
    let source = "第1章 开端\n他推开门。\n\n第2章 夜行\n她走了。\n第3章 归来\n雨停了。";

    let segments = TextSegmenter::default().segment(source);

    assert_eq!(segments.len(), 3);
    let numbers: Vec<i64> = segments.iter().map(|s| s.chapter_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(segments[0].title, "第1章 开端");
    assert_eq!(segments[1].content.trim(), "她走了。");
    assert_eq!(segments[2].content.trim(), "雨停了。");
}

/// Test that numbering ignores the numbers written in the headings
#[test]
fn test_segment_withSkippedHeadingNumber_shouldNumberSequentially() {
    let source = "第1章 开端\n甲。\n第3章 夜行\n乙。";

    let segments = TextSegmenter::default().segment(source);

    assert_eq!(segments.len(), 2);
    assert_eq!(segments[1].chapter_number, 2);
    assert_eq!(heading_number(&segments[1].title), Some(3));
}

/// Test mixed conventions are merged in source order
#[test]
fn test_segment_withMixedConventions_shouldKeepSourceOrder() {
    let source = "第一章 序\n甲。\nChapter 2 The Road\nBeta.\n第三章 终\n丙。";

    let segments = TextSegmenter::default().segment(source);

    let titles: Vec<&str> = segments.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["第一章 序", "Chapter 2 The Road", "第三章 终"]);
}

/// Test that a source without headings becomes a single chapter
#[test]
fn test_segment_withoutHeadings_shouldReturnOneChapter() {
    let segments = TextSegmenter::default().segment("A short story\nwith no chapter headings at all.");

    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].chapter_number, 1);
    assert_eq!(segments[0].title, "A short story");
}

/// Test that blank input yields nothing
#[test]
fn test_segment_withBlankSource_shouldReturnNoChapters() {
    assert!(TextSegmenter::default().segment("").is_empty());
    assert!(TextSegmenter::default().segment(" \n\t\n ").is_empty());
}

/// Test that over-long title lines are capped
#[test]
fn test_segment_withLongHeading_shouldCapTitle() {
    let source = format!("Chapter 1 {}\nBody.", "x".repeat(200));

    let segments = TextSegmenter::new(20).segment(&source);

    assert_eq!(segments[0].title.chars().count(), 20);
}

/// Test heading helpers on titles
#[test]
fn test_headingHelpers_shouldParseMarkerAndNumber() {
    assert_eq!(heading_number("第十二章 夜行"), Some(12));
    assert_eq!(heading_number("第１２章"), Some(12));
    assert_eq!(heading_number("Chapter XII"), Some(12));
    assert_eq!(heading_number("Prologue"), None);
    assert_eq!(heading_marker("第2章 夜行").as_deref(), Some("第2章"));
    assert!(heading_marker("no heading").is_none());
}
