/*!
 * Tests for length-bounded batching and body chunking
 */

use tomeport::translation::batcher::batch_by_length;
use tomeport::translation::chunking::{merge_translated_chunks, split_long_text};

fn titles(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("Chapter {} {}", i, "w".repeat(i % 7))).collect()
}

/// Test that flattening the batches gives back the input in order
#[test]
fn test_batchByLength_withManyItems_shouldPreserveOrder() {
    let items = titles(40);

    let batches = batch_by_length(items.clone(), |t| t.clone(), 60, Some(5));

    assert!(batches.len() > 1);
    assert_eq!(batches.concat(), items);
    for batch in &batches {
        assert!(batch.len() <= 5);
        let chars: usize = batch.iter().map(|t| t.chars().count()).sum();
        assert!(batch.len() == 1 || chars <= 60);
    }
}

/// Test that an oversized item travels alone instead of being dropped
#[test]
fn test_batchByLength_withOversizedItem_shouldEmitSingletonBatch() {
    let items = vec!["short".to_string(), "x".repeat(100), "tiny".to_string()];

    let batches = batch_by_length(items, |t| t.clone(), 20, None);

    assert_eq!(batches.len(), 3);
    assert_eq!(batches[1], vec!["x".repeat(100)]);
}

/// Test that empty input yields no batches
#[test]
fn test_batchByLength_withNoItems_shouldReturnEmpty() {
    let batches = batch_by_length(Vec::<String>::new(), |t| t.clone(), 10, None);
    assert!(batches.is_empty());
}

/// Test that chunk texts concatenate back to the original body
#[test]
fn test_splitLongText_shouldReproduceInputWhenConcatenated() {
    let body = "他推开门，走进了雨里。街上没有一个人。\n\n远处传来钟声，一下，又一下。她停下脚步，回头看了一眼。\n\
                灯还亮着。Nobody had followed her, and the road was empty.";

    let chunks = split_long_text(body, 25, 8);

    assert!(chunks.len() > 1);
    let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(joined, body);
    assert!(chunks.iter().all(|c| c.text.chars().count() <= 25));
    assert!(chunks[0].context.is_empty());
    assert!(chunks[1..].iter().all(|c| !c.context.is_empty() && c.context.chars().count() <= 8));
}

/// Test that merging keeps the paragraph breaks between chunks
#[test]
fn test_mergeTranslatedChunks_shouldRestoreSeparators() {
    let body = "First paragraph here.\n\nSecond paragraph here.";
    let chunks = split_long_text(body, 25, 0);
    let pieces: Vec<_> = chunks
        .into_iter()
        .map(|c| {
            let translated = format!(" {} ", c.text.trim().to_uppercase());
            (c, translated)
        })
        .collect();

    assert_eq!(merge_translated_chunks(&pieces), "FIRST PARAGRAPH HERE.\n\nSECOND PARAGRAPH HERE.");
}
