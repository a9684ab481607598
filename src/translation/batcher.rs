/*!
 * Length-bounded batching.
 *
 * Groups items into consecutive batches whose combined text stays under a
 * character budget (and optionally an item count). Single pass, greedy, and
 * order-preserving: flattening the batches gives back the input sequence.
 */

/// Group `items` into ordered batches under `max_chars` and `max_items`.
///
/// An item whose own text is longer than `max_chars` is emitted as a batch of
/// its own so the caller always makes progress.
pub fn batch_by_length<T, F, S>(
    items: Vec<T>,
    to_text: F,
    max_chars: usize,
    max_items: Option<usize>,
) -> Vec<Vec<T>>
where
    F: Fn(&T) -> S,
    S: AsRef<str>,
{
    let max_items = max_items.unwrap_or(usize::MAX).max(1);
    let mut batches: Vec<Vec<T>> = Vec::new();
    let mut current: Vec<T> = Vec::new();
    let mut current_chars = 0usize;

    for item in items {
        let len = to_text(&item).as_ref().chars().count();

        if len > max_chars {
            if !current.is_empty() {
                batches.push(std::mem::take(&mut current));
                current_chars = 0;
            }
            batches.push(vec![item]);
            continue;
        }

        if !current.is_empty() && (current_chars + len > max_chars || current.len() >= max_items) {
            batches.push(std::mem::take(&mut current));
            current_chars = 0;
        }

        current_chars += len;
        current.push(item);
    }

    if !current.is_empty() {
        batches.push(current);
    }

    batches
}
