//! # Splitter Module
//!
//! Partitions an ordered list into near-equal contiguous chunks.
//!
//! With `base = len / n` and `extra = len % n`, the first `extra` chunks get
//! `base + 1` items and the rest get `base`. Item order is preserved within
//! and across chunks, so concatenating the chunks gives back the input.

use std::ops::Range;

/// Resolve the number of chunks actually produced for `len` items.
///
/// `requested == 0` falls back to a single chunk holding everything;
/// otherwise the count is clamped so no chunk is empty. Empty input always
/// yields zero chunks.
pub fn chunk_count(len: usize, requested: usize) -> usize {
    if len == 0 {
        return 0;
    }
    requested.clamp(1, len)
}

/// Compute the index ranges of each chunk without touching the items
pub fn chunk_ranges(len: usize, requested: usize) -> Vec<Range<usize>> {
    let n = chunk_count(len, requested);
    if n == 0 {
        return Vec::new();
    }

    let base = len / n;
    let extra = len % n;

    let mut ranges = Vec::with_capacity(n);
    let mut start = 0;
    for i in 0..n {
        let size = if i < extra { base + 1 } else { base };
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

/// Split `items` into balanced, order-preserving chunks
pub fn split<T>(items: &[T], n: usize) -> Vec<&[T]> {
    chunk_ranges(items.len(), n)
        .into_iter()
        .map(|range| &items[range])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_balanced(len: usize, n: usize) {
        let items: Vec<usize> = (0..len).collect();
        let chunks = split(&items, n);

        assert_eq!(chunks.len(), n.min(len), "len={len} n={n}");

        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        if let (Some(max), Some(min)) = (sizes.iter().max(), sizes.iter().min()) {
            assert!(max - min <= 1, "unbalanced sizes {sizes:?}");
            assert!(*min >= 1, "empty chunk in {sizes:?}");
        }

        let rejoined: Vec<usize> = chunks.concat();
        assert_eq!(rejoined, items);
    }

    #[test]
    fn split_is_balanced_and_order_preserving() {
        for len in 0..40 {
            for n in 1..12 {
                assert_balanced(len, n);
            }
        }
    }

    #[test]
    fn larger_chunks_come_first() {
        let items: Vec<u32> = (0..10).collect();
        let chunks = split(&items, 4);
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![3, 3, 2, 2]);
        assert_eq!(chunks[0], &[0, 1, 2]);
        assert_eq!(chunks[3], &[8, 9]);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let items: Vec<u8> = Vec::new();
        assert!(split(&items, 0).is_empty());
        assert!(split(&items, 1).is_empty());
        assert!(split(&items, 8).is_empty());
    }

    #[test]
    fn worker_count_is_clamped_to_input_length() {
        let items = ["a", "b", "c"];
        let chunks = split(&items, 16);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() == 1));
    }

    #[test]
    fn zero_workers_falls_back_to_a_single_chunk() {
        let items = ["a", "b", "c", "d"];
        assert_eq!(chunk_count(items.len(), 0), 1);
        let chunks = split(&items, 0);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], &items[..]);
    }

    #[test]
    fn ranges_cover_input_exactly() {
        let ranges = chunk_ranges(7, 3);
        assert_eq!(ranges, vec![0..3, 3..5, 5..7]);
    }
}
