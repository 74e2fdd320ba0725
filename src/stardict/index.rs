//! A generic sorted array index with equal-range and prefix lookup.

use std::cmp::Ordering;

/// A sorted array of `(key, value)` pairs built once from unsorted input.
///
/// Keys compare byte-wise. Equal keys are permitted and keep their insertion
/// order (the sort is stable), so every lookup returns a contiguous slice in
/// deterministic order.
#[derive(Debug)]
pub(crate) struct SortedIndex<V> {
    entries: Vec<(String, V)>,
}

impl<V> SortedIndex<V> {
    pub fn new(mut entries: Vec<(String, V)>) -> Self {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        SortedIndex { entries }
    }

    /// All entries whose key equals `key`, in stored order.
    pub fn equal_range(&self, key: &str) -> &[(String, V)] {
        match self.entries.binary_search_by(|e| e.0.as_str().cmp(key)) {
            Ok(hit) => self.expand(hit, |k| k == key),
            Err(_) => &[],
        }
    }

    /// All entries whose key starts with `prefix`, in stored order.
    ///
    /// The prefix relation is applied only at lookup time; the array stays in
    /// exact byte order, which makes "equals or starts-with" a strict weak
    /// ordering over the stored keys.
    pub fn prefix_range(&self, prefix: &str) -> &[(String, V)] {
        let found = self.entries.binary_search_by(|e| {
            if e.0.starts_with(prefix) {
                Ordering::Equal
            } else {
                e.0.as_str().cmp(prefix)
            }
        });
        match found {
            Ok(hit) => self.expand(hit, |k| k.starts_with(prefix)),
            Err(_) => &[],
        }
    }

    // Widen a single binary-search hit to the full contiguous run for which
    // the predicate holds.
    fn expand(&self, hit: usize, pred: impl Fn(&str) -> bool) -> &[(String, V)] {
        let mut lo = hit;
        while lo > 0 && pred(&self.entries[lo - 1].0) {
            lo -= 1;
        }
        let mut hi = hit + 1;
        while hi < self.entries.len() && pred(&self.entries[hi].0) {
            hi += 1;
        }
        &self.entries[lo..hi]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(keys: &[(&str, u32)]) -> SortedIndex<u32> {
        SortedIndex::new(
            keys.iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        )
    }

    fn values(slice: &[(String, u32)]) -> Vec<u32> {
        slice.iter().map(|(_, v)| *v).collect()
    }

    #[test]
    fn equal_range_finds_all_duplicates() {
        let idx = index(&[("b", 1), ("a", 2), ("b", 3), ("c", 4), ("b", 5)]);
        assert_eq!(values(idx.equal_range("b")), vec![1, 3, 5]);
        assert_eq!(values(idx.equal_range("a")), vec![2]);
        assert!(idx.equal_range("d").is_empty());
    }

    #[test]
    fn equal_range_at_the_edges() {
        let idx = index(&[("a", 1), ("a", 2), ("z", 3), ("z", 4)]);
        assert_eq!(values(idx.equal_range("a")), vec![1, 2]);
        assert_eq!(values(idx.equal_range("z")), vec![3, 4]);
    }

    #[test]
    fn prefix_range_is_sound() {
        let idx = index(&[
            ("apple", 1),
            ("app", 2),
            ("application", 3),
            ("banana", 4),
            ("ap", 5),
        ]);
        assert_eq!(values(idx.prefix_range("app")), vec![2, 1, 3]);
        assert_eq!(values(idx.prefix_range("ap")), vec![5, 2, 1, 3]);
        assert_eq!(values(idx.prefix_range("banana")), vec![4]);
        assert!(idx.prefix_range("bananas").is_empty());
        assert!(idx.prefix_range("c").is_empty());
    }

    #[test]
    fn empty_index() {
        let idx = index(&[]);
        assert!(idx.equal_range("a").is_empty());
        assert!(idx.prefix_range("a").is_empty());
    }
}
