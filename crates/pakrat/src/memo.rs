//! The per-parse memoization table.

use crate::{engine::Match, types::Map};

/// Cache of rule-match results, one bucket per input position in
/// `0..=len(input)`, keyed by rule name within each bucket.
///
/// A missing key means "not yet computed"; `Some(..)` is a memoized
/// success and `None` a memoized failure. Cells are write-once: each
/// `(position, rule)` pair denotes a pure computation over the immutable
/// input and rule table, so a populated cell is never invalidated for the
/// lifetime of the parse.
#[derive(Debug)]
pub(crate) struct MemoTable<V> {
    cells: Vec<Map<String, Option<Match<V>>>>,
}

impl<V> MemoTable<V> {
    pub(crate) fn new(input_len: usize) -> Self {
        let mut cells = Vec::with_capacity(input_len + 1);
        cells.resize_with(input_len + 1, Map::default);
        Self { cells }
    }

    pub(crate) fn get(&self, pos: usize, rule: &str) -> Option<&Option<Match<V>>> {
        self.cells[pos].get(rule)
    }

    pub(crate) fn insert(&mut self, pos: usize, rule: &str, entry: Option<Match<V>>) {
        debug_assert!(
            !self.cells[pos].contains_key(rule),
            "memo cell ({}, {}) written twice",
            pos,
            rule,
        );
        self.cells[pos].insert(rule.to_owned(), entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Match, Value};

    fn success(pos: usize, consumed: usize) -> Match<()> {
        Match {
            start: pos,
            consumed,
            alternative: Some(0),
            value: Value::Seq(vec![]),
        }
    }

    #[test]
    fn lazily_populated_cells() {
        let mut memo = MemoTable::<()>::new(3);
        assert!(memo.get(0, "a").is_none());

        memo.insert(0, "a", Some(success(0, 2)));
        memo.insert(2, "a", None);

        assert_eq!(memo.get(0, "a").unwrap().as_ref().unwrap().consumed, 2);
        assert!(memo.get(2, "a").unwrap().is_none());
        assert!(memo.get(1, "a").is_none());
        assert!(memo.get(3, "b").is_none());
    }

    #[test]
    #[should_panic(expected = "written twice")]
    fn cells_are_write_once() {
        let mut memo = MemoTable::<()>::new(1);
        memo.insert(0, "a", None);
        memo.insert(0, "a", Some(success(0, 0)));
    }
}
