//! Content-addressed table enforcing node canonicity: every distinct
//! `(level, edges)` pair maps to exactly one handle, so structurally
//! identical nodes are never stored twice.

use crate::node_store::{Edges, Handle};
use std::collections::HashMap;

/// Key identifying a canonical node's contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Key {
    level: u16,
    edges: Edges,
}

/// Hash table mapping canonical node contents to handles.
///
/// A plain `HashMap` already doubles its bucket array on load, which is
/// the rehash policy this table needs; there is no reason to hand-roll it.
#[derive(Debug, Default)]
pub struct UniqueTable {
    table: HashMap<Key, Handle>,
}

impl UniqueTable {
    pub fn new() -> Self {
        UniqueTable {
            table: HashMap::new(),
        }
    }

    /// Looks up `(level, edges)`. Returns the canonical handle if an
    /// equal node is already present.
    pub fn find(&self, level: u16, edges: &Edges) -> Option<Handle> {
        self.table
            .get(&Key {
                level,
                edges: edges.clone(),
            })
            .copied()
    }

    /// Inserts `(level, edges) -> handle`. Callers are expected to have
    /// already checked [`UniqueTable::find`] — insertion semantics live one
    /// level up, in [`crate::forest::Forest::reduce`], since only the
    /// forest knows whether to keep or discard the temp node once the
    /// canonical form is known.
    pub fn insert(&mut self, level: u16, edges: Edges, handle: Handle) {
        self.table.insert(Key { level, edges }, handle);
    }

    /// Removes the entry for `(level, edges)`, e.g. when a node dies.
    pub fn remove(&mut self, level: u16, edges: &Edges) {
        self.table.remove(&Key {
            level,
            edges: edges.clone(),
        });
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_store::FALSE;

    #[test]
    fn insert_then_find_round_trips() {
        let mut t = UniqueTable::new();
        let edges = Edges::Full(vec![FALSE, 5]);
        t.insert(2, edges.clone(), 10);
        assert_eq!(t.find(2, &edges), Some(10));
    }

    #[test]
    fn distinct_levels_are_distinct_keys() {
        let mut t = UniqueTable::new();
        let edges = Edges::Full(vec![FALSE, 5]);
        t.insert(2, edges.clone(), 10);
        assert_eq!(t.find(3, &edges), None);
    }

    #[test]
    fn remove_forgets_entry() {
        let mut t = UniqueTable::new();
        let edges = Edges::Sparse(vec![(1, 9)]);
        t.insert(4, edges.clone(), 77);
        t.remove(4, &edges);
        assert_eq!(t.find(4, &edges), None);
    }
}
