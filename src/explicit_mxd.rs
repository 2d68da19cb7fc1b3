//! Explicit (row-major linked-list) matrix diagram for the 2001-style
//! reachability-graph encoding, kept as a secondary relation representation
//! alongside the main [`crate::forest::Forest`]-based MxD.
//!
//! Unlike the hash-consed, arena-backed nodes in [`crate::node_store`], this
//! representation models the original `rg2001`-era node directly: a
//! row-major linked list under construction (`BUILDING`), canonicalised by
//! deep structural equality (`CANONICAL`), or merged into another node with
//! a forwarding pointer left behind (`MERGED`) until a sweep reclaims it
//! (`RECYCLED`). It exists to accumulate a relation incrementally from an
//! explicit-generation front end before (optionally) being lowered into the
//! shared `Forest` representation via [`crate::ops::relation`].

use std::collections::HashMap;

/// Handle into an [`ExplicitMatrixStore`]'s arena.
pub type ExplicitHandle = u32;

/// Lifecycle state of an explicit matrix-diagram node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Under construction; rows may still be appended out of order.
    Building,
    /// Canonicalised and hash-consed; immutable.
    Canonical,
    /// Superseded by another canonical node; `forward` names it.
    Merged,
    /// Swept; the slot may be reused.
    Recycled,
}

/// Outcome of attempting to merge two explicit nodes. The original's
/// `shareProc()` returning `0` is ambiguous between "no change" and "not
/// implemented"; resolved here as "not yet available, complete via a
/// subsequent call" so the two cases can't be confused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The merge completed; this is the resulting canonical handle.
    Merged(ExplicitHandle),
    /// The merge could not complete in this call (e.g. one side is still
    /// `Building`); retry once both sides are canonical.
    Pending,
}

/// One row of a [`ExplicitNode`]: the nonzero `(column, child)` pairs for a
/// single row index, kept sorted by column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Row {
    entries: Vec<(u32, ExplicitHandle)>,
}

impl Row {
    fn insert(&mut self, col: u32, child: ExplicitHandle) {
        match self.entries.binary_search_by_key(&col, |(c, _)| *c) {
            Ok(pos) => self.entries[pos].1 = child,
            Err(pos) => self.entries.insert(pos, (col, child)),
        }
    }

    fn merge_from(&mut self, other: &Row, merge_child: impl Fn(ExplicitHandle, ExplicitHandle) -> ExplicitHandle) {
        for &(col, child) in &other.entries {
            match self.entries.binary_search_by_key(&col, |(c, _)| *c) {
                Ok(pos) => {
                    let existing = self.entries[pos].1;
                    self.entries[pos].1 = merge_child(existing, child);
                }
                Err(pos) => self.entries.insert(pos, (col, child)),
            }
        }
    }
}

/// A node in the explicit matrix diagram: a row-major linked list of
/// `(column, child)` pairs per nonzero row, at one level.
#[derive(Debug, Clone)]
struct ExplicitNode {
    level: u16,
    rows: Vec<(u32, Row)>,
    state: NodeState,
    forward: Option<ExplicitHandle>,
}

impl ExplicitNode {
    fn row_mut(&mut self, row: u32) -> &mut Row {
        match self.rows.binary_search_by_key(&row, |(r, _)| *r) {
            Ok(pos) => &mut self.rows[pos].1,
            Err(pos) => {
                self.rows.insert(pos, (row, Row::default()));
                &mut self.rows[pos].1
            }
        }
    }

    /// Signature used as the first cut of the canonicalisation hash: the
    /// position and value of the last nonzero row. Duplicates are detected via
    /// this signature first, then confirmed by full equality on collision.
    fn signature(&self) -> Option<(u32, Vec<(u32, ExplicitHandle)>)> {
        self.rows.last().map(|(r, row)| (*r, row.entries.clone()))
    }
}

/// Terminal handles, matching the shared [`crate::node_store`] convention.
pub const FALSE: ExplicitHandle = 0;
pub const TRUE: ExplicitHandle = 1;

/// Arena owning a set of explicit matrix-diagram nodes.
#[derive(Debug, Default)]
pub struct ExplicitMatrixStore {
    nodes: Vec<Option<ExplicitNode>>,
    // Signature -> candidate canonical handles sharing that signature
    // (full equality is still checked on collision).
    unique: HashMap<(u16, Option<(u32, Vec<(u32, ExplicitHandle)>)>), Vec<ExplicitHandle>>,
}

impl ExplicitMatrixStore {
    pub fn new() -> Self {
        ExplicitMatrixStore {
            nodes: vec![None, None],
            unique: HashMap::new(),
        }
    }

    /// Starts a new `BUILDING` node at `level`.
    pub fn new_building(&mut self, level: u16) -> ExplicitHandle {
        self.nodes.push(Some(ExplicitNode {
            level,
            rows: Vec::new(),
            state: NodeState::Building,
            forward: None,
        }));
        (self.nodes.len() - 1) as ExplicitHandle
    }

    /// Adds `(row, col) -> child` to a `BUILDING` node. Panics (an internal
    /// invariant violation) if `handle` is not `BUILDING`.
    pub fn add_entry(&mut self, handle: ExplicitHandle, row: u32, col: u32, child: ExplicitHandle) {
        let handle = self.resolve(handle);
        let node = self.nodes[handle as usize]
            .as_mut()
            .expect("add_entry on a recycled explicit node");
        assert!(
            matches!(node.state, NodeState::Building),
            "add_entry called on a non-BUILDING explicit node"
        );
        node.row_mut(row).insert(col, child);
    }

    /// Follows `forward` pointers through `MERGED` nodes until a
    /// `CANONICAL` (or still-`BUILDING`) handle is reached.
    pub fn resolve(&self, mut handle: ExplicitHandle) -> ExplicitHandle {
        loop {
            match self.nodes.get(handle as usize).and_then(|n| n.as_ref()) {
                Some(node) if node.state == NodeState::Merged => {
                    handle = node.forward.expect("MERGED node missing forward pointer");
                }
                _ => return handle,
            }
        }
    }

    pub fn state(&self, handle: ExplicitHandle) -> Option<NodeState> {
        if handle == FALSE || handle == TRUE {
            return Some(NodeState::Canonical);
        }
        self.nodes.get(handle as usize).and_then(|n| n.as_ref()).map(|n| n.state)
    }

    /// Canonicalises a `BUILDING` node bottom-up: children are assumed
    /// already canonical (callers build leaves-first, as
    /// [`crate::forest::Forest::reduce`] does for the shared
    /// representation). Hash-conses via the row signature, falling back to
    /// full structural equality on a signature collision.
    pub fn canonicalize(&mut self, handle: ExplicitHandle) -> ExplicitHandle {
        if handle == FALSE || handle == TRUE {
            return handle;
        }
        let handle = self.resolve(handle);
        {
            let node = self.nodes[handle as usize].as_ref().expect("canonicalize of recycled node");
            if node.state == NodeState::Canonical {
                return handle;
            }
        }

        let (level, signature) = {
            let node = self.nodes[handle as usize].as_mut().expect("canonicalize of recycled node");
            // Normalise empty rows away: a row whose entries are all gone
            // (every child collapsed to FALSE) is not stored, mirroring
            // "sparse storage omits edges whose target is terminal-0"
            // generalised to whole rows here.
            node.rows.retain(|(_, row)| !row.entries.is_empty());
            (node.level, node.signature())
        };
        let key = (level, signature);

        if let Some(candidates) = self.unique.get(&key) {
            for &candidate in candidates {
                if self.structurally_equal(handle, candidate) {
                    self.mark_merged(handle, candidate);
                    return candidate;
                }
            }
        }

        {
            let node = self.nodes[handle as usize].as_mut().unwrap();
            node.state = NodeState::Canonical;
        }
        self.unique.entry(key).or_default().push(handle);
        handle
    }

    fn structurally_equal(&self, a: ExplicitHandle, b: ExplicitHandle) -> bool {
        if a == b {
            return true;
        }
        match (
            self.nodes.get(a as usize).and_then(|n| n.as_ref()),
            self.nodes.get(b as usize).and_then(|n| n.as_ref()),
        ) {
            (Some(na), Some(nb)) => na.level == nb.level && na.rows == nb.rows,
            _ => false,
        }
    }

    fn mark_merged(&mut self, loser: ExplicitHandle, winner: ExplicitHandle) {
        let node = self.nodes[loser as usize].as_mut().unwrap();
        node.state = NodeState::Merged;
        node.forward = Some(winner);
        node.rows.clear();
    }

    /// Accumulates `incoming` (assumed `CANONICAL` or `BUILDING`) into
    /// `target` (a `BUILDING` node), merging row-by-row: a growing
    /// BUILDING diagram absorbs a CANONICAL one by recursive element-list
    /// merging. Returns [`MergeOutcome::Pending`]
    /// if `target` is not `BUILDING` (not yet available to accept more
    /// entries).
    pub fn merge_into(&mut self, target: ExplicitHandle, incoming: ExplicitHandle) -> MergeOutcome {
        let target = self.resolve(target);
        let incoming = self.resolve(incoming);
        if incoming == FALSE {
            return MergeOutcome::Merged(target);
        }
        let target_is_building = matches!(
            self.nodes.get(target as usize).and_then(|n| n.as_ref()).map(|n| n.state),
            Some(NodeState::Building)
        );
        if !target_is_building {
            return MergeOutcome::Pending;
        }
        let incoming_rows = match self.nodes.get(incoming as usize).and_then(|n| n.as_ref()) {
            Some(n) => n.rows.clone(),
            None => return MergeOutcome::Pending,
        };
        for (row_idx, row) in incoming_rows {
            let target_row = self.nodes[target as usize].as_mut().unwrap().row_mut(row_idx);
            let mut merged = target_row.clone();
            merged.merge_from(&row, |existing, _incoming| existing);
            *self.nodes[target as usize].as_mut().unwrap().row_mut(row_idx) = merged;
        }
        MergeOutcome::Merged(target)
    }

    /// Reads back every `(row, col, child)` triple of a canonical (or
    /// building) node, for tests and for lowering into the shared `Forest`
    /// representation.
    pub fn entries(&self, handle: ExplicitHandle) -> Vec<(u32, u32, ExplicitHandle)> {
        let handle = self.resolve(handle);
        match self.nodes.get(handle as usize).and_then(|n| n.as_ref()) {
            Some(node) => node
                .rows
                .iter()
                .flat_map(|(r, row)| row.entries.iter().map(move |&(c, child)| (*r, c, child)))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn level_of(&self, handle: ExplicitHandle) -> Option<u16> {
        if handle == FALSE || handle == TRUE {
            return Some(0);
        }
        let handle = self.resolve(handle);
        self.nodes.get(handle as usize).and_then(|n| n.as_ref()).map(|n| n.level)
    }
}
