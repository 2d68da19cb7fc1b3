//! Reduction policy: decides sparse vs. full storage and applies each
//! reduction rule's collapse check.

use super::{Forest, ReductionRule, TempNode};
use crate::error::EngineResult;
use crate::node_store::{is_terminal, Edges, Handle, NodeRecord, FALSE};

/// Canonicalises `temp` and returns an owned (refcount +1) handle.
pub(super) fn reduce(forest: &mut Forest, temp: TempNode) -> EngineResult<Handle> {
    let TempNode {
        phys_level, edges, ..
    } = temp;

    if let Some(collapse_to) = collapse_target(forest, forest.rule(), phys_level, &edges) {
        // The node is redundant: unlink every edge we're discarding and
        // return the (already-linked-by-someone-else) collapse target with
        // one fresh link for the caller.
        for child in edges {
            forest.unlink(child);
        }
        forest.link(collapse_to);
        return Ok(collapse_to);
    }

    let packed = pack_edges(edges, forest.sparse_threshold());

    if let Some(existing) = forest.unique().find(phys_level, &packed) {
        // Duplicate of an existing canonical node: the links we're holding
        // for `packed`'s children are redundant (the existing node already
        // owns its own set of links), so give them back.
        for (_, child) in packed.nonzero() {
            forest.unlink(child);
        }
        forest.link(existing);
        return Ok(existing);
    }

    let handle = forest.store_mut().new_handle()?;
    let mut record = NodeRecord::new(phys_level, packed.clone());
    record.refcount = 1; // the handle we're about to return to the caller
    forest.store_mut().store(handle, record);
    forest.unique_mut().insert(phys_level, packed, handle);
    Ok(handle)
}

/// Chooses sparse vs. full storage by nonzero fraction.
fn pack_edges(edges: Vec<Handle>, sparse_threshold: f64) -> Edges {
    let size = edges.len();
    let nnz = edges.iter().filter(|h| **h != FALSE).count();
    let fraction = if size == 0 { 0.0 } else { nnz as f64 / size as f64 };
    if fraction <= sparse_threshold {
        let pairs = edges
            .into_iter()
            .enumerate()
            .filter(|(_, h)| *h != FALSE)
            .map(|(i, h)| (i as u32, h))
            .collect();
        Edges::Sparse(pairs)
    } else {
        Edges::Full(edges)
    }
}

/// Returns `Some(x)` if `edges` (at `phys_level`) is redundant and should
/// collapse to child `x` instead of becoming a canonical node of its own.
fn collapse_target(forest: &Forest, rule: ReductionRule, phys_level: u16, edges: &[Handle]) -> Option<Handle> {
    match rule {
        ReductionRule::MddSet | ReductionRule::EvPlusIndex => all_equal(edges),
        ReductionRule::MxdIdentity => {
            if forest.is_primed_level(phys_level) {
                // Primed (column) nodes are never collapsed on their own;
                // the skip is realised one level up, at the unprimed node.
                None
            } else {
                unprimed_identity_collapse(forest, edges)
            }
        }
        ReductionRule::MxdQuasi => None,
    }
}

/// Set-MDD / EV+ redundancy rule: a node whose every edge is the same
/// child collapses to that child.
fn all_equal(edges: &[Handle]) -> Option<Handle> {
    if edges.is_empty() {
        return Some(FALSE);
    }
    let first = edges[0];
    if edges.iter().all(|h| *h == first) {
        Some(first)
    } else {
        None
    }
}

/// A primed (column) node for row `i` is in "identity pattern" form when
/// its only nonzero entry is the diagonal `(i, x)` — i.e. variable `i`
/// passes through unchanged to `x`.
fn primed_identity_target(forest: &Forest, primed_handle: Handle, row: u32) -> Option<Handle> {
    if is_terminal(primed_handle) {
        return None;
    }
    let view = forest.view(primed_handle)?;
    let mut nz = view.nonzero();
    let (idx, target) = nz.next()?;
    if nz.next().is_some() {
        return None;
    }
    if idx == row {
        Some(target)
    } else {
        None
    }
}

/// An unprimed (row) node collapses to `x` when every row's primed child
/// is the identity pattern pointing to the same `x`.
fn unprimed_identity_collapse(forest: &Forest, edges: &[Handle]) -> Option<Handle> {
    if edges.is_empty() {
        return None;
    }
    let mut target: Option<Handle> = None;
    for (i, &primed) in edges.iter().enumerate() {
        let x = primed_identity_target(forest, primed, i as u32)?;
        match target {
            None => target = Some(x),
            Some(t) if t != x => return None,
            _ => {}
        }
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::forest::Forest;
    use crate::node_store::TRUE;

    #[test]
    fn all_equal_handles_empty_slice_as_false() {
        assert_eq!(all_equal(&[]), Some(FALSE));
    }

    #[test]
    fn all_equal_rejects_mixed_children() {
        assert_eq!(all_equal(&[FALSE, TRUE]), None);
    }

    #[test]
    fn pack_edges_prefers_sparse_below_threshold() {
        let edges = vec![FALSE, FALSE, FALSE, TRUE];
        let packed = pack_edges(edges, 0.5);
        assert!(matches!(packed, Edges::Sparse(_)));
    }

    #[test]
    fn pack_edges_prefers_full_above_threshold() {
        let edges = vec![TRUE, TRUE, TRUE, FALSE];
        let packed = pack_edges(edges, 0.5);
        assert!(matches!(packed, Edges::Full(_)));
    }

    #[test]
    fn identity_collapse_requires_same_target_on_every_row() {
        let mut f = Forest::new(ReductionRule::MxdIdentity, vec![2, 2], EngineConfig::default());
        // Build two primed nodes for conceptual level 1: row 0 -> (0, TRUE), row 1 -> (1, TRUE)
        let phys_primed = f.phys_primed(1);
        let mut p0 = f.temp_node(phys_primed, 2);
        f.set_edge(&mut p0, 0, TRUE).unwrap();
        let p0h = f.reduce(p0).unwrap();

        let mut p1 = f.temp_node(phys_primed, 2);
        f.set_edge(&mut p1, 1, TRUE).unwrap();
        let p1h = f.reduce(p1).unwrap();

        let phys_unprimed = f.phys_unprimed(1);
        let mut top = f.temp_node(phys_unprimed, 2);
        f.set_edge(&mut top, 0, p0h).unwrap();
        f.set_edge(&mut top, 1, p1h).unwrap();
        let h = f.reduce(top).unwrap();
        assert_eq!(h, TRUE, "pure identity over this level must collapse to its child");
        f.unlink(h);
    }
}
