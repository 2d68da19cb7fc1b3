//! Building and converting relation (MxD) handles from concrete
//! `(row, column)` pairs.
//!
//! Generalises [`super::minterm::minterm_to_handle`] from a single-level
//! edge chain to the row/primed-column edge pair a relation forest needs at
//! every conceptual level: a relation forest interleaves an unprimed and a
//! primed physical level per conceptual level, see
//! [`crate::forest::Forest::phys_unprimed`] /
//! [`crate::forest::Forest::phys_primed`].

use crate::error::EngineResult;
use crate::forest::Forest;
use crate::node_store::{Handle, FALSE, TRUE};

impl Forest {
    /// Builds the singleton-relation handle mapping `row` to `col`
    /// (`row[k-1]`/`col[k-1]` give the value at conceptual level `k`).
    /// Works for both [`crate::forest::ReductionRule::MxdQuasi`] (every
    /// level stays explicit, since a lone pair never satisfies the
    /// all-rows-identity collapse check) and
    /// [`crate::forest::ReductionRule::MxdIdentity`] (collapses only once
    /// enough pairs are unioned together to fill out an identity pattern at
    /// a level).
    pub fn pair_to_handle(&mut self, row: &[u32], col: &[u32]) -> EngineResult<Handle> {
        debug_assert_eq!(row.len(), self.num_levels());
        debug_assert_eq!(col.len(), self.num_levels());
        let mut h = TRUE;
        for k in 1..=self.num_levels() as u16 {
            let bound = self.level_bound(k);
            let idx = (k - 1) as usize;

            let phys_primed = self.phys_primed(k);
            let mut primed = self.temp_node(phys_primed, bound);
            self.set_edge(&mut primed, col[idx], h)?;
            self.unlink(h);
            let primed_h = self.reduce(primed)?;

            let phys_unprimed = self.phys_unprimed(k);
            let mut unprimed = self.temp_node(phys_unprimed, bound);
            self.set_edge(&mut unprimed, row[idx], primed_h)?;
            self.unlink(primed_h);
            h = self.reduce(unprimed)?;
        }
        Ok(h)
    }

    /// Unions `N` `(row, col)` pairs into one relation handle, same pairwise
    /// folding strategy as [`super::minterm::Forest::build_batch`].
    pub fn build_relation_batch(&mut self, pairs: &[(Vec<u32>, Vec<u32>)]) -> EngineResult<Handle> {
        if pairs.is_empty() {
            return Ok(FALSE);
        }
        let mut handles: Vec<Handle> = pairs
            .iter()
            .map(|(row, col)| self.pair_to_handle(row, col))
            .collect::<EngineResult<_>>()?;

        while handles.len() > 1 {
            let mut next = Vec::with_capacity(handles.len().div_ceil(2));
            let mut iter = handles.into_iter();
            while let Some(a) = iter.next() {
                let merged = match iter.next() {
                    Some(b) => {
                        let u = self.union(a, b)?;
                        self.unlink(a);
                        self.unlink(b);
                        u
                    }
                    None => a,
                };
                next.push(merged);
            }
            handles = next;
        }
        Ok(handles.into_iter().next().unwrap_or(FALSE))
    }

    /// Enumerates every `(row, col)` pair a **quasi-reduced** relation
    /// handle accepts. Every level is explicit under this rule, so the
    /// walk never needs to special-case a skipped level.
    pub fn relation_pairs_quasi(&self, h: Handle) -> EngineResult<Vec<(Vec<u32>, Vec<u32>)>> {
        let mut out = Vec::new();
        let mut row_prefix = Vec::with_capacity(self.num_levels());
        let mut col_prefix = Vec::with_capacity(self.num_levels());
        self.walk_quasi(h, &mut row_prefix, &mut col_prefix, &mut out)?;
        Ok(out)
    }

    fn walk_quasi(
        &self,
        h: Handle,
        row_prefix: &mut Vec<u32>,
        col_prefix: &mut Vec<u32>,
        out: &mut Vec<(Vec<u32>, Vec<u32>)>,
    ) -> EngineResult<()> {
        if h == FALSE {
            return Ok(());
        }
        if h == TRUE {
            let mut row = row_prefix.clone();
            let mut col = col_prefix.clone();
            row.reverse();
            col.reverse();
            out.push((row, col));
            return Ok(());
        }
        let view = self
            .view(h)
            .ok_or_else(|| crate::error::EngineError::IllegalArgument("relation handle has no node".into()))?;
        for (i, primed) in view.nonzero() {
            let column = self
                .view(primed)
                .ok_or_else(|| crate::error::EngineError::IllegalArgument("primed node has no columns".into()))?;
            row_prefix.push(i);
            for (j, target) in column.nonzero() {
                col_prefix.push(j);
                self.walk_quasi(target, row_prefix, col_prefix, out)?;
                col_prefix.pop();
            }
            row_prefix.pop();
        }
        Ok(())
    }

    /// Enumerates every `(row, col)` pair an **identity-reduced** relation
    /// handle accepts. A skipped level means "unchanged", so every value
    /// in that level's domain contributes a `row=col=v` leg.
    pub fn relation_pairs_identity(&self, h: Handle) -> EngineResult<Vec<(Vec<u32>, Vec<u32>)>> {
        let mut out = Vec::new();
        let mut row_prefix = Vec::with_capacity(self.num_levels());
        let mut col_prefix = Vec::with_capacity(self.num_levels());
        self.walk_identity(h, self.num_levels() as u16, &mut row_prefix, &mut col_prefix, &mut out)?;
        Ok(out)
    }

    fn walk_identity(
        &self,
        h: Handle,
        level: u16,
        row_prefix: &mut Vec<u32>,
        col_prefix: &mut Vec<u32>,
        out: &mut Vec<(Vec<u32>, Vec<u32>)>,
    ) -> EngineResult<()> {
        if h == FALSE {
            return Ok(());
        }
        if level == 0 {
            debug_assert_eq!(h, TRUE);
            let mut row = row_prefix.clone();
            let mut col = col_prefix.clone();
            row.reverse();
            col.reverse();
            out.push((row, col));
            return Ok(());
        }
        let bound = self.level_bound(level);
        let node_level = if h == TRUE { 0 } else { self.level_of(h)? };
        if h == TRUE || node_level < level {
            // Skipped: identity over every value at this level.
            for v in 0..bound {
                row_prefix.push(v);
                col_prefix.push(v);
                self.walk_identity(h, level - 1, row_prefix, col_prefix, out)?;
                col_prefix.pop();
                row_prefix.pop();
            }
            return Ok(());
        }
        let view = self
            .view(h)
            .ok_or_else(|| crate::error::EngineError::IllegalArgument("relation handle has no node".into()))?;
        for (i, primed) in view.nonzero() {
            let column = self
                .view(primed)
                .ok_or_else(|| crate::error::EngineError::IllegalArgument("primed node has no columns".into()))?;
            row_prefix.push(i);
            for (j, target) in column.nonzero() {
                col_prefix.push(j);
                self.walk_identity(target, level - 1, row_prefix, col_prefix, out)?;
                col_prefix.pop();
            }
            row_prefix.pop();
        }
        Ok(())
    }
}

/// Converts a handle built under [`crate::forest::ReductionRule::MxdQuasi`]
/// in `quasi` into its equivalent handle in an identity-reduced `identity`
/// forest.
pub fn quasi_to_identity(quasi: &Forest, h: Handle, identity: &mut Forest) -> EngineResult<Handle> {
    let pairs = quasi.relation_pairs_quasi(h)?;
    identity.build_relation_batch(&pairs)
}

/// The inverse conversion: quasi-reduced -> identity-reduced -> quasi-reduced
/// round-trips to the same underlying relation.
pub fn identity_to_quasi(identity: &Forest, h: Handle, quasi: &mut Forest) -> EngineResult<Handle> {
    let pairs = identity.relation_pairs_identity(h)?;
    quasi.build_relation_batch(&pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::forest::ReductionRule;

    #[test]
    fn pair_to_handle_round_trips_through_identity_pairs() {
        let mut rel = Forest::new(ReductionRule::MxdIdentity, vec![3, 2], EngineConfig::default());
        let h = rel.pair_to_handle(&[1, 0], &[2, 1]).unwrap();
        let pairs = rel.relation_pairs_identity(h).unwrap();
        assert_eq!(pairs, vec![(vec![1, 0], vec![2, 1])]);
        rel.unlink(h);
    }

    #[test]
    fn quasi_and_identity_forests_agree_on_the_same_relation() {
        let bounds = vec![2, 3];
        let mut quasi = Forest::new(ReductionRule::MxdQuasi, bounds.clone(), EngineConfig::default());
        let mut identity = Forest::new(ReductionRule::MxdIdentity, bounds, EngineConfig::default());

        let pairs = vec![
            (vec![0, 1], vec![0, 2]),
            (vec![1, 0], vec![1, 0]),
            (vec![1, 2], vec![0, 0]),
        ];
        let qh = quasi.build_relation_batch(&pairs).unwrap();
        let ih = quasi_to_identity(&quasi, qh, &mut identity).unwrap();

        let mut recovered = identity.relation_pairs_identity(ih).unwrap();
        recovered.sort();
        let mut expected = pairs.clone();
        expected.sort();
        assert_eq!(recovered, expected);

        let back = identity_to_quasi(&identity, ih, &mut quasi).unwrap();
        let mut recovered_quasi = quasi.relation_pairs_quasi(back).unwrap();
        recovered_quasi.sort();
        assert_eq!(recovered_quasi, expected);

        quasi.unlink(qh);
        quasi.unlink(back);
        identity.unlink(ih);
    }

    #[test]
    fn identity_relation_over_full_domain_is_true_and_expands_to_every_pair() {
        let mut rel = Forest::new(ReductionRule::MxdIdentity, vec![2], EngineConfig::default());
        let pairs = vec![(vec![0], vec![0]), (vec![1], vec![1])];
        let h = rel.build_relation_batch(&pairs).unwrap();
        assert_eq!(h, TRUE, "full identity over one binary level collapses to TRUE");
        let recovered = rel.relation_pairs_identity(h).unwrap();
        assert_eq!(recovered.len(), 2);
    }
}
