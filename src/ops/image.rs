//! Image and pre-image through a relation forest.
//!
//! `p` lives in a set forest (`self`); `r` lives in a companion
//! identity-reduced (or quasi-reduced) relation forest passed alongside it.
//! Reading `r`'s edges never mutates the relation forest's refcounts, the
//! same way [`super::union`]'s cofactor helper reads a borrowed operand
//! without taking ownership of it: the relation handle stays alive for the
//! whole recursion because its caller keeps it linked.

use crate::error::{EngineError, EngineResult};
use crate::forest::Forest;
use crate::node_store::{Handle, FALSE, TRUE};
use crate::op_cache::{CacheValue, OpId};

impl Forest {
    /// `{ j | ∃ i ∈ p : (i,j) ∈ r }`.
    pub fn image(&mut self, p: Handle, rel: &Forest, r: Handle) -> EngineResult<Handle> {
        self.step(p, rel, r, OpId::Image, Direction::Forward)
    }

    /// `{ i | ∃ j ∈ q : (i,j) ∈ r }`.
    pub fn preimage(&mut self, q: Handle, rel: &Forest, r: Handle) -> EngineResult<Handle> {
        self.step(q, rel, r, OpId::Preimage, Direction::Backward)
    }

    fn step(&mut self, p: Handle, rel: &Forest, r: Handle, op: OpId, dir: Direction) -> EngineResult<Handle> {
        if p == FALSE || r == FALSE {
            return Ok(FALSE);
        }
        if r == TRUE {
            // Identity relation, or an identity-reduced skip all the way
            // down: every remaining level passes `p` through unchanged.
            self.link(p);
            return Ok(p);
        }
        if p == TRUE {
            return Ok(FALSE);
        }

        if let Some(cached) = self.cache_mut().probe(op, p, r) {
            let h = cached.as_node().expect("image/preimage cache node handles only");
            self.link(h);
            return Ok(h);
        }

        let kp = self.level_of(p)?;
        let kr = rel.level_of(r)?;
        let size = self.level_bound(kp);

        let result = if kr < kp {
            // `r` skips this level: identity-reduced semantics say the
            // variable at `kp` passes through unchanged, so recurse
            // one level down on each of `p`'s own children under the same
            // index and keep `r` fixed.
            let mut temp = self.temp_node(kp, size);
            for i in 0..size {
                let pi = self.edge(p, i);
                if pi == FALSE {
                    continue;
                }
                let sub = self.step(pi, rel, r, op, dir)?;
                self.set_edge(&mut temp, i, sub)?;
                self.unlink(sub);
            }
            self.reduce(temp)?
        } else {
            debug_assert_eq!(kr, kp, "relation must not be coarser than the set it maps over");
            let row = rel
                .view(r)
                .ok_or_else(|| EngineError::IllegalArgument("relation handle has no node".into()))?;

            let mut accum = vec![FALSE; size as usize];
            for (i, primed) in row.nonzero() {
                let column = rel
                    .view(primed)
                    .ok_or_else(|| EngineError::IllegalArgument("primed relation node has no columns".into()))?;
                for (j, target) in column.nonzero() {
                    // Forward (image): select `p`'s row index `i`, accumulate into column `j`.
                    // Backward (preimage): select `p`'s column index `j`, accumulate into row `i`.
                    let (select, result_idx) = match dir {
                        Direction::Forward => (i, j),
                        Direction::Backward => (j, i),
                    };
                    let selected = self.edge(p, select);
                    if selected == FALSE {
                        continue;
                    }
                    let fired = self.step(selected, rel, target, op, dir)?;
                    if fired == FALSE {
                        continue;
                    }
                    let merged = self.union(accum[result_idx as usize], fired)?;
                    self.unlink(accum[result_idx as usize]);
                    self.unlink(fired);
                    accum[result_idx as usize] = merged;
                }
            }

            let mut temp = self.temp_node(kp, size);
            for (idx, child) in accum.into_iter().enumerate() {
                self.set_edge(&mut temp, idx as u32, child)?;
                self.unlink(child);
            }
            self.reduce(temp)?
        };

        self.cache_mut().insert(op, p, r, CacheValue::Node(result));
        // `r` lives in the companion relation forest (`rel: &Forest`, borrowed
        // immutably here), so its cache-count is that forest's own concern;
        // only `p` and `result` live in `self`.
        self.cache_link(p);
        self.cache_link(result);
        Ok(result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::forest::{Forest, ReductionRule};
    use crate::node_store::{FALSE, TRUE};

    fn point(f: &mut Forest, level: u16, size: u32, value: u32) -> u32 {
        let mut temp = f.temp_node(level, size);
        f.set_edge(&mut temp, value, TRUE).unwrap();
        f.reduce(temp).unwrap()
    }

    /// Builds the identity relation over one level with domain `size`.
    fn identity_relation(rel: &mut Forest, size: u32) -> u32 {
        let phys_primed = rel.phys_primed(1);
        let mut primed = Vec::with_capacity(size as usize);
        for i in 0..size {
            let mut p = rel.temp_node(phys_primed, size);
            rel.set_edge(&mut p, i, TRUE).unwrap();
            primed.push(rel.reduce(p).unwrap());
        }
        let phys_unprimed = rel.phys_unprimed(1);
        let mut top = rel.temp_node(phys_unprimed, size);
        for (i, ph) in primed.into_iter().enumerate() {
            rel.set_edge(&mut top, i as u32, ph).unwrap();
        }
        rel.reduce(top).unwrap()
    }

    #[test]
    fn image_through_identity_relation_is_identity() {
        let mut set_forest = Forest::new(ReductionRule::MddSet, vec![3], EngineConfig::default());
        let mut rel_forest = Forest::new(ReductionRule::MxdIdentity, vec![3], EngineConfig::default());

        let p = point(&mut set_forest, 1, 3, 1);
        let r = identity_relation(&mut rel_forest, 3);

        let img = set_forest.image(p, &rel_forest, r).unwrap();
        assert_eq!(img, p);

        set_forest.unlink(p);
        set_forest.unlink(img);
        rel_forest.unlink(r);
    }

    #[test]
    fn image_through_empty_relation_is_false() {
        let mut set_forest = Forest::new(ReductionRule::MddSet, vec![2], EngineConfig::default());
        let rel_forest = Forest::new(ReductionRule::MxdIdentity, vec![2], EngineConfig::default());

        let p = point(&mut set_forest, 1, 2, 0);
        let img = set_forest.image(p, &rel_forest, FALSE).unwrap();
        assert_eq!(img, FALSE);
        set_forest.unlink(p);
    }

    #[test]
    fn image_of_empty_set_is_false() {
        let mut set_forest = Forest::new(ReductionRule::MddSet, vec![2], EngineConfig::default());
        let mut rel_forest = Forest::new(ReductionRule::MxdIdentity, vec![2], EngineConfig::default());
        let r = identity_relation(&mut rel_forest, 2);
        let img = set_forest.image(FALSE, &rel_forest, r).unwrap();
        assert_eq!(img, FALSE);
        rel_forest.unlink(r);
    }
}
