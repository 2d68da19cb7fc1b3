//! Convert-to-index, the EV+ operation.
//!
//! Rather than maintaining a parallel edge-valued node representation, ranks
//! are computed directly over an existing fully-reduced set MDD: the rank of
//! an accepting minterm is the number of other accepting minterms that sort
//! strictly before it in variable order, which is a prefix sum of
//! subtree cardinalities, so each accepting path carries its rank in
//! natural order along the variable sequence.

use crate::error::EngineResult;
use crate::forest::Forest;
use crate::node_store::{Handle, FALSE, TRUE};
use num_bigint::BigUint;
use num_traits::Zero;

/// Dense rank assignment for every accepting minterm of a set handle. The
/// assigned indices form a bijection onto `[0, |set|)`.
#[derive(Debug, Clone)]
pub struct IndexAssignment {
    /// `rank[i]` is the `i`-th minterm (in variable order) and its dense index.
    pub ranks: Vec<(Vec<u32>, BigUint)>,
    pub count: BigUint,
}

impl Forest {
    /// Computes the dense rank of every accepting minterm of `h`.
    pub fn convert_to_index(&mut self, h: Handle) -> EngineResult<IndexAssignment> {
        let count = self.cardinality(h)?;
        let top = self.num_levels() as u16;
        let mut ranks = Vec::new();
        let mut prefix = Vec::with_capacity(self.num_levels());
        self.walk(h, top, BigUint::zero(), &mut prefix, &mut ranks)?;
        Ok(IndexAssignment { ranks, count })
    }

    /// Walks `h` down from `expected_level`, assigning each accepting
    /// minterm a running offset. Expands skipped levels the same way
    /// `collect_minterms` does, so ranks stay consistent with
    /// `handle_to_minterm_iter`'s enumeration order, and reuses
    /// `cardinality_rec`'s own memoisation rather than keeping a second
    /// cache here.
    fn walk(
        &mut self,
        h: Handle,
        expected_level: u16,
        base: BigUint,
        prefix: &mut Vec<u32>,
        out: &mut Vec<(Vec<u32>, BigUint)>,
    ) -> EngineResult<()> {
        if h == FALSE {
            return Ok(());
        }
        let actual_level = if h == TRUE { 0 } else { self.level_of(h)? };

        if expected_level > actual_level {
            let size = self.level_bound(expected_level);
            let per_value = self.cardinality_rec(h)? * self.skip_factor(actual_level, expected_level - 1);
            let mut running = base;
            for value in 0..size {
                prefix.push(value);
                self.walk(h, expected_level - 1, running.clone(), prefix, out)?;
                running += per_value.clone();
                prefix.pop();
            }
            return Ok(());
        }

        if h == TRUE {
            let mut assignment = prefix.clone();
            assignment.reverse();
            out.push((assignment, base));
            return Ok(());
        }

        let view = self
            .view(h)
            .ok_or_else(|| crate::error::EngineError::IllegalArgument("handle has no node".into()))?;
        let mut running = base;
        let mut children: Vec<(u32, Handle)> = view.nonzero().collect();
        children.sort_by_key(|(i, _)| *i);
        for (i, child) in children {
            prefix.push(i);
            self.walk(child, actual_level - 1, running.clone(), prefix, out)?;
            let child_level = self.level_of(child)?;
            running += self.cardinality_rec(child)? * self.skip_factor(child_level, actual_level - 1);
            prefix.pop();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::forest::{Forest, ReductionRule};
    use crate::node_store::TRUE;
    use num_bigint::BigUint;

    #[test]
    fn ranks_form_a_bijection_onto_zero_to_count() {
        let mut f = Forest::new(ReductionRule::MddSet, vec![3], EngineConfig::default());
        let mut temp = f.temp_node(1, 3);
        f.set_edge(&mut temp, 0, TRUE).unwrap();
        f.set_edge(&mut temp, 2, TRUE).unwrap();
        let h = f.reduce(temp).unwrap();

        let assignment = f.convert_to_index(h).unwrap();
        assert_eq!(assignment.count, BigUint::from(2u32));
        let mut seen: Vec<BigUint> = assignment.ranks.iter().map(|(_, r)| r.clone()).collect();
        seen.sort();
        assert_eq!(seen, vec![BigUint::from(0u32), BigUint::from(1u32)]);
        f.unlink(h);
    }
}
