//! Minterm batch build.
//!
//! A minterm is one complete assignment of values to every level;
//! `minterm_to_handle` turns one assignment into a singleton set,
//! `build_batch` unions `N` of them in one pass, and
//! `handle_to_minterm_iter` walks a set handle back into its accepting
//! assignments.

use crate::error::EngineResult;
use crate::forest::Forest;
use crate::node_store::{Handle, FALSE, TRUE};

impl Forest {
    /// Builds the singleton-set handle for one complete assignment,
    /// `assignment[k-1]` giving the value at conceptual level `k`

    pub fn minterm_to_handle(&mut self, assignment: &[u32]) -> EngineResult<Handle> {
        debug_assert_eq!(assignment.len(), self.num_levels());
        let mut h = TRUE;
        for (k, &value) in assignment.iter().enumerate() {
            let level = (k + 1) as u16;
            let size = self.level_bound(level);
            let mut temp = self.temp_node(level, size);
            self.set_edge(&mut temp, value, h)?;
            self.unlink(h);
            h = self.reduce(temp)?;
        }
        Ok(h)
    }

    /// Unions `N` minterms bottom-up in one pass; inputs need not be
    /// sorted. Amortises `UniqueTable` lookups by folding
    /// pairwise instead of accumulating one union at a time.
    pub fn build_batch(&mut self, minterms: &[Vec<u32>]) -> EngineResult<Handle> {
        if minterms.is_empty() {
            return Ok(FALSE);
        }
        let mut handles: Vec<Handle> = minterms
            .iter()
            .map(|m| self.minterm_to_handle(m))
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

    /// Iterates every accepting assignment of `h`, most-significant level
    /// first.
    pub fn handle_to_minterm_iter(&self, h: Handle) -> EngineResult<Vec<Vec<u32>>> {
        let mut out = Vec::new();
        let mut prefix = Vec::with_capacity(self.num_levels());
        let top = self.num_levels() as u16;
        self.collect_minterms(h, top, &mut prefix, &mut out)?;
        Ok(out)
    }

    /// Walks `h` down from `expected_level`. All-equal collapse (§3) lets an
    /// edge skip straight past intervening levels, including all the way to
    /// a terminal, and every skipped level implicitly accepts every value,
    /// so it must be enumerated rather than left out of the assignment.
    fn collect_minterms(
        &self,
        h: Handle,
        expected_level: u16,
        prefix: &mut Vec<u32>,
        out: &mut Vec<Vec<u32>>,
    ) -> EngineResult<()> {
        if h == FALSE {
            return Ok(());
        }
        let actual_level = if h == TRUE { 0 } else { self.level_of(h)? };

        if expected_level > actual_level {
            let size = self.level_bound(expected_level);
            for value in 0..size {
                prefix.push(value);
                self.collect_minterms(h, expected_level - 1, prefix, out)?;
                prefix.pop();
            }
            return Ok(());
        }

        if h == TRUE {
            let mut assignment = prefix.clone();
            assignment.reverse();
            out.push(assignment);
            return Ok(());
        }

        let view = self
            .view(h)
            .ok_or_else(|| crate::error::EngineError::IllegalArgument("handle has no node".into()))?;
        for (i, child) in view.nonzero() {
            prefix.push(i);
            self.collect_minterms(child, actual_level - 1, prefix, out)?;
            prefix.pop();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::forest::{Forest, ReductionRule};
    use crate::node_store::{FALSE, TRUE};

    #[test]
    fn full_domain_collapse_enumerates_every_combination() {
        // Every minterm of a 2x2 domain present: all-equal collapse reduces
        // this straight to TRUE, so recovering minterms must expand both
        // skipped levels rather than reading an empty prefix off TRUE.
        let mut f = Forest::new(ReductionRule::MddSet, vec![2, 2], EngineConfig::default());
        let minterms = vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]];
        let h = f.build_batch(&minterms).unwrap();
        assert_eq!(h, TRUE, "a fully-accepting set collapses to the TRUE terminal");

        let mut recovered = f.handle_to_minterm_iter(h).unwrap();
        recovered.sort();
        let mut expected = minterms;
        expected.sort();
        assert_eq!(recovered, expected);
    }

    #[test]
    fn empty_batch_is_false() {
        let mut f = Forest::new(ReductionRule::MddSet, vec![2, 2], EngineConfig::default());
        let h = f.build_batch(&[]).unwrap();
        assert_eq!(h, FALSE);
    }

    #[test]
    fn batch_union_recovers_every_minterm_regardless_of_order() {
        let mut f = Forest::new(ReductionRule::MddSet, vec![2, 3], EngineConfig::default());
        let minterms = vec![vec![1, 0], vec![0, 2], vec![1, 2]];
        let h = f.build_batch(&minterms).unwrap();

        let mut recovered = f.handle_to_minterm_iter(h).unwrap();
        recovered.sort();
        let mut expected = minterms;
        expected.sort();
        assert_eq!(recovered, expected);
        f.unlink(h);
    }

    #[test]
    fn duplicate_minterms_do_not_inflate_cardinality() {
        let mut f = Forest::new(ReductionRule::MddSet, vec![2], EngineConfig::default());
        let minterms = vec![vec![0], vec![0], vec![1]];
        let h = f.build_batch(&minterms).unwrap();
        assert_eq!(f.cardinality(h).unwrap(), num_bigint::BigUint::from(2u32));
        f.unlink(h);
    }
}
