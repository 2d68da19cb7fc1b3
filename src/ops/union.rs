//! Union and Intersect.

use crate::error::EngineResult;
use crate::forest::Forest;
use crate::node_store::{is_terminal, Handle, FALSE, TRUE};
use crate::op_cache::{CacheValue, OpId};

impl Forest {
    /// `{ m : m in a } ∪ { m : m in b }`.
    ///
    /// Recurses top-down over levels the way a BDD manager's `ite` recurses
    /// over the topmost variable among its operands, using
    /// [`Forest::cofactor`] so a node that lives strictly below the level
    /// being split is treated as constant across every branch there,
    /// handling sparse and full children symmetrically by iterating over
    /// the union of child indices.
    pub fn union(&mut self, a: Handle, b: Handle) -> EngineResult<Handle> {
        if a == FALSE {
            self.link(b);
            return Ok(b);
        }
        if b == FALSE {
            self.link(a);
            return Ok(a);
        }
        if a == TRUE || b == TRUE {
            return Ok(TRUE);
        }
        if a == b {
            self.link(a);
            return Ok(a);
        }

        if let Some(cached) = self.cache_mut().probe(OpId::Union, a, b) {
            let h = cached.as_node().expect("union caches node handles only");
            self.link(h);
            return Ok(h);
        }

        let la = self.level_of_phys(a)?;
        let lb = self.level_of_phys(b)?;
        let top = la.max(lb);
        let size = self.domain_size_at_phys(top);

        let mut temp = self.temp_node(top, size);
        for i in 0..size {
            let ca = self.cofactor(a, la, top, i);
            let cb = self.cofactor(b, lb, top, i);
            let child = self.union(ca, cb)?;
            self.set_edge(&mut temp, i, child)?;
            self.unlink(child);
        }
        let result = self.reduce(temp)?;

        self.cache_mut().insert(OpId::Union, a, b, CacheValue::Node(result));
        self.cache_link(a);
        self.cache_link(b);
        self.cache_link(result);
        Ok(result)
    }

    /// `{ m : m in a } ∩ { m : m in b }`, `Union`'s sibling; same cofactor
    /// recursion, dual base cases.
    pub fn intersect(&mut self, a: Handle, b: Handle) -> EngineResult<Handle> {
        if a == FALSE || b == FALSE {
            return Ok(FALSE);
        }
        if a == TRUE {
            self.link(b);
            return Ok(b);
        }
        if b == TRUE {
            self.link(a);
            return Ok(a);
        }
        if a == b {
            self.link(a);
            return Ok(a);
        }

        if let Some(cached) = self.cache_mut().probe(OpId::Intersect, a, b) {
            let h = cached.as_node().expect("intersect caches node handles only");
            self.link(h);
            return Ok(h);
        }

        let la = self.level_of_phys(a)?;
        let lb = self.level_of_phys(b)?;
        let top = la.max(lb);
        let size = self.domain_size_at_phys(top);

        let mut temp = self.temp_node(top, size);
        for i in 0..size {
            let ca = self.cofactor(a, la, top, i);
            let cb = self.cofactor(b, lb, top, i);
            let child = self.intersect(ca, cb)?;
            self.set_edge(&mut temp, i, child)?;
            self.unlink(child);
        }
        let result = self.reduce(temp)?;

        self.cache_mut().insert(OpId::Intersect, a, b, CacheValue::Node(result));
        self.cache_link(a);
        self.cache_link(b);
        self.cache_link(result);
        Ok(result)
    }

    /// Cofactor of `h` (living at physical level `h_level`) with respect to
    /// branch `i` of `top_level`: `h`'s own edge if `h` lives exactly at
    /// `top_level`, otherwise `h` unchanged (it does not depend on that
    /// variable).
    pub(crate) fn cofactor(&self, h: Handle, h_level: u16, top_level: u16, i: u32) -> Handle {
        if !is_terminal(h) && h_level == top_level {
            self.edge(h, i)
        } else {
            h
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::forest::{Forest, ReductionRule};
    use crate::node_store::{FALSE, TRUE};

    fn var(f: &mut Forest, level: u16, size: u32, value: u32) -> u32 {
        let mut temp = f.temp_node(level, size);
        f.set_edge(&mut temp, value, TRUE).unwrap();
        f.reduce(temp).unwrap()
    }

    #[test]
    fn union_with_false_is_identity() {
        let mut f = Forest::new(ReductionRule::MddSet, vec![2], EngineConfig::default());
        let a = var(&mut f, 1, 2, 0);
        let u = f.union(a, FALSE).unwrap();
        assert_eq!(u, a);
        f.unlink(a);
        f.unlink(u);
    }

    #[test]
    fn union_with_true_is_true() {
        let mut f = Forest::new(ReductionRule::MddSet, vec![2], EngineConfig::default());
        let a = var(&mut f, 1, 2, 0);
        let u = f.union(a, TRUE).unwrap();
        assert_eq!(u, TRUE);
        f.unlink(a);
    }

    #[test]
    fn union_is_idempotent() {
        let mut f = Forest::new(ReductionRule::MddSet, vec![2], EngineConfig::default());
        let a = var(&mut f, 1, 2, 0);
        let u = f.union(a, a).unwrap();
        assert_eq!(u, a);
        f.unlink(a);
        f.unlink(u);
    }

    #[test]
    fn union_is_commutative() {
        let mut f = Forest::new(ReductionRule::MddSet, vec![2], EngineConfig::default());
        let a = var(&mut f, 1, 2, 0);
        let b = var(&mut f, 1, 2, 1);
        let ab = f.union(a, b).unwrap();
        let ba = f.union(b, a).unwrap();
        assert_eq!(ab, ba);
        f.unlink(a);
        f.unlink(b);
        f.unlink(ab);
        f.unlink(ba);
    }

    #[test]
    fn intersect_of_disjoint_variables_is_false() {
        let mut f = Forest::new(ReductionRule::MddSet, vec![2], EngineConfig::default());
        let a = var(&mut f, 1, 2, 0);
        let b = var(&mut f, 1, 2, 1);
        let i = f.intersect(a, b).unwrap();
        assert_eq!(i, FALSE);
        f.unlink(a);
        f.unlink(b);
    }

    #[test]
    fn intersect_with_true_is_identity() {
        let mut f = Forest::new(ReductionRule::MddSet, vec![2], EngineConfig::default());
        let a = var(&mut f, 1, 2, 0);
        let i = f.intersect(a, TRUE).unwrap();
        assert_eq!(i, a);
        f.unlink(a);
        f.unlink(i);
    }
}
