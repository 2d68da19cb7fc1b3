//! Cardinality: post-order traversal with memoisation, arbitrary precision.

use crate::error::EngineResult;
use crate::forest::Forest;
use crate::node_store::{Handle, FALSE, TRUE};
use crate::op_cache::{CacheValue, OpId};
use num_bigint::BigUint;
use num_traits::{One, Zero};

impl Forest {
    /// `|{ m : m accepted by h }|`, exact and arbitrary-precision.
    ///
    /// All-equal collapse (§3) lets an edge skip straight past any number of
    /// levels down to its child, including all the way to a terminal; every
    /// skipped level is implicitly "every value accepted", so its domain
    /// size must be folded into the count rather than silently dropped.
    pub fn cardinality(&mut self, h: Handle) -> EngineResult<BigUint> {
        let n = self.cardinality_rec(h)?;
        let top = self.num_levels() as u16;
        let root_level = self.level_of(h)?;
        Ok(n * self.skip_factor(root_level, top))
    }

    /// Count local to `h`'s own subtree, with no outer skip applied; callers
    /// fold in the domain sizes of any levels skipped above `h` themselves.
    pub(crate) fn cardinality_rec(&mut self, h: Handle) -> EngineResult<BigUint> {
        if h == FALSE {
            return Ok(BigUint::zero());
        }
        if h == TRUE {
            return Ok(BigUint::one());
        }

        if let Some(cached) = self.cache_mut().probe(OpId::Cardinality, h, FALSE) {
            if let CacheValue::Count(n) = cached {
                return Ok(n);
            }
        }

        let view = self
            .view(h)
            .ok_or_else(|| crate::error::EngineError::IllegalArgument("handle has no node".into()))?;
        let my_level = self.level_of(h)?;
        let children: Vec<Handle> = view.nonzero().map(|(_, c)| c).collect();
        let mut total = BigUint::zero();
        for child in children {
            let child_level = self.level_of(child)?;
            total += self.cardinality_rec(child)? * self.skip_factor(child_level, my_level - 1);
        }

        self.cache_mut()
            .insert(OpId::Cardinality, h, FALSE, CacheValue::Count(total.clone()));
        self.cache_link(h);
        Ok(total)
    }

    /// Product of the domain bounds of every conceptual level strictly
    /// between `lo` and `hi` (i.e. `lo+1..=hi`); `1` when the range is empty.
    pub(crate) fn skip_factor(&self, lo: u16, hi: u16) -> BigUint {
        let mut factor = BigUint::one();
        let mut k = lo + 1;
        while k <= hi {
            factor *= self.level_bound(k);
            k += 1;
        }
        factor
    }
}
