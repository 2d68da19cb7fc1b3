//! Binary operation cache with hit/miss metrics.
//!
//! Same idea as a BDD manager's `ite_cache: HashMap<(NodeId, NodeId, NodeId),
//! NodeId>`, generalised along two axes: the key carries an explicit
//! operation id (`Union`, `Intersect`, `Image`, `Preimage`, `SatImage`,
//! `Cardinality`, `ConvertIndex`) since one forest runs several distinct
//! binary operations rather than just `ITE`, and the cached value is not
//! always a node handle (`Cardinality` produces an arbitrary-precision
//! count).

use crate::node_store::Handle;
use num_bigint::BigUint;
use std::collections::HashMap;

/// Operation identifiers used as the first component of an [`OpCache`] key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpId {
    Union,
    Intersect,
    Image,
    Preimage,
    SatImage,
    Cardinality,
    ConvertIndex,
}

impl OpId {
    /// Whether the operands of this op should be canonically swapped
    /// (`a <= b`) before hashing, so a commutative op hits the cache
    /// regardless of argument order.
    fn is_commutative(self) -> bool {
        matches!(self, OpId::Union | OpId::Intersect)
    }
}

/// A cached result: most operations cache a node handle, cardinality
/// caches an exact, possibly-arbitrary-precision count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
    Node(Handle),
    Count(BigUint),
}

impl CacheValue {
    /// The node handle this entry refers to, if it is a node-valued result.
    pub fn as_node(&self) -> Option<Handle> {
        match self {
            CacheValue::Node(h) => Some(*h),
            CacheValue::Count(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    op: OpId,
    a: Handle,
    b: Handle,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OpCacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub invalidated: u64,
}

/// Memoisation table for DD operations.
#[derive(Debug, Default)]
pub struct OpCache {
    table: HashMap<Key, CacheValue>,
    metrics: OpCacheMetrics,
}

impl OpCache {
    pub fn new() -> Self {
        OpCache::default()
    }

    fn key(op: OpId, a: Handle, b: Handle) -> Key {
        if op.is_commutative() && a > b {
            Key { op, a: b, b: a }
        } else {
            Key { op, a, b }
        }
    }

    /// Looks up `(op, a, b)`, recording a hit or miss.
    pub fn probe(&mut self, op: OpId, a: Handle, b: Handle) -> Option<CacheValue> {
        let key = Self::key(op, a, b);
        let found = self.table.get(&key).cloned();
        if found.is_some() {
            self.metrics.hits += 1;
        } else {
            self.metrics.misses += 1;
        }
        found
    }

    /// Inserts `(op, a, b) -> value`. Cache-count bumps on `a`, `b`, and
    /// any node-valued result are the caller's responsibility (they live
    /// in [`crate::forest::Forest`], which owns the node store).
    pub fn insert(&mut self, op: OpId, a: Handle, b: Handle, value: CacheValue) {
        self.table.insert(Self::key(op, a, b), value);
    }

    /// Removes every entry that mentions a node for which `is_dead`
    /// returns true, either as an operand or as the result. Run as a
    /// periodic sweep rather than an eager per-death scan.
    ///
    /// Returns every handle (operand or node-valued result) that appeared in
    /// a removed row, one entry per appearance, so the caller can release
    /// the cache-count share it took out when the row was inserted.
    pub fn sweep_dead(&mut self, is_dead: impl Fn(Handle) -> bool) -> Vec<Handle> {
        let before = self.table.len();
        let mut released = Vec::new();
        self.table.retain(|key, value| {
            let result_handle = value.as_node();
            let result_dead = result_handle.map(&is_dead).unwrap_or(false);
            let dead = is_dead(key.a) || is_dead(key.b) || result_dead;
            if dead {
                released.push(key.a);
                released.push(key.b);
                if let Some(h) = result_handle {
                    released.push(h);
                }
            }
            !dead
        });
        self.metrics.invalidated += (before - self.table.len()) as u64;
        released
    }

    /// Drops every entry unconditionally, used when a forest's reduction
    /// rule changes mid-life (not expected in normal operation, but kept
    /// for completeness and tests).
    pub fn clear(&mut self) {
        self.metrics.invalidated += self.table.len() as u64;
        self.table.clear();
    }

    pub fn metrics(&self) -> OpCacheMetrics {
        self.metrics
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

    #[test]
    fn commutative_op_hits_regardless_of_argument_order() {
        let mut cache = OpCache::new();
        cache.insert(OpId::Union, 3, 7, CacheValue::Node(9));
        assert_eq!(cache.probe(OpId::Union, 7, 3), Some(CacheValue::Node(9)));
        assert_eq!(cache.metrics().hits, 1);
    }

    #[test]
    fn non_commutative_op_is_order_sensitive() {
        let mut cache = OpCache::new();
        cache.insert(OpId::Image, 3, 7, CacheValue::Node(9));
        assert_eq!(cache.probe(OpId::Image, 7, 3), None);
        assert_eq!(cache.probe(OpId::Image, 3, 7), Some(CacheValue::Node(9)));
    }

    #[test]
    fn miss_then_hit_updates_metrics() {
        let mut cache = OpCache::new();
        assert_eq!(cache.probe(OpId::Union, 1, 2), None);
        cache.insert(OpId::Union, 1, 2, CacheValue::Node(5));
        assert_eq!(cache.probe(OpId::Union, 1, 2), Some(CacheValue::Node(5)));
        let m = cache.metrics();
        assert_eq!(m.misses, 1);
        assert_eq!(m.hits, 1);
    }

    #[test]
    fn sweep_dead_removes_entries_mentioning_dead_operand_or_result() {
        let mut cache = OpCache::new();
        cache.insert(OpId::Union, 2, 3, CacheValue::Node(4));
        cache.insert(OpId::Union, 5, 6, CacheValue::Node(7));
        cache.sweep_dead(|h| h == 3);
        assert_eq!(cache.probe(OpId::Union, 2, 3), None);
        assert_eq!(cache.probe(OpId::Union, 5, 6), Some(CacheValue::Node(7)));
    }

    #[test]
    fn sweep_dead_removes_entries_whose_result_died() {
        let mut cache = OpCache::new();
        cache.insert(OpId::Union, 2, 3, CacheValue::Node(100));
        cache.sweep_dead(|h| h == 100);
        assert_eq!(cache.probe(OpId::Union, 2, 3), None);
    }

    #[test]
    fn sweep_dead_reports_every_handle_in_a_removed_row() {
        let mut cache = OpCache::new();
        cache.insert(OpId::Union, 2, 3, CacheValue::Node(4));
        let mut released = cache.sweep_dead(|h| h == 3);
        released.sort();
        assert_eq!(released, vec![2, 3, 4], "operand, operand, and result all held a cache-count share");
    }

    #[test]
    fn count_values_are_never_considered_dead_by_result() {
        let mut cache = OpCache::new();
        cache.insert(OpId::Cardinality, 2, 0, CacheValue::Count(BigUint::from(42u32)));
        cache.sweep_dead(|h| h == 2);
        // Operand 2 is dead, so the entry is still removed via the operand check.
        assert_eq!(cache.probe(OpId::Cardinality, 2, 0), None);
    }
}
