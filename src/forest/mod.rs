//! Typed wrapper over [`NodeStore`] + [`UniqueTable`] for one variable
//! order and reduction rule.
//!
//! A `Forest` is the unit of ownership: it is the one object that mutates
//! its `NodeStore`, `UniqueTable`, and `OpCache`, the same way a
//! `BddManager` is the sole owner of its `nodes` vector, `unique_table`,
//! and `ite_cache`. Unlike a singleton BDD manager it is not a global
//! instance behind a `Mutex`: this is a single-threaded, explicitly-owned
//! engine instance, so a `Forest` is a plain `struct` passed around by
//! `&mut` reference.

mod reduce;

use crate::config::EngineConfig;
use crate::error::{EngineResult, ForestError};
use crate::node_store::{is_terminal, Edges, Handle, NodeRecord, NodeStore, FALSE, TRUE};
use crate::op_cache::OpCache;
use crate::unique_table::UniqueTable;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_FOREST_ID: AtomicU64 = AtomicU64::new(1);

/// Which canonical form a forest's nodes are reduced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionRule {
    /// Fully-reduced set MDD.
    MddSet,
    /// Identity-reduced matrix diagram (relation), level-skipping allowed.
    MxdIdentity,
    /// Quasi-reduced matrix diagram: every level present, used while
    /// accumulating a relation under construction.
    MxdQuasi,
    /// Edge-valued MDD assigning each accepting minterm a dense index.
    EvPlusIndex,
}

impl ReductionRule {
    /// MxD forests interleave an unprimed (row) and primed (column) node
    /// per conceptual variable level so that "child strictly below parent"
    /// holds uniformly; set/EV+ forests use one physical level
    /// per conceptual level.
    fn is_relation(self) -> bool {
        matches!(self, ReductionRule::MxdIdentity | ReductionRule::MxdQuasi)
    }
}

/// A node under construction: mutable, with exactly one holder, not yet in
/// the [`UniqueTable`].
#[derive(Debug, Clone)]
pub struct TempNode {
    phys_level: u16,
    edges: Vec<Handle>,
    forest_id: u64,
    consumed: bool,
}

impl Drop for TempNode {
    fn drop(&mut self) {
        if !self.consumed {
            // A temp node abandoned without going through `reduce` (e.g. an
            // error unwind) still holds links on its children; the forest
            // that built it is responsible for unlinking those before the
            // temp is dropped. We cannot reach the forest from here, so we
            // only assert the documented usage in debug builds.
            debug_assert!(
                self.consumed,
                "TempNode dropped without Forest::reduce or Forest::abandon_temp"
            );
        }
    }
}

impl TempNode {
    /// Sets edge `i`. Does not take ownership of `child`'s refcount by
    /// itself; callers go through [`Forest::set_edge`], which does.
    fn set_raw(&mut self, i: u32, child: Handle) {
        let i = i as usize;
        if i >= self.edges.len() {
            self.edges.resize(i + 1, FALSE);
        }
        self.edges[i] = child;
    }
}

/// Snapshot of a forest's size, used for error reporting and by
/// `BuilderFront`'s completion-engine statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForestStats {
    pub live_nodes: u64,
    pub peak_nodes: u64,
    pub unique_table_entries: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

/// A read-only view over a node's edges, used by traversal code so callers
/// never need to match on sparse vs full storage themselves.
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'a> {
    pub level: u16,
    pub primed: bool,
    edges: &'a Edges,
}

impl<'a> NodeView<'a> {
    pub fn size(&self) -> u32 {
        self.edges.size()
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self.edges, Edges::Sparse(_))
    }

    pub fn get(&self, i: u32) -> Handle {
        self.edges.get(i)
    }

    pub fn nonzero(&self) -> Box<dyn Iterator<Item = (u32, Handle)> + 'a> {
        self.edges.nonzero()
    }
}

/// Typed wrapper over `NodeStore` + `UniqueTable` + `OpCache` for one
/// variable order and reduction rule.
pub struct Forest {
    id: u64,
    rule: ReductionRule,
    /// `bounds[k-1]` is the domain bound of conceptual level `k`.
    bounds: Vec<u32>,
    store: NodeStore,
    unique: UniqueTable,
    cache: OpCache,
    config: EngineConfig,
}

impl Forest {
    /// Creates a forest over `bounds.len()` levels, level `k` (1-indexed)
    /// having domain `[0, bounds[k-1])`.
    pub fn new(rule: ReductionRule, bounds: Vec<u32>, config: EngineConfig) -> Self {
        Forest {
            id: NEXT_FOREST_ID.fetch_add(1, Ordering::Relaxed),
            rule,
            bounds,
            store: NodeStore::new(),
            unique: UniqueTable::new(),
            cache: OpCache::new(),
            config,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn rule(&self) -> ReductionRule {
        self.rule
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn cache_mut(&mut self) -> &mut OpCache {
        &mut self.cache
    }

    pub(crate) fn cache(&self) -> &OpCache {
        &self.cache
    }

    /// Number of conceptual variable levels `1..=K`.
    pub fn num_levels(&self) -> usize {
        self.bounds.len()
    }

    /// Domain bound of conceptual level `k` (`1..=num_levels()`).
    pub fn level_bound(&self, k: u16) -> u32 {
        self.bounds[(k - 1) as usize]
    }

    fn scale(&self) -> u16 {
        if self.rule.is_relation() {
            2
        } else {
            1
        }
    }

    /// Physical level for the unprimed (row) node at conceptual level `k`.
    pub fn phys_unprimed(&self, k: u16) -> u16 {
        k * self.scale()
    }

    /// Physical level for the primed (column) node at conceptual level `k`
    /// (only meaningful for relation forests).
    pub fn phys_primed(&self, k: u16) -> u16 {
        debug_assert!(self.rule.is_relation());
        k * 2 - 1
    }

    pub(crate) fn conceptual_level(&self, phys: u16) -> u16 {
        if self.rule.is_relation() {
            (phys + 1) / 2
        } else {
            phys
        }
    }

    /// Domain bound for whatever conceptual level physical level `phys`
    /// belongs to (row and column share the same bound).
    pub(crate) fn domain_size_at_phys(&self, phys: u16) -> u32 {
        if phys == 0 {
            return 0;
        }
        self.level_bound(self.conceptual_level(phys))
    }

    /// Whether a physical level is the primed half of a relation forest.
    pub fn is_primed_level(&self, phys: u16) -> bool {
        self.rule.is_relation() && phys % 2 == 1
    }

    /// Terminal handle for `true`/`false`.
    pub fn terminal(&self, value: bool) -> Handle {
        if value {
            TRUE
        } else {
            FALSE
        }
    }

    /// Begins building a mutable node at physical level `phys_level` with
    /// `size` edge slots.
    pub fn temp_node(&mut self, phys_level: u16, size: u32) -> TempNode {
        TempNode {
            phys_level,
            edges: vec![FALSE; size as usize],
            forest_id: self.id,
            consumed: false,
        }
    }

    /// Attaches `child` at index `i`, taking an ownership share of it

    pub fn set_edge(&mut self, temp: &mut TempNode, i: u32, child: Handle) -> EngineResult<()> {
        if temp.forest_id != self.id {
            return Err(ForestError::MismatchedForest {
                expected: self.id,
                found: temp.forest_id,
            }
            .into());
        }
        if !is_terminal(child) {
            let child_level = self.level_of_phys(child)?;
            if child_level >= temp.phys_level {
                return Err(ForestError::IllegalEdgeLevel {
                    parent_level: temp.phys_level,
                    child_level,
                }
                .into());
            }
        }
        // Unlink whatever was previously at slot i (set_edge may be called
        // more than once per slot while building).
        let previous = temp.edges.get(i as usize).copied().unwrap_or(FALSE);
        self.link(child);
        temp.set_raw(i, child);
        self.unlink(previous);
        Ok(())
    }

    /// Canonicalises `temp`, consuming it. The returned handle is already
    /// linked once on the caller's behalf (RAII-style ownership transfer:
    /// the caller must `unlink` it, or hand that link off via `set_edge`
    /// into a parent node).
    pub fn reduce(&mut self, mut temp: TempNode) -> EngineResult<Handle> {
        if temp.forest_id != self.id {
            return Err(ForestError::MismatchedForest {
                expected: self.id,
                found: temp.forest_id,
            }
            .into());
        }
        temp.consumed = true;
        reduce::reduce(self, temp)
    }

    /// Explicitly discards a temp node on an error-unwind path, unlinking
    /// every child it held, so the forest stays invariant-consistent
    /// after a cancellation or failure.
    pub fn abandon_temp(&mut self, mut temp: TempNode) {
        for i in 0..temp.edges.len() {
            let child = temp.edges[i];
            temp.edges[i] = FALSE;
            self.unlink(child);
        }
        temp.consumed = true;
    }

    /// Increments `h`'s refcount. No-op on terminals.
    pub fn link(&mut self, h: Handle) {
        if let Some(rec) = self.store.get_mut(h) {
            rec.refcount += 1;
        }
    }

    /// Increments `h`'s cache-count: one `OpCache` row now refers to it as
    /// an operand or result. No-op on terminals. Pairs with
    /// [`Forest::release_cache_refs`], which is how the share gets dropped
    /// again once the row that took it out is swept.
    pub fn cache_link(&mut self, h: Handle) {
        if let Some(rec) = self.store.get_mut(h) {
            rec.cache_count += 1;
        }
    }

    /// Decrements `h`'s refcount; recycles the node (and cascades to its
    /// children) once both refcount and cache-count reach zero.
    pub fn unlink(&mut self, h: Handle) {
        if is_terminal(h) {
            return;
        }
        let should_recycle = match self.store.get_mut(h) {
            Some(rec) => {
                debug_assert!(rec.refcount > 0, "unlink called more times than link on handle {h}");
                rec.refcount = rec.refcount.saturating_sub(1);
                rec.refcount == 0 && rec.cache_count == 0
            }
            None => false,
        };
        if should_recycle {
            self.recycle_cascade(h);
        }
    }

    /// Releases one cache-count share on each handle, recycling any that
    /// drop to `refcount == 0 && cache_count == 0` as a result. Called with
    /// the handles `OpCache::sweep_dead` reports as having lost a row.
    fn release_cache_refs(&mut self, handles: Vec<Handle>) {
        for h in handles {
            if is_terminal(h) {
                continue;
            }
            let should_recycle = match self.store.get_mut(h) {
                Some(rec) => {
                    debug_assert!(rec.cache_count > 0, "cache-count underflow on handle {h}");
                    rec.cache_count = rec.cache_count.saturating_sub(1);
                    rec.refcount == 0 && rec.cache_count == 0
                }
                None => false,
            };
            if should_recycle {
                self.recycle_cascade(h);
            }
        }
    }

    fn recycle_cascade(&mut self, h: Handle) {
        // Invalidate any OpCache rows mentioning this handle first, then
        // release the cache-count shares those rows held on other handles,
        // unlink children, and free the slot.
        let released = self.cache.sweep_dead(|x| x == h);
        let record = match self.store.get(h) {
            Some(r) => r.clone(),
            None => return,
        };
        if record.refcount != 0 || record.cache_count != 0 {
            // Something re-linked it while we were sweeping the cache; not
            // possible in the single-threaded model, but stay defensive.
            return;
        }
        self.unique.remove(record.level, &record.edges);
        let children: Vec<Handle> = record.edges.nonzero().map(|(_, c)| c).collect();
        self.store.recycle(h);
        self.release_cache_refs(released);
        for c in children {
            self.unlink(c);
        }
    }

    /// Physical level a handle lives at (0 for terminals).
    pub fn level_of_phys(&self, h: Handle) -> EngineResult<u16> {
        if is_terminal(h) {
            return Ok(0);
        }
        self.store
            .get(h)
            .map(|r| r.level)
            .ok_or_else(|| ForestError::Internal {
                detail: format!("handle {h} has no record"),
            }
            .into())
    }

    /// Conceptual (un-doubled) level a handle lives at.
    pub fn level_of(&self, h: Handle) -> EngineResult<u16> {
        self.level_of_phys(h).map(|p| self.conceptual_level(p))
    }

    pub fn size_of(&self, h: Handle) -> EngineResult<u32> {
        if is_terminal(h) {
            return Ok(0);
        }
        self.store
            .get(h)
            .map(|r| r.edges.size())
            .ok_or_else(|| ForestError::Internal {
                detail: format!("handle {h} has no record"),
            }
            .into())
    }

    pub fn is_sparse(&self, h: Handle) -> bool {
        matches!(self.store.get(h).map(|r| &r.edges), Some(Edges::Sparse(_)))
    }

    pub fn edge(&self, h: Handle, i: u32) -> Handle {
        match self.store.get(h) {
            Some(r) => r.edges.get(i),
            None => FALSE,
        }
    }

    pub fn view(&self, h: Handle) -> Option<NodeView<'_>> {
        self.store.get(h).map(|r| NodeView {
            level: r.level,
            primed: self.is_primed_level(r.level),
            edges: &r.edges,
        })
    }

    /// Runs a compaction pass over the node store if warranted by
    /// `config.compaction_threshold`.
    pub fn maybe_compact(&mut self) -> bool {
        self.store.maybe_compact(self.config.compaction_threshold)
    }

    pub fn stats(&self) -> ForestStats {
        let s = self.store.stats();
        let m = self.cache.metrics();
        ForestStats {
            live_nodes: self.store.live_count() as u64,
            peak_nodes: s.peak_live,
            unique_table_entries: self.unique.len(),
            cache_hits: m.hits,
            cache_misses: m.misses,
        }
    }

    pub(crate) fn store(&self) -> &NodeStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut NodeStore {
        &mut self.store
    }

    pub(crate) fn unique(&self) -> &UniqueTable {
        &self.unique
    }

    pub(crate) fn unique_mut(&mut self) -> &mut UniqueTable {
        &mut self.unique
    }

    pub(crate) fn sparse_threshold(&self) -> f64 {
        self.config.reduction_threshold_sparse
    }
}
