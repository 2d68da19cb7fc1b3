//! Raw storage of decision-diagram nodes.
//!
//! Mirrors a hash-consed node arena (`nodes: Vec<BddNode>` in a BDD
//! manager) but adds two pieces a decision-diagram forest needs that a
//! single BDD didn't: a **stable handle → slot** indirection
//! so addresses can be rewritten during compaction without invalidating any
//! handle a caller holds, and per-node `refcount`/`cache_count` fields used
//! by the rest of the forest to decide when a node may be recycled.

use crate::error::NodeStoreError;

/// Handle to a decision-diagram node. `0` and `1` are reserved for the
/// terminals: `0` is false/empty, `1` is true/relation-identity.
pub type Handle = u32;

/// Terminal handle for `false` / the empty set.
pub const FALSE: Handle = 0;
/// Terminal handle for `true` / relation-identity.
pub const TRUE: Handle = 1;

/// Returns whether `h` is one of the two reserved terminal handles.
#[inline]
pub fn is_terminal(h: Handle) -> bool {
    h == FALSE || h == TRUE
}

/// Edge list of a node, in one of two physical layouts: full (one edge
/// per domain value) or sparse (nonzero pairs only).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Edges {
    /// One edge per index in `0..size`.
    Full(Vec<Handle>),
    /// Only the nonzero `(index, child)` pairs, sorted by index.
    Sparse(Vec<(u32, Handle)>),
}

impl Edges {
    /// Logical size (domain bound) this edge list was built for.
    pub fn size(&self) -> u32 {
        match self {
            Edges::Full(v) => v.len() as u32,
            Edges::Sparse(pairs) => pairs.last().map(|(i, _)| i + 1).unwrap_or(0),
        }
    }

    /// Child at index `i`, or the terminal-0 child if `i` is absent from a
    /// sparse node.
    pub fn get(&self, i: u32) -> Handle {
        match self {
            Edges::Full(v) => v.get(i as usize).copied().unwrap_or(FALSE),
            Edges::Sparse(pairs) => pairs
                .binary_search_by_key(&i, |(idx, _)| *idx)
                .map(|pos| pairs[pos].1)
                .unwrap_or(FALSE),
        }
    }

    /// Iterate over `(index, child)` pairs whose child is not terminal-0.
    pub fn nonzero(&self) -> Box<dyn Iterator<Item = (u32, Handle)> + '_> {
        match self {
            Edges::Full(v) => Box::new(
                v.iter()
                    .enumerate()
                    .filter(|(_, h)| **h != FALSE)
                    .map(|(i, h)| (i as u32, *h)),
            ),
            Edges::Sparse(pairs) => Box::new(pairs.iter().copied()),
        }
    }

    fn byte_cost(&self) -> usize {
        match self {
            Edges::Full(v) => v.len() * std::mem::size_of::<Handle>(),
            Edges::Sparse(pairs) => pairs.len() * (std::mem::size_of::<u32>() + std::mem::size_of::<Handle>()),
        }
    }
}

/// A stored decision-diagram node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    /// Variable level this node lives at.
    pub level: u16,
    /// Edge list.
    pub edges: Edges,
    /// External holders + canonical parent edges.
    pub refcount: u32,
    /// Number of OpCache rows referring to this node.
    pub cache_count: u32,
    owner: Handle,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NodeStoreStats {
    pub allocated: u64,
    pub recycled: u64,
    pub peak_live: u64,
    pub compactions: u64,
}

/// Arena of [`NodeRecord`]s addressed by stable [`Handle`]s.
///
/// `addresses[handle]` is an index into `slots`; `slots` holds holes as
/// `None` between compactions. This is the safe-Rust analogue of the
/// original `node_manager`'s `address[] -> offset` + byte-buffer pair:
/// handles never move, but the slot they point to can be
/// rewritten by [`NodeStore::compact`].
#[derive(Debug)]
pub struct NodeStore {
    slots: Vec<Option<NodeRecord>>,
    addresses: Vec<usize>,
    free_handles: Vec<Handle>,
    free_slots: Vec<usize>,
    max_nodes: usize,
    stats: NodeStoreStats,
}

impl NodeStore {
    /// Creates an empty store with an effectively unbounded ceiling.
    pub fn new() -> Self {
        Self::with_ceiling(usize::MAX)
    }

    /// Creates an empty store that refuses new handles once `max_nodes`
    /// live+allocated handles have been issued (used to exercise the
    /// `OutOfMemory` path deterministically in tests).
    pub fn with_ceiling(max_nodes: usize) -> Self {
        NodeStore {
            slots: Vec::new(),
            // index 0 and 1 reserved for terminals; never dereferenced.
            addresses: vec![0, 0],
            free_handles: Vec::new(),
            free_slots: Vec::new(),
            max_nodes,
            stats: NodeStoreStats::default(),
        }
    }

    /// Allocates a fresh handle without storing a record in it yet
    
    pub fn new_handle(&mut self) -> Result<Handle, NodeStoreError> {
        if let Some(h) = self.free_handles.pop() {
            return Ok(h);
        }
        let next = self.addresses.len();
        if next >= self.max_nodes {
            return Err(NodeStoreError::OutOfMemory {
                requested_bytes: std::mem::size_of::<NodeRecord>(),
                ceiling_bytes: self.max_nodes * std::mem::size_of::<NodeRecord>(),
            });
        }
        self.addresses.push(0);
        Ok(next as Handle)
    }

    /// Writes `record` into `handle`'s slot.
    pub fn store(&mut self, handle: Handle, mut record: NodeRecord) {
        record.owner = handle;
        let idx = self.alloc_slot();
        self.slots[idx] = Some(record);
        self.addresses[handle as usize] = idx;
        self.stats.allocated += 1;
        let live = self.live_count() as u64;
        if live > self.stats.peak_live {
            self.stats.peak_live = live;
        }
        log::trace!("node_store: stored handle {} at slot {}", handle, idx);
    }

    fn alloc_slot(&mut self) -> usize {
        if let Some(idx) = self.free_slots.pop() {
            return idx;
        }
        self.slots.push(None);
        self.slots.len() - 1
    }

    /// Returns the record for `handle`, or `None` for a terminal or a
    /// handle that has been recycled.
    pub fn get(&self, handle: Handle) -> Option<&NodeRecord> {
        if is_terminal(handle) {
            return None;
        }
        let idx = *self.addresses.get(handle as usize)?;
        self.slots.get(idx)?.as_ref()
    }

    /// Mutable access to `handle`'s record, for refcount/cache-count bumps.
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut NodeRecord> {
        if is_terminal(handle) {
            return None;
        }
        let idx = *self.addresses.get(handle as usize)?;
        self.slots.get_mut(idx)?.as_mut()
    }

    /// Returns `handle`'s slot to the free list and the handle itself for
    /// reuse.
    pub fn recycle(&mut self, handle: Handle) {
        if is_terminal(handle) {
            return;
        }
        let idx = self.addresses[handle as usize];
        self.slots[idx] = None;
        self.free_slots.push(idx);
        self.free_handles.push(handle);
        self.stats.recycled += 1;
        log::trace!("node_store: recycled handle {}", handle);
    }

    /// Number of occupied slots.
    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free_slots.len()
    }

    /// Fraction of allocated slots that are holes, used to decide whether
    /// to run [`NodeStore::compact`].
    pub fn wasted_fraction(&self) -> f64 {
        if self.slots.is_empty() {
            0.0
        } else {
            self.free_slots.len() as f64 / self.slots.len() as f64
        }
    }

    /// Runs a compaction pass if the wasted-byte fraction exceeds
    /// `threshold`. Rewrites `addresses` but never changes any handle, so
    /// it is invisible to callers holding handles.
    pub fn maybe_compact(&mut self, threshold: f64) -> bool {
        if self.wasted_fraction() <= threshold {
            return false;
        }
        self.compact();
        true
    }

    fn compact(&mut self) {
        let mut new_slots = Vec::with_capacity(self.live_count());
        for slot in self.slots.drain(..) {
            if let Some(record) = slot {
                let owner = record.owner;
                new_slots.push(Some(record));
                self.addresses[owner as usize] = new_slots.len() - 1;
            }
        }
        self.slots = new_slots;
        self.free_slots.clear();
        self.stats.compactions += 1;
        log::debug!(
            "node_store: compacted, {} live nodes remain",
            self.live_count()
        );
    }

    /// Approximate byte footprint of live nodes.
    pub fn live_bytes(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .map(|r| r.edges.byte_cost() + std::mem::size_of::<u16>() + 2 * std::mem::size_of::<u32>())
            .sum()
    }

    pub fn stats(&self) -> NodeStoreStats {
        self.stats
    }

    /// Structured dump of every occupied slot, at `trace` level (analogue of
    /// the original `node_manager::Dump`).
    pub fn dump(&self) {
        for (h, &idx) in self.addresses.iter().enumerate() {
            match self.slots.get(idx).and_then(|s| s.as_ref()) {
                Some(r) if r.owner == h as Handle => {
                    log::trace!(
                        "node_store: handle {} level {} refcount {} cache_count {}",
                        h,
                        r.level,
                        r.refcount,
                        r.cache_count
                    );
                }
                _ => {}
            }
        }
    }
}

impl Default for NodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRecord {
    pub fn new(level: u16, edges: Edges) -> Self {
        NodeRecord {
            level,
            edges,
            refcount: 0,
            cache_count: 0,
            owner: FALSE,
        }
    }
}
