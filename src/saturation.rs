//! Level-structured fixpoint of a partitioned next-state relation.
//!
//! `Sat`/`RecFire` are mutually recursive; both live here as private
//! helpers behind one public entry point, [`Forest::saturate`], so a caller
//! never has to juggle the two functions directly.

use crate::error::{EngineResult, SaturationError};
use crate::forest::Forest;
use crate::node_store::{Handle, FALSE, TRUE};
use crate::op_cache::{CacheValue, OpId};

/// A next-state relation split by the highest level each transition
/// changes. `levels[k-1]` is the portion whose highest-changing level is
/// conceptual level `k`, or `None` if no transition changes anything at
/// that level.
pub struct Partition<'a> {
    levels: Vec<Option<Handle>>,
    rel: &'a Forest,
}

impl<'a> Partition<'a> {
    /// `levels[k-1]` corresponds to conceptual level `k`; a `None` entry
    /// means `R[k]` is empty.
    pub fn new(rel: &'a Forest, levels: Vec<Option<Handle>>) -> Self {
        Partition { levels, rel }
    }

    fn at(&self, level: u16) -> Option<Handle> {
        self.levels.get((level - 1) as usize).copied().flatten()
    }
}

/// Cooperative cancellation flag polled between outer saturation
/// iterations; no atomic primitives are required since the engine runs
/// single-threaded.
pub trait Interrupt {
    fn is_set(&self) -> bool;
}

impl Interrupt for () {
    fn is_set(&self) -> bool {
        false
    }
}

impl Forest {
    /// Computes the least fixpoint of `X ↦ S0 ∪ image(X, R)`.
    pub fn saturate(&mut self, s0: Handle, partition: &Partition<'_>, interrupt: &impl Interrupt) -> EngineResult<Handle> {
        if partition.levels.iter().all(|l| l.is_none()) {
            log::debug!("saturate: partitioned relation is entirely empty, PartitionMissing");
            return Err(SaturationError::PartitionMissing.into());
        }
        // Hold a temporary reference for the duration of the call; `sat`
        // returns its own independently owned handle, so this is released
        // again before returning regardless of outcome.
        self.link(s0);
        let mut iterations = 0usize;
        let result = self.sat(s0, partition, interrupt, &mut iterations);
        self.unlink(s0);
        result
    }

    fn sat(
        &mut self,
        s: Handle,
        partition: &Partition<'_>,
        interrupt: &impl Interrupt,
        iterations: &mut usize,
    ) -> EngineResult<Handle> {
        if s == FALSE || s == TRUE {
            return Ok(s);
        }
        let k = self.level_of(s)?;
        let size = self.level_bound(k);

        // Saturate every child strictly below k first: every child handle
        // must already be a fixpoint of R[1..k-1] before the first firing at k.
        let mut current = vec![FALSE; size as usize];
        for i in 0..size {
            let child = self.edge(s, i);
            current[i as usize] = self.sat(child, partition, interrupt, iterations)?;
        }

        let r_k = match partition.at(k) {
            Some(h) => h,
            None => {
                let h = self.rebuild(k, size, &current)?;
                for c in current {
                    self.unlink(c);
                }
                return Ok(h);
            }
        };

        loop {
            *iterations += 1;
            if *iterations % self.config().interrupt_check_interval.max(1) == 0 && interrupt.is_set() {
                for c in current {
                    self.unlink(c);
                }
                return Err(SaturationError::Interrupted.into());
            }

            let mut changed = false;
            for i in 0..size {
                if current[i as usize] == FALSE {
                    continue;
                }
                let row = match partition.rel.view(r_k) {
                    Some(v) => v,
                    None => break,
                };
                let primed = row.get(i);
                if primed == FALSE {
                    continue;
                }
                let column = match partition.rel.view(primed) {
                    Some(v) => v,
                    None => continue,
                };
                for (j, target) in column.nonzero() {
                    let fired = self.rec_fire(current[i as usize], partition, target, interrupt, iterations)?;
                    if fired == FALSE {
                        continue;
                    }
                    let merged = self.union(current[j as usize], fired)?;
                    let same = merged == current[j as usize];
                    self.unlink(fired);
                    if same {
                        self.unlink(merged);
                    } else {
                        self.unlink(current[j as usize]);
                        current[j as usize] = merged;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        let h = self.rebuild(k, size, &current)?;
        for c in current {
            self.unlink(c);
        }
        Ok(h)
    }

    /// Fires `mxd` against `p`, recursively saturating the image whenever
    /// the resulting level still has a non-empty local relation slice.
    fn rec_fire(
        &mut self,
        p: Handle,
        partition: &Partition<'_>,
        mxd: Handle,
        interrupt: &impl Interrupt,
        iterations: &mut usize,
    ) -> EngineResult<Handle> {
        if p == FALSE || mxd == FALSE {
            return Ok(FALSE);
        }
        if mxd == TRUE {
            self.link(p);
            return Ok(p);
        }
        if p == TRUE {
            return Ok(FALSE);
        }

        if let Some(cached) = self.cache_mut().probe(OpId::SatImage, p, mxd) {
            let h = cached.as_node().expect("sat-image caches node handles only");
            self.link(h);
            return Ok(h);
        }

        let kp = self.level_of(p)?;
        let size = self.level_bound(kp);
        let kr = partition.rel.level_of(mxd)?;

        let mut reduced = if kr < kp {
            // `mxd` skips this level: identity-reduction means the variable
            // at `kp` passes through unchanged, so recurse one level down on
            // each of `p`'s own children under the same index, keeping `mxd`
            // fixed, the same way `image::step` handles a skipped relation
            // level.
            let mut edges = vec![FALSE; size as usize];
            for i in 0..size {
                let pi = self.edge(p, i);
                if pi == FALSE {
                    continue;
                }
                edges[i as usize] = self.rec_fire(pi, partition, mxd, interrupt, iterations)?;
            }
            let reduced = self.rebuild(kp, size, &edges)?;
            for c in &edges {
                self.unlink(*c);
            }
            reduced
        } else {
            debug_assert_eq!(kr, kp, "relation must not be coarser than the state level it fires at");
            let row = partition
                .rel
                .view(mxd)
                .ok_or_else(|| crate::error::EngineError::IllegalArgument("relation handle has no node".into()))?;

            let mut result = vec![FALSE; size as usize];
            for (i, primed) in row.nonzero() {
                let pi = self.edge(p, i);
                if pi == FALSE {
                    continue;
                }
                let column = partition
                    .rel
                    .view(primed)
                    .ok_or_else(|| crate::error::EngineError::IllegalArgument("primed node has no columns".into()))?;
                for (j, target) in column.nonzero() {
                    let fired = self.rec_fire(pi, partition, target, interrupt, iterations)?;
                    if fired == FALSE {
                        continue;
                    }
                    let merged = self.union(result[j as usize], fired)?;
                    self.unlink(result[j as usize]);
                    self.unlink(fired);
                    result[j as usize] = merged;
                }
            }

            let reduced = self.rebuild(kp, size, &result)?;
            for c in &result {
                self.unlink(*c);
            }
            reduced
        };

        if partition.at(kp).is_some() && reduced != FALSE {
            let saturated = self.sat(reduced, partition, interrupt, iterations)?;
            self.unlink(reduced);
            reduced = saturated;
        }

        self.cache_mut().insert(OpId::SatImage, p, mxd, CacheValue::Node(reduced));
        // `mxd` lives in the companion relation forest (`partition.rel`,
        // borrowed immutably), so only `p` and `reduced` take a cache-count
        // share in `self`.
        self.cache_link(p);
        self.cache_link(reduced);
        Ok(reduced)
    }

    fn rebuild(&mut self, level: u16, size: u32, edges: &[Handle]) -> EngineResult<Handle> {
        let mut temp = self.temp_node(level, size);
        for (i, &child) in edges.iter().enumerate() {
            self.set_edge(&mut temp, i as u32, child)?;
        }
        self.reduce(temp)
    }
}
