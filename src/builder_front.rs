//! Adapts a model's event interface into minterm batches and relation
//! edges the `Forest` can consume.
//!
//! Two construction modes:
//! - **Explicit generation** ([`BuilderFront::generate`]): a breadth-first
//!   worklist over concrete state vectors, batching newly discovered
//!   states into minterm unions and `(from, to)` pairs into a relation
//!   accumulator, flushed by size or by a level-change heuristic
//!   (`BatchSize`/`LevelChangeFlush`/`MaximizeBatchRefill`).
//! - **Symbolic construction** ([`PetriNet`]): a small evaluator over
//!   input/inhibitor/output arcs that computes `enabled`/`fire` directly
//!   from a transition's arc list rather than firing a hand-written
//!   closure per transition, mirroring the "small capability interface"
//!   small-capability-interface duck typing a state model can satisfy
//!   without any direct dependency on `Forest` internals.

use std::collections::{HashSet, VecDeque};

use crate::config::{EngineConfig, VanishingPolicy};
use crate::error::EngineResult;
use crate::forest::Forest;
use crate::node_store::{Handle, FALSE};
use crate::ops::relation::quasi_to_identity;
use crate::saturation::Interrupt;

/// The capability interface a front-end model exposes to `BuilderFront`:
/// level structure, initial state, and per-event enabling/firing logic.
pub trait StateModel {
    fn num_levels(&self) -> usize;
    fn level_bound(&self, level: u16) -> u32;
    fn initial_state(&self) -> Vec<u32>;
    fn num_events(&self) -> usize;
    fn enabled(&self, event: usize, state: &[u32]) -> bool;
    fn fire(&self, event: usize, state: &[u32]) -> Vec<u32>;

    /// Whether `state` is a transient (vanishing) marking. Defaults to
    /// `false`, appropriate for any model with no vanishing markings.
    fn is_vanishing(&self, _state: &[u32]) -> bool {
        false
    }

    /// Priority of an event, used only while resolving a vanishing marking
    /// under [`VanishingPolicy::HighestPriority`]. Defaults to `0` for every
    /// event, which is a no-op tie when `HighestPriority` is never selected.
    fn priority(&self, _event: usize) -> u32 {
        0
    }
}

/// Outcome of an explicit-generation run.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Reachable-set handle, already linked once on the caller's behalf.
    pub reachable: Handle,
    /// Relation handle, if a relation forest was supplied, linked once.
    pub relation: Option<Handle>,
    pub states_generated: u64,
    pub peak_frontier: usize,
    /// Tangible states with no enabled event, reported as a statistic
    /// rather than an error.
    pub deadlock_states: Vec<Vec<u32>>,
}

/// Explicit-generation batch driver.
pub struct BuilderFront {
    config: EngineConfig,
}

impl BuilderFront {
    pub fn new(config: EngineConfig) -> Self {
        BuilderFront { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs breadth-first explicit generation over `model`, accumulating
    /// the reachable tangible set into `sets` and, if `relation` is given,
    /// the next-state relation into it too: state-space-only when
    /// `relation` is `None`, state-space-plus-relation otherwise.
    ///
    /// `relation`, if present, must be an identity-reduced forest; when
    /// [`EngineConfig::use_quasi_reduced_during_build`] is set the relation
    /// is accumulated in a scratch quasi-reduced forest first and converted
    /// to identity-reduced once generation completes.
    pub fn generate(
        &self,
        model: &dyn StateModel,
        sets: &mut Forest,
        mut relation: Option<&mut Forest>,
        interrupt: &impl Interrupt,
    ) -> EngineResult<BuildReport> {
        let num_levels = model.num_levels();
        let bounds: Vec<u32> = (1..=num_levels as u16).map(|k| model.level_bound(k)).collect();

        let mut scratch_relation = if relation.is_some() && self.config.use_quasi_reduced_during_build {
            Some(Forest::new(
                crate::forest::ReductionRule::MxdQuasi,
                bounds.clone(),
                self.config.clone(),
            ))
        } else {
            None
        };

        let initial = model.initial_state();
        debug_assert_eq!(initial.len(), num_levels);

        let mut explored: HashSet<Vec<u32>> = HashSet::new();
        explored.insert(initial.clone());
        let mut frontier: VecDeque<Vec<u32>> = VecDeque::new();
        frontier.push_back(initial.clone());

        let mut pending_states: Vec<Vec<u32>> = vec![initial];
        let mut pending_edges: Vec<(Vec<u32>, Vec<u32>)> = Vec::new();
        let mut deadlocks: Vec<Vec<u32>> = Vec::new();

        let mut reachable = FALSE;
        sets.link(reachable);
        let mut relation_handle = relation.as_ref().map(|_| FALSE);
        if let Some(h) = relation_handle {
            if let Some(r) = relation.as_deref_mut() {
                r.link(h);
            }
        }

        let mut last_state: Option<Vec<u32>> = None;
        let mut states_generated: u64 = 0;
        let mut peak_frontier: usize = frontier.len();
        let mut poll_counter: usize = 0;

        while let Some(state) = frontier.pop_front() {
            poll_counter += 1;
            if poll_counter % self.config.interrupt_check_interval.max(1) == 0 && interrupt.is_set() {
                log::debug!("BuilderFront::generate interrupted after {states_generated} states");
                return Err(crate::error::EngineError::Interrupted);
            }
            states_generated += 1;
            peak_frontier = peak_frontier.max(frontier.len());

            let vanishing = self.config.vanishing_policy == VanishingPolicy::HighestPriority && model.is_vanishing(&state);

            let enabled_events: Vec<usize> = (0..model.num_events()).filter(|&e| model.enabled(e, &state)).collect();

            let events_to_fire: Vec<usize> = if vanishing && !enabled_events.is_empty() {
                let top = enabled_events.iter().map(|&e| model.priority(e)).max().unwrap();
                enabled_events.iter().copied().filter(|&e| model.priority(e) == top).collect()
            } else {
                enabled_events.clone()
            };

            if !vanishing {
                if enabled_events.is_empty() {
                    deadlocks.push(state.clone());
                }
            }

            for event in events_to_fire {
                let next = model.fire(event, &state);
                debug_assert_eq!(next.len(), num_levels);
                if relation.is_some() {
                    pending_edges.push((state.clone(), next.clone()));
                }
                if explored.insert(next.clone()) {
                    frontier.push_back(next);
                }
            }

            let flush_size = pending_states.len() >= self.config.batch_size;
            let flush_level = last_state
                .as_ref()
                .and_then(|prev| highest_differing_level(prev, &state))
                .map(|lvl| lvl > self.config.level_change_flush)
                .unwrap_or(false);
            let flush_starved = !self.config.maximize_batch_refill && frontier.is_empty();

            if !vanishing {
                // Nothing to add for a vanishing state, but the flush
                // heuristics below still look at the newly popped state's
                // level to decide whether to drain what's pending.
            }

            if flush_size || flush_level || flush_starved {
                self.flush(
                    sets,
                    &mut reachable,
                    &mut pending_states,
                    scratch_relation.as_mut().or(relation.as_deref_mut()),
                    &mut relation_handle,
                    &mut pending_edges,
                )?;
            }

            last_state = Some(state);
        }

        self.flush(
            sets,
            &mut reachable,
            &mut pending_states,
            scratch_relation.as_mut().or(relation.as_deref_mut()),
            &mut relation_handle,
            &mut pending_edges,
        )?;

        let final_relation = match (relation.as_deref_mut(), scratch_relation, relation_handle) {
            (Some(identity_forest), Some(mut quasi_forest), Some(qh)) => {
                let ih = quasi_to_identity(&quasi_forest, qh, identity_forest)?;
                quasi_forest.unlink(qh);
                Some(ih)
            }
            (Some(_), None, Some(rh)) => Some(rh),
            _ => None,
        };

        log::debug!(
            "BuilderFront::generate finished: {states_generated} states, peak frontier {peak_frontier}, {} deadlocks",
            deadlocks.len()
        );

        Ok(BuildReport {
            reachable,
            relation: final_relation,
            states_generated,
            peak_frontier,
            deadlock_states: deadlocks,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn flush(
        &self,
        sets: &mut Forest,
        reachable: &mut Handle,
        pending_states: &mut Vec<Vec<u32>>,
        relation: Option<&mut Forest>,
        relation_handle: &mut Option<Handle>,
        pending_edges: &mut Vec<(Vec<u32>, Vec<u32>)>,
    ) -> EngineResult<()> {
        if !pending_states.is_empty() {
            let batch = sets.build_batch(pending_states)?;
            let merged = sets.union(*reachable, batch)?;
            sets.unlink(*reachable);
            sets.unlink(batch);
            *reachable = merged;
            log::debug!("BuilderFront flushed {} states", pending_states.len());
            pending_states.clear();
        }
        if let Some(rel) = relation {
            if !pending_edges.is_empty() {
                let batch = rel.build_relation_batch(pending_edges)?;
                if let Some(h) = relation_handle {
                    let merged = rel.union(*h, batch)?;
                    rel.unlink(*h);
                    rel.unlink(batch);
                    *h = merged;
                } else {
                    *relation_handle = Some(batch);
                }
                pending_edges.clear();
            }
        }
        Ok(())
    }
}

/// Highest (most significant, i.e. largest index) level at which `a` and
/// `b` differ, 1-indexed. `None` if the vectors are identical.
fn highest_differing_level(a: &[u32], b: &[u32]) -> Option<u16> {
    a.iter()
        .zip(b.iter())
        .enumerate()
        .filter(|(_, (x, y))| x != y)
        .map(|(i, _)| (i + 1) as u16)
        .max()
}

/// One weighted arc: `place`'s index into the state vector and the arc's
/// token cardinality.
#[derive(Debug, Clone, Copy)]
pub struct Arc {
    pub place: usize,
    pub cardinality: u32,
}

impl Arc {
    pub fn new(place: usize, cardinality: u32) -> Self {
        Arc { place, cardinality }
    }
}

/// A Petri-net transition's enabling and firing logic, expressed directly
/// as arc lists rather than a general boolean-expression tree: conjoin
/// `place_token_count >= input_card` over inputs, `place_token_count <
/// inhibitor_card` over inhibitors, and form the next state as
/// `place - input_card + output_card`.
#[derive(Debug, Clone, Default)]
pub struct Transition {
    pub inputs: Vec<Arc>,
    pub inhibitors: Vec<Arc>,
    pub outputs: Vec<Arc>,
    pub priority: u32,
}

impl Transition {
    fn is_enabled(&self, state: &[u32]) -> bool {
        self.inputs.iter().all(|a| state[a.place] >= a.cardinality)
            && self.inhibitors.iter().all(|a| state[a.place] < a.cardinality)
    }

    fn fire_into(&self, state: &[u32]) -> Vec<u32> {
        let mut next = state.to_vec();
        for a in &self.inputs {
            next[a.place] -= a.cardinality;
        }
        for a in &self.outputs {
            next[a.place] += a.cardinality;
        }
        next
    }
}

/// A place/transition net evaluated directly against concrete markings,
/// the symbolic-construction counterpart of explicit generation. Implements
/// [`StateModel`] so the same [`BuilderFront::generate`] drives both modes.
#[derive(Debug, Clone)]
pub struct PetriNet {
    pub place_bounds: Vec<u32>,
    pub initial_marking: Vec<u32>,
    pub transitions: Vec<Transition>,
}

impl PetriNet {
    pub fn new(place_bounds: Vec<u32>, initial_marking: Vec<u32>) -> Self {
        debug_assert_eq!(place_bounds.len(), initial_marking.len());
        PetriNet {
            place_bounds,
            initial_marking,
            transitions: Vec::new(),
        }
    }

    pub fn add_transition(&mut self, transition: Transition) -> &mut Self {
        self.transitions.push(transition);
        self
    }
}

impl StateModel for PetriNet {
    fn num_levels(&self) -> usize {
        self.place_bounds.len()
    }

    fn level_bound(&self, level: u16) -> u32 {
        self.place_bounds[(level - 1) as usize]
    }

    fn initial_state(&self) -> Vec<u32> {
        self.initial_marking.clone()
    }

    fn num_events(&self) -> usize {
        self.transitions.len()
    }

    fn enabled(&self, event: usize, state: &[u32]) -> bool {
        self.transitions[event].is_enabled(state)
    }

    fn fire(&self, event: usize, state: &[u32]) -> Vec<u32> {
        self.transitions[event].fire_into(state)
    }

    fn priority(&self, event: usize) -> u32 {
        self.transitions[event].priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::forest::ReductionRule;

    struct NeverInterrupt;
    impl Interrupt for NeverInterrupt {
        fn is_set(&self) -> bool {
            false
        }
    }

    /// Two places, capacity 2 each, one transition moving a token from
    /// `p1` to `p2`. Expected reachable set: the three markings with
    /// `p1 + p2 == 2`.
    #[test]
    fn two_place_capacity_two_net_reaches_expected_markings() {
        let mut net = PetriNet::new(vec![3, 3], vec![2, 0]);
        net.add_transition(Transition {
            inputs: vec![Arc::new(0, 1)],
            inhibitors: vec![],
            outputs: vec![Arc::new(1, 1)],
            priority: 0,
        });

        let mut sets = Forest::new(ReductionRule::MddSet, vec![3, 3], EngineConfig::default());
        let front = BuilderFront::new(EngineConfig::default());
        let report = front.generate(&net, &mut sets, None, &NeverInterrupt).unwrap();

        let mut states = sets.handle_to_minterm_iter(report.reachable).unwrap();
        states.sort();
        assert_eq!(states, vec![vec![0, 2], vec![1, 1], vec![2, 0]]);
        assert!(report.deadlock_states.contains(&vec![0, 2]));
        sets.unlink(report.reachable);
    }

    /// Inhibitor gate. Places `a, b` bound 2; transition `t`: input
    /// `a >= 1`, inhibitor `b < 1`, output `b + 1`. Initial `(2, 0)`.
    /// Expected reachable: `{(2,0), (1,1)}`.
    #[test]
    fn inhibitor_gate_net_stops_after_one_firing() {
        let mut net = PetriNet::new(vec![3, 3], vec![2, 0]);
        net.add_transition(Transition {
            inputs: vec![Arc::new(0, 1)],
            inhibitors: vec![Arc::new(1, 1)],
            outputs: vec![Arc::new(1, 1)],
            priority: 0,
        });

        let mut sets = Forest::new(ReductionRule::MddSet, vec![3, 3], EngineConfig::default());
        let front = BuilderFront::new(EngineConfig::default());
        let report = front.generate(&net, &mut sets, None, &NeverInterrupt).unwrap();

        let mut states = sets.handle_to_minterm_iter(report.reachable).unwrap();
        states.sort();
        assert_eq!(states, vec![vec![1, 1], vec![2, 0]]);
        sets.unlink(report.reachable);
    }

    /// An empty batch (no states ever inserted) must saturate to
    /// terminal-0. `BuilderFront` always seeds with at least the initial
    /// state, so this exercises the same boundary directly through
    /// `Forest::build_batch`, the primitive `generate` is built on.
    #[test]
    fn empty_batch_is_terminal_zero() {
        let mut sets = Forest::new(ReductionRule::MddSet, vec![2], EngineConfig::default());
        let h = sets.build_batch(&[]).unwrap();
        assert_eq!(h, FALSE);
        assert_eq!(sets.cardinality(h).unwrap(), num_bigint::BigUint::from(0u32));
    }

    #[test]
    fn generation_also_builds_matching_relation_when_requested() {
        let mut net = PetriNet::new(vec![3, 3], vec![2, 0]);
        net.add_transition(Transition {
            inputs: vec![Arc::new(0, 1)],
            inhibitors: vec![],
            outputs: vec![Arc::new(1, 1)],
            priority: 0,
        });

        let mut sets = Forest::new(ReductionRule::MddSet, vec![3, 3], EngineConfig::default());
        let mut rel = Forest::new(ReductionRule::MxdIdentity, vec![3, 3], EngineConfig::default());
        let front = BuilderFront::new(EngineConfig::default());
        let report = front.generate(&net, &mut sets, Some(&mut rel), &NeverInterrupt).unwrap();

        let rel_handle = report.relation.expect("relation requested");
        let mut pairs = rel.relation_pairs_identity(rel_handle).unwrap();
        pairs.sort();
        assert_eq!(pairs, vec![(vec![1, 1], vec![0, 2]), (vec![2, 0], vec![1, 1])]);

        sets.unlink(report.reachable);
        rel.unlink(rel_handle);
    }

    #[test]
    fn deadlock_set_reports_states_with_no_enabled_event() {
        let net = PetriNet::new(vec![2], vec![0]); // no transitions at all
        let mut sets = Forest::new(ReductionRule::MddSet, vec![2], EngineConfig::default());
        let front = BuilderFront::new(EngineConfig::default());
        let report = front.generate(&net, &mut sets, None, &NeverInterrupt).unwrap();
        assert_eq!(report.deadlock_states, vec![vec![0]]);
        sets.unlink(report.reachable);
    }

    /// Producer-consumer, places `produced, consumed` bound 4 each.
    /// `produce` is inhibited once `produced` reaches the capacity cap (an
    /// inhibitor arc on the place being produced into is how this family of
    /// models expresses a capacity bound, since there is no separate "place
    /// capacity" concept in the arc-logic evaluator); `consume` likewise is
    /// inhibited once `consumed` is full. Expected reachable set size under
    /// a capacity cap of 3 each: 16.
    #[test]
    fn producer_consumer_capacity_three_reaches_sixteen_states() {
        const PRODUCED: usize = 0;
        const CONSUMED: usize = 1;
        let mut net = PetriNet::new(vec![4, 4], vec![0, 0]);
        net.add_transition(Transition {
            inputs: vec![],
            inhibitors: vec![Arc::new(PRODUCED, 3)],
            outputs: vec![Arc::new(PRODUCED, 1)],
            priority: 0,
        });
        net.add_transition(Transition {
            inputs: vec![Arc::new(PRODUCED, 1)],
            inhibitors: vec![Arc::new(CONSUMED, 3)],
            outputs: vec![Arc::new(CONSUMED, 1)],
            priority: 0,
        });

        let mut sets = Forest::new(ReductionRule::MddSet, vec![4, 4], EngineConfig::default());
        let front = BuilderFront::new(EngineConfig::default());
        let report = front.generate(&net, &mut sets, None, &NeverInterrupt).unwrap();

        assert_eq!(sets.cardinality(report.reachable).unwrap(), num_bigint::BigUint::from(16u32));
        let states = sets.handle_to_minterm_iter(report.reachable).unwrap();
        assert!(states.iter().all(|s| s[PRODUCED] <= 3 && s[CONSUMED] <= 3));
        sets.unlink(report.reachable);
    }

    /// A chain of `K = 10` binary variables. An `init` event sets
    /// `x_1 = 1` from the all-zero state; event `k` (for `k = 2..=10`)
    /// requires `x_{k-1} = 1, x_k = 0` and sets `x_k = 1`.
    /// ("Flips" here is one-way: once set, a variable is never cleared
    /// again, which is what makes the reachable set exactly the 11
    /// "1-prefix" markings rather than the full `2^10` hypercube.)
    /// Expected reachable set: all vectors whose 1-positions form a prefix,
    /// 11 states total.
    #[test]
    fn chain_of_ten_binary_variables_reaches_prefix_states_only() {
        const K: usize = 10;
        let mut net = PetriNet::new(vec![2; K], vec![0; K]);
        // init: enabled only when every variable is 0; sets x_1 = 1.
        net.add_transition(Transition {
            inputs: vec![],
            inhibitors: (0..K).map(|i| Arc::new(i, 1)).collect(),
            outputs: vec![Arc::new(0, 1)],
            priority: 0,
        });
        // event k (1-indexed k=2..=10, 0-indexed i=1..=9): x_{i-1}=1, x_i=0 -> x_i=1.
        for i in 1..K {
            net.add_transition(Transition {
                inputs: vec![Arc::new(i - 1, 1)],
                inhibitors: vec![Arc::new(i, 1)],
                outputs: vec![Arc::new(i, 1)],
                priority: 0,
            });
        }

        let mut sets = Forest::new(ReductionRule::MddSet, vec![2; K], EngineConfig::default());
        let front = BuilderFront::new(EngineConfig::default());
        let report = front.generate(&net, &mut sets, None, &NeverInterrupt).unwrap();

        assert_eq!(sets.cardinality(report.reachable).unwrap(), num_bigint::BigUint::from(11u32));
        let mut states = sets.handle_to_minterm_iter(report.reachable).unwrap();
        states.sort();
        let expected: Vec<Vec<u32>> = (0..=K)
            .map(|ones| (0..K).map(|i| if i < ones { 1 } else { 0 }).collect())
            .collect();
        assert_eq!(states, expected, "every reachable state must be a 1-prefix marking");
        sets.unlink(report.reachable);
    }
}
