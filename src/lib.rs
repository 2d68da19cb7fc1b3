//! # satdd
//!
//! A decision-diagram core for symbolic state-space generation and
//! saturation over structured models (Petri nets, DTMCs/CTMCs).
//!
//! ## Overview
//!
//! The crate is layered the way a classical decision-diagram package
//! separates storage from operations from a front end:
//!
//! - **Storage**: [`node_store`] (the raw node arena), [`unique_table`]
//!   (hash-consing), and [`op_cache`] (binary-operation memoization) are the
//!   primitives everything else builds on.
//! - **Forest**: [`forest::Forest`] wraps those three into one typed handle
//!   space for a single variable order and [`forest::ReductionRule`]. The
//!   [`ops`] module adds union, intersection, image/pre-image, cardinality,
//!   dense-index conversion, and minterm/relation batch construction as
//!   methods on `Forest`. [`saturation`] adds the level-structured fixpoint
//!   algorithm that builds a reachable-state set from a partitioned
//!   next-state relation.
//! - **Front end**: [`builder_front`] adapts a model's event interface
//!   (explicit `enabled`/`fire`, or the Petri-net arc-logic evaluator in
//!   [`builder_front::PetriNet`]) into the minterm and relation batches the
//!   forest consumes. [`compact_states`] stores the resulting state vectors
//!   in a bit-packed encoding for space-efficient retrieval.
//!
//! [`explicit_mxd`] is a secondary, row-major matrix-diagram representation
//! for accumulating a relation incrementally from an explicit-generation
//! front end before it is lowered into a `Forest`.
//!
//! ## Example
//!
//! ```
//! use satdd::builder_front::{Arc, BuilderFront, PetriNet, Transition};
//! use satdd::config::EngineConfig;
//! use satdd::forest::{Forest, ReductionRule};
//! use satdd::saturation::Interrupt;
//!
//! struct NoInterrupt;
//! impl Interrupt for NoInterrupt {
//!     fn is_set(&self) -> bool {
//!         false
//!     }
//! }
//!
//! # fn main() -> Result<(), satdd::error::EngineError> {
//! // Two places, capacity 2 each; one transition moves a token p1 -> p2.
//! let mut net = PetriNet::new(vec![3, 3], vec![2, 0]);
//! net.add_transition(Transition {
//!     inputs: vec![Arc::new(0, 1)],
//!     inhibitors: vec![],
//!     outputs: vec![Arc::new(1, 1)],
//!     priority: 0,
//! });
//!
//! let mut sets = Forest::new(ReductionRule::MddSet, vec![3, 3], EngineConfig::default());
//! let front = BuilderFront::new(EngineConfig::default());
//! let report = front.generate(&net, &mut sets, None, &NoInterrupt)?;
//!
//! assert_eq!(sets.cardinality(report.reachable)?, num_bigint::BigUint::from(3u32));
//! sets.unlink(report.reachable);
//! # Ok(())
//! # }
//! ```

pub mod builder_front;
pub mod compact_states;
pub mod config;
pub mod error;
pub mod explicit_mxd;
pub mod forest;
pub mod node_store;
pub mod op_cache;
pub mod ops;
pub mod saturation;
pub mod unique_table;

// Re-export the public surface a front end drives day to day.
pub use builder_front::{BuildReport, BuilderFront, StateModel};
pub use compact_states::{CompactStates, Encoding, StateHandle};
pub use config::{EngineConfig, VanishingPolicy};
pub use error::{EngineError, EngineResult};
pub use explicit_mxd::{ExplicitHandle, ExplicitMatrixStore, MergeOutcome};
pub use forest::{Forest, ReductionRule};
pub use node_store::{Handle, FALSE, TRUE};
pub use op_cache::OpId;
pub use saturation::{Interrupt, Partition};
