//! Error types for the decision-diagram core
//!
//! This module provides error types organized by source and operation, the
//! same way the rest of the engine is organized: each component that can
//! fail has its own source-level enum, and the handful of fallible
//! operations exposed to a front-end compose those into a wrapper enum
//! that names exactly the errors that operation can produce.

use std::fmt;

/// Errors raised by [`NodeStore`](crate::node_store::NodeStore) allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeStoreError {
    /// Both the address table and the byte buffer refused to grow further.
    OutOfMemory {
        /// Bytes requested at the time of failure.
        requested_bytes: usize,
        /// Configured ceiling that was hit.
        ceiling_bytes: usize,
    },
}

impl fmt::Display for NodeStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStoreError::OutOfMemory {
                requested_bytes,
                ceiling_bytes,
            } => write!(
                f,
                "node store out of memory: requested {} bytes, ceiling is {} bytes",
                requested_bytes, ceiling_bytes
            ),
        }
    }
}

impl std::error::Error for NodeStoreError {}

/// Errors raised while driving a [`Forest`](crate::forest::Forest).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForestError {
    /// An operation received handles from two different forests.
    MismatchedForest {
        /// The forest id the operation expected.
        expected: u64,
        /// The forest id actually observed on one of the operands.
        found: u64,
    },
    /// An edge argument referred to a level at or above its parent's level.
    IllegalEdgeLevel {
        /// Level of the node the edge was being attached to.
        parent_level: u16,
        /// Level of the child the caller tried to attach.
        child_level: u16,
    },
    /// An internal invariant was violated; the forest must be treated as
    /// unusable from this point on.
    Internal {
        /// Human-readable description of the violated invariant.
        detail: String,
    },
}

impl fmt::Display for ForestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForestError::MismatchedForest { expected, found } => write!(
                f,
                "handle belongs to forest {} but forest {} was expected",
                found, expected
            ),
            ForestError::IllegalEdgeLevel {
                parent_level,
                child_level,
            } => write!(
                f,
                "edge from level {} points to level {}, which is not strictly lower",
                parent_level, child_level
            ),
            ForestError::Internal { detail } => write!(f, "internal invariant violated: {}", detail),
        }
    }
}

impl std::error::Error for ForestError {}

/// Errors raised by [`Saturation`](crate::saturation) and `RecFire`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaturationError {
    /// Saturation was invoked without a partitioned next-state relation.
    PartitionMissing,
    /// The operation was cancelled via the cooperative interrupt flag.
    Interrupted,
}

impl fmt::Display for SaturationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaturationError::PartitionMissing => {
                write!(f, "saturation invoked with no partitioned relation")
            }
            SaturationError::Interrupted => write!(f, "operation interrupted"),
        }
    }
}

impl std::error::Error for SaturationError {}

/// Snapshot of engine progress, attached to fatal errors so a front-end can
/// still report partial results: states generated so far and peak node
/// count observed before the failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialStats {
    /// Number of distinct states discovered before the failure.
    pub states_generated: u64,
    /// Largest live node count observed in the forest before the failure.
    pub peak_node_count: u64,
}

/// Top-level error returned by engine operations.
///
/// This is the error every public entry point ultimately returns; it is
/// assembled from the source-level enums above the same way a
/// `MinimizationError` is assembled from `InstanceError`/`CubeError`/`io::Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A node store could not satisfy an allocation.
    OutOfMemory(NodeStoreError),
    /// A cooperative cancellation was observed.
    Interrupted,
    /// Saturation was invoked without a partitioned relation.
    PartitionMissing,
    /// Caller passed handles/arguments that don't belong together.
    IllegalArgument(String),
    /// An internal invariant was violated; the forest is no longer usable.
    Internal {
        /// Description of what was violated.
        detail: String,
        /// Best-effort progress snapshot at the time of failure.
        stats: PartialStats,
    },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::OutOfMemory(e) => write!(f, "out of memory: {}", e),
            EngineError::Interrupted => write!(f, "interrupted"),
            EngineError::PartitionMissing => write!(f, "partitioned relation missing"),
            EngineError::IllegalArgument(msg) => write!(f, "illegal argument: {}", msg),
            EngineError::Internal { detail, stats } => write!(
                f,
                "internal error: {} (states generated: {}, peak nodes: {})",
                detail, stats.states_generated, stats.peak_node_count
            ),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::OutOfMemory(e) => Some(e),
            _ => None,
        }
    }
}

impl From<NodeStoreError> for EngineError {
    fn from(err: NodeStoreError) -> Self {
        EngineError::OutOfMemory(err)
    }
}

impl From<SaturationError> for EngineError {
    fn from(err: SaturationError) -> Self {
        match err {
            SaturationError::PartitionMissing => EngineError::PartitionMissing,
            SaturationError::Interrupted => EngineError::Interrupted,
        }
    }
}

impl From<ForestError> for EngineError {
    fn from(err: ForestError) -> Self {
        match err {
            ForestError::MismatchedForest { expected, found } => EngineError::IllegalArgument(
                format!("handle belongs to forest {} but forest {} was expected", found, expected),
            ),
            ForestError::IllegalEdgeLevel { .. } => EngineError::Internal {
                detail: err.to_string(),
                stats: PartialStats::default(),
            },
            ForestError::Internal { detail } => EngineError::Internal {
                detail,
                stats: PartialStats::default(),
            },
        }
    }
}

/// Result alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn node_store_out_of_memory_message() {
        let err = NodeStoreError::OutOfMemory {
            requested_bytes: 4096,
            ceiling_bytes: 2048,
        };
        let msg = err.to_string();
        assert!(msg.contains("4096"));
        assert!(msg.contains("2048"));
    }

    #[test]
    fn forest_error_mismatched_forest_display() {
        let err = ForestError::MismatchedForest {
            expected: 1,
            found: 2,
        };
        assert!(err.to_string().contains("forest 2"));
        assert!(err.to_string().contains("forest 1 was expected"));
    }

    #[test]
    fn engine_error_from_node_store_error_is_out_of_memory() {
        let inner = NodeStoreError::OutOfMemory {
            requested_bytes: 8,
            ceiling_bytes: 4,
        };
        let engine_err: EngineError = inner.into();
        assert!(matches!(engine_err, EngineError::OutOfMemory(_)));
        assert!(engine_err.source().is_some());
    }

    #[test]
    fn engine_error_from_saturation_error_partition_missing() {
        let err: EngineError = SaturationError::PartitionMissing.into();
        assert_eq!(err, EngineError::PartitionMissing);
    }

    #[test]
    fn engine_error_from_saturation_error_interrupted() {
        let err: EngineError = SaturationError::Interrupted.into();
        assert_eq!(err, EngineError::Interrupted);
    }

    #[test]
    fn engine_error_from_forest_error_illegal_edge_level_is_internal() {
        let err: EngineError = ForestError::IllegalEdgeLevel {
            parent_level: 3,
            child_level: 5,
        }
        .into();
        assert!(matches!(err, EngineError::Internal { .. }));
    }

    #[test]
    fn engine_error_internal_display_includes_stats() {
        let err = EngineError::Internal {
            detail: "bad refcount".to_string(),
            stats: PartialStats {
                states_generated: 42,
                peak_node_count: 7,
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("bad refcount"));
        assert!(msg.contains("42"));
        assert!(msg.contains("7"));
    }
}
