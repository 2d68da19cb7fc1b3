//! Engine-wide configuration options.
//!
//! A plain struct with a conservative [`Default`], constructed once and
//! passed by reference to the components that need it.

/// How `BuilderFront` resolves vanishing markings during explicit
/// generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VanishingPolicy {
    /// Don't distinguish tangible/vanishing; generate the full reachable
    /// set as-is. Correct whenever no marking is ever vanishing.
    #[default]
    Ignore,
    /// Resolve a vanishing marking by firing only its highest-priority
    /// enabled event(s), matching SPN vanishing-state semantics.
    HighestPriority,
}

/// Engine-wide configuration, covering both the DD core and `BuilderFront`.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Max minterms per batch accumulation.
    ///
    /// **Default:** `256`
    pub batch_size: usize,

    /// When `BuilderFront` sees an unexplored state whose highest differing
    /// level exceeds this, flush the current batch.
    ///
    /// **Default:** `0` (flush on every level change)
    pub level_change_flush: u16,

    /// When removing unexplored states in batch, refill to the maximum
    /// batch size rather than taking whatever is currently available.
    ///
    /// **Default:** `true`
    pub maximize_batch_refill: bool,

    /// Build with quasi-reduced MxD, converting to identity-reduced only at
    /// the end of construction.
    ///
    /// **Default:** `true` (recommended; simplifies batch accumulation)
    pub use_quasi_reduced_during_build: bool,

    /// Fraction of nonzero entries below which a node prefers sparse
    /// storage over full storage.
    ///
    /// **Default:** `0.5`
    pub reduction_threshold_sparse: f64,

    /// Fraction of wasted bytes in the node store above which a
    /// compaction pass is triggered.
    ///
    /// **Default:** `0.25`
    pub compaction_threshold: f64,

    /// How `BuilderFront` resolves vanishing markings.
    ///
    /// **Default:** [`VanishingPolicy::Ignore`]
    pub vanishing_policy: VanishingPolicy,

    /// Number of outer saturation-loop iterations between polls of the
    /// cooperative interrupt flag. Polling every iteration has measurable
    /// overhead on tall variable orders.
    ///
    /// **Default:** `64`
    pub interrupt_check_interval: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            batch_size: 256,
            level_change_flush: 0,
            maximize_batch_refill: true,
            use_quasi_reduced_during_build: true,
            reduction_threshold_sparse: 0.5,
            compaction_threshold: 0.25,
            vanishing_policy: VanishingPolicy::Ignore,
            interrupt_check_interval: 64,
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.batch_size, 256);
        assert_eq!(cfg.level_change_flush, 0);
        assert!(cfg.maximize_batch_refill);
        assert!(cfg.use_quasi_reduced_during_build);
        assert_eq!(cfg.reduction_threshold_sparse, 0.5);
        assert_eq!(cfg.compaction_threshold, 0.25);
        assert_eq!(cfg.vanishing_policy, VanishingPolicy::Ignore);
        assert_eq!(cfg.interrupt_check_interval, 64);
    }

    #[test]
    fn new_is_default() {
        assert_eq!(EngineConfig::new(), EngineConfig::default());
    }
}
