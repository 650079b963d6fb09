//! Grounder configuration

use serde::{Deserialize, Serialize};

/// Tunables for a grounding run.
///
/// Mirrors the shape of an engine config in this lineage: a plain,
/// serde-deserializable struct with a sane [`Default`], rather than a
/// builder with a dozen setters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrounderConfig {
    /// Run rule dispatch within a stratum across a rayon thread pool.
    /// Disable to force fully sequential evaluation (useful for
    /// reproducing an issue without cross-thread interleaving).
    pub parallel: bool,

    /// Soft iteration cap per stratum used only to detect a runaway
    /// configuration during development; the algorithm always reaches a
    /// real fixpoint (fact sets are finite and monotone) so this should
    /// never trigger on a correct program. When it does trigger, the
    /// driver stops and reports [`crate::error::GrounderError::Cancelled`].
    pub max_iterations_per_stratum: usize,

    /// Poll the cancellation flag between worker dispatches, not only at
    /// stratum boundaries. Slightly more overhead, finer cancellation
    /// granularity.
    pub fine_grained_cancellation: bool,
}

impl Default for GrounderConfig {
    fn default() -> Self {
        GrounderConfig {
            parallel: true,
            max_iterations_per_stratum: 1_000_000,
            fine_grained_cancellation: false,
        }
    }
}
