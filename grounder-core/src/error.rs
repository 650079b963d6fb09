//! Error types for the grounder

use thiserror::Error;

/// Main error type for grounding operations
#[derive(Error, Debug)]
pub enum GrounderError {
    /// A rule, predicate, or function reference was malformed, detected
    /// while building a [`crate::api::GrounderHandle`].
    ///
    /// This is always a setup-time, fatal error: the grounder never fails
    /// at runtime (see [`GrounderError::Capacity`]).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A perfect-hash rank overflowed the addressable range implied by
    /// `object count * parameter count`.
    #[error("capacity error: {0}")]
    Capacity(String),

    /// The configured iteration cap was exceeded before a fixpoint was
    /// reached -- a misconfigured or non-terminating program, not a
    /// normal stopping point. Carries no partial fact set; a caller that
    /// wants a graceful, resumable stop should request cancellation via
    /// [`crate::api::ground_cancellable`] instead, which returns a
    /// [`crate::api::GroundingOutcome`] with `complete: false`.
    #[error("grounding cancelled after {iterations} iterations")]
    Cancelled {
        /// Number of completed scheduler iterations before cancellation.
        iterations: usize,
    },

    /// Program description could not be parsed from the configuration
    /// format handed to the CLI / test harness.
    #[error("program description error: {0}")]
    ProgramDescription(#[from] serde_json::Error),

    /// I/O failure loading a program description or writing output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for grounder operations
pub type Result<T> = std::result::Result<T, GrounderError>;

impl GrounderError {
    /// Construct a [`GrounderError::Configuration`] error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        GrounderError::Configuration(msg.into())
    }

    /// Construct a [`GrounderError::Capacity`] error.
    pub fn capacity(msg: impl Into<String>) -> Self {
        GrounderError::Capacity(msg.into())
    }
}
