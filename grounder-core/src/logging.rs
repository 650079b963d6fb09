//! Tracing setup for the grounder
//!
//! A single `RUST_LOG`-driven subscriber, in the style of this lineage's
//! `monitoring::tracing_setup` but trimmed to what a library (not a
//! server) needs: one initializer, no JSON/OTLP fan-out.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize a process-global `tracing` subscriber using `RUST_LOG`,
/// defaulting to `info` when unset. Safe to call more than once; the
/// second and later calls are no-ops (tracing-subscriber's global
/// default can only be set once per process).
pub fn init() {
    init_with_default_level("info");
}

/// Like [`init`], but with an explicit fallback level for when
/// `RUST_LOG` is not set.
pub fn init_with_default_level(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init();
}
