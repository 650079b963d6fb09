//! grounder-core - semi-naive grounding engine for lifted planning programs
//!
//! Takes a lifted program (typed objects, predicates/functions tagged by
//! stratum, conjunctive-condition rules) and produces the set of ground
//! atoms/ground rules reachable by repeated rule application, evaluated
//! stratum by stratum with delta-driven semi-naive iteration so that each
//! round only re-derives consequences of facts new since the previous
//! round.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod api;
pub mod bitset;
pub mod config;
pub mod error;
pub mod grounding;
pub mod logging;
pub mod object;
pub mod repository;

pub use api::{
    build, ground, ground_cancellable, ground_with_listener, GrounderHandle, GroundingListener,
    GroundingOutcome,
};
pub use config::GrounderConfig;
pub use error::{GrounderError, Result};
pub use grounding::description::ProgramDescription;
pub use grounding::formalism::{
    Atom, BooleanOperator, ConjunctiveCondition, FunctionExpression, FunctionSymbol, GroundAtom,
    GroundRule, Literal, NumericConstraint, Rule, Stratum, Term,
};
pub use grounding::program::Program;
pub use object::{Object, ObjectTable};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
