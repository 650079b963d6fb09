//! Lifted-program grounding
//!
//! Submodules mirror the components of the design: [`formalism`] is the
//! data model, [`program`] assembles it into a checked [`program::Program`],
//! [`domains`] through [`scheduler`] implement analysis/enumeration/
//! evaluation, and [`context`] is the per-iteration evaluation context the
//! others close over.

pub mod assignment;
pub mod consistency_graph;
pub mod context;
pub mod description;
pub mod domains;
pub mod facts;
pub mod formalism;
pub mod kpkc;
pub mod program;
pub mod scheduler;
pub mod stratify;
pub mod worker;
