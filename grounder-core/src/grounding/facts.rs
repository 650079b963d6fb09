//! Component C: fact sets
//!
//! A [`FactSet`] holds the ground atoms and ground-function-term values
//! known at a point in the run. It is created from an initial
//! [`FactSource`], mutated only by [`crate::grounding::scheduler`]
//! between iterations, and read by [`crate::grounding::worker`] during
//! an iteration; fact sets never shrink over the life of a grounding
//! run.

use ahash::AHashMap;

use crate::object::Object;

use super::formalism::{FunctionId, GroundAtom, GroundFunctionTerm, PredicateId};

/// Anything that can supply the initial ground atoms and function
/// values a grounding run starts from.
pub trait FactSource {
    fn ground_atoms(&self) -> Box<dyn Iterator<Item = &GroundAtom> + '_>;
    fn function_values(&self) -> Box<dyn Iterator<Item = (&GroundFunctionTerm, f64)> + '_>;
}

/// An in-memory, append-only collection of ground atoms and
/// ground-function-term values, keyed by predicate/function for O(1)
/// membership and value lookup.
#[derive(Debug, Clone, Default)]
pub struct FactSet {
    predicate_args: Vec<AHashMap<Vec<Object>, ()>>,
    function_values: Vec<AHashMap<Vec<Object>, f64>>,
}

impl FactSet {
    /// An empty fact set sized for `predicate_count` predicates and
    /// `function_count` functions.
    pub fn new(predicate_count: usize, function_count: usize) -> Self {
        FactSet {
            predicate_args: (0..predicate_count).map(|_| AHashMap::default()).collect(),
            function_values: (0..function_count).map(|_| AHashMap::default()).collect(),
        }
    }

    /// Loads every atom/value from `source`. Returns the set of
    /// predicates that received at least one ground atom, for the
    /// caller to seed the initial scheduler work set from.
    pub fn load(&mut self, source: &dyn FactSource) -> Vec<PredicateId> {
        let mut touched = Vec::new();
        for atom in source.ground_atoms() {
            if self.insert_atom(atom.predicate, atom.args.clone()) && !touched.contains(&atom.predicate) {
                touched.push(atom.predicate);
            }
        }
        for (term, value) in source.function_values() {
            self.set_function_value(term.function, term.args.clone(), value);
        }
        touched
    }

    /// Records `args` as a ground atom of `predicate`. Returns `true` if
    /// this was not already present.
    pub fn insert_atom(&mut self, predicate: PredicateId, args: Vec<Object>) -> bool {
        self.predicate_args[predicate.index()].insert(args, ()).is_none()
    }

    /// Exact membership test. Used both for dedup and for evaluating
    /// negative literals (`not p(x)` holds iff this returns `false`).
    pub fn contains(&self, predicate: PredicateId, args: &[Object]) -> bool {
        self.predicate_args[predicate.index()].contains_key(args)
    }

    pub fn atoms_of(&self, predicate: PredicateId) -> impl Iterator<Item = &[Object]> {
        self.predicate_args[predicate.index()].keys().map(|v| v.as_slice())
    }

    pub fn atom_count(&self, predicate: PredicateId) -> usize {
        self.predicate_args[predicate.index()].len()
    }

    pub fn set_function_value(&mut self, function: FunctionId, args: Vec<Object>, value: f64) {
        self.function_values[function.index()].insert(args, value);
    }

    /// Looks up a function's value at `args`. Absence means "unknown",
    /// which numeric-constraint evaluation treats pessimistically
    /// (unsatisfied), per the error-handling design.
    pub fn function_value(&self, function: FunctionId, args: &[Object]) -> Option<f64> {
        self.function_values[function.index()].get(args).copied()
    }

    pub fn predicate_count(&self) -> usize {
        self.predicate_args.len()
    }

    pub fn function_count(&self) -> usize {
        self.function_values.len()
    }
}

/// A simple in-memory [`FactSource`]. The grounder's `ground`/
/// `ground_with_listener` entry points accept this, or any other
/// `FactSource` implementation a caller supplies.
#[derive(Debug, Clone, Default)]
pub struct InitialFacts {
    pub atoms: Vec<GroundAtom>,
    pub values: Vec<(GroundFunctionTerm, f64)>,
}

impl InitialFacts {
    pub fn new() -> Self {
        InitialFacts::default()
    }

    pub fn with_atom(mut self, atom: GroundAtom) -> Self {
        self.atoms.push(atom);
        self
    }

    pub fn with_value(mut self, term: GroundFunctionTerm, value: f64) -> Self {
        self.values.push((term, value));
        self
    }
}

impl FactSource for InitialFacts {
    fn ground_atoms(&self) -> Box<dyn Iterator<Item = &GroundAtom> + '_> {
        Box::new(self.atoms.iter())
    }

    fn function_values(&self) -> Box<dyn Iterator<Item = (&GroundFunctionTerm, f64)> + '_> {
        Box::new(self.values.iter().map(|(t, v)| (t, *v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectTable;

    #[test]
    fn insert_atom_reports_novelty() {
        let mut table = ObjectTable::new();
        let a = table.intern("a");
        let mut fs = FactSet::new(1, 0);
        let pred = PredicateId(0);
        assert!(fs.insert_atom(pred, vec![a]));
        assert!(!fs.insert_atom(pred, vec![a]));
        assert_eq!(fs.atom_count(pred), 1);
    }

    #[test]
    fn negative_literal_is_absence() {
        let mut table = ObjectTable::new();
        let a = table.intern("a");
        let fs = FactSet::new(1, 0);
        assert!(!fs.contains(PredicateId(0), &[a]));
    }

    #[test]
    fn function_value_absent_by_default() {
        let fs = FactSet::new(0, 1);
        assert_eq!(fs.function_value(FunctionId(0), &[]), None);
    }
}
