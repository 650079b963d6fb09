//! Predicate-dependency stratification (spec component G, §4.G)
//!
//! A rule at stratum `s` may only consume fluent/derived predicates
//! produced at strata `<= s`, and a rule that *negates* a predicate
//! must sit strictly above every stratum that predicate is produced at
//! -- otherwise a round-robin fixpoint could fire the negating rule
//! before the predicate it negates has finished growing, deriving a
//! fact that a fully-stratified evaluation never would (see
//! `SPEC_FULL.md`'s discussion of this module). This is computed once,
//! at setup, over the predicate-dependency graph implied by every
//! rule's head/body predicates; a cycle containing a negative edge is
//! recursion through negation, rejected with
//! [`crate::error::GrounderError::Configuration`] per §7/§9's
//! "stratified negation only, pre-checked at setup" non-goal.

use crate::error::{GrounderError, Result};

use super::formalism::PredicateId;
use super::program::Program;

/// Per-rule and per-predicate stratum assignment for one program.
#[derive(Debug, Clone)]
pub struct Stratification {
    /// `rule_stratum[i]` is the stratum of `program.rules()[i]`.
    rule_stratum: Vec<usize>,
    /// `predicate_stratum[i]` is the stratum `program.predicates()[i]`
    /// is fully derived at (0 for every predicate that is never a rule
    /// head, including every static predicate).
    predicate_stratum: Vec<usize>,
    /// One entry per stratum, smallest first, each the rule indices
    /// assigned to it in declaration order.
    strata: Vec<Vec<usize>>,
}

impl Stratification {
    /// A placeholder used only while assembling a [`Program`]: real
    /// programs always overwrite this with [`compute`]'s result before
    /// [`ProgramBuilder::build`](super::program::ProgramBuilder::build)
    /// returns.
    pub(crate) fn default_empty() -> Self {
        Stratification {
            rule_stratum: Vec::new(),
            predicate_stratum: Vec::new(),
            strata: Vec::new(),
        }
    }

    /// The number of strata (1 if the program has no rules at all).
    pub fn len(&self) -> usize {
        self.strata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strata.is_empty()
    }

    /// Rule indices assigned to `stratum`, in declaration order.
    pub fn rules_in(&self, stratum: usize) -> &[usize] {
        &self.strata[stratum]
    }

    pub fn rule_stratum(&self, rule_idx: usize) -> usize {
        self.rule_stratum[rule_idx]
    }

    pub fn predicate_stratum(&self, predicate: PredicateId) -> usize {
        self.predicate_stratum[predicate.index()]
    }
}

/// Computes the stratification of `program`, erroring if any predicate
/// is defined through a cycle that crosses a negative-literal edge.
pub fn compute(program: &Program) -> Result<Stratification> {
    let num_predicates = program.predicates().len();
    let num_rules = program.rules().len();

    // predicate_stratum[p] = the length of the longest
    // positive-edge-weight-0/negative-edge-weight-1 path ending at p in
    // the predicate dependency graph; a predicate never produced by any
    // rule stays at 0.
    let mut predicate_stratum = vec![0usize; num_predicates];

    // Bellman-Ford-style relaxation: after `num_predicates` rounds with
    // no change we're at a fixpoint; a round that still relaxes after
    // `num_predicates` full passes witnesses a cycle with positive total
    // weight, i.e. recursion through negation.
    for pass in 0..=num_predicates {
        let mut changed = false;
        for rule in program.rules() {
            let head = rule.head.predicate.index();
            for literal in rule.body.all_literals() {
                let dep = literal.atom.predicate.index();
                let weight = if literal.positive { 0 } else { 1 };
                let candidate = predicate_stratum[dep] + weight;
                if candidate > predicate_stratum[head] {
                    predicate_stratum[head] = candidate;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
        if pass == num_predicates {
            return Err(GrounderError::configuration(
                "program contains recursion through negation (a predicate negatively depends on itself, directly or transitively) -- only stratified negation is supported",
            ));
        }
    }

    let rule_stratum: Vec<usize> = program
        .rules()
        .iter()
        .map(|rule| predicate_stratum[rule.head.predicate.index()])
        .collect();

    let num_strata = rule_stratum.iter().copied().max().map_or(1, |m| m + 1);
    let mut strata = vec![Vec::new(); num_strata];
    for (idx, &s) in rule_stratum.iter().enumerate().take(num_rules) {
        strata[s].push(idx);
    }

    Ok(Stratification {
        rule_stratum,
        predicate_stratum,
        strata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grounding::formalism::{
        Atom, ConjunctiveCondition, Literal, ParameterIndex, PredicateSymbol, Rule, Stratum, Term,
    };
    use crate::grounding::program::ProgramBuilder;

    fn atom(pred: PredicateId, terms: Vec<Term>) -> Atom {
        Atom { predicate: pred, terms }
    }

    #[test]
    fn mutual_positive_recursion_stays_in_one_stratum() {
        let mut b = ProgramBuilder::new();
        let edge = b.add_predicate(PredicateSymbol { name: "edge".into(), arity: 2, stratum: Stratum::Static });
        let tc = b.add_predicate(PredicateSymbol { name: "tc".into(), arity: 2, stratum: Stratum::Derived });

        b.add_rule(Rule {
            head: atom(tc, vec![Term::Parameter(ParameterIndex(0)), Term::Parameter(ParameterIndex(1))]),
            body: ConjunctiveCondition {
                variables: 2,
                static_literals: vec![Literal { positive: true, atom: atom(edge, vec![Term::Parameter(ParameterIndex(0)), Term::Parameter(ParameterIndex(1))]) }],
                fluent_literals: vec![],
                numeric_constraints: vec![],
            },
            cost: 0.0,
        });
        b.add_rule(Rule {
            head: atom(tc, vec![Term::Parameter(ParameterIndex(0)), Term::Parameter(ParameterIndex(2))]),
            body: ConjunctiveCondition {
                variables: 3,
                static_literals: vec![Literal { positive: true, atom: atom(edge, vec![Term::Parameter(ParameterIndex(0)), Term::Parameter(ParameterIndex(1))]) }],
                fluent_literals: vec![Literal { positive: true, atom: atom(tc, vec![Term::Parameter(ParameterIndex(1)), Term::Parameter(ParameterIndex(2))]) }],
                numeric_constraints: vec![],
            },
            cost: 0.0,
        });

        let program = b.build().unwrap();
        let strat = compute(&program).unwrap();
        assert_eq!(strat.len(), 1);
        assert_eq!(strat.rule_stratum(0), 0);
        assert_eq!(strat.rule_stratum(1), 0);
    }

    #[test]
    fn negation_over_a_lower_predicate_is_a_later_stratum() {
        let mut b = ProgramBuilder::new();
        let obj = b.add_predicate(PredicateSymbol { name: "obj".into(), arity: 1, stratum: Stratum::Static });
        let p = b.add_predicate(PredicateSymbol { name: "p".into(), arity: 1, stratum: Stratum::Fluent });
        let q = b.add_predicate(PredicateSymbol { name: "q".into(), arity: 1, stratum: Stratum::Derived });

        b.add_rule(Rule {
            head: atom(q, vec![Term::Parameter(ParameterIndex(0))]),
            body: ConjunctiveCondition {
                variables: 1,
                static_literals: vec![Literal { positive: true, atom: atom(obj, vec![Term::Parameter(ParameterIndex(0))]) }],
                fluent_literals: vec![Literal { positive: false, atom: atom(p, vec![Term::Parameter(ParameterIndex(0))]) }],
                numeric_constraints: vec![],
            },
            cost: 0.0,
        });

        let program = b.build().unwrap();
        let strat = compute(&program).unwrap();
        assert_eq!(strat.len(), 2);
        assert_eq!(strat.predicate_stratum(p), 0);
        assert_eq!(strat.rule_stratum(0), 1);
        assert_eq!(strat.rules_in(1), &[0]);
    }

    #[test]
    fn recursion_through_negation_is_rejected() {
        let mut b = ProgramBuilder::new();
        let p = b.add_predicate(PredicateSymbol { name: "p".into(), arity: 1, stratum: Stratum::Derived });
        let q = b.add_predicate(PredicateSymbol { name: "q".into(), arity: 1, stratum: Stratum::Derived });

        // p(x) :- not q(x).
        b.add_rule(Rule {
            head: atom(p, vec![Term::Parameter(ParameterIndex(0))]),
            body: ConjunctiveCondition {
                variables: 1,
                static_literals: vec![],
                fluent_literals: vec![Literal { positive: false, atom: atom(q, vec![Term::Parameter(ParameterIndex(0))]) }],
                numeric_constraints: vec![],
            },
            cost: 0.0,
        });
        // q(x) :- p(x).
        b.add_rule(Rule {
            head: atom(q, vec![Term::Parameter(ParameterIndex(0))]),
            body: ConjunctiveCondition {
                variables: 1,
                static_literals: vec![],
                fluent_literals: vec![Literal { positive: true, atom: atom(p, vec![Term::Parameter(ParameterIndex(0))]) }],
                numeric_constraints: vec![],
            },
            cost: 0.0,
        });

        let program = b.build().unwrap();
        assert!(compute(&program).is_err());
    }
}
