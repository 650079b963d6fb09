//! Top-level entry points: build a [`GrounderHandle`] from a checked
//! [`Program`], then ground it to a fixpoint from an initial fact
//! source.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::GrounderConfig;
use crate::error::Result;
use crate::grounding::domains::{self, Domains};
use crate::grounding::facts::{FactSet, FactSource};
use crate::grounding::formalism::GroundRule;
use crate::grounding::program::Program;
use crate::grounding::scheduler::GroundingScheduler;

/// Receives every [`GroundRule`] a grounding run derives, in emission
/// order. A plain `FnMut(&GroundRule)` closure implements this
/// automatically -- the trait exists so a caller that wants to hold
/// onto state across calls (a counter, a writer, a channel sender) can
/// implement it directly instead of closing over a `RefCell`.
pub trait GroundingListener {
    /// Called once per newly derived ground rule.
    fn on_ground_rule(&mut self, rule: &GroundRule);
}

impl<F: FnMut(&GroundRule)> GroundingListener for F {
    fn on_ground_rule(&mut self, rule: &GroundRule) {
        (self)(rule)
    }
}

/// A no-op listener, for callers that only want the final [`GroundingOutcome`].
struct DiscardListener;

impl GroundingListener for DiscardListener {
    fn on_ground_rule(&mut self, _rule: &GroundRule) {}
}

/// A checked program with its domain analysis (component A) already
/// computed against one fact source. Domain analysis only depends on
/// which ground atoms/constants are visible, not on numeric function
/// values, so a handle built once can be reused to ground the same
/// program against several initial fact sets sharing the same
/// predicate/object vocabulary.
pub struct GrounderHandle {
    program: Program,
    domains: Domains,
}

impl GrounderHandle {
    /// The checked program this handle was built from.
    pub fn program(&self) -> &Program {
        &self.program
    }
}

/// The result of a grounding run.
#[derive(Debug, Clone)]
pub struct GroundingOutcome {
    /// Every ground atom and function value known at the end of the run
    /// -- the initial facts plus everything derivable from them.
    pub facts: FactSet,
    /// `true` if the run reached a genuine fixpoint (no rule derived
    /// anything new in a full pass). `false` means the run was stopped
    /// early by an external cancellation request; `facts` is then sound
    /// but possibly incomplete -- every atom present is really
    /// derivable, but some derivable atoms may be missing.
    pub complete: bool,
}

/// Builds a [`GrounderHandle`] for `program`, running domain analysis
/// against `facts` up front so later `ground*` calls can skip it.
pub fn build(program: Program, facts: &dyn FactSource) -> Result<GrounderHandle> {
    let domains = domains::analyze(&program, facts)?;
    Ok(GrounderHandle { program, domains })
}

/// Grounds `handle`'s program from `initial` to a fixpoint, under
/// `config`. Equivalent to [`ground_with_listener`] with every emitted
/// rule discarded.
pub fn ground(handle: &GrounderHandle, initial: &dyn FactSource, config: &GrounderConfig) -> Result<GroundingOutcome> {
    let never_cancel = AtomicBool::new(false);
    ground_cancellable(handle, initial, config, &never_cancel, &mut DiscardListener)
}

/// Grounds `handle`'s program from `initial` to a fixpoint, under
/// `config`, invoking `listener` once per newly emitted ground rule in
/// emission order. Runs unconditionally to completion (or to
/// [`crate::error::GrounderError::Cancelled`] if
/// `config.max_iterations_per_stratum` is exceeded, which indicates a
/// misconfigured program rather than a normal outcome); callers that
/// need to request early stop should use [`ground_cancellable`]
/// instead.
pub fn ground_with_listener(
    handle: &GrounderHandle,
    initial: &dyn FactSource,
    config: &GrounderConfig,
    mut listener: impl GroundingListener,
) -> Result<GroundingOutcome> {
    let never_cancel = AtomicBool::new(false);
    ground_cancellable(handle, initial, config, &never_cancel, &mut listener)
}

/// Like [`ground_with_listener`], polled against `cancel` once per
/// iteration (and, when `config.fine_grained_cancellation` is set,
/// between individual rule dispatches within an iteration too). A run
/// stopped by `cancel` returns `Ok` with `complete: false` rather than
/// an error -- every rule the listener saw before the stop is still
/// valid, just possibly incomplete.
pub fn ground_cancellable(
    handle: &GrounderHandle,
    initial: &dyn FactSource,
    config: &GrounderConfig,
    cancel: &AtomicBool,
    listener: &mut dyn GroundingListener,
) -> Result<GroundingOutcome> {
    let mut facts = FactSet::new(handle.program.predicates().len(), handle.program.functions().len());
    facts.load(initial);

    tracing::info!(
        rules = handle.program.rules().len(),
        predicates = handle.program.predicates().len(),
        "starting grounding run"
    );

    let mut scheduler = GroundingScheduler::new(&handle.program, &handle.domains, facts)?;
    let complete = scheduler.run(config, &|| cancel.load(Ordering::Relaxed), |gr| listener.on_ground_rule(gr))?;

    tracing::info!(complete, "grounding run finished");

    Ok(GroundingOutcome {
        facts: scheduler.into_facts(),
        complete,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grounding::facts::InitialFacts;
    use crate::grounding::formalism::{
        Atom, ConjunctiveCondition, GroundAtom, Literal, ParameterIndex, PredicateSymbol, Rule, Stratum, Term,
    };
    use crate::grounding::program::ProgramBuilder;
    use proptest::prelude::*;

    #[test]
    fn build_and_ground_a_trivial_program() {
        let mut builder = ProgramBuilder::new();
        let a = builder.intern_object("a");
        let source = builder.add_predicate(PredicateSymbol {
            name: "source".into(),
            arity: 1,
            stratum: Stratum::Static,
        });
        let derived = builder.add_predicate(PredicateSymbol {
            name: "derived".into(),
            arity: 1,
            stratum: Stratum::Derived,
        });
        builder.add_rule(Rule {
            head: Atom {
                predicate: derived,
                terms: vec![Term::Parameter(ParameterIndex(0))],
            },
            body: ConjunctiveCondition {
                variables: 1,
                static_literals: vec![Literal {
                    positive: true,
                    atom: Atom {
                        predicate: source,
                        terms: vec![Term::Parameter(ParameterIndex(0))],
                    },
                }],
                fluent_literals: vec![],
                numeric_constraints: vec![],
            },
            cost: 0.0,
        });
        let program = builder.build().unwrap();

        let initial = InitialFacts::new().with_atom(GroundAtom {
            predicate: source,
            args: vec![a],
        });

        let handle = build(program, &initial).unwrap();
        let outcome = ground(&handle, &initial, &GrounderConfig::default()).unwrap();
        assert!(outcome.complete);
        assert!(outcome.facts.contains(derived, &[a]));
    }

    #[test]
    fn listener_observes_every_emitted_rule() {
        let mut builder = ProgramBuilder::new();
        let a = builder.intern_object("a");
        let b = builder.intern_object("b");
        let source = builder.add_predicate(PredicateSymbol {
            name: "source".into(),
            arity: 1,
            stratum: Stratum::Static,
        });
        let derived = builder.add_predicate(PredicateSymbol {
            name: "derived".into(),
            arity: 1,
            stratum: Stratum::Derived,
        });
        builder.add_rule(Rule {
            head: Atom {
                predicate: derived,
                terms: vec![Term::Parameter(ParameterIndex(0))],
            },
            body: ConjunctiveCondition {
                variables: 1,
                static_literals: vec![Literal {
                    positive: true,
                    atom: Atom {
                        predicate: source,
                        terms: vec![Term::Parameter(ParameterIndex(0))],
                    },
                }],
                fluent_literals: vec![],
                numeric_constraints: vec![],
            },
            cost: 0.0,
        });
        let program = builder.build().unwrap();

        let initial = InitialFacts::new()
            .with_atom(GroundAtom { predicate: source, args: vec![a] })
            .with_atom(GroundAtom { predicate: source, args: vec![b] });

        let handle = build(program, &initial).unwrap();
        let mut seen = Vec::new();
        let outcome = ground_with_listener(&handle, &initial, &GrounderConfig::default(), |gr: &GroundRule| {
            seen.push(gr.head.args.clone());
        })
        .unwrap();
        assert!(outcome.complete);
        seen.sort();
        assert_eq!(seen, vec![vec![a], vec![b]]);
    }

    #[test]
    fn cancellation_before_any_iteration_yields_incomplete_outcome() {
        let mut builder = ProgramBuilder::new();
        let p = builder.add_predicate(PredicateSymbol {
            name: "p".into(),
            arity: 0,
            stratum: Stratum::Derived,
        });
        let q = builder.add_predicate(PredicateSymbol {
            name: "q".into(),
            arity: 0,
            stratum: Stratum::Static,
        });
        builder.add_rule(Rule {
            head: Atom { predicate: p, terms: vec![] },
            body: ConjunctiveCondition {
                variables: 0,
                static_literals: vec![Literal {
                    positive: true,
                    atom: Atom { predicate: q, terms: vec![] },
                }],
                fluent_literals: vec![],
                numeric_constraints: vec![],
            },
            cost: 0.0,
        });
        let program = builder.build().unwrap();
        let initial = InitialFacts::new().with_atom(GroundAtom { predicate: q, args: vec![] });
        let handle = build(program, &initial).unwrap();

        let cancel = AtomicBool::new(true);
        let outcome = ground_cancellable(
            &handle,
            &initial,
            &GrounderConfig::default(),
            &cancel,
            &mut DiscardListener,
        )
        .unwrap();
        assert!(!outcome.complete);
    }

    proptest! {
        /// Commutativity under reordering (§8): re-ordering the initial
        /// facts never changes the final fact set, only the order a
        /// listener observes ground rules in.
        #[test]
        fn fact_order_does_not_affect_final_closure(
            edges in proptest::collection::vec((0usize..4, 0usize..4), 0..10),
        ) {
            let mut builder = ProgramBuilder::new();
            let objects: Vec<_> = (0..4).map(|i| builder.intern_object(&format!("o{i}"))).collect();
            let edge = builder.add_predicate(PredicateSymbol {
                name: "edge".into(),
                arity: 2,
                stratum: Stratum::Static,
            });
            let reach = builder.add_predicate(PredicateSymbol {
                name: "reach".into(),
                arity: 2,
                stratum: Stratum::Derived,
            });
            builder.add_rule(Rule {
                head: Atom {
                    predicate: reach,
                    terms: vec![Term::Parameter(ParameterIndex(0)), Term::Parameter(ParameterIndex(1))],
                },
                body: ConjunctiveCondition {
                    variables: 2,
                    static_literals: vec![Literal {
                        positive: true,
                        atom: Atom {
                            predicate: edge,
                            terms: vec![Term::Parameter(ParameterIndex(0)), Term::Parameter(ParameterIndex(1))],
                        },
                    }],
                    fluent_literals: vec![],
                    numeric_constraints: vec![],
                },
                cost: 0.0,
            });
            builder.add_rule(Rule {
                head: Atom {
                    predicate: reach,
                    terms: vec![Term::Parameter(ParameterIndex(0)), Term::Parameter(ParameterIndex(2))],
                },
                body: ConjunctiveCondition {
                    variables: 3,
                    static_literals: vec![Literal {
                        positive: true,
                        atom: Atom {
                            predicate: edge,
                            terms: vec![Term::Parameter(ParameterIndex(0)), Term::Parameter(ParameterIndex(1))],
                        },
                    }],
                    fluent_literals: vec![Literal {
                        positive: true,
                        atom: Atom {
                            predicate: reach,
                            terms: vec![Term::Parameter(ParameterIndex(1)), Term::Parameter(ParameterIndex(2))],
                        },
                    }],
                    numeric_constraints: vec![],
                },
                cost: 0.0,
            });
            let program = builder.build().unwrap();

            let atoms: Vec<GroundAtom> = edges
                .iter()
                .map(|&(i, j)| GroundAtom { predicate: edge, args: vec![objects[i], objects[j]] })
                .collect();
            let forward = InitialFacts { atoms: atoms.clone(), values: vec![] };
            let mut reversed = atoms;
            reversed.reverse();
            let backward = InitialFacts { atoms: reversed, values: vec![] };

            let handle = build(program, &forward).unwrap();
            let outcome_forward = ground(&handle, &forward, &GrounderConfig::default()).unwrap();
            let outcome_backward = ground(&handle, &backward, &GrounderConfig::default()).unwrap();

            let mut r1: Vec<_> = outcome_forward.facts.atoms_of(reach).map(|a| (a[0], a[1])).collect();
            let mut r2: Vec<_> = outcome_backward.facts.atoms_of(reach).map(|a| (a[0], a[1])).collect();
            r1.sort();
            r2.sort();
            prop_assert_eq!(r1, r2);
        }
    }
}
