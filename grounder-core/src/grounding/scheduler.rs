//! Component G: rule scheduler / fixpoint driver
//!
//! Drives every stratum's rules to a joint fixpoint, stratum by stratum
//! in topological order (§4.G): within a stratum, each iteration sweeps
//! every one of its rules' runtime-consistent graphs against the latest
//! fact set (incrementally, via [`ActivityMask`]), feeds the result to
//! that rule's delta enumerator, collects newly emitted [`GroundRule`]s,
//! then merges their heads into the fact set before the next iteration.
//! A stratum is done once a full pass over just its rules emits nothing
//! new; whatever sits in one of its workers' pending queues at that
//! point stays stuck forever, since nothing in this or an earlier
//! stratum will ever add the facts it is waiting on. The next stratum
//! then starts from a fact set that already includes every fact the
//! previous strata will ever produce -- the property [`super::stratify`]
//! exists to guarantee, so that a rule negating a predicate never
//! observes a partial derivation of it.
//!
//! Within a stratum, rules are still dispatched round-robin rather than
//! woken only when a dependency changed: with the delta enumerator
//! already doing the work of skipping unchanged cliques, a pass over an
//! unaffected rule costs little more than an empty sweep and an empty
//! `for_each_new_k_clique` -- not worth a finer-grained listener set to
//! avoid within one stratum's rules.

use ahash::AHashSet;
use rayon::prelude::*;

use crate::bitset::Bitset;
use crate::config::GrounderConfig;
use crate::error::Result;
use crate::object::Object;

use super::consistency_graph::{self, ActivityMask, StaticConsistencyGraph};
use super::domains::Domains;
use super::facts::FactSet;
use super::formalism::{GroundRule, RuleId};
use super::program::Program;
use super::worker::RuleWorker;

/// Per-rule previous-sweep state, carried across iterations so
/// [`consistency_graph::sweep_fluent_incremental`] only re-evaluates
/// still-unsettled vertices/edges.
struct SweepState {
    mask: ActivityMask,
    vertices: Bitset,
    edges: Vec<Bitset>,
}

impl SweepState {
    fn new(graph: &StaticConsistencyGraph) -> Self {
        let n = graph.hash().vertex_count();
        SweepState {
            mask: ActivityMask::new(graph),
            vertices: Bitset::new(n),
            edges: (0..n).map(|_| Bitset::new(n)).collect(),
        }
    }
}

/// Drives every rule of a program to a joint semi-naive fixpoint.
pub struct GroundingScheduler<'p> {
    program: &'p Program,
    workers: Vec<RuleWorker>,
    sweeps: Vec<SweepState>,
    facts: FactSet,
}

impl<'p> GroundingScheduler<'p> {
    /// Builds one [`RuleWorker`] (and its static consistency graph) per
    /// rule of `program`, over `domains`, seeded with `facts`.
    pub fn new(program: &'p Program, domains: &Domains, facts: FactSet) -> Result<Self> {
        let mut workers = Vec::with_capacity(program.rules().len());
        let mut sweeps = Vec::with_capacity(program.rules().len());

        for (idx, rule) in program.rules().iter().enumerate() {
            let rule_domains: Vec<Vec<Object>> = (0..rule.body.arity())
                .map(|p| domains.rule_parameter(idx, p).to_vec())
                .collect();
            let graph = consistency_graph::build(&rule.body, &rule_domains, &facts)?;
            sweeps.push(SweepState::new(&graph));
            workers.push(RuleWorker::new(RuleId(idx as u32), graph));
        }

        Ok(GroundingScheduler {
            program,
            workers,
            sweeps,
            facts,
        })
    }

    pub fn facts(&self) -> &FactSet {
        &self.facts
    }

    pub fn into_facts(self) -> FactSet {
        self.facts
    }

    /// Runs every stratum to a joint fixpoint, in topological order: a
    /// stratum's rules round-robin to their own local fixpoint (a full
    /// pass over just that stratum's rules derives nothing new) before
    /// the next stratum starts, so a rule that negates a predicate
    /// never sees a partial derivation of it (§4.G, §9). Stops early if
    /// a stratum's iteration cap is hit or `cancelled` reports `true`;
    /// returns `true` if every stratum reached a genuine fixpoint.
    pub fn run(
        &mut self,
        config: &GrounderConfig,
        cancelled: &dyn Fn() -> bool,
        mut on_ground_rule: impl FnMut(&GroundRule),
    ) -> Result<bool> {
        let num_strata = self.program.stratification().len();
        for stratum in 0..num_strata {
            let span = tracing::debug_span!("grounding_stratum", stratum);
            let _enter = span.enter();

            let rule_ids: Vec<usize> = self.program.stratification().rules_in(stratum).to_vec();
            if !self.run_stratum_to_fixpoint(&rule_ids, config, cancelled, &mut on_ground_rule)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Round-robins just `rule_ids` (all belonging to one stratum) until
    /// a full pass over them derives nothing new. Returns `Ok(false)` on
    /// cancellation, `Err` on iteration-cap overflow.
    fn run_stratum_to_fixpoint(
        &mut self,
        rule_ids: &[usize],
        config: &GrounderConfig,
        cancelled: &dyn Fn() -> bool,
        on_ground_rule: &mut impl FnMut(&GroundRule),
    ) -> Result<bool> {
        let mut iterations = 0usize;
        loop {
            if cancelled() {
                return Ok(false);
            }
            iterations += 1;
            if iterations > config.max_iterations_per_stratum {
                return Err(crate::error::GrounderError::Cancelled { iterations });
            }

            let span = tracing::debug_span!("grounding_iteration", iteration = iterations);
            let _enter = span.enter();

            let emitted = self.run_one_pass(rule_ids, config, cancelled);
            let emitted_count = emitted.len();

            for gr in &emitted {
                self.facts.insert_atom(gr.head.predicate, gr.head.args.clone());
            }
            metrics::counter!("grounder_ground_rules_emitted_total").increment(emitted_count as u64);
            metrics::gauge!("grounder_iteration").set(iterations as f64);
            tracing::debug!(emitted = emitted_count, "grounding pass complete");

            for gr in &emitted {
                on_ground_rule(gr);
            }

            if emitted_count == 0 {
                return Ok(true);
            }
        }
    }

    /// One sweep-then-ground pass over `rule_ids`. Sweeping and
    /// candidate enumeration only read `self.facts`, so they run in
    /// parallel across rules when `config.parallel`; merging the newly
    /// derived heads back into `self.facts` happens once, sequentially,
    /// after every rule's pass completes for this iteration.
    fn run_one_pass(&mut self, rule_ids: &[usize], config: &GrounderConfig, cancelled: &dyn Fn() -> bool) -> Vec<GroundRule> {
        let facts = &self.facts;
        let program = self.program;
        let wanted: AHashSet<usize> = rule_ids.iter().copied().collect();

        // Zipping the full workers/sweeps vectors (rather than indexing
        // `self.workers[idx]` per wanted index) is what lets the borrow
        // checker see these as disjoint mutable borrows; the `filter`
        // then restricts the pass to this stratum's rules only.
        let work = self
            .workers
            .iter_mut()
            .zip(self.sweeps.iter_mut())
            .enumerate()
            .filter(|(idx, _)| wanted.contains(idx));

        let per_rule: Vec<Vec<GroundRule>> = if config.parallel {
            // Fine-grained cancellation would require interrupting an
            // in-flight rayon dispatch; not supported here, only between
            // whole passes (see the doc comment on `GrounderConfig`).
            work.collect::<Vec<_>>()
                .into_par_iter()
                .map(|(idx, (worker, sweep))| run_rule_pass(program, RuleId(idx as u32), worker, sweep, facts))
                .collect()
        } else {
            let mut out = Vec::new();
            for (idx, (worker, sweep)) in work {
                if config.fine_grained_cancellation && cancelled() {
                    break;
                }
                out.push(run_rule_pass(program, RuleId(idx as u32), worker, sweep, facts));
            }
            out
        };

        per_rule.into_iter().flatten().collect()
    }
}

fn run_rule_pass(
    program: &Program,
    rule_id: RuleId,
    worker: &mut RuleWorker,
    sweep: &mut SweepState,
    facts: &FactSet,
) -> Vec<GroundRule> {
    let rule = program.rule(rule_id);
    let (vertices, edges) = consistency_graph::sweep_fluent_incremental(
        worker.graph(),
        &rule.body,
        facts,
        &sweep.vertices,
        &sweep.edges,
        &mut sweep.mask,
    );
    sweep.vertices = vertices.clone();
    sweep.edges = edges.clone();
    worker.advance(vertices, edges);
    worker.step(rule, facts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grounding::domains;
    use crate::grounding::facts::InitialFacts;
    use crate::grounding::formalism::{Atom, ConjunctiveCondition, FunctionSymbol, Literal, ParameterIndex, PredicateSymbol, Rule, Stratum, Term};
    use crate::grounding::program::ProgramBuilder;

    #[test]
    fn reaches_fixpoint_and_derives_transitive_closure() {
        let mut builder = ProgramBuilder::new();
        let a = builder.intern_object("a");
        let b = builder.intern_object("b");
        let c = builder.intern_object("c");

        let edge = builder.add_predicate(PredicateSymbol {
            name: "edge".into(),
            arity: 2,
            stratum: Stratum::Static,
        });
        let path = builder.add_predicate(PredicateSymbol {
            name: "path".into(),
            arity: 2,
            stratum: Stratum::Derived,
        });

        // path(x, y) :- edge(x, y).
        builder.add_rule(Rule {
            head: Atom {
                predicate: path,
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

        // path(x, z) :- edge(x, y), path(y, z).
        builder.add_rule(Rule {
            head: Atom {
                predicate: path,
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
                        predicate: path,
                        terms: vec![Term::Parameter(ParameterIndex(1)), Term::Parameter(ParameterIndex(2))],
                    },
                }],
                numeric_constraints: vec![],
            },
            cost: 0.0,
        });
        let _ = FunctionSymbol {
            name: "unused".into(),
            arity: 0,
            stratum: Stratum::Static,
        };

        let program = builder.build().unwrap();

        let initial = InitialFacts::new()
            .with_atom(crate::grounding::formalism::GroundAtom {
                predicate: edge,
                args: vec![a, b],
            })
            .with_atom(crate::grounding::formalism::GroundAtom {
                predicate: edge,
                args: vec![b, c],
            });

        let mut facts = FactSet::new(program.predicates().len(), program.functions().len());
        facts.load(&initial);

        let computed_domains = domains::analyze(&program, &initial).unwrap();
        let mut scheduler = GroundingScheduler::new(&program, &computed_domains, facts).unwrap();

        let config = GrounderConfig {
            parallel: false,
            ..GrounderConfig::default()
        };
        let mut emitted = Vec::new();
        let complete = scheduler.run(&config, &|| false, |gr| emitted.push(gr.clone())).unwrap();
        assert!(complete);

        let final_facts = scheduler.into_facts();
        assert!(final_facts.contains(path, &[a, b]));
        assert!(final_facts.contains(path, &[b, c]));
        assert!(final_facts.contains(path, &[a, c]));
        assert_eq!(final_facts.atom_count(path), 3);
    }
}
