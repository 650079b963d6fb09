//! Component A: domain analysis
//!
//! Computes, for every predicate/function argument position and for
//! every rule parameter, the set of objects that could ever legitimately
//! appear there, without running the grounder. A single restrict-then-lift
//! pass suffices: restriction only consumes static evidence, which is
//! fixed before lifting begins, so there is no fixpoint to iterate.

use ahash::AHashSet;

use crate::error::{GrounderError, Result};
use crate::object::Object;

use super::facts::FactSource;
use super::formalism::{FunctionId, PredicateId, Stratum, Term};
use super::program::Program;

/// Per-position domains for every predicate and function, plus
/// per-parameter domains for every rule.
#[derive(Debug, Clone)]
pub struct Domains {
    /// `predicate_positions[pred][position]` = canonically sorted domain.
    predicate_positions: Vec<Vec<Vec<Object>>>,
    /// `function_positions[func][position]` = canonically sorted domain.
    function_positions: Vec<Vec<Vec<Object>>>,
    /// `rule_parameters[rule][parameter]` = canonically sorted domain.
    rule_parameters: Vec<Vec<Vec<Object>>>,
}

impl Domains {
    pub fn predicate_position(&self, predicate: PredicateId, position: usize) -> &[Object] {
        &self.predicate_positions[predicate.index()][position]
    }

    pub fn function_position(&self, function: FunctionId, position: usize) -> &[Object] {
        &self.function_positions[function.index()][position]
    }

    pub fn rule_parameter(&self, rule: usize, parameter: usize) -> &[Object] {
        &self.rule_parameters[rule][parameter]
    }
}

/// Runs domain analysis (spec component A) over `program`, seeding
/// predicate/function position domains from `facts` (step 1), then
/// restricting and lifting every rule's parameter domains (steps 2-3),
/// then sorting everything into a canonical order (step 4).
pub fn analyze(program: &Program, facts: &dyn FactSource) -> Result<Domains> {
    let mut predicate_positions: Vec<Vec<AHashSet<Object>>> = program
        .predicates()
        .iter()
        .map(|p| vec![AHashSet::default(); p.arity])
        .collect();
    let mut function_positions: Vec<Vec<AHashSet<Object>>> = program
        .functions()
        .iter()
        .map(|f| vec![AHashSet::default(); f.arity])
        .collect();

    // Step 1: seed from ground evidence (initial facts plus every atom
    // literally appearing in a rule body/head as constants).
    for ga in facts.ground_atoms() {
        let slots = &mut predicate_positions[ga.predicate.index()];
        for (pos, obj) in ga.args.iter().enumerate() {
            slots[pos].insert(*obj);
        }
    }
    for (term, value) in facts.function_values() {
        let _ = value;
        let slots = &mut function_positions[term.function.index()];
        for (pos, obj) in term.args.iter().enumerate() {
            slots[pos].insert(*obj);
        }
    }
    for rule in program.rules() {
        seed_from_constants(&rule.head, &mut predicate_positions);
        for lit in rule.body.all_literals() {
            seed_from_constants(&lit.atom, &mut predicate_positions);
        }
    }

    // Steps 2-3: restrict then lift, one non-iterated pass per rule.
    let mut rule_parameters: Vec<Vec<AHashSet<Object>>> = Vec::with_capacity(program.rules().len());
    let universe: Vec<Object> = program.objects().iter().collect();

    for (rule_idx, rule) in program.rules().iter().enumerate() {
        let arity = rule.body.arity();
        let mut param_domains: Vec<AHashSet<Object>> = (0..arity)
            .map(|_| universe.iter().copied().collect())
            .collect();

        // Restriction: intersect each parameter's domain with every
        // static literal/constraint position domain where it appears.
        for lit in &rule.body.static_literals {
            let predicate = program.predicate(lit.atom.predicate);
            if predicate.stratum != Stratum::Static {
                return Err(GrounderError::configuration(format!(
                    "rule {rule_idx}: literal over '{}' listed as static but predicate stratum is not static",
                    predicate.name
                )));
            }
            for (pos, term) in lit.atom.terms.iter().enumerate() {
                if let Term::Parameter(p) = term {
                    let position_domain = &predicate_positions[lit.atom.predicate.index()][pos];
                    restrict(&mut param_domains[p.index()], position_domain);
                }
            }
        }
        for constraint in &rule.body.numeric_constraints {
            restrict_expression(&constraint.lhs, program, &function_positions, &mut param_domains);
            restrict_expression(&constraint.rhs, program, &function_positions, &mut param_domains);
        }

        // Lifting: union the restricted parameter domain back into every
        // fluent predicate/function position where that parameter occurs.
        // Transmits the rule's restricted domain into still-growing
        // fluent positions, heads included, since head predicates are
        // always fluent/derived.
        for (pos, term) in rule.head.terms.iter().enumerate() {
            if let Term::Parameter(p) = term {
                let dom = param_domains[p.index()].clone();
                predicate_positions[rule.head.predicate.index()][pos].extend(dom);
            }
        }
        for lit in &rule.body.fluent_literals {
            for (pos, term) in lit.atom.terms.iter().enumerate() {
                if let Term::Parameter(p) = term {
                    let dom = param_domains[p.index()].clone();
                    predicate_positions[lit.atom.predicate.index()][pos].extend(dom);
                }
            }
        }
        for constraint in &rule.body.numeric_constraints {
            lift_expression(&constraint.lhs, program, &param_domains, &mut function_positions);
            lift_expression(&constraint.rhs, program, &param_domains, &mut function_positions);
        }

        rule_parameters.push(param_domains);
    }

    Ok(Domains {
        predicate_positions: canonicalize_nested(predicate_positions),
        function_positions: canonicalize_nested(function_positions),
        rule_parameters: canonicalize_nested(rule_parameters),
    })
}

fn seed_from_constants(
    atom: &super::formalism::Atom,
    predicate_positions: &mut [Vec<AHashSet<Object>>],
) {
    for (pos, term) in atom.terms.iter().enumerate() {
        if let Term::Constant(obj) = term {
            predicate_positions[atom.predicate.index()][pos].insert(*obj);
        }
    }
}

fn restrict(param_domain: &mut AHashSet<Object>, position_domain: &AHashSet<Object>) {
    param_domain.retain(|o| position_domain.contains(o));
}

fn restrict_expression(
    expr: &super::formalism::FunctionExpression,
    program: &Program,
    function_positions: &[Vec<AHashSet<Object>>],
    param_domains: &mut [AHashSet<Object>],
) {
    use super::formalism::FunctionExpression as FE;
    match expr {
        FE::Constant(_) => {}
        FE::FunctionTerm(term) => {
            let is_static = program.function(term.function).stratum == Stratum::Static;
            if !is_static {
                return;
            }
            for (pos, t) in term.terms.iter().enumerate() {
                if let Term::Parameter(p) = t {
                    let position_domain = &function_positions[term.function.index()][pos];
                    restrict(&mut param_domains[p.index()], position_domain);
                }
            }
        }
        FE::Negate(e) => restrict_expression(e, program, function_positions, param_domains),
        FE::Subtract(a, b) | FE::Add(a, b) | FE::Multiply(a, b) | FE::Divide(a, b) => {
            restrict_expression(a, program, function_positions, param_domains);
            restrict_expression(b, program, function_positions, param_domains);
        }
        FE::Sum(es) | FE::Product(es) => {
            for e in es {
                restrict_expression(e, program, function_positions, param_domains);
            }
        }
    }
}

fn lift_expression(
    expr: &super::formalism::FunctionExpression,
    program: &Program,
    param_domains: &[AHashSet<Object>],
    function_positions: &mut [Vec<AHashSet<Object>>],
) {
    use super::formalism::FunctionExpression as FE;
    match expr {
        FE::Constant(_) => {}
        FE::FunctionTerm(term) => {
            let is_static = program.function(term.function).stratum == Stratum::Static;
            if is_static {
                return;
            }
            for (pos, t) in term.terms.iter().enumerate() {
                if let Term::Parameter(p) = t {
                    let dom = param_domains[p.index()].clone();
                    function_positions[term.function.index()][pos].extend(dom);
                }
            }
        }
        FE::Negate(e) => lift_expression(e, program, param_domains, function_positions),
        FE::Subtract(a, b) | FE::Add(a, b) | FE::Multiply(a, b) | FE::Divide(a, b) => {
            lift_expression(a, program, param_domains, function_positions);
            lift_expression(b, program, param_domains, function_positions);
        }
        FE::Sum(es) | FE::Product(es) => {
            for e in es {
                lift_expression(e, program, param_domains, function_positions);
            }
        }
    }
}

fn canonicalize_nested(nested: Vec<Vec<AHashSet<Object>>>) -> Vec<Vec<Vec<Object>>> {
    nested
        .into_iter()
        .map(|positions| {
            positions
                .into_iter()
                .map(|set| {
                    let mut v: Vec<Object> = set.into_iter().collect();
                    v.sort_unstable();
                    v
                })
                .collect()
        })
        .collect()
}
