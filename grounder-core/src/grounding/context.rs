//! Component H: expression evaluator
//!
//! `evaluate(expr, facts) -> f64` and `evaluate(literal, facts) -> bool`
//! over the term/expression trees of [`super::formalism`], closed under
//! a full parameter binding. Used both by [`super::consistency_graph`]
//! (over the static fact set, at build time, where every parameter
//! involved is already bound) and by [`super::worker`] (over the full
//! fact set, at runtime, under a candidate clique binding).

use crate::object::Object;

use super::facts::FactSet;
use super::formalism::{FunctionExpression, GroundAtom, Literal, NumericConstraint, Term};

/// Substitutes `binding` into `terms`, producing the corresponding
/// ground argument list. `binding[i]` is the object bound to
/// `ParameterIndex(i)`.
pub fn ground_terms(terms: &[Term], binding: &[Object]) -> Vec<Object> {
    ground_terms_with(terms, |i| binding[i])
}

/// Like [`ground_terms`], but resolves each referenced parameter
/// through `get` instead of indexing a dense binding array. Used where
/// only a handful of parameters are bound (the static consistency
/// graph builder checks one or two parameters at a time) and
/// allocating a full-arity binding array would be wasted work; `get`
/// is only ever called for parameters the term list actually
/// references.
pub fn ground_terms_with(terms: &[Term], get: impl Fn(usize) -> Object) -> Vec<Object> {
    terms
        .iter()
        .map(|t| match t {
            Term::Constant(o) => *o,
            Term::Parameter(p) => get(p.index()),
        })
        .collect()
}

/// Grounds `literal.atom` under `binding` into a [`GroundAtom`].
pub fn ground_atom(literal: &Literal, binding: &[Object]) -> GroundAtom {
    GroundAtom {
        predicate: literal.atom.predicate,
        args: ground_terms(&literal.atom.terms, binding),
    }
}

/// Whether `literal` holds under `binding`, against `facts`. A positive
/// literal holds iff its ground atom is present; a negative literal
/// holds iff it is absent (classical/closed-world negation).
pub fn literal_holds(literal: &Literal, binding: &[Object], facts: &FactSet) -> bool {
    literal_holds_with(literal, |i| binding[i], facts)
}

/// Like [`literal_holds`], resolving parameters through `get`. See
/// [`ground_terms_with`].
pub fn literal_holds_with(literal: &Literal, get: impl Fn(usize) -> Object, facts: &FactSet) -> bool {
    let args = ground_terms_with(&literal.atom.terms, get);
    let present = facts.contains(literal.atom.predicate, &args);
    present == literal.positive
}

/// Evaluates `expr` under `binding` against `facts`. Returns `None` if
/// any function term it depends on has no recorded value. The caller
/// treats an unknown value pessimistically (the constraint is reported
/// unsatisfied), per the closed-world error-handling design.
pub fn evaluate_expression(expr: &FunctionExpression, binding: &[Object], facts: &FactSet) -> Option<f64> {
    evaluate_expression_with(expr, &|i| binding[i], facts)
}

/// Like [`evaluate_expression`], resolving parameters through `get`.
/// See [`ground_terms_with`].
pub fn evaluate_expression_with(
    expr: &FunctionExpression,
    get: &dyn Fn(usize) -> Object,
    facts: &FactSet,
) -> Option<f64> {
    match expr {
        FunctionExpression::Constant(c) => Some(*c),
        FunctionExpression::FunctionTerm(term) => {
            let args = ground_terms_with(&term.terms, get);
            facts.function_value(term.function, &args)
        }
        FunctionExpression::Negate(e) => evaluate_expression_with(e, get, facts).map(|v| -v),
        FunctionExpression::Subtract(a, b) => Some(
            evaluate_expression_with(a, get, facts)? - evaluate_expression_with(b, get, facts)?,
        ),
        FunctionExpression::Add(a, b) => Some(
            evaluate_expression_with(a, get, facts)? + evaluate_expression_with(b, get, facts)?,
        ),
        FunctionExpression::Multiply(a, b) => Some(
            evaluate_expression_with(a, get, facts)? * evaluate_expression_with(b, get, facts)?,
        ),
        FunctionExpression::Divide(a, b) => {
            let denom = evaluate_expression_with(b, get, facts)?;
            if denom == 0.0 {
                return None;
            }
            Some(evaluate_expression_with(a, get, facts)? / denom)
        }
        FunctionExpression::Sum(es) => {
            let mut total = 0.0;
            for e in es {
                total += evaluate_expression_with(e, get, facts)?;
            }
            Some(total)
        }
        FunctionExpression::Product(es) => {
            let mut total = 1.0;
            for e in es {
                total *= evaluate_expression_with(e, get, facts)?;
            }
            Some(total)
        }
    }
}

/// Evaluates a numeric constraint under `binding` against `facts`. An
/// unknown operand evaluates the whole constraint to `false`.
pub fn evaluate_constraint(constraint: &NumericConstraint, binding: &[Object], facts: &FactSet) -> bool {
    evaluate_constraint_with(constraint, &|i| binding[i], facts)
}

/// Like [`evaluate_constraint`], resolving parameters through `get`.
/// See [`ground_terms_with`].
pub fn evaluate_constraint_with(
    constraint: &NumericConstraint,
    get: &dyn Fn(usize) -> Object,
    facts: &FactSet,
) -> bool {
    match (
        evaluate_expression_with(&constraint.lhs, get, facts),
        evaluate_expression_with(&constraint.rhs, get, facts),
    ) {
        (Some(l), Some(r)) => constraint.operator.apply(l, r),
        _ => false,
    }
}
