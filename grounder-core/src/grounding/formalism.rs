//! Core data model: objects, symbols, terms, atoms, conditions, rules
//!
//! This generalizes the source's template-on-tag pattern (one class
//! template instantiated once per stratum) into a tagged [`Stratum`] enum
//! carried at runtime by each symbol, plus zero-sized [`StaticTag`] /
//! [`FluentTag`] marker types implementing [`StratumTag`] so that
//! generic code (assignment sets, fact sets) still monomorphises per
//! stratum instead of paying for a runtime dispatch in the hot grounding
//! loop.

use serde::{Deserialize, Serialize};

use crate::object::Object;

/// A rule-local parameter reference, strictly less than its rule body's
/// arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParameterIndex(pub u32);

impl ParameterIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Dense index of a predicate symbol within a [`crate::grounding::program::Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PredicateId(pub u32);

impl PredicateId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Dense index of a function symbol within a [`crate::grounding::program::Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FunctionId(pub u32);

impl FunctionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Dense index of a rule within a [`crate::grounding::program::Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuleId(pub u32);

impl RuleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A symbol's evaluation stratum. Static symbols are complete and
/// immutable once the initial facts are loaded; fluent and derived
/// symbols may gain new ground extensions as rules fire. Derived
/// symbols never appear directly in the initial fact source; they
/// exist only as rule heads. That distinction matters to
/// [`crate::grounding::scheduler`]'s dependency stratification, not to
/// fact-set bookkeeping, where derived is treated exactly like fluent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stratum {
    /// Never changes after initial facts are loaded.
    Static,
    /// May be seeded by initial facts and/or grown by rule heads.
    Fluent,
    /// Grown by rule heads only; never appears in the initial fact source.
    Derived,
}

impl Stratum {
    /// Whether this symbol is static.
    pub fn is_static(self) -> bool {
        matches!(self, Stratum::Static)
    }
}

/// Compile-time marker distinguishing the static and fluent halves of
/// generic assignment-set / fact-set code. `Derived` symbols use
/// [`FluentTag`]. Generic code only cares about "complete at setup" vs
/// "grows at runtime", not the three-way scheduling distinction
/// [`Stratum`] carries.
pub trait StratumTag: Copy + Send + Sync + 'static {
    /// `true` for [`StaticTag`], `false` for [`FluentTag`].
    const IS_STATIC: bool;
}

/// Marker for the complete-at-setup half of a stratified structure.
#[derive(Debug, Clone, Copy)]
pub struct StaticTag;
/// Marker for the grows-at-runtime half of a stratified structure.
#[derive(Debug, Clone, Copy)]
pub struct FluentTag;

impl StratumTag for StaticTag {
    const IS_STATIC: bool = true;
}
impl StratumTag for FluentTag {
    const IS_STATIC: bool = false;
}

/// A named, arity-tagged predicate symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateSymbol {
    pub name: String,
    pub arity: usize,
    pub stratum: Stratum,
}

/// A named, arity-tagged numeric function symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSymbol {
    pub name: String,
    pub arity: usize,
    pub stratum: Stratum,
}

/// Either a reference to a rule parameter by index, or a bound constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    Parameter(ParameterIndex),
    Constant(Object),
}

/// A predicate applied to an ordered list of terms. Argument positions
/// carry positional semantics: position `i` of every atom over a given
/// predicate means the same thing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Atom {
    pub predicate: PredicateId,
    pub terms: Vec<Term>,
}

/// A fully-bound atom: every argument is a concrete object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroundAtom {
    pub predicate: PredicateId,
    pub args: Vec<Object>,
}

/// A function symbol applied to an ordered list of terms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionTerm {
    pub function: FunctionId,
    pub terms: Vec<Term>,
}

/// A fully-bound function term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroundFunctionTerm {
    pub function: FunctionId,
    pub args: Vec<Object>,
}

/// A polarity-tagged atom. Negation is classical/closed-world: a
/// negative literal holds exactly when its ground atom is absent from
/// the current fact set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Literal {
    pub positive: bool,
    pub atom: Atom,
}

impl Literal {
    /// The rule-local parameter indices this literal's terms reference,
    /// deduplicated but not sorted.
    pub fn distinct_parameters(&self) -> Vec<ParameterIndex> {
        let mut params = Vec::new();
        for term in &self.atom.terms {
            if let Term::Parameter(p) = term {
                if !params.contains(p) {
                    params.push(*p);
                }
            }
        }
        params
    }
}

/// Expression tree over constants and (static or fluent) function
/// terms, closed under unary negation and the four binary arithmetic
/// operators plus n-ary sum/product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FunctionExpression {
    Constant(f64),
    FunctionTerm(FunctionTerm),
    Negate(Box<FunctionExpression>),
    Subtract(Box<FunctionExpression>, Box<FunctionExpression>),
    Add(Box<FunctionExpression>, Box<FunctionExpression>),
    Multiply(Box<FunctionExpression>, Box<FunctionExpression>),
    Divide(Box<FunctionExpression>, Box<FunctionExpression>),
    Sum(Vec<FunctionExpression>),
    Product(Vec<FunctionExpression>),
}

impl FunctionExpression {
    /// The rule-local parameter indices appearing anywhere in this
    /// expression, deduplicated but not sorted.
    pub fn distinct_parameters(&self) -> Vec<ParameterIndex> {
        let mut params = Vec::new();
        self.collect_parameters(&mut params);
        params
    }

    fn collect_parameters(&self, out: &mut Vec<ParameterIndex>) {
        match self {
            FunctionExpression::Constant(_) => {}
            FunctionExpression::FunctionTerm(term) => {
                for t in &term.terms {
                    if let Term::Parameter(p) = t {
                        if !out.contains(p) {
                            out.push(*p);
                        }
                    }
                }
            }
            FunctionExpression::Negate(e) => e.collect_parameters(out),
            FunctionExpression::Subtract(a, b)
            | FunctionExpression::Add(a, b)
            | FunctionExpression::Multiply(a, b)
            | FunctionExpression::Divide(a, b) => {
                a.collect_parameters(out);
                b.collect_parameters(out);
            }
            FunctionExpression::Sum(es) | FunctionExpression::Product(es) => {
                for e in es {
                    e.collect_parameters(out);
                }
            }
        }
    }
}

/// An arity-tagged comparison between two function expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BooleanOperator {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

impl BooleanOperator {
    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            BooleanOperator::Equal => lhs == rhs,
            BooleanOperator::NotEqual => lhs != rhs,
            BooleanOperator::LessThan => lhs < rhs,
            BooleanOperator::LessOrEqual => lhs <= rhs,
            BooleanOperator::GreaterThan => lhs > rhs,
            BooleanOperator::GreaterOrEqual => lhs >= rhs,
        }
    }
}

/// A single numeric constraint: `lhs <op> rhs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericConstraint {
    pub operator: BooleanOperator,
    pub lhs: FunctionExpression,
    pub rhs: FunctionExpression,
}

impl NumericConstraint {
    /// The rule-local parameter indices this constraint's two
    /// expressions reference, deduplicated but not sorted.
    pub fn distinct_parameters(&self) -> Vec<ParameterIndex> {
        let mut params = self.lhs.distinct_parameters();
        for p in self.rhs.distinct_parameters() {
            if !params.contains(&p) {
                params.push(p);
            }
        }
        params
    }
}

/// `(variables, static-literals, fluent-literals, numeric-constraints)`.
///
/// Arity is `variables`' length: the number of free parameters of this
/// body. The nullary sub-condition is whichever literals/constraints
/// have zero distinct parameters; these are checked once per iteration,
/// outside the clique loop (see [`crate::grounding::worker`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConjunctiveCondition {
    pub variables: usize,
    pub static_literals: Vec<Literal>,
    pub fluent_literals: Vec<Literal>,
    pub numeric_constraints: Vec<NumericConstraint>,
}

impl ConjunctiveCondition {
    pub fn arity(&self) -> usize {
        self.variables
    }

    /// Every literal in this body, static and fluent together, in a
    /// stable static-then-fluent order.
    pub fn all_literals(&self) -> impl Iterator<Item = &Literal> {
        self.static_literals.iter().chain(self.fluent_literals.iter())
    }
}

/// `(head-atom, body, cost)`. The head is always over a fluent (or
/// derived) predicate.
///
/// `cost` is carried through from the planning lineage this grounder's
/// rule shape is drawn from; grounding never reads it. It exists so a
/// downstream search layer consuming [`GroundRule`]s has it on hand
/// without a second lookup. This engine neither computes nor
/// interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub head: Atom,
    pub body: ConjunctiveCondition,
    pub cost: f64,
}

/// `(rule-index, binding, ground-body, ground-head)`. Emitted only when
/// the ground body is satisfied by the fact set in force at emission
/// time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroundRule {
    pub rule: RuleId,
    pub binding: Vec<Object>,
    pub head: GroundAtom,
}
