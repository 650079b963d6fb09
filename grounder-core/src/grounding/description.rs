//! Name-based program descriptions
//!
//! [`formalism::Term`]/[`formalism::Atom`] address parameters and
//! predicates by dense integer index -- right for the grounder's hot
//! path, wrong for anything a person hand-writes. [`ProgramDescription`]
//! is the serde-friendly mirror of the same shape, addressing everything
//! by name, with [`ProgramDescription::assemble`] resolving names to
//! indices through a [`ProgramBuilder`] (interning objects, predicates,
//! and functions as it goes) and producing both the checked
//! [`Program`] and the [`InitialFacts`] to ground it from.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{GrounderError, Result};
use crate::object::Object;

use super::facts::InitialFacts;
use super::formalism::{
    Atom, BooleanOperator, ConjunctiveCondition, FunctionExpression, FunctionId, FunctionSymbol,
    FunctionTerm, GroundAtom, GroundFunctionTerm, Literal, NumericConstraint, ParameterIndex,
    PredicateId, PredicateSymbol, Rule, Stratum, Term,
};
use super::program::{Program, ProgramBuilder};

/// Name-based mirror of [`Stratum`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StratumDescription {
    Static,
    Fluent,
    Derived,
}

impl From<StratumDescription> for Stratum {
    fn from(s: StratumDescription) -> Self {
        match s {
            StratumDescription::Static => Stratum::Static,
            StratumDescription::Fluent => Stratum::Fluent,
            StratumDescription::Derived => Stratum::Derived,
        }
    }
}

/// Name-based mirror of [`BooleanOperator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BooleanOperatorDescription {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

impl From<BooleanOperatorDescription> for BooleanOperator {
    fn from(op: BooleanOperatorDescription) -> Self {
        match op {
            BooleanOperatorDescription::Equal => BooleanOperator::Equal,
            BooleanOperatorDescription::NotEqual => BooleanOperator::NotEqual,
            BooleanOperatorDescription::LessThan => BooleanOperator::LessThan,
            BooleanOperatorDescription::LessOrEqual => BooleanOperator::LessOrEqual,
            BooleanOperatorDescription::GreaterThan => BooleanOperator::GreaterThan,
            BooleanOperatorDescription::GreaterOrEqual => BooleanOperator::GreaterOrEqual,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredicateDescription {
    pub name: String,
    pub arity: usize,
    pub stratum: StratumDescription,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDescription {
    pub name: String,
    pub arity: usize,
    pub stratum: StratumDescription,
}

/// Either a rule-local parameter name or a named constant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermDescription {
    Parameter(String),
    Constant(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomDescription {
    pub predicate: String,
    #[serde(default)]
    pub terms: Vec<TermDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteralDescription {
    #[serde(default = "default_true")]
    pub positive: bool,
    pub atom: AtomDescription,
}

fn default_true() -> bool {
    true
}

/// Name-based mirror of [`FunctionExpression`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionExpressionDescription {
    Constant(f64),
    FunctionTerm { function: String, #[serde(default)] terms: Vec<TermDescription> },
    Negate(Box<FunctionExpressionDescription>),
    Subtract(Box<FunctionExpressionDescription>, Box<FunctionExpressionDescription>),
    Add(Box<FunctionExpressionDescription>, Box<FunctionExpressionDescription>),
    Multiply(Box<FunctionExpressionDescription>, Box<FunctionExpressionDescription>),
    Divide(Box<FunctionExpressionDescription>, Box<FunctionExpressionDescription>),
    Sum(Vec<FunctionExpressionDescription>),
    Product(Vec<FunctionExpressionDescription>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericConstraintDescription {
    pub operator: BooleanOperatorDescription,
    pub lhs: FunctionExpressionDescription,
    pub rhs: FunctionExpressionDescription,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConjunctiveConditionDescription {
    /// Names of this body's free parameters, in index order.
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub static_literals: Vec<LiteralDescription>,
    #[serde(default)]
    pub fluent_literals: Vec<LiteralDescription>,
    #[serde(default)]
    pub numeric_constraints: Vec<NumericConstraintDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDescription {
    pub head: AtomDescription,
    pub body: ConjunctiveConditionDescription,
    #[serde(default)]
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundAtomDescription {
    pub predicate: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundFunctionValueDescription {
    pub function: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub value: f64,
}

/// A complete, name-addressed program plus its initial facts, as a
/// human-authorable JSON/TOML document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramDescription {
    #[serde(default)]
    pub predicates: Vec<PredicateDescription>,
    #[serde(default)]
    pub functions: Vec<FunctionDescription>,
    #[serde(default)]
    pub rules: Vec<RuleDescription>,
    #[serde(default)]
    pub facts: Vec<GroundAtomDescription>,
    #[serde(default)]
    pub function_values: Vec<GroundFunctionValueDescription>,
}

impl ProgramDescription {
    /// Parses a description from a JSON document.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parses a description from a TOML document.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| GrounderError::configuration(format!("TOML parse error: {e}")))
    }

    /// Resolves every name to an interned [`Object`]/[`PredicateId`]/
    /// [`FunctionId`]/[`ParameterIndex`], producing a checked [`Program`]
    /// and the [`InitialFacts`] to ground it from.
    pub fn assemble(&self) -> Result<(Program, InitialFacts)> {
        let mut builder = ProgramBuilder::new();
        let mut predicate_ids: AHashMap<&str, PredicateId> = AHashMap::new();
        let mut function_ids: AHashMap<&str, FunctionId> = AHashMap::new();

        for p in &self.predicates {
            let id = builder.add_predicate(PredicateSymbol {
                name: p.name.clone(),
                arity: p.arity,
                stratum: p.stratum.into(),
            });
            predicate_ids.insert(&p.name, id);
        }
        for f in &self.functions {
            let id = builder.add_function(FunctionSymbol {
                name: f.name.clone(),
                arity: f.arity,
                stratum: f.stratum.into(),
            });
            function_ids.insert(&f.name, id);
        }

        for (idx, rule) in self.rules.iter().enumerate() {
            let variables = &rule.body.variables;
            let resolve_term = |builder: &mut ProgramBuilder, t: &TermDescription| -> Result<Term> {
                match t {
                    TermDescription::Parameter(name) => variables
                        .iter()
                        .position(|v| v == name)
                        .map(|i| Term::Parameter(ParameterIndex(i as u32)))
                        .ok_or_else(|| {
                            GrounderError::configuration(format!(
                                "rule {idx}: parameter '{name}' is not declared in body.variables"
                            ))
                        }),
                    TermDescription::Constant(name) => Ok(Term::Constant(builder.intern_object(name))),
                }
            };
            let resolve_atom = |builder: &mut ProgramBuilder, a: &AtomDescription| -> Result<Atom> {
                let predicate = *predicate_ids
                    .get(a.predicate.as_str())
                    .ok_or_else(|| GrounderError::configuration(format!("rule {idx}: unknown predicate '{}'", a.predicate)))?;
                let terms = a
                    .terms
                    .iter()
                    .map(|t| resolve_term(builder, t))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Atom { predicate, terms })
            };
            let resolve_literal = |builder: &mut ProgramBuilder, l: &LiteralDescription| -> Result<Literal> {
                Ok(Literal {
                    positive: l.positive,
                    atom: resolve_atom(builder, &l.atom)?,
                })
            };
            fn resolve_expression(
                builder: &mut ProgramBuilder,
                function_ids: &AHashMap<&str, FunctionId>,
                variables: &[String],
                idx: usize,
                expr: &FunctionExpressionDescription,
            ) -> Result<FunctionExpression> {
                use FunctionExpressionDescription as FED;
                Ok(match expr {
                    FED::Constant(c) => FunctionExpression::Constant(*c),
                    FED::FunctionTerm { function, terms } => {
                        let function = *function_ids.get(function.as_str()).ok_or_else(|| {
                            GrounderError::configuration(format!("rule {idx}: unknown function '{function}'"))
                        })?;
                        let resolved = terms
                            .iter()
                            .map(|t| match t {
                                TermDescription::Parameter(name) => variables
                                    .iter()
                                    .position(|v| v == name)
                                    .map(|i| Term::Parameter(ParameterIndex(i as u32)))
                                    .ok_or_else(|| {
                                        GrounderError::configuration(format!(
                                            "rule {idx}: parameter '{name}' is not declared in body.variables"
                                        ))
                                    }),
                                TermDescription::Constant(name) => Ok(Term::Constant(builder.intern_object(name))),
                            })
                            .collect::<Result<Vec<_>>>()?;
                        FunctionExpression::FunctionTerm(FunctionTerm { function, terms: resolved })
                    }
                    FED::Negate(e) => {
                        FunctionExpression::Negate(Box::new(resolve_expression(builder, function_ids, variables, idx, e)?))
                    }
                    FED::Subtract(a, b) => FunctionExpression::Subtract(
                        Box::new(resolve_expression(builder, function_ids, variables, idx, a)?),
                        Box::new(resolve_expression(builder, function_ids, variables, idx, b)?),
                    ),
                    FED::Add(a, b) => FunctionExpression::Add(
                        Box::new(resolve_expression(builder, function_ids, variables, idx, a)?),
                        Box::new(resolve_expression(builder, function_ids, variables, idx, b)?),
                    ),
                    FED::Multiply(a, b) => FunctionExpression::Multiply(
                        Box::new(resolve_expression(builder, function_ids, variables, idx, a)?),
                        Box::new(resolve_expression(builder, function_ids, variables, idx, b)?),
                    ),
                    FED::Divide(a, b) => FunctionExpression::Divide(
                        Box::new(resolve_expression(builder, function_ids, variables, idx, a)?),
                        Box::new(resolve_expression(builder, function_ids, variables, idx, b)?),
                    ),
                    FED::Sum(es) => FunctionExpression::Sum(
                        es.iter()
                            .map(|e| resolve_expression(builder, function_ids, variables, idx, e))
                            .collect::<Result<Vec<_>>>()?,
                    ),
                    FED::Product(es) => FunctionExpression::Product(
                        es.iter()
                            .map(|e| resolve_expression(builder, function_ids, variables, idx, e))
                            .collect::<Result<Vec<_>>>()?,
                    ),
                })
            }

            let head = resolve_atom(&mut builder, &rule.head)?;
            let static_literals = rule
                .body
                .static_literals
                .iter()
                .map(|l| resolve_literal(&mut builder, l))
                .collect::<Result<Vec<_>>>()?;
            let fluent_literals = rule
                .body
                .fluent_literals
                .iter()
                .map(|l| resolve_literal(&mut builder, l))
                .collect::<Result<Vec<_>>>()?;
            let numeric_constraints = rule
                .body
                .numeric_constraints
                .iter()
                .map(|c| {
                    Ok(NumericConstraint {
                        operator: c.operator.into(),
                        lhs: resolve_expression(&mut builder, &function_ids, variables, idx, &c.lhs)?,
                        rhs: resolve_expression(&mut builder, &function_ids, variables, idx, &c.rhs)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            builder.add_rule(Rule {
                head,
                body: ConjunctiveCondition {
                    variables: variables.len(),
                    static_literals,
                    fluent_literals,
                    numeric_constraints,
                },
                cost: rule.cost,
            });
        }

        let mut atoms: Vec<GroundAtom> = Vec::with_capacity(self.facts.len());
        for fact in &self.facts {
            let predicate = *predicate_ids
                .get(fact.predicate.as_str())
                .ok_or_else(|| GrounderError::configuration(format!("fact references unknown predicate '{}'", fact.predicate)))?;
            let args: Vec<Object> = fact.args.iter().map(|name| builder.intern_object(name)).collect();
            atoms.push(GroundAtom { predicate, args });
        }

        let mut values: Vec<(GroundFunctionTerm, f64)> = Vec::with_capacity(self.function_values.len());
        for fv in &self.function_values {
            let function = *function_ids
                .get(fv.function.as_str())
                .ok_or_else(|| GrounderError::configuration(format!("function value references unknown function '{}'", fv.function)))?;
            let args: Vec<Object> = fv.args.iter().map(|name| builder.intern_object(name)).collect();
            values.push((GroundFunctionTerm { function, args }, fv.value));
        }

        let program = builder.build()?;
        let mut initial = InitialFacts::new();
        initial.atoms = atoms;
        initial.values = values;
        Ok((program, initial))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "predicates": [
                {"name": "edge", "arity": 2, "stratum": "static"},
                {"name": "path", "arity": 2, "stratum": "derived"}
            ],
            "rules": [
                {
                    "head": {"predicate": "path", "terms": [{"parameter": "x"}, {"parameter": "y"}]},
                    "body": {
                        "variables": ["x", "y"],
                        "static_literals": [
                            {"atom": {"predicate": "edge", "terms": [{"parameter": "x"}, {"parameter": "y"}]}}
                        ]
                    }
                }
            ],
            "facts": [
                {"predicate": "edge", "args": ["a", "b"]}
            ]
        }"#
    }

    #[test]
    fn parses_and_assembles_a_simple_description() {
        let description = ProgramDescription::from_json(sample_json()).unwrap();
        let (program, initial) = description.assemble().unwrap();
        assert_eq!(program.predicates().len(), 2);
        assert_eq!(program.rules().len(), 1);
        assert_eq!(initial.atoms.len(), 1);
    }

    #[test]
    fn unknown_predicate_reference_is_a_configuration_error() {
        let description = ProgramDescription {
            predicates: vec![],
            functions: vec![],
            rules: vec![RuleDescription {
                head: AtomDescription {
                    predicate: "missing".into(),
                    terms: vec![],
                },
                body: ConjunctiveConditionDescription::default(),
                cost: 0.0,
            }],
            facts: vec![],
            function_values: vec![],
        };
        assert!(description.assemble().is_err());
    }
}
