//! Checked, assembled lifted programs
//!
//! A [`Program`] is the validated input to [`crate::api::build`]: object
//! table, predicate/function symbol tables, and rules, with every
//! cross-reference checked up front so that setup-time configuration
//! errors (undefined symbol, arity mismatch, unreachable parameter) are
//! caught before any analysis runs.

use crate::error::{GrounderError, Result};
use crate::object::ObjectTable;

use super::formalism::{
    Atom, FunctionId, FunctionSymbol, PredicateId, PredicateSymbol, Rule, RuleId, Term,
};
use super::stratify::{self, Stratification};

/// A fully assembled, statically-checked lifted program.
#[derive(Debug, Clone)]
pub struct Program {
    pub(crate) objects: ObjectTable,
    pub(crate) predicates: Vec<PredicateSymbol>,
    pub(crate) functions: Vec<FunctionSymbol>,
    pub(crate) rules: Vec<Rule>,
    pub(crate) stratification: Stratification,
}

impl Program {
    pub fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    pub fn predicates(&self) -> &[PredicateSymbol] {
        &self.predicates
    }

    pub fn functions(&self) -> &[FunctionSymbol] {
        &self.functions
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn predicate(&self, id: PredicateId) -> &PredicateSymbol {
        &self.predicates[id.index()]
    }

    pub fn function(&self, id: FunctionId) -> &FunctionSymbol {
        &self.functions[id.index()]
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.index()]
    }

    pub fn rule_ids(&self) -> impl Iterator<Item = RuleId> {
        (0..self.rules.len() as u32).map(RuleId)
    }

    /// This program's predicate-dependency stratification (component G,
    /// §4.G), computed once at [`ProgramBuilder::build`].
    pub fn stratification(&self) -> &Stratification {
        &self.stratification
    }
}

/// Incrementally assembles a [`Program`], validating cross-references at
/// [`ProgramBuilder::build`].
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    objects: ObjectTable,
    predicates: Vec<PredicateSymbol>,
    functions: Vec<FunctionSymbol>,
    rules: Vec<Rule>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        ProgramBuilder::default()
    }

    pub fn intern_object(&mut self, name: &str) -> crate::object::Object {
        self.objects.intern(name)
    }

    pub fn add_predicate(&mut self, symbol: PredicateSymbol) -> PredicateId {
        let id = PredicateId(self.predicates.len() as u32);
        self.predicates.push(symbol);
        id
    }

    pub fn add_function(&mut self, symbol: FunctionSymbol) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        self.functions.push(symbol);
        id
    }

    pub fn add_rule(&mut self, rule: Rule) -> RuleId {
        let id = RuleId(self.rules.len() as u32);
        self.rules.push(rule);
        id
    }

    /// Validates every cross-reference and returns the assembled
    /// program, or a [`GrounderError::Configuration`] naming the first
    /// problem found.
    pub fn build(self) -> Result<Program> {
        for (idx, rule) in self.rules.iter().enumerate() {
            self.validate_atom(&rule.head, rule.body.arity(), idx)?;
            let head_pred = self
                .predicates
                .get(rule.head.predicate.index())
                .ok_or_else(|| {
                    GrounderError::configuration(format!(
                        "rule {idx}: head references undefined predicate {:?}",
                        rule.head.predicate
                    ))
                })?;
            if head_pred.stratum == super::formalism::Stratum::Static {
                return Err(GrounderError::configuration(format!(
                    "rule {idx}: head predicate '{}' is static and cannot be a rule head",
                    head_pred.name
                )));
            }

            for lit in rule.body.all_literals() {
                self.validate_atom(&lit.atom, rule.body.arity(), idx)?;
            }
            for constraint in &rule.body.numeric_constraints {
                self.validate_expression(&constraint.lhs, rule.body.arity(), idx)?;
                self.validate_expression(&constraint.rhs, rule.body.arity(), idx)?;
            }

            // Every parameter must appear in at least one body position
            // (else its domain cannot be computed by restriction).
            let mut seen = vec![false; rule.body.arity()];
            for lit in rule.body.all_literals() {
                for p in lit.distinct_parameters() {
                    if p.index() < seen.len() {
                        seen[p.index()] = true;
                    }
                }
            }
            for constraint in &rule.body.numeric_constraints {
                for p in constraint.distinct_parameters() {
                    if p.index() < seen.len() {
                        seen[p.index()] = true;
                    }
                }
            }
            if let Some(unreachable) = seen.iter().position(|&s| !s) {
                return Err(GrounderError::configuration(format!(
                    "rule {idx}: parameter {unreachable} is never mentioned in the body"
                )));
            }
        }

        let program = Program {
            objects: self.objects,
            predicates: self.predicates,
            functions: self.functions,
            rules: self.rules,
            stratification: Stratification::default_empty(),
        };
        let stratification = stratify::compute(&program)?;
        Ok(Program {
            stratification,
            ..program
        })
    }

    fn validate_atom(&self, atom: &Atom, arity: usize, rule_idx: usize) -> Result<()> {
        let symbol = self.predicates.get(atom.predicate.index()).ok_or_else(|| {
            GrounderError::configuration(format!(
                "rule {rule_idx}: references undefined predicate {:?}",
                atom.predicate
            ))
        })?;
        if symbol.arity != atom.terms.len() {
            return Err(GrounderError::configuration(format!(
                "rule {rule_idx}: predicate '{}' expects {} arguments, got {}",
                symbol.name,
                symbol.arity,
                atom.terms.len()
            )));
        }
        for term in &atom.terms {
            if let Term::Parameter(p) = term {
                if p.index() >= arity {
                    return Err(GrounderError::configuration(format!(
                        "rule {rule_idx}: parameter index {} out of range for arity {arity}",
                        p.index()
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_expression(
        &self,
        expr: &super::formalism::FunctionExpression,
        arity: usize,
        rule_idx: usize,
    ) -> Result<()> {
        use super::formalism::FunctionExpression as FE;
        match expr {
            FE::Constant(_) => Ok(()),
            FE::FunctionTerm(term) => {
                let symbol = self.functions.get(term.function.index()).ok_or_else(|| {
                    GrounderError::configuration(format!(
                        "rule {rule_idx}: references undefined function {:?}",
                        term.function
                    ))
                })?;
                if symbol.arity != term.terms.len() {
                    return Err(GrounderError::configuration(format!(
                        "rule {rule_idx}: function '{}' expects {} arguments, got {}",
                        symbol.name,
                        symbol.arity,
                        term.terms.len()
                    )));
                }
                for t in &term.terms {
                    if let Term::Parameter(p) = t {
                        if p.index() >= arity {
                            return Err(GrounderError::configuration(format!(
                                "rule {rule_idx}: parameter index {} out of range for arity {arity}",
                                p.index()
                            )));
                        }
                    }
                }
                Ok(())
            }
            FE::Negate(e) => self.validate_expression(e, arity, rule_idx),
            FE::Subtract(a, b) | FE::Add(a, b) | FE::Multiply(a, b) | FE::Divide(a, b) => {
                self.validate_expression(a, arity, rule_idx)?;
                self.validate_expression(b, arity, rule_idx)
            }
            FE::Sum(es) | FE::Product(es) => {
                for e in es {
                    self.validate_expression(e, arity, rule_idx)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grounding::formalism::{
        ConjunctiveCondition, Literal, ParameterIndex, Stratum, Term,
    };

    fn atom(pred: PredicateId, terms: Vec<Term>) -> Atom {
        Atom { predicate: pred, terms }
    }

    #[test]
    fn rejects_unreachable_parameter() {
        let mut b = ProgramBuilder::new();
        let p = b.add_predicate(PredicateSymbol {
            name: "p".into(),
            arity: 1,
            stratum: Stratum::Fluent,
        });
        let q = b.add_predicate(PredicateSymbol {
            name: "q".into(),
            arity: 1,
            stratum: Stratum::Fluent,
        });
        let rule = Rule {
            head: atom(q, vec![Term::Parameter(ParameterIndex(0))]),
            body: ConjunctiveCondition {
                variables: 2,
                static_literals: vec![],
                fluent_literals: vec![Literal {
                    positive: true,
                    atom: atom(p, vec![Term::Parameter(ParameterIndex(0))]),
                }],
                numeric_constraints: vec![],
            },
            cost: 1.0,
        };
        b.add_rule(rule);
        assert!(b.build().is_err());
    }

    #[test]
    fn rejects_static_rule_head() {
        let mut b = ProgramBuilder::new();
        let s = b.add_predicate(PredicateSymbol {
            name: "s".into(),
            arity: 1,
            stratum: Stratum::Static,
        });
        let rule = Rule {
            head: atom(s, vec![Term::Parameter(ParameterIndex(0))]),
            body: ConjunctiveCondition {
                variables: 1,
                static_literals: vec![Literal {
                    positive: true,
                    atom: atom(s, vec![Term::Parameter(ParameterIndex(0))]),
                }],
                fluent_literals: vec![],
                numeric_constraints: vec![],
            },
            cost: 1.0,
        };
        b.add_rule(rule);
        assert!(b.build().is_err());
    }

    #[test]
    fn accepts_well_formed_program() {
        let mut b = ProgramBuilder::new();
        let t = b.add_predicate(PredicateSymbol {
            name: "t".into(),
            arity: 1,
            stratum: Stratum::Static,
        });
        let q = b.add_predicate(PredicateSymbol {
            name: "q".into(),
            arity: 1,
            stratum: Stratum::Fluent,
        });
        let rule = Rule {
            head: atom(q, vec![Term::Parameter(ParameterIndex(0))]),
            body: ConjunctiveCondition {
                variables: 1,
                static_literals: vec![Literal {
                    positive: true,
                    atom: atom(t, vec![Term::Parameter(ParameterIndex(0))]),
                }],
                fluent_literals: vec![],
                numeric_constraints: vec![],
            },
            cost: 1.0,
        };
        b.add_rule(rule);
        assert!(b.build().is_ok());
    }
}
