//! This module defines [Literal].

use chasm_physical::{datatypes::Term, error::Error as PhysicalError, tabular::Segment};

use super::term::{LogicalTerm, PredicateId, VariableId};

/// A predicate applied to a list of terms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal {
    predicate: PredicateId,
    terms: Vec<LogicalTerm>,
}

impl Literal {
    /// Create a new [Literal].
    pub fn new(predicate: PredicateId, terms: Vec<LogicalTerm>) -> Self {
        Self { predicate, terms }
    }

    /// Return the predicate of this literal.
    pub fn predicate(&self) -> PredicateId {
        self.predicate
    }

    /// Return the arguments of this literal.
    pub fn terms(&self) -> &[LogicalTerm] {
        &self.terms
    }

    /// Return the number of arguments.
    pub fn arity(&self) -> usize {
        self.terms.len()
    }

    /// Iterate over the variables of this literal, including repetitions.
    pub fn variables(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.terms.iter().filter_map(LogicalTerm::as_variable)
    }

    /// Return the variables of this literal in the order of their first occurrence.
    pub fn distinct_variables(&self) -> Vec<VariableId> {
        let mut result = Vec::new();
        for variable in self.variables() {
            if !result.contains(&variable) {
                result.push(variable);
            }
        }

        result
    }

    /// Return the first position at which the variable occurs.
    pub fn first_position(&self, variable: VariableId) -> Option<usize> {
        self.terms
            .iter()
            .position(|term| term.as_variable() == Some(variable))
    }

    /// Return, for each [distinct variable][Literal::distinct_variables],
    /// the position of its first occurrence.
    pub fn variable_positions(&self) -> Vec<usize> {
        self.distinct_variables()
            .into_iter()
            .filter_map(|variable| self.first_position(variable))
            .collect()
    }

    /// Keep only the rows of `data` that match this literal,
    /// i.e. that carry the literal's constants
    /// and agree on all positions of a repeated variable.
    ///
    /// Returns a cheap copy if the literal imposes no condition.
    pub fn select(&self, data: &Segment) -> Segment {
        let mut checks = Vec::new();
        for (position, term) in self.terms.iter().enumerate() {
            match term {
                LogicalTerm::Constant(constant) => checks.push(Check::Constant(position, *constant)),
                LogicalTerm::Variable(variable) => {
                    if let Some(first) = self.first_position(*variable) {
                        if first != position {
                            checks.push(Check::Equal(first, position));
                        }
                    }
                }
            }
        }

        if checks.is_empty() {
            return data.clone();
        }

        let rows = (0..data.len())
            .filter(|&row| {
                checks.iter().all(|check| match *check {
                    Check::Constant(position, constant) => data.value(row, position) == constant,
                    Check::Equal(first, second) => {
                        data.value(row, first) == data.value(row, second)
                    }
                })
            })
            .collect::<Vec<_>>();

        data.gather(&rows)
    }

    /// Select the matching rows of `data` and project them
    /// onto the [distinct variables][Literal::distinct_variables] of this literal.
    pub fn bind(&self, data: &Segment) -> Result<Segment, PhysicalError> {
        self.select(data).project(&self.variable_positions())
    }
}

/// Condition a row must satisfy to match a literal.
#[derive(Debug, Clone, Copy)]
enum Check {
    Constant(usize, Term),
    Equal(usize, usize),
}
