//! This module defines the terms that can appear in literals.

use std::fmt;

use chasm_physical::datatypes::Term;

/// Identifies a predicate of a [Program][super::Program].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PredicateId(pub u32);

impl PredicateId {
    /// Return the position of the predicate in the program's predicate table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PredicateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifies a variable within one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableId(pub u32);

impl VariableId {
    /// Return the number of the variable.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Argument of a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogicalTerm {
    /// A variable, which is universal unless the rule declares it existential
    Variable(VariableId),
    /// An encoded constant or null
    Constant(Term),
}

impl LogicalTerm {
    /// Create a variable term.
    pub fn variable(id: u32) -> Self {
        Self::Variable(VariableId(id))
    }

    /// Create a constant term.
    pub fn constant(term: Term) -> Self {
        Self::Constant(term)
    }

    /// Return the variable if this term is one.
    pub fn as_variable(&self) -> Option<VariableId> {
        match self {
            Self::Variable(variable) => Some(*variable),
            Self::Constant(_) => None,
        }
    }
}
