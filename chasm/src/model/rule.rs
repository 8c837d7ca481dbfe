//! This module defines [Rule].

use std::collections::BTreeSet;

use crate::error::Error;

use super::{literal::Literal, term::VariableId};

/// A rule `head :- body` whose head may contain existentially quantified variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Head literals of the rule
    head: Vec<Literal>,
    /// Body literals of the rule, evaluated from left to right
    body: Vec<Literal>,
    /// Variables of the head that receive fresh nulls
    existentials: BTreeSet<VariableId>,
    /// Rules of lower strata are saturated first
    stratum: usize,
    /// Names used when displaying variables, indexed by [VariableId]
    variable_names: Vec<String>,
}

impl Rule {
    /// Construct a new rule.
    pub fn new(head: Vec<Literal>, body: Vec<Literal>, existentials: BTreeSet<VariableId>) -> Self {
        Self {
            head,
            body,
            existentials,
            stratum: 0,
            variable_names: Vec::new(),
        }
    }

    /// Attach names to the variables of this rule.
    pub fn with_variable_names(mut self, names: Vec<String>) -> Self {
        self.variable_names = names;
        self
    }

    /// Place this rule into the given stratum.
    pub fn with_stratum(mut self, stratum: usize) -> Self {
        self.stratum = stratum;
        self
    }

    /// Return the head literals.
    pub fn head(&self) -> &[Literal] {
        &self.head
    }

    /// Return the body literals.
    pub fn body(&self) -> &[Literal] {
        &self.body
    }

    /// Return the existential variables.
    pub fn existentials(&self) -> &BTreeSet<VariableId> {
        &self.existentials
    }

    /// Return `true` if the variable is existentially quantified.
    pub fn is_existential(&self, variable: VariableId) -> bool {
        self.existentials.contains(&variable)
    }

    /// Return `true` if the rule has no existential variables.
    pub fn is_datalog(&self) -> bool {
        self.existentials.is_empty()
    }

    /// Return the stratum of this rule.
    pub fn stratum(&self) -> usize {
        self.stratum
    }

    pub(crate) fn set_stratum(&mut self, stratum: usize) {
        self.stratum = stratum;
    }

    /// Return all variables that occur in the body.
    pub fn body_variables(&self) -> BTreeSet<VariableId> {
        self.body.iter().flat_map(Literal::variables).collect()
    }

    /// Return the universal variables that occur in the head, in ascending order.
    ///
    /// These determine the nulls of the existential variables.
    pub fn frontier(&self) -> Vec<VariableId> {
        self.head
            .iter()
            .flat_map(Literal::variables)
            .filter(|variable| !self.is_existential(*variable))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Return the display name of a variable.
    pub fn variable_name(&self, variable: VariableId) -> String {
        let prefix = if self.is_existential(variable) { '!' } else { '?' };

        match self.variable_names.get(variable.index()) {
            Some(name) => format!("{prefix}{name}"),
            None => format!("{prefix}V{}", variable.0),
        }
    }

    /// Check that the rule is well formed.
    ///
    /// `index` is only used to identify the rule in error messages.
    pub fn validate(&self, index: usize) -> Result<(), Error> {
        if self.head.is_empty() || self.body.is_empty() {
            return Err(Error::EmptyRule { rule: index });
        }

        let body_variables = self.body_variables();

        if let Some(variable) = self
            .existentials
            .iter()
            .find(|variable| body_variables.contains(variable))
        {
            return Err(Error::ExistentialInBody {
                rule: index,
                variable: self.variable_name(*variable),
            });
        }

        if let Some(variable) = self
            .frontier()
            .into_iter()
            .find(|variable| !body_variables.contains(variable))
        {
            return Err(Error::UnsafeHeadVariable {
                rule: index,
                variable: self.variable_name(variable),
            });
        }

        Ok(())
    }
}
