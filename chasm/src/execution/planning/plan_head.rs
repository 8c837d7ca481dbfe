//! This module defines [HeadPlan], which builds the head facts
//! from the result of the body.

use chasm_physical::datatypes::Term;

use crate::model::{Literal, LogicalTerm, PredicateId, Rule, VariableId};

/// Source of one column of a head literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadColumn {
    /// Column of the body result
    Body(usize),
    /// Nulls of the existential variable with the given position in [HeadPlan::existentials]
    Null(usize),
    /// A constant
    Constant(Term),
}

/// Test whether a binding of the body already satisfies the head,
/// in which case no nulls need to be created for it.
#[derive(Debug, Clone)]
pub struct RestrictedCheck {
    /// The single head literal
    pub literal: Literal,
    /// Columns of the body result holding the universal head variables
    pub body_columns: Vec<usize>,
    /// Positions of the same variables in the head literal
    pub head_positions: Vec<usize>,
}

/// Plan for the construction of the head facts.
#[derive(Debug, Clone)]
pub struct HeadPlan {
    literals: Vec<(PredicateId, Vec<HeadColumn>)>,
    existentials: Vec<VariableId>,
    frontier_columns: Vec<usize>,
    restricted_check: Option<RestrictedCheck>,
}

impl HeadPlan {
    /// Plan the head of `rule`, given the variables of the body result.
    ///
    /// With `restricted` set, rules with existential variables and a single head literal
    /// only create nulls for bindings that do not already satisfy the head.
    pub fn new(rule: &Rule, body_variables: &[VariableId], restricted: bool) -> Self {
        let column_of = |variable: VariableId| {
            body_variables
                .iter()
                .position(|&candidate| candidate == variable)
        };
        let existentials = rule.existentials().iter().copied().collect::<Vec<_>>();

        let literals = rule
            .head()
            .iter()
            .map(|literal| {
                let columns = literal
                    .terms()
                    .iter()
                    .filter_map(|term| match *term {
                        LogicalTerm::Constant(constant) => Some(HeadColumn::Constant(constant)),
                        LogicalTerm::Variable(variable) => match existentials
                            .iter()
                            .position(|&existential| existential == variable)
                        {
                            Some(index) => Some(HeadColumn::Null(index)),
                            None => column_of(variable).map(HeadColumn::Body),
                        },
                    })
                    .collect();

                (literal.predicate(), columns)
            })
            .collect();

        let frontier_columns = rule.frontier().into_iter().filter_map(column_of).collect();

        let restricted_check = match rule.head() {
            [literal] if restricted && !rule.is_datalog() => {
                let mut body_columns = Vec::new();
                let mut head_positions = Vec::new();
                for variable in literal.distinct_variables() {
                    if rule.is_existential(variable) {
                        continue;
                    }

                    if let (Some(column), Some(position)) =
                        (column_of(variable), literal.first_position(variable))
                    {
                        body_columns.push(column);
                        head_positions.push(position);
                    }
                }

                Some(RestrictedCheck {
                    literal: literal.clone(),
                    body_columns,
                    head_positions,
                })
            }
            _ => None,
        };

        Self {
            literals,
            existentials,
            frontier_columns,
            restricted_check,
        }
    }

    /// Return, for each head literal, its predicate and the sources of its columns.
    pub fn literals(&self) -> &[(PredicateId, Vec<HeadColumn>)] {
        &self.literals
    }

    /// Return the existential variables in ascending order.
    pub fn existentials(&self) -> &[VariableId] {
        &self.existentials
    }

    /// Return the columns of the body result that determine the nulls.
    pub fn frontier_columns(&self) -> &[usize] {
        &self.frontier_columns
    }

    /// Return the check that filters out already satisfied bindings, if enabled.
    pub fn restricted_check(&self) -> Option<&RestrictedCheck> {
        self.restricted_check.as_ref()
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use chasm_physical::datatypes::Term;
    use test_log::test;

    use crate::model::{Literal, LogicalTerm, PredicateId, Rule, VariableId};

    use super::{HeadColumn, HeadPlan};

    fn existential_rule() -> Rule {
        // q(c7, Y, N, X) :- e(X, Y)
        Rule::new(
            vec![Literal::new(
                PredicateId(1),
                vec![
                    LogicalTerm::constant(Term::constant(7)),
                    LogicalTerm::variable(1),
                    LogicalTerm::variable(2),
                    LogicalTerm::variable(0),
                ],
            )],
            vec![Literal::new(
                PredicateId(0),
                vec![LogicalTerm::variable(0), LogicalTerm::variable(1)],
            )],
            BTreeSet::from([VariableId(2)]),
        )
    }

    #[test]
    fn head_columns() {
        let plan = HeadPlan::new(&existential_rule(), &[VariableId(0), VariableId(1)], true);

        assert_eq!(
            plan.literals()[0].1,
            vec![
                HeadColumn::Constant(Term::constant(7)),
                HeadColumn::Body(1),
                HeadColumn::Null(0),
                HeadColumn::Body(0)
            ]
        );
        assert_eq!(plan.existentials(), &[VariableId(2)]);
        assert_eq!(plan.frontier_columns(), &[0, 1]);

        let check = plan.restricted_check().unwrap();
        assert_eq!(check.body_columns, vec![1, 0]);
        assert_eq!(check.head_positions, vec![1, 3]);
    }

    #[test]
    fn oblivious_has_no_check() {
        let plan = HeadPlan::new(&existential_rule(), &[VariableId(0), VariableId(1)], false);
        assert!(plan.restricted_check().is_none());
    }
}
