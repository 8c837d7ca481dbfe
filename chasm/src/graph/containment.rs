//! This module defines [RewrittenQuery],
//! which describes the facts of a node as a conjunctive query over the EDB.

use std::collections::HashMap;

use crate::model::{Literal, LogicalTerm, VariableId};

/// Largest number of body literals a rewritten query may have.
pub const MAX_QUERY_LENGTH: usize = 16;

/// Where a body literal of an unfolded rule takes its facts from.
#[derive(Debug, Clone, Copy)]
pub enum UnfoldInput<'a> {
    /// The literal is evaluated on the EDB
    Edb,
    /// The literal is evaluated on a node, which may have a query
    Node(Option<&'a RewrittenQuery>),
}

/// Conjunctive query `head :- body` whose body only refers to EDB predicates.
///
/// Two nodes whose queries are equivalent contain the same facts,
/// so a rule execution whose query is equivalent to that of an existing node
/// cannot derive anything new.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenQuery {
    head: Literal,
    body: Vec<Literal>,
}

impl RewrittenQuery {
    /// Create a new [RewrittenQuery].
    pub fn new(head: Literal, body: Vec<Literal>) -> Self {
        Self { head, body }
    }

    /// Return the head literal.
    pub fn head(&self) -> &Literal {
        &self.head
    }

    /// Return the body literals.
    pub fn body(&self) -> &[Literal] {
        &self.body
    }

    /// Return a bound that is larger than every variable id in this query.
    fn variable_bound(&self) -> u32 {
        std::iter::once(&self.head)
            .chain(&self.body)
            .flat_map(Literal::variables)
            .map(|variable| variable.0 + 1)
            .max()
            .unwrap_or(0)
    }

    /// Rename every variable by adding `offset` to its id.
    fn shifted(&self, offset: u32) -> Self {
        let shift = |literal: &Literal| {
            Literal::new(
                literal.predicate(),
                literal
                    .terms()
                    .iter()
                    .map(|term| match term {
                        LogicalTerm::Variable(variable) => {
                            LogicalTerm::Variable(VariableId(variable.0 + offset))
                        }
                        constant => *constant,
                    })
                    .collect(),
            )
        };

        Self {
            head: shift(&self.head),
            body: self.body.iter().map(shift).collect(),
        }
    }

    /// Compute the query of a rule application.
    ///
    /// `rule_body` holds the body literals of a rule with a single head literal `rule_head`.
    /// For every body literal, `inputs` says where its facts come from.
    ///
    /// Returns `None` if some input has no query, the head and body cannot be unified
    /// or the result exceeds [MAX_QUERY_LENGTH] literals.
    pub fn unfold(
        rule_head: &Literal,
        rule_body: &[Literal],
        inputs: &[UnfoldInput<'_>],
    ) -> Option<Self> {
        debug_assert_eq!(rule_body.len(), inputs.len());

        let mut next_variable = std::iter::once(rule_head)
            .chain(rule_body)
            .flat_map(Literal::variables)
            .map(|variable| variable.0 + 1)
            .max()
            .unwrap_or(0);

        let mut unifier = Unifier::default();
        let mut body = Vec::new();

        for (literal, input) in rule_body.iter().zip(inputs) {
            match input {
                UnfoldInput::Edb => body.push(literal.clone()),
                UnfoldInput::Node(None) => return None,
                UnfoldInput::Node(Some(query)) => {
                    let query = query.shifted(next_variable);
                    next_variable = query.variable_bound().max(next_variable);

                    if !unifier.unify_literals(query.head(), literal) {
                        return None;
                    }
                    body.extend(query.body);
                }
            }

            if body.len() > MAX_QUERY_LENGTH {
                return None;
            }
        }

        Some(Self {
            head: unifier.apply(rule_head),
            body: body.iter().map(|literal| unifier.apply(literal)).collect(),
        })
    }

    /// Return `true` if both queries have the same answers on every database.
    pub fn is_equivalent(&self, other: &RewrittenQuery) -> bool {
        self.head.predicate() == other.head.predicate()
            && has_homomorphism(self, other)
            && has_homomorphism(other, self)
    }
}

/// Most general unifier, built incrementally.
#[derive(Debug, Default)]
struct Unifier {
    bindings: HashMap<VariableId, LogicalTerm>,
}

impl Unifier {
    fn resolve(&self, mut term: LogicalTerm) -> LogicalTerm {
        while let LogicalTerm::Variable(variable) = term {
            match self.bindings.get(&variable) {
                Some(bound) => term = *bound,
                None => break,
            }
        }

        term
    }

    fn unify(&mut self, first: LogicalTerm, second: LogicalTerm) -> bool {
        match (self.resolve(first), self.resolve(second)) {
            (first, second) if first == second => true,
            (LogicalTerm::Variable(variable), term) | (term, LogicalTerm::Variable(variable)) => {
                self.bindings.insert(variable, term);
                true
            }
            (LogicalTerm::Constant(_), LogicalTerm::Constant(_)) => false,
        }
    }

    fn unify_literals(&mut self, first: &Literal, second: &Literal) -> bool {
        first.predicate() == second.predicate()
            && first.arity() == second.arity()
            && first
                .terms()
                .iter()
                .zip(second.terms())
                .all(|(a, b)| self.unify(*a, *b))
    }

    fn apply(&self, literal: &Literal) -> Literal {
        Literal::new(
            literal.predicate(),
            literal
                .terms()
                .iter()
                .map(|term| self.resolve(*term))
                .collect(),
        )
    }
}

/// Search a mapping of the variables of `from` to terms of `to`
/// that maps the head of `from` onto the head of `to` and every body literal of `from`
/// onto some body literal of `to`.
fn has_homomorphism(from: &RewrittenQuery, to: &RewrittenQuery) -> bool {
    let mut mapping = HashMap::new();
    if extend_mapping(&mut mapping, from.head(), to.head()).is_none() {
        return false;
    }

    search(&mut mapping, from.body(), to.body())
}

/// Try to map `from` onto `to`, returning the newly bound variables on success.
fn extend_mapping(
    mapping: &mut HashMap<VariableId, LogicalTerm>,
    from: &Literal,
    to: &Literal,
) -> Option<Vec<VariableId>> {
    if from.predicate() != to.predicate() || from.arity() != to.arity() {
        return None;
    }

    let mut added = Vec::new();
    for (source, target) in from.terms().iter().zip(to.terms()) {
        let consistent = match source {
            LogicalTerm::Constant(_) => source == target,
            LogicalTerm::Variable(variable) => match mapping.get(variable) {
                Some(mapped) => mapped == target,
                None => {
                    mapping.insert(*variable, *target);
                    added.push(*variable);
                    true
                }
            },
        };

        if !consistent {
            for variable in added {
                mapping.remove(&variable);
            }
            return None;
        }
    }

    Some(added)
}

fn search(
    mapping: &mut HashMap<VariableId, LogicalTerm>,
    remaining: &[Literal],
    targets: &[Literal],
) -> bool {
    let Some((first, rest)) = remaining.split_first() else {
        return true;
    };

    for target in targets {
        if let Some(added) = extend_mapping(mapping, first, target) {
            if search(mapping, rest, targets) {
                return true;
            }

            for variable in added {
                mapping.remove(&variable);
            }
        }
    }

    false
}

#[cfg(test)]
mod test {
    use chasm_physical::datatypes::Term;
    use test_log::test;

    use crate::model::{Literal, LogicalTerm, PredicateId};

    use super::{RewrittenQuery, UnfoldInput};

    fn literal(predicate: u32, terms: &[i64]) -> Literal {
        // negative numbers denote constants
        Literal::new(
            PredicateId(predicate),
            terms
                .iter()
                .map(|&term| {
                    if term < 0 {
                        LogicalTerm::constant(Term::constant(term.unsigned_abs()))
                    } else {
                        LogicalTerm::variable(term as u32)
                    }
                })
                .collect(),
        )
    }

    #[test]
    fn renamed_queries_are_equivalent() {
        let first = RewrittenQuery::new(
            literal(9, &[0, 2]),
            vec![literal(1, &[0, 1]), literal(1, &[1, 2])],
        );
        let second = RewrittenQuery::new(
            literal(9, &[5, 7]),
            vec![literal(1, &[6, 7]), literal(1, &[5, 6])],
        );
        assert!(first.is_equivalent(&second));

        let path = RewrittenQuery::new(literal(9, &[0, 1]), vec![literal(1, &[0, 1])]);
        assert!(!first.is_equivalent(&path));
    }

    #[test]
    fn redundant_literals_do_not_matter() {
        let minimal = RewrittenQuery::new(literal(9, &[0]), vec![literal(1, &[0, 1])]);
        let redundant = RewrittenQuery::new(
            literal(9, &[0]),
            vec![literal(1, &[0, 1]), literal(1, &[0, 2])],
        );
        assert!(minimal.is_equivalent(&redundant));

        let constant = RewrittenQuery::new(literal(9, &[0]), vec![literal(1, &[0, -4])]);
        assert!(!minimal.is_equivalent(&constant));
    }

    #[test]
    fn unfold_through_node_query() {
        // node: p(X, Y) :- e(X, Y)
        let node = RewrittenQuery::new(literal(2, &[0, 1]), vec![literal(1, &[0, 1])]);
        // rule: q(A, C) :- p(A, B), e(B, C)
        let head = literal(3, &[0, 2]);
        let body = vec![literal(2, &[0, 1]), literal(1, &[1, 2])];

        let unfolded =
            RewrittenQuery::unfold(&head, &body, &[UnfoldInput::Node(Some(&node)), UnfoldInput::Edb])
                .unwrap();
        assert_eq!(unfolded.body().len(), 2);

        let expected = RewrittenQuery::new(
            literal(3, &[0, 2]),
            vec![literal(1, &[0, 1]), literal(1, &[1, 2])],
        );
        assert!(unfolded.is_equivalent(&expected));

        assert!(
            RewrittenQuery::unfold(&head, &body, &[UnfoldInput::Node(None), UnfoldInput::Edb])
                .is_none()
        );
    }
}
