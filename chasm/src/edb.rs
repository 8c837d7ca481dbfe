//! This module defines the interface to the extensional facts, [EdbLayer],
//! and the in-memory implementation [InMemoryEdb].

use std::collections::HashMap;

use chasm_physical::{datatypes::Term, tabular::Segment};

use crate::{
    error::Error,
    model::{Literal, PredicateId, Program},
};

/// Source of the facts that are given as input to the chase.
pub trait EdbLayer: std::fmt::Debug + Send + Sync {
    /// Return the facts matching the given literal in full arity.
    ///
    /// Constants and repeated variables of the literal act as filters.
    /// The result is sorted and free of duplicates.
    fn query(&self, literal: &Literal) -> Result<Segment, Error>;

    /// Return the arity of the relation stored for the predicate, if any.
    fn arity(&self, predicate: PredicateId) -> Option<usize>;

    /// Return the number of facts stored for the predicate.
    fn count(&self, predicate: PredicateId) -> usize;

    /// Return every predicate that has stored facts.
    fn predicates(&self) -> Vec<PredicateId>;
}

/// Keeps one sorted relation per predicate in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEdb {
    relations: HashMap<PredicateId, Segment>,
}

impl InMemoryEdb {
    /// Create an empty [InMemoryEdb].
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the facts of a program.
    pub fn from_program(program: &Program) -> Result<Self, Error> {
        let mut rows = HashMap::<PredicateId, Vec<&[Term]>>::new();
        for (predicate, terms) in program.facts() {
            rows.entry(*predicate).or_default().push(terms);
        }

        let mut result = Self::new();
        for (predicate, rows) in rows {
            let segment = Segment::from_rows(program.arity(predicate), rows)?;
            result.add_relation(predicate, segment)?;
        }

        Ok(result)
    }

    /// Add facts for a predicate, merging them with the ones already stored.
    pub fn add_relation(&mut self, predicate: PredicateId, segment: Segment) -> Result<(), Error> {
        let segment = segment.without_provenance();

        let merged = match self.relations.remove(&predicate) {
            Some(existing) => Segment::concat(existing.arity(), &[existing, segment])?,
            None => segment,
        };

        log::debug!(
            "EDB relation {predicate}: {} facts of arity {}",
            merged.len(),
            merged.arity()
        );
        self.relations.insert(predicate, merged.sorted_and_unique());

        Ok(())
    }

    /// Return the whole relation of a predicate.
    pub fn relation(&self, predicate: PredicateId) -> Option<&Segment> {
        self.relations.get(&predicate)
    }
}

impl EdbLayer for InMemoryEdb {
    fn query(&self, literal: &Literal) -> Result<Segment, Error> {
        let Some(relation) = self.relations.get(&literal.predicate()) else {
            return Ok(Segment::empty(literal.arity()));
        };

        if relation.arity() != literal.arity() {
            return Err(Error::PredicateArity {
                predicate: literal.predicate().to_string(),
                expected: relation.arity(),
                found: literal.arity(),
            });
        }

        Ok(literal.select(relation))
    }

    fn arity(&self, predicate: PredicateId) -> Option<usize> {
        self.relations.get(&predicate).map(Segment::arity)
    }

    fn count(&self, predicate: PredicateId) -> usize {
        self.relations.get(&predicate).map_or(0, Segment::len)
    }

    fn predicates(&self) -> Vec<PredicateId> {
        let mut result = self.relations.keys().copied().collect::<Vec<_>>();
        result.sort();
        result
    }
}

#[cfg(test)]
mod test {
    use chasm_physical::{datatypes::Term, tabular::Segment};
    use test_log::test;

    use crate::model::{Literal, LogicalTerm, PredicateId};

    use super::{EdbLayer, InMemoryEdb};

    fn rows(pairs: &[(u64, u64)]) -> Segment {
        Segment::from_rows(
            2,
            pairs
                .iter()
                .map(|&(a, b)| [Term::constant(a), Term::constant(b)]),
        )
        .unwrap()
    }

    #[test]
    fn relations_are_merged_and_sorted() {
        let mut edb = InMemoryEdb::new();
        edb.add_relation(PredicateId(0), rows(&[(3, 1), (1, 2)]))
            .unwrap();
        edb.add_relation(PredicateId(0), rows(&[(1, 2), (2, 2)]))
            .unwrap();

        assert_eq!(edb.count(PredicateId(0)), 3);
        assert_eq!(edb.arity(PredicateId(0)), Some(2));
        assert!(edb.relation(PredicateId(0)).unwrap().is_sorted_and_unique());
        assert_eq!(edb.predicates(), vec![PredicateId(0)]);
    }

    #[test]
    fn query_applies_filters() {
        let mut edb = InMemoryEdb::new();
        edb.add_relation(PredicateId(0), rows(&[(1, 1), (1, 2), (2, 2)]))
            .unwrap();

        let diagonal = Literal::new(
            PredicateId(0),
            vec![LogicalTerm::variable(0), LogicalTerm::variable(0)],
        );
        assert_eq!(edb.query(&diagonal).unwrap().len(), 2);

        let constant = Literal::new(
            PredicateId(0),
            vec![
                LogicalTerm::constant(Term::constant(1)),
                LogicalTerm::variable(0),
            ],
        );
        assert_eq!(edb.query(&constant).unwrap().len(), 2);

        let missing = Literal::new(PredicateId(7), vec![LogicalTerm::variable(0)]);
        let result = edb.query(&missing).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.arity(), 1);
    }
}
