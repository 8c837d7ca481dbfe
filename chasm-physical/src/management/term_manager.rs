//! This module defines [TermManager],
//! which assigns ids to the nulls created for existential variables.

pub(crate) mod rows;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use bitvec::vec::BitVec;
use hashbrown::HashMap;

use crate::{columnar::Column, datatypes::Term, error::Error};

use rows::RowTable;

/// Number of low bits of a null id that count the rows of one table.
const ROW_BITS: u32 = 40;
/// Mask selecting the row part of a null id.
const ROW_MASK: u64 = (1 << ROW_BITS) - 1;
/// Maximum number of tables, limited by the bits left over in [Term].
const MAX_KEYS: usize = 1 << (63 - ROW_BITS);

/// Which chase variant decides whether nulls are reused.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChaseMode {
    /// Equal arguments for the same rule and variable always yield the same null
    #[default]
    Restricted,
    /// Every request yields a fresh null
    Oblivious,
}

/// Identifies the table of one existential variable of one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermKey(u32);

impl TermKey {
    /// Return the index of the table.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// First id of the range reserved for this key.
    fn start(self) -> u64 {
        u64::from(self.0) << ROW_BITS
    }
}

/// Table of generated nulls for one existential variable of one rule.
#[derive(Debug)]
struct TermTable {
    /// Index of the rule
    rule: usize,
    /// The existential variable
    variable: usize,
    /// Number of arguments that determine a null
    arity: usize,
    /// Arguments of every null handed out so far
    rows: RwLock<RowTable>,
}

impl TermTable {
    fn read(&self) -> RwLockReadGuard<'_, RowTable> {
        self.rows.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RowTable> {
        self.rows.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Hands out nulls for existential variables.
///
/// Each pair of rule and existential variable is registered once
/// and receives its own range of ids, so nulls of different pairs never collide.
/// In [ChaseMode::Restricted] the arguments of a null functionally determine it.
///
/// Tables may be read by many threads at once;
/// adding rows requires exclusive access to the affected table only.
#[derive(Debug)]
pub struct TermManager {
    mode: ChaseMode,
    tables: Vec<TermTable>,
    keys: HashMap<(usize, usize), TermKey>,
    /// Set once a null has been found among its own generating arguments
    cyclic: AtomicBool,
}

impl TermManager {
    /// Create a new [TermManager].
    pub fn new(mode: ChaseMode) -> Self {
        Self {
            mode,
            tables: Vec::new(),
            keys: HashMap::new(),
            cyclic: AtomicBool::new(false),
        }
    }

    /// Return the chase mode used by this manager.
    pub fn mode(&self) -> ChaseMode {
        self.mode
    }

    /// Register an existential variable of a rule,
    /// whose nulls are determined by `arity` arguments.
    ///
    /// Registering the same pair again returns the existing key.
    pub fn register(&mut self, rule: usize, variable: usize, arity: usize) -> Result<TermKey, Error> {
        if let Some(&key) = self.keys.get(&(rule, variable)) {
            if self.tables[key.index()].arity != arity {
                return Err(Error::ArityMismatch {
                    expected: self.tables[key.index()].arity,
                    found: arity,
                });
            }

            return Ok(key);
        }

        if self.tables.len() >= MAX_KEYS {
            return Err(Error::TermKeySpaceExhausted(MAX_KEYS));
        }

        let key = TermKey(
            u32::try_from(self.tables.len()).map_err(|_| Error::TermKeySpaceExhausted(MAX_KEYS))?,
        );
        self.tables.push(TermTable {
            rule,
            variable,
            arity,
            rows: RwLock::new(RowTable::new(arity)),
        });
        self.keys.insert((rule, variable), key);

        log::debug!("registered existential variable {variable} of rule {rule} as {key:?}");

        Ok(key)
    }

    /// Return the key registered for the given rule and variable.
    pub fn key(&self, rule: usize, variable: usize) -> Result<TermKey, Error> {
        self.keys
            .get(&(rule, variable))
            .copied()
            .ok_or(Error::UnregisteredTermKey { rule, variable })
    }

    /// Return the number of registered tables.
    pub fn key_count(&self) -> usize {
        self.tables.len()
    }

    /// Return the total number of nulls handed out.
    pub fn null_count(&self) -> usize {
        self.tables.iter().map(|table| table.read().len()).sum()
    }

    /// Return `true` if some null occurs, directly or transitively, among its own arguments.
    pub fn contains_cyclic_terms(&self) -> bool {
        self.cyclic.load(Ordering::Acquire)
    }

    /// Split a null into the table that created it and its row within that table.
    fn locate(&self, term: Term) -> Option<(TermKey, usize)> {
        if !term.is_null() {
            return None;
        }

        let index = usize::try_from(term.value() >> ROW_BITS).ok()?;
        let row = usize::try_from(term.value() & ROW_MASK).ok()?;

        let table = self.tables.get(index)?;
        if row >= table.read().len() {
            return None;
        }

        Some((TermKey(u32::try_from(index).ok()?), row))
    }

    /// Return the rule and variable a null was created for.
    pub fn origin_of(&self, term: Term) -> Option<(usize, usize)> {
        let (key, _) = self.locate(term)?;
        let table = &self.tables[key.index()];

        Some((table.rule, table.variable))
    }

    /// Return the arguments a null was created from.
    pub fn arguments_of(&self, term: Term) -> Option<Vec<Term>> {
        let (key, row) = self.locate(term)?;

        Some(self.tables[key.index()].read().row(row).to_vec())
    }

    /// Compute the set of term keys occurring among the given arguments
    /// or, transitively, among the arguments of those.
    fn ancestry(&self, arguments: &[Term]) -> Option<Arc<BitVec>> {
        let mut result: Option<BitVec> = None;

        for &argument in arguments {
            let Some((key, row)) = self.locate(argument) else {
                continue;
            };

            let set = result.get_or_insert_with(|| BitVec::repeat(false, self.tables.len()));
            set.set(key.index(), true);

            if let Some(inherited) = self.tables[key.index()].read().ancestry(row) {
                for index in inherited.iter_ones() {
                    set.set(index, true);
                }
            }
        }

        result.map(Arc::new)
    }

    fn report_cycle(&self, key: TermKey, arguments: &[Term]) {
        if !self.cyclic.swap(true, Ordering::AcqRel) {
            let table = &self.tables[key.index()];
            log::warn!(
                "cyclic term detected: existential variable {} of rule {} reappears among its arguments {:?}",
                table.variable,
                table.rule,
                arguments
            );
        }
    }

    /// Return a null for each of the first `row_count` argument rows,
    /// which are given column-wise in `arguments`.
    ///
    /// In [ChaseMode::Restricted], rows that were seen before receive the null they received then,
    /// and equal rows within one call receive the same null.
    /// In [ChaseMode::Oblivious], every row receives a fresh null.
    pub fn get_or_assign_ids(
        &self,
        rule: usize,
        variable: usize,
        arguments: &[Column<Term>],
        row_count: usize,
    ) -> Result<Column<Term>, Error> {
        let key = self.key(rule, variable)?;
        let table = &self.tables[key.index()];

        if arguments.len() != table.arity {
            return Err(Error::ArityMismatch {
                expected: table.arity,
                found: arguments.len(),
            });
        }
        if arguments.iter().any(|column| column.len() < row_count) {
            return Err(Error::ColumnLengthMismatch(
                arguments.iter().map(Column::len).collect(),
            ));
        }

        let row_of = |index: usize| -> Vec<Term> {
            arguments.iter().map(|column| column[index]).collect()
        };

        let mut result = vec![Term::default(); row_count];
        let mut missing = Vec::<(usize, u64, Vec<Term>)>::new();

        match self.mode {
            ChaseMode::Restricted => {
                let rows = table.read();
                for (index, slot) in result.iter_mut().enumerate() {
                    let row = row_of(index);
                    let hash = rows.hash(&row);

                    match rows.find(hash, &row) {
                        Some(existing) => *slot = Self::null_id(key, existing)?,
                        None => missing.push((index, hash, row)),
                    }
                }
            }
            ChaseMode::Oblivious => {
                missing.extend((0..row_count).map(|index| (index, 0, row_of(index))));
            }
        }

        if missing.is_empty() {
            return Ok(Column::new(result));
        }

        // Ancestry must be computed before taking the write lock,
        // as it may need to read this very table.
        let ancestries = missing
            .iter()
            .map(|(_, _, row)| self.ancestry(row))
            .collect::<Vec<_>>();

        let indexed = self.mode == ChaseMode::Restricted;
        let mut rows = table.write();
        for ((index, hash, row), ancestry) in missing.into_iter().zip(ancestries) {
            if indexed {
                if let Some(existing) = rows.find(hash, &row) {
                    result[index] = Self::null_id(key, existing)?;
                    continue;
                }
            }

            if rows.len() as u64 > ROW_MASK {
                return Err(Error::NullSpaceExhausted { rule, variable });
            }

            if ancestry
                .as_ref()
                .is_some_and(|set| set.get(key.index()).is_some_and(|bit| *bit))
            {
                self.report_cycle(key, &row);
            }

            let position = rows.push(hash, &row, ancestry, indexed);
            result[index] = Self::null_id(key, position)?;
        }

        Ok(Column::new(result))
    }

    fn null_id(key: TermKey, row: usize) -> Result<Term, Error> {
        let row = u64::try_from(row).map_err(|_| Error::TermKeySpaceExhausted(MAX_KEYS))?;
        Ok(Term::null(key.start() | row))
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use crate::{columnar::Column, datatypes::Term, error::Error};

    use super::{ChaseMode, TermManager};

    fn column(values: &[u64]) -> Column<Term> {
        values.iter().copied().map(Term::constant).collect()
    }

    #[test]
    fn restricted_mode_reuses_nulls() {
        let mut manager = TermManager::new(ChaseMode::Restricted);
        manager.register(0, 1, 1).unwrap();

        let first = manager
            .get_or_assign_ids(0, 1, &[column(&[1, 2, 1])], 3)
            .unwrap();
        assert!(first.iter().all(|term| term.is_null()));
        assert_eq!(first[0], first[2]);
        assert_ne!(first[0], first[1]);

        let second = manager
            .get_or_assign_ids(0, 1, &[column(&[2, 1])], 2)
            .unwrap();
        assert_eq!(second.as_slice(), &[first[1], first[0]]);
        assert_eq!(manager.null_count(), 2);
    }

    #[test]
    fn oblivious_mode_is_always_fresh() {
        let mut manager = TermManager::new(ChaseMode::Oblivious);
        manager.register(0, 0, 1).unwrap();

        let first = manager.get_or_assign_ids(0, 0, &[column(&[1, 1])], 2).unwrap();
        let second = manager.get_or_assign_ids(0, 0, &[column(&[1])], 1).unwrap();

        assert_ne!(first[0], first[1]);
        assert_ne!(first[0], second[0]);
        assert_eq!(manager.null_count(), 3);
    }

    #[test]
    fn keys_have_disjoint_ranges() {
        let mut manager = TermManager::new(ChaseMode::Restricted);
        manager.register(0, 0, 1).unwrap();
        manager.register(1, 0, 1).unwrap();

        let first = manager.get_or_assign_ids(0, 0, &[column(&[5])], 1).unwrap();
        let second = manager.get_or_assign_ids(1, 0, &[column(&[5])], 1).unwrap();

        assert_ne!(first[0], second[0]);
        assert_eq!(manager.origin_of(first[0]), Some((0, 0)));
        assert_eq!(manager.origin_of(second[0]), Some((1, 0)));
        assert_eq!(manager.arguments_of(second[0]), Some(vec![Term::constant(5)]));
        assert_eq!(manager.origin_of(Term::constant(5)), None);
    }

    #[test]
    fn unregistered_keys_are_rejected() {
        let manager = TermManager::new(ChaseMode::Restricted);

        assert_eq!(
            manager.get_or_assign_ids(3, 4, &[], 0),
            Err(Error::UnregisteredTermKey {
                rule: 3,
                variable: 4
            })
        );
    }

    #[test]
    fn argument_count_is_checked() {
        let mut manager = TermManager::new(ChaseMode::Restricted);
        manager.register(0, 0, 2).unwrap();

        assert!(manager
            .get_or_assign_ids(0, 0, &[column(&[1])], 1)
            .is_err());
        assert!(manager.register(0, 0, 1).is_err());
    }

    #[test]
    fn detects_cyclic_terms() {
        let mut manager = TermManager::new(ChaseMode::Restricted);
        manager.register(0, 0, 1).unwrap();
        manager.register(1, 0, 1).unwrap();

        let first = manager.get_or_assign_ids(0, 0, &[column(&[1])], 1).unwrap();
        assert!(!manager.contains_cyclic_terms());

        // A null of another table does not close a cycle.
        let other = manager
            .get_or_assign_ids(1, 0, &[first.clone()], 1)
            .unwrap();
        assert!(!manager.contains_cyclic_terms());

        // Through the other table, the first table reappears among its own arguments.
        manager.get_or_assign_ids(0, 0, &[other], 1).unwrap();
        assert!(manager.contains_cyclic_terms());
    }

    #[test]
    fn nullary_arguments() {
        let mut manager = TermManager::new(ChaseMode::Restricted);
        manager.register(2, 7, 0).unwrap();

        let first = manager.get_or_assign_ids(2, 7, &[], 2).unwrap();
        assert_eq!(first[0], first[1]);
        assert_eq!(manager.null_count(), 1);
    }
}
