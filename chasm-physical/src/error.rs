//! Error-handling module for the crate

use thiserror::Error;

/// Error-Collection for all the possible Errors occurring in this crate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Two tables or columns that are combined do not agree on their shape
    #[error("Expected {expected} columns but got {found}.")]
    ArityMismatch {
        /// Number of columns that was expected
        expected: usize,
        /// Number of columns that was supplied
        found: usize,
    },
    /// A column position beyond the arity of a segment was requested
    #[error("Column {column} is out of bounds for a segment of arity {arity}.")]
    ColumnOutOfBounds {
        /// Requested column
        column: usize,
        /// Arity of the segment
        arity: usize,
    },
    /// Columns of one segment have different lengths
    #[error("The provided columns do not have the same length: {0:?}")]
    ColumnLengthMismatch(Vec<usize>),
    /// Null generation was requested for a pair that was never registered
    #[error("No existential term table has been registered for rule {rule} and variable {variable}.")]
    UnregisteredTermKey {
        /// Index of the rule
        rule: usize,
        /// Identifier of the existential variable
        variable: usize,
    },
    /// The id range of one existential term table is used up
    #[error("The existential term table of rule {rule} and variable {variable} is full.")]
    NullSpaceExhausted {
        /// Index of the rule
        rule: usize,
        /// Identifier of the existential variable
        variable: usize,
    },
    /// There are more existential variables than can be assigned disjoint id ranges
    #[error("Cannot register more than {0} existential term tables.")]
    TermKeySpaceExhausted(usize),
}
