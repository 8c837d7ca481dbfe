//! Error-handling module for the crate

use std::path::PathBuf;

use thiserror::Error;

/// Error-Collection for all the possible Errors occurring in this crate
#[allow(variant_size_differences)]
#[derive(Error, Debug)]
pub enum Error {
    /// A body literal shares no variable with the literals before it
    #[error("Rule {rule}: body literal {literal} shares no variable with the preceding literals.")]
    NoJoinVariable {
        /// Index of the rule
        rule: usize,
        /// Position of the literal in the body
        literal: usize,
    },
    /// A universal variable of the head does not occur in the body
    #[error("Rule {rule}: head variable {variable} does not occur in the body.")]
    UnsafeHeadVariable {
        /// Index of the rule
        rule: usize,
        /// Name of the variable
        variable: String,
    },
    /// An existential variable occurs in the body
    #[error("Rule {rule}: existential variable {variable} occurs in the body.")]
    ExistentialInBody {
        /// Index of the rule
        rule: usize,
        /// Name of the variable
        variable: String,
    },
    /// A rule without head or without body
    #[error("Rule {rule} has an empty head or an empty body.")]
    EmptyRule {
        /// Index of the rule
        rule: usize,
    },
    /// A predicate is used with different arities
    #[error("Predicate {predicate} is used with arity {found} but has arity {expected}.")]
    PredicateArity {
        /// Name of the predicate
        predicate: String,
        /// Arity the predicate was registered with
        expected: usize,
        /// Arity of the offending use
        found: usize,
    },
    /// A predicate that is not part of the program
    #[error("Unknown predicate {0}.")]
    UnknownPredicate(String),
    /// A node id that does not belong to the derivation graph
    #[error("Unknown node {0}.")]
    UnknownNode(u32),
    /// The rule file could not be parsed
    #[error("Parse error at line {line}, column {column}: {message}")]
    Parse {
        /// Line of the error, starting at 1
        line: usize,
        /// Column of the error, starting at 1
        column: usize,
        /// Description of what was expected
        message: String,
    },
    /// CSV serialization/deserialization error
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// IO Error
    #[error(transparent)]
    IO(#[from] std::io::Error),
    /// Error while reading a file
    #[error("Failed to read \"{filename}\": {error}")]
    IOReading {
        /// Underlying IO error
        error: std::io::Error,
        /// File that could not be read
        filename: PathBuf,
    },
    /// File exists and should not be overwritten
    #[error("File \"{0}\" exists and would be overwritten!\nConsider using the `--overwrite-results` option or setting a different `--export-dir`.")]
    IOExists(PathBuf),
    /// The worker pool could not be created
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    /// Error in the physical layer
    #[error(transparent)]
    PhysicalError(#[from] chasm_physical::error::Error),
}
