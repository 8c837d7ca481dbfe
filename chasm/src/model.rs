//! This module defines the logical representation of rule programs.

pub mod literal;
pub mod program;
pub mod rule;
pub mod term;

pub use literal::Literal;
pub use program::Program;
pub use rule::Rule;
pub use term::{LogicalTerm, PredicateId, VariableId};
