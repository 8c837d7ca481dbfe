//! This module contains state that lives for a whole chase run
//! rather than for a single operation.

pub mod term_manager;
