//! A chase engine for existential rules over in-memory columnar data.
//!
//! Derived facts are kept in a derivation graph whose nodes record
//! which rule produced them from which other nodes.

#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts
)]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    variant_size_differences
)]

/// The crate for underlying physical operations.
pub extern crate chasm_physical;

pub mod api;
pub mod edb;
pub mod error;
pub mod execution;
pub mod graph;
pub mod io;
pub mod model;

// we use these types of chasm_physical in our API, so re-export them here.
pub use chasm_physical::{
    datatypes::{NodeId, Term},
    dictionary::Dictionary,
    management::term_manager::ChaseMode,
    meta,
    tabular::Segment,
};
