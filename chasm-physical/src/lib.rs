//! This crate defines low-level data structures and operations of the chase engine,
//! i.e., it corresponds to the physical layer of a data processing system.
//! It works on dictionary-encoded terms stored in immutable columnar segments
//! and has no notion of rules or predicates.

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
    variant_size_differences,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap
)]

pub mod columnar;
pub mod datatypes;
pub mod dictionary;
pub mod error;
pub mod management;
pub mod meta;
pub mod tabular;
