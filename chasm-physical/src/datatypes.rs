//! This module collects the primitive value types stored in columns.

pub mod term;
pub use term::Term;

/// Identifier of a node of the derivation graph.
///
/// The physical layer treats it as an opaque value that is carried along
/// in the provenance columns of a [Segment][crate::tabular::segment::Segment].
pub type NodeId = u32;
