//! This module defines the [DerivationGraph],
//! which stores every batch of derived facts together with its provenance.

pub mod containment;
pub mod derivation_graph;
pub mod node;

pub use containment::{RewrittenQuery, UnfoldInput};
pub use derivation_graph::{Derivation, DerivationGraph};
pub use node::{NewNode, Node};
