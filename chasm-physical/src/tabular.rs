//! This module defines the tabular data structure of the engine
//! and the operations that combine tables.

pub mod operations;
pub mod segment;
pub mod segment_reader;
pub mod segment_writer;

pub use segment::Segment;
