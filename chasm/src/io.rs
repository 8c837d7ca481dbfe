//! This module contains the reading and writing of rule files and tables.

pub mod csv;
pub mod parser;

pub use parser::parse_program;
