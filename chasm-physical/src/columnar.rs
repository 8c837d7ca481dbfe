//! This module collects the column types that segments are made of.

pub mod column;
pub use column::Column;
