//! This module collects utilities for inspecting the engine at runtime.

pub mod timing;
pub use timing::TimedCode;
