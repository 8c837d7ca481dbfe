//! Functionality which handles the execution of a program

pub mod combinations;
pub mod execution_engine;
pub mod execution_parameters;
pub mod planning;
pub mod rule_executor;

pub use execution_engine::{ChaseStatus, ExecutionEngine};
pub use execution_parameters::{
    CyclicTermPolicy, ExecutionParameters, ExportParameters, ProvenanceMode,
};
