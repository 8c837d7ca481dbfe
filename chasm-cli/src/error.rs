//! This module defines all the errors that can occur while executing chasm-cli.

use thiserror::Error;

/// Error that occur during execution of the CLI app
#[derive(Error, Debug)]
pub enum CliError {
    /// Error while parsing a fact for tracing
    #[error("unable to parse fact: {fact}")]
    TracingInvalidFact {
        /// Incorrectly formatted fact
        fact: String,
    },
    /// Error if the number of threads is zero
    #[error("the number of threads must be at least 1")]
    NoThreads,
    /// Error resulting from io operations
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    /// Error originating from chasm
    #[error(transparent)]
    ChasmError(#[from] chasm::error::Error),
}
