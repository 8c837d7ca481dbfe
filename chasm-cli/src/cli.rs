//! Command line arguments of the `chasm` binary.
use std::{path::PathBuf, time::Duration};

use chasm::{
    execution::{CyclicTermPolicy, ExecutionParameters, ExportParameters, ProvenanceMode},
    ChaseMode,
};

use crate::error::CliError;

/// Directory that results are written to unless `-D` is given.
const RESULTS_DIRECTORY: &str = "results";

/// Which predicates to write or print.
#[derive(clap::ValueEnum, Clone, Copy, Default, Debug, PartialEq, Eq)]
pub(crate) enum PredicateSelection {
    /// No predicate.
    #[default]
    None,
    /// Predicates that occur in some rule head.
    Idb,
    /// Every predicate of the program.
    All,
}

impl From<PredicateSelection> for ExportParameters {
    fn from(selection: PredicateSelection) -> Self {
        match selection {
            PredicateSelection::None => ExportParameters::None,
            PredicateSelection::Idb => ExportParameters::Idb,
            PredicateSelection::All => ExportParameters::All,
        }
    }
}

/// What to report once the chase has stopped.
#[derive(clap::ValueEnum, Clone, Copy, Default, Debug, PartialEq, Eq)]
pub(crate) enum Reporting {
    /// Nothing.
    None,
    /// A summary, unless facts or traces are printed.
    #[default]
    Auto,
    /// A summary of steps, derived facts and time.
    Short,
    /// The summary and the full timing tree.
    Time,
}

/// Chase variant selectable on the command line.
#[derive(clap::ValueEnum, Clone, Copy, Default, Debug, PartialEq, Eq)]
pub(crate) enum Chase {
    /// Reuse nulls for equal frontier values and skip satisfied rule instances
    #[default]
    Restricted,
    /// Create a fresh null for every rule instance
    Oblivious,
}

impl From<Chase> for ChaseMode {
    fn from(val: Chase) -> Self {
        match val {
            Chase::Restricted => ChaseMode::Restricted,
            Chase::Oblivious => ChaseMode::Oblivious,
        }
    }
}

/// Granularity of provenance selectable on the command line.
#[derive(clap::ValueEnum, Clone, Copy, Default, Debug, PartialEq, Eq)]
pub(crate) enum Provenance {
    /// Record the premise nodes of every derived fact
    #[default]
    Tuple,
    /// Record only the premise nodes of every node
    Node,
}

impl From<Provenance> for ProvenanceMode {
    fn from(val: Provenance) -> Self {
        match val {
            Provenance::Tuple => ProvenanceMode::Tuple,
            Provenance::Node => ProvenanceMode::Node,
        }
    }
}

/// Cli Arguments related to logging
#[derive(clap::Args, Debug)]
pub(crate) struct LoggingArgs {
    /// Increase log verbosity (multiple uses increase verbosity further)
    #[arg(short, long, action = clap::builder::ArgAction::Count, group = "verbosity")]
    verbose: u8,
    /// Reduce log verbosity to show only errors (equivalent to --log error)
    #[arg(short, long, group = "verbosity")]
    quiet: bool,
    /// Set log verbosity (default is "warn")
    #[arg(long = "log", value_parser=clap::builder::PossibleValuesParser::new(["error", "warn", "info", "debug", "trace"]), group = "verbosity")]
    log_level: Option<String>,
}

impl LoggingArgs {
    /// Initialising Logging
    ///
    /// Sets the logging verbosity to the given log-level in the following order:
    ///  * `Info`, `Debug`, `Trace`; depending on the count of `-v`
    ///  * `Error` when `-q` is used
    ///  * The `CHASM_LOG` environment variable value
    ///  * `Warn` otherwise
    pub(crate) fn initialize_logging(&self) {
        let mut builder = env_logger::Builder::new();

        builder.filter_level(log::LevelFilter::Warn);

        builder.parse_env("CHASM_LOG");
        if let Some(ref level) = self.log_level {
            builder.parse_filters(level);
        } else if self.quiet {
            builder.filter_level(log::LevelFilter::Error);
        } else if self.verbose > 0 {
            builder.filter_level(match self.verbose {
                1 => log::LevelFilter::Info,
                2 => log::LevelFilter::Debug,
                _ => log::LevelFilter::Trace,
            });
        }
        builder.init();
    }
}

/// Where results go
#[derive(Debug, clap::Args)]
pub(crate) struct OutputArgs {
    /// Predicates whose facts are written to `<predicate>.csv`
    #[arg(short, long = "export", value_enum, default_value_t)]
    pub(crate) export: PredicateSelection,
    /// Directory for the written files
    #[arg(short = 'D', long = "export-dir", default_value = RESULTS_DIRECTORY)]
    pub(crate) export_directory: PathBuf,
    /// Replace files that already exist
    #[arg(short, long = "overwrite-results", default_value = "false")]
    pub(crate) overwrite: bool,
    /// Predicates whose facts are printed to standard output
    #[arg(long = "print-facts", value_enum, default_value_t)]
    pub(crate) print_facts: PredicateSelection,
}

/// Cli arguments that control the chase
#[derive(Debug, clap::Args)]
pub(crate) struct ChaseArgs {
    /// Chase variant
    #[arg(long = "chase", value_enum, default_value_t)]
    chase: Chase,
    /// Number of worker threads (default depends on the machine)
    #[arg(short = 't', long = "threads")]
    threads: Option<usize>,
    /// Stop after this many steps
    #[arg(long = "max-steps")]
    max_steps: Option<usize>,
    /// Stop after this many milliseconds, checked between steps
    #[arg(long = "timeout-ms")]
    timeout_ms: Option<u64>,
    /// Merge the nodes of a predicate once it has more than this many
    #[arg(long = "max-nodes", default_value_t = 8)]
    max_nodes: usize,
    /// Skip rule applications that are equivalent to an earlier one
    #[arg(long = "query-containment")]
    query_containment: bool,
    /// Keep going when a null is created from a null of the same kind
    #[arg(long = "continue-on-cyclic-terms")]
    continue_on_cyclic_terms: bool,
    /// Granularity of the recorded provenance
    #[arg(long = "provenance", value_enum, default_value_t)]
    provenance: Provenance,
}

impl ChaseArgs {
    /// Translate the arguments into [ExecutionParameters].
    pub(crate) fn execution_parameters(&self) -> Result<ExecutionParameters, CliError> {
        let mut parameters = ExecutionParameters::default()
            .with_chase_mode(self.chase.into())
            .with_max_steps(self.max_steps)
            .with_timeout(self.timeout_ms.map(Duration::from_millis))
            .with_max_nodes_per_predicate(self.max_nodes)
            .with_query_containment(self.query_containment)
            .with_provenance(self.provenance.into());

        if self.continue_on_cyclic_terms {
            parameters = parameters.with_cyclic_term_policy(CyclicTermPolicy::Continue);
        }

        match self.threads {
            Some(0) => return Err(CliError::NoThreads),
            Some(threads) => parameters = parameters.with_threads(threads),
            None => {}
        }

        Ok(parameters)
    }
}

/// Facts to explain
#[derive(Debug, clap::Args)]
pub(crate) struct TracingArgs {
    /// Facts for which the derivation should be shown;
    /// multiple facts can be separated by a semicolon, e.g. "p(a, b);q(c)".
    #[arg(long = "trace", value_delimiter = ';')]
    pub(crate) facts: Option<Vec<String>>,
}

/// Chase engine for existential rules
#[derive(clap::Parser, Debug)]
#[command(author, version, about)]
pub struct CliApp {
    /// Rule program file
    #[arg(value_parser)]
    pub(crate) rules: PathBuf,
    /// Export and printing
    #[command(flatten)]
    pub(crate) output: OutputArgs,
    /// Directory containing a `<predicate>.csv` file for each predicate with input facts
    #[arg(short = 'I', long = "import-dir")]
    pub(crate) import_directory: Option<PathBuf>,
    /// Arguments related to the chase
    #[command(flatten)]
    pub(crate) chase: ChaseArgs,
    /// Explanations
    #[command(flatten)]
    pub(crate) tracing: TracingArgs,
    /// What to report at the end
    #[arg(long = "report", value_enum, default_value_t)]
    pub(crate) reporting: Reporting,
    /// Log output
    #[command(flatten)]
    pub(crate) logging: LoggingArgs,
}
