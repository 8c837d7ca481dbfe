//! This module defines [ExecutionParameters].

use std::{num::NonZeroUsize, time::Duration};

use chasm_physical::management::term_manager::ChaseMode;

/// Upper bound for the default number of worker threads.
const DEFAULT_MAX_THREADS: usize = 4;

/// Which predicates are written when results are exported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportParameters {
    /// Write nothing
    #[default]
    None,
    /// Export all IDB predicates (those used in rule heads)
    Idb,
    /// Export all predicates
    All,
}

/// What happens when the chase starts to produce cyclic terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CyclicTermPolicy {
    /// Stop the chase and report it
    #[default]
    Stop,
    /// Log a warning and keep going
    Continue,
}

/// How much provenance is recorded for derived facts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProvenanceMode {
    /// Every fact remembers the node used for each body literal
    #[default]
    Tuple,
    /// Only nodes remember the nodes they were derived from
    Node,
}

/// External parameters affecting the execution
#[derive(Debug, Clone, Copy)]
pub struct ExecutionParameters {
    /// Decides whether nulls are reused
    pub chase_mode: ChaseMode,
    /// Number of worker threads
    pub threads: usize,
    /// Stop after this many steps
    pub max_steps: Option<usize>,
    /// Stop once this much time has passed, checked between steps
    pub timeout: Option<Duration>,
    /// Merge the nodes of a predicate once it has more than this many
    pub max_nodes_per_predicate: usize,
    /// Joins against EDB relations with at most this many facts use a nested loop
    pub nested_loop_threshold: usize,
    /// Skip rule applications whose query is equivalent to that of an existing node
    pub query_containment: bool,
    /// Granularity of recorded provenance
    pub provenance: ProvenanceMode,
    /// Reaction to cyclic terms
    pub cyclic_term_policy: CyclicTermPolicy,
    /// Compute strata from predicate dependencies if the program has none
    pub stratify: bool,
}

impl Default for ExecutionParameters {
    fn default() -> Self {
        let threads = std::thread::available_parallelism()
            .map_or(1, NonZeroUsize::get)
            .min(DEFAULT_MAX_THREADS);

        Self {
            chase_mode: ChaseMode::default(),
            threads,
            max_steps: None,
            timeout: None,
            max_nodes_per_predicate: 8,
            nested_loop_threshold: 64,
            query_containment: false,
            provenance: ProvenanceMode::default(),
            cyclic_term_policy: CyclicTermPolicy::default(),
            stratify: true,
        }
    }
}

impl ExecutionParameters {
    /// Set the chase variant.
    pub fn with_chase_mode(mut self, chase_mode: ChaseMode) -> Self {
        self.chase_mode = chase_mode;
        self
    }

    /// Set the number of worker threads. Zero is treated as one.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Limit the number of steps.
    pub fn with_max_steps(mut self, max_steps: Option<usize>) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Limit the running time.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of nodes per predicate above which nodes are merged.
    pub fn with_max_nodes_per_predicate(mut self, max_nodes: usize) -> Self {
        self.max_nodes_per_predicate = max_nodes.max(1);
        self
    }

    /// Set the size below which EDB relations are joined with a nested loop.
    pub fn with_nested_loop_threshold(mut self, threshold: usize) -> Self {
        self.nested_loop_threshold = threshold;
        self
    }

    /// Enable or disable pruning by query containment.
    pub fn with_query_containment(mut self, enabled: bool) -> Self {
        self.query_containment = enabled;
        self
    }

    /// Set how much provenance is recorded.
    pub fn with_provenance(mut self, provenance: ProvenanceMode) -> Self {
        self.provenance = provenance;
        self
    }

    /// Set the reaction to cyclic terms.
    pub fn with_cyclic_term_policy(mut self, policy: CyclicTermPolicy) -> Self {
        self.cyclic_term_policy = policy;
        self
    }

    /// Enable or disable automatic stratification.
    pub fn with_stratify(mut self, stratify: bool) -> Self {
        self.stratify = stratify;
        self
    }
}
