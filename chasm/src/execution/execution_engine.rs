//! This module defines [ExecutionEngine], which drives the chase to a fixpoint.

use std::{
    collections::HashSet,
    time::{Duration, Instant},
};

use chasm_physical::{
    datatypes::{NodeId, Term},
    dictionary::Dictionary,
    management::term_manager::TermManager,
    meta::timing::TimedCode,
    tabular::Segment,
};
use rayon::{
    iter::{IntoParallelRefIterator, ParallelIterator},
    ThreadPool, ThreadPoolBuilder,
};

use crate::{
    edb::EdbLayer,
    error::Error,
    graph::{
        containment::{RewrittenQuery, UnfoldInput},
        Derivation, DerivationGraph, NewNode,
    },
    model::{Literal, LogicalTerm, PredicateId, Program},
};

use super::{
    combinations::{AtomNodes, Combinations},
    execution_parameters::{CyclicTermPolicy, ExecutionParameters},
    planning::{LiteralSource, RulePlan},
    rule_executor::RuleExecutor,
};

/// Reason why [ExecutionEngine::run] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChaseStatus {
    /// No rule can derive anything new
    Fixpoint,
    /// A null was created from arguments containing a null of the same kind
    CyclicTerms,
    /// The configured number of steps was reached
    StepLimit,
    /// The configured time was used up
    Timeout,
}

/// Stores useful information about a rule.
#[derive(Default, Debug, Copy, Clone)]
pub struct RuleInfo {
    /// The execution step this rule was last applied in.
    pub step_last_applied: Option<usize>,
}

/// One rule application to be performed in a step.
#[derive(Debug, Clone)]
struct WorkItem {
    rule: usize,
    combination: Vec<NodeId>,
}

/// Result of a [WorkItem] before it is added to the graph.
#[derive(Debug, Default)]
struct WorkOutput {
    heads: Vec<(PredicateId, Segment)>,
    query: Option<RewrittenQuery>,
}

/// Object which handles the evaluation of the program.
#[derive(Debug)]
pub struct ExecutionEngine {
    program: Program,
    edb: Box<dyn EdbLayer>,
    parameters: ExecutionParameters,

    graph: DerivationGraph,
    term_manager: TermManager,
    pool: ThreadPool,

    plans: Vec<RulePlan>,
    strata: Vec<Vec<usize>>,
    rule_infos: Vec<RuleInfo>,

    current_step: usize,
    current_stratum: usize,
    derived_facts: usize,
}

impl ExecutionEngine {
    /// Initialize [ExecutionEngine].
    ///
    /// Compiles the rules, registers their existential variables
    /// and adds the EDB facts of IDB predicates to the graph.
    pub fn initialize<Edb: EdbLayer + 'static>(
        mut program: Program,
        edb: Edb,
        parameters: ExecutionParameters,
    ) -> Result<Self, Error> {
        TimedCode::instance().sub("Reasoning/Initialization").start();

        if parameters.stratify && !program.has_strata() {
            program.stratify();
        }

        for predicate in edb.predicates() {
            let expected = program.arity(predicate);
            let found = edb.arity(predicate).unwrap_or(expected);
            if expected != found {
                return Err(Error::PredicateArity {
                    predicate: program.predicate_name(predicate).to_string(),
                    expected,
                    found,
                });
            }
        }

        let plans = (0..program.rules().len())
            .map(|rule| RulePlan::new(rule, &program, &edb, &parameters))
            .collect::<Result<Vec<_>, _>>()?;

        let mut term_manager = TermManager::new(parameters.chase_mode);
        for (index, rule) in program.rules().iter().enumerate() {
            let arity = rule.frontier().len();
            for variable in rule.existentials() {
                term_manager.register(index, variable.index(), arity)?;
            }
        }

        let graph = DerivationGraph::new();
        for predicate in edb.predicates() {
            if program.is_idb(predicate) {
                let facts = edb.query(&Self::full_literal(&program, predicate))?;
                if !facts.is_empty() {
                    graph.add_node(NewNode::input(predicate, facts));
                }
            }
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(parameters.threads)
            .build()?;

        let strata = program.strata();
        let rule_infos = vec![RuleInfo::default(); program.rules().len()];

        log::info!(
            "Initialized chase with {} rules in {} strata using {} threads",
            program.rules().len(),
            strata.len(),
            parameters.threads
        );

        TimedCode::instance().sub("Reasoning/Initialization").stop();

        Ok(Self {
            program,
            edb: Box::new(edb),
            parameters,
            graph,
            term_manager,
            pool,
            plans,
            strata,
            rule_infos,
            current_step: 0,
            current_stratum: 0,
            derived_facts: 0,
        })
    }

    /// Literal with a distinct variable for each argument of the predicate.
    fn full_literal(program: &Program, predicate: PredicateId) -> Literal {
        Literal::new(
            predicate,
            (0..program.arity(predicate) as u32)
                .map(LogicalTerm::variable)
                .collect(),
        )
    }

    /// Apply rules until a fixpoint is reached or the chase has to stop.
    ///
    /// Strata are processed in ascending order.
    /// Limits and cyclic terms are only checked between steps.
    /// Calling this again after an early return resumes the chase.
    pub fn run(&mut self) -> Result<ChaseStatus, Error> {
        TimedCode::instance().sub("Reasoning/Execution").start();
        let status = self.saturate();
        TimedCode::instance().sub("Reasoning/Execution").stop();

        if let Ok(status) = status {
            log::info!(
                "Chase stopped after step {} with status {status:?}: {} derived facts in {} nodes",
                self.current_step,
                self.derived_facts,
                self.graph.node_count()
            );
        }

        status
    }

    fn saturate(&mut self) -> Result<ChaseStatus, Error> {
        let start = Instant::now();

        while self.current_stratum < self.strata.len() {
            loop {
                if let Some(status) = self.check_limits(start) {
                    return Ok(status);
                }

                let new_nodes = self.step(self.current_stratum)?;

                if self.term_manager.contains_cyclic_terms()
                    && self.parameters.cyclic_term_policy == CyclicTermPolicy::Stop
                {
                    return Ok(ChaseStatus::CyclicTerms);
                }

                if new_nodes == 0 {
                    break;
                }
            }

            log::debug!("Stratum {} saturated", self.current_stratum);
            self.current_stratum += 1;
        }

        Ok(ChaseStatus::Fixpoint)
    }

    fn check_limits(&self, start: Instant) -> Option<ChaseStatus> {
        if self
            .parameters
            .max_steps
            .is_some_and(|max_steps| self.current_step >= max_steps)
        {
            return Some(ChaseStatus::StepLimit);
        }

        if self
            .parameters
            .timeout
            .is_some_and(|timeout| start.elapsed() >= timeout)
        {
            return Some(ChaseStatus::Timeout);
        }

        None
    }

    /// Perform one step of the given stratum and return the number of new nodes.
    fn step(&mut self, stratum: usize) -> Result<usize, Error> {
        self.current_step += 1;
        let step = self.current_step;

        let items = self.enumerate(stratum, step);
        log::info!(
            "<<< {step}: APPLYING {} RULE INSTANCES IN STRATUM {stratum} >>>",
            items.len()
        );

        TimedCode::instance().sub("Reasoning/Execution/Rules").start();
        let outputs = self.execute(&items);
        TimedCode::instance().sub("Reasoning/Execution/Rules").stop();

        TimedCode::instance().sub("Reasoning/Execution/Commit").start();
        let first_node = self.graph.next_node_id();
        let mut new_nodes = 0;
        let mut new_facts = 0;
        let mut received = HashSet::new();

        for (item, output) in items.iter().zip(outputs) {
            let output = output?;

            let mut incoming_edges = item.combination.clone();
            incoming_edges.sort_unstable();
            incoming_edges.dedup();

            for (predicate, facts) in output.heads {
                let facts = self.graph.retain_since(predicate, facts, first_node)?;
                if facts.is_empty() {
                    continue;
                }

                new_facts += facts.len();
                self.graph.add_node(NewNode {
                    predicate,
                    rule: Some(item.rule),
                    step,
                    incoming_edges: incoming_edges.clone(),
                    data: facts,
                    query: output.query.clone(),
                });

                new_nodes += 1;
                received.insert(predicate);
            }
        }
        self.derived_facts += new_facts;
        TimedCode::instance().sub("Reasoning/Execution/Commit").stop();

        self.merge_fragmented(&received)?;

        log::info!("Step {step}: {new_nodes} new nodes with {new_facts} facts");

        Ok(new_nodes)
    }

    /// Collect the rule applications of a step.
    fn enumerate(&mut self, stratum: usize, step: usize) -> Vec<WorkItem> {
        let mut items = Vec::new();

        for &rule in &self.strata[stratum] {
            let plan = &self.plans[rule];
            let last = self.rule_infos[rule].step_last_applied;

            if plan.body().idb_predicates().is_empty() {
                if last.is_none() {
                    items.push(WorkItem {
                        rule,
                        combination: Vec::new(),
                    });
                }
            } else {
                let atoms = plan
                    .body()
                    .idb_predicates()
                    .iter()
                    .map(|&predicate| {
                        AtomNodes::split(
                            self.graph
                                .nodes_with_predicate(predicate)
                                .iter()
                                .map(|node| (node.id(), node.step())),
                            last,
                        )
                    })
                    .collect::<Vec<_>>();

                let before = items.len();
                items.extend(
                    Combinations::new(&atoms).map(|combination| WorkItem { rule, combination }),
                );
                log::debug!("Rule {rule}: {} combinations", items.len() - before);
            }

            self.rule_infos[rule].step_last_applied = Some(step);
        }

        items
    }

    /// Apply rules in the worker pool, against the graph as it was at the start of the step.
    ///
    /// Applications of the same existential rule run one after another in the order of `items`,
    /// so that nulls are numbered the same way in every run.
    /// Results are returned in the order of `items`.
    fn execute(&self, items: &[WorkItem]) -> Vec<Result<WorkOutput, Error>> {
        let executor = RuleExecutor::new(
            &self.graph,
            self.edb.as_ref(),
            &self.term_manager,
            self.parameters.provenance,
        );

        let batches = self.batches(items);
        self.pool.install(|| {
            batches
                .par_iter()
                .flat_map_iter(move |batch| batch.iter().map(move |item| self.apply(executor, item)))
                .collect()
        })
    }

    /// Split the items of a step into batches that may run in parallel.
    ///
    /// Items of a rule are consecutive.
    /// Those of an existential rule share one batch, all others get their own.
    fn batches<'a>(&self, items: &'a [WorkItem]) -> Vec<&'a [WorkItem]> {
        let mut batches = Vec::new();
        let mut start = 0;

        while start < items.len() {
            let rule = items[start].rule;
            let length = if self.program.rules()[rule].is_datalog() {
                1
            } else {
                items[start..]
                    .iter()
                    .take_while(|item| item.rule == rule)
                    .count()
            };

            batches.push(&items[start..start + length]);
            start += length;
        }

        batches
    }

    fn apply(&self, executor: RuleExecutor<'_>, item: &WorkItem) -> Result<WorkOutput, Error> {
        let plan = &self.plans[item.rule];

        let query = if self.parameters.query_containment && plan.supports_queries() {
            self.rewrite(plan, &item.combination)?
        } else {
            None
        };

        if let Some(query) = &query {
            if let Some(node) = self.graph.find_equivalent(query.head().predicate(), query) {
                log::debug!(
                    "Rule {} on {:?} skipped: equivalent to node {node}",
                    item.rule,
                    item.combination
                );
                return Ok(WorkOutput::default());
            }
        }

        let output = executor.execute_rule(plan, &item.combination)?;
        let heads = output
            .heads
            .into_iter()
            .filter(|(_, facts)| !facts.is_empty())
            .map(|(predicate, facts)| Ok((predicate, self.graph.retain(predicate, facts)?)))
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(WorkOutput { heads, query })
    }

    /// Compute the query describing the result of applying a rule to the given nodes.
    fn rewrite(
        &self,
        plan: &RulePlan,
        combination: &[NodeId],
    ) -> Result<Option<RewrittenQuery>, Error> {
        let rule = &self.program.rules()[plan.rule()];
        let nodes = combination
            .iter()
            .map(|&node| self.graph.node(node))
            .collect::<Result<Vec<_>, _>>()?;

        let inputs = plan
            .body()
            .literal_sources()
            .map(|source| match source {
                LiteralSource::Edb => UnfoldInput::Edb,
                LiteralSource::Idb { atom } => UnfoldInput::Node(nodes[atom].query()),
            })
            .collect::<Vec<_>>();

        Ok(rule
            .head()
            .first()
            .and_then(|head| RewrittenQuery::unfold(head, rule.body(), &inputs)))
    }

    /// Merge the nodes of predicates that have too many of them.
    ///
    /// Predicates that received a node in the last step are left alone,
    /// so that no node that is still new for some rule disappears.
    fn merge_fragmented(&self, received: &HashSet<PredicateId>) -> Result<(), Error> {
        for predicate in self.graph.predicates() {
            if received.contains(&predicate) {
                continue;
            }

            if self.graph.node_ids_with_predicate(predicate).len()
                > self.parameters.max_nodes_per_predicate
            {
                TimedCode::instance().sub("Reasoning/Execution/Merge").start();
                self.graph.merge_nodes_with_predicate_into_one(predicate)?;
                TimedCode::instance().sub("Reasoning/Execution/Merge").stop();
            }
        }

        Ok(())
    }

    /// Return all facts of a predicate, sorted and without duplicates.
    pub fn table(&self, predicate: PredicateId) -> Result<Segment, Error> {
        if predicate.index() >= self.program.predicates().count() {
            return Err(Error::UnknownPredicate(predicate.to_string()));
        }

        if !self.program.is_idb(predicate) {
            return self
                .edb
                .query(&Self::full_literal(&self.program, predicate));
        }

        Ok(self
            .graph
            .table(predicate)?
            .unwrap_or_else(|| Segment::empty(self.program.arity(predicate))))
    }

    /// Return all facts of the predicate with the given name.
    pub fn table_by_name(&self, name: &str) -> Result<Segment, Error> {
        let predicate = self
            .program
            .predicate(name)
            .ok_or_else(|| Error::UnknownPredicate(name.to_string()))?;

        self.table(predicate)
    }

    /// Return the number of facts derived by rules.
    pub fn derived_fact_count(&self) -> usize {
        self.derived_facts
    }

    /// Return the number of facts of a predicate, including input facts.
    pub fn count_facts_of_predicate(&self, predicate: PredicateId) -> usize {
        if self.program.is_idb(predicate) {
            self.graph.count_facts(predicate)
        } else {
            self.edb.count(predicate)
        }
    }

    /// Return the number of the last step.
    pub fn current_iteration(&self) -> usize {
        self.current_step
    }

    /// Return the number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Return `true` if some null was created from arguments containing a null of the same kind.
    pub fn contains_cyclic_terms(&self) -> bool {
        self.term_manager.contains_cyclic_terms()
    }

    /// Explain how a fact was derived.
    pub fn explain(&self, predicate: PredicateId, tuple: &[Term]) -> Result<Option<Derivation>, Error> {
        self.graph.explain(predicate, tuple)
    }

    /// Return the derivation graph.
    pub fn graph(&self) -> &DerivationGraph {
        &self.graph
    }

    /// Return the program.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Return the dictionary of constants.
    pub fn dictionary(&self) -> &Dictionary {
        self.program.dictionary()
    }

    /// Return the term manager that created the nulls.
    pub fn term_manager(&self) -> &TermManager {
        &self.term_manager
    }

    /// Return the parameters of this execution.
    pub fn parameters(&self) -> &ExecutionParameters {
        &self.parameters
    }

    /// Change the step limit for subsequent calls to [ExecutionEngine::run].
    pub fn set_max_steps(&mut self, max_steps: Option<usize>) {
        self.parameters.max_steps = max_steps;
    }

    /// Change the time limit for subsequent calls to [ExecutionEngine::run].
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.parameters.timeout = timeout;
    }
}
