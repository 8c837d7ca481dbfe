//! This module defines [RuleExecutor], which applies one rule
//! to one combination of input nodes.

use chasm_physical::{
    columnar::Column,
    datatypes::{NodeId, Term},
    management::term_manager::TermManager,
    tabular::{
        operations::{left_join, merge_join, nested_loop_join},
        Segment,
    },
};

use crate::{
    edb::EdbLayer,
    error::Error,
    graph::DerivationGraph,
    model::{Literal, PredicateId},
};

use super::{
    execution_parameters::ProvenanceMode,
    planning::{
        HeadColumn, JoinStep, LiteralSource, RestrictedCheck, RulePlan, StepProcessor,
    },
};

/// Facts derived by one rule application.
#[derive(Debug, Clone, Default)]
pub struct RuleOutput {
    /// For each head literal, its predicate and the derived facts,
    /// sorted and free of duplicates
    pub heads: Vec<(PredicateId, Segment)>,
}

impl RuleOutput {
    /// Return the total number of derived facts.
    pub fn len(&self) -> usize {
        self.heads.iter().map(|(_, segment)| segment.len()).sum()
    }

    /// Return `true` if nothing was derived.
    pub fn is_empty(&self) -> bool {
        self.heads.iter().all(|(_, segment)| segment.is_empty())
    }
}

/// Evaluates [RulePlan]s against the EDB and the nodes of a [DerivationGraph].
///
/// Only reads shared state, so several executors may run at the same time.
#[derive(Debug, Clone, Copy)]
pub struct RuleExecutor<'a> {
    graph: &'a DerivationGraph,
    edb: &'a dyn EdbLayer,
    term_manager: &'a TermManager,
    provenance: ProvenanceMode,
}

impl<'a> RuleExecutor<'a> {
    /// Create a new [RuleExecutor].
    pub fn new(
        graph: &'a DerivationGraph,
        edb: &'a dyn EdbLayer,
        term_manager: &'a TermManager,
        provenance: ProvenanceMode,
    ) -> Self {
        Self {
            graph,
            edb,
            term_manager,
            provenance,
        }
    }

    /// Apply the rule of `plan` to the given nodes, one per IDB body literal.
    ///
    /// The provenance columns of the result hold, per fact, the node used for each IDB literal,
    /// unless only node-level provenance is recorded.
    pub fn execute_rule(&self, plan: &RulePlan, combination: &[NodeId]) -> Result<RuleOutput, Error> {
        debug_assert_eq!(combination.len(), plan.body().idb_predicates().len());

        let relation = self.evaluate_body(plan, combination)?;
        log::trace!(
            "Rule {}: {} body matches on nodes {combination:?}",
            plan.rule(),
            relation.len()
        );

        self.construct_heads(plan, relation)
    }

    /// Return the bindings of a literal, one column per distinct variable.
    fn literal_bindings(
        &self,
        literal: &Literal,
        source: LiteralSource,
        combination: &[NodeId],
    ) -> Result<Segment, Error> {
        match source {
            LiteralSource::Edb => Ok(self
                .edb
                .query(literal)?
                .project(&literal.variable_positions())?),
            LiteralSource::Idb { atom } => {
                let node = combination[atom];
                let data = self.graph.node_data(node)?;
                let bindings = literal.bind(&data.without_provenance())?;

                Ok(match self.provenance {
                    ProvenanceMode::Tuple => {
                        let length = bindings.len();
                        bindings.with_provenance(vec![Column::constant(node, length)])?
                    }
                    ProvenanceMode::Node => bindings,
                })
            }
        }
    }

    fn evaluate_body(&self, plan: &RulePlan, combination: &[NodeId]) -> Result<Segment, Error> {
        // A single empty row, which every body matches before its first literal
        let mut relation = Segment::nullary(1);

        for step in plan.body().steps() {
            relation = match &step.processor {
                StepProcessor::EdbSeed {
                    literal,
                    projection,
                } => Self::seed(
                    &relation,
                    self.literal_bindings(literal, LiteralSource::Edb, combination)?
                        .project(projection)?,
                )?,
                StepProcessor::IdbSeed {
                    literal,
                    atom,
                    projection,
                } => Self::seed(
                    &relation,
                    self.literal_bindings(literal, LiteralSource::Idb { atom: *atom }, combination)?
                        .project(projection)?,
                )?,
                StepProcessor::Filter { literal, source } => {
                    let matches = self.literal_bindings(literal, *source, combination)?;
                    if matches.is_empty() {
                        relation.gather(&[])
                    } else {
                        let mut provenance = relation.provenance().to_vec();
                        provenance.extend(matches.provenance().iter().map(|column| {
                            Column::constant(column.as_slice()[0], relation.len())
                        }));
                        relation.with_provenance(provenance)?
                    }
                }
                StepProcessor::MergeJoin(join) => {
                    let right = self.literal_bindings(&join.literal, join.source, combination)?;
                    let joined = merge_join(
                        &relation.sort_by_field(join.left_key)?,
                        join.left_key,
                        &right.sort_by_field(join.right_key)?,
                        join.right_key,
                        &join.output,
                    )?;

                    Self::finish_join(join, joined)?
                }
                StepProcessor::NestedLoopJoin(join) => {
                    let right = self.literal_bindings(&join.literal, join.source, combination)?;
                    let joined = nested_loop_join(
                        &relation,
                        join.left_key,
                        &right,
                        join.right_key,
                        &join.output,
                    )?;

                    Self::finish_join(join, joined)?
                }
            };

            if relation.is_empty() {
                break;
            }
        }

        Ok(relation)
    }

    /// Start the bindings of the body from the first literal with variables.
    ///
    /// `relation` is a single nullary row whose provenance stems from preceding filters.
    fn seed(relation: &Segment, bindings: Segment) -> Result<Segment, Error> {
        if relation.provenance_arity() == 0 {
            return Ok(bindings);
        }

        let first_rows = vec![0; bindings.len()];
        let provenance = relation
            .provenance()
            .iter()
            .map(|column| column.gather(&first_rows))
            .chain(bindings.provenance().iter().cloned())
            .collect();

        Ok(bindings.with_provenance(provenance)?)
    }

    /// Apply the equality checks of a join step and drop columns that are no longer needed.
    fn finish_join(join: &JoinStep, joined: Segment) -> Result<Segment, Error> {
        let joined = if join.equalities.is_empty() {
            joined
        } else {
            let rows = (0..joined.len())
                .filter(|&row| {
                    join.equalities
                        .iter()
                        .all(|&(first, second)| joined.value(row, first) == joined.value(row, second))
                })
                .collect::<Vec<_>>();
            joined.gather(&rows)
        };

        Ok(joined.project(&join.projection)?)
    }

    /// Remove the bindings that already have a matching fact for the head literal.
    fn unsatisfied(&self, check: &RestrictedCheck, mut relation: Segment) -> Result<Segment, Error> {
        for node in self.graph.nodes_with_predicate(check.literal.predicate()) {
            if relation.is_empty() {
                break;
            }

            let existing = check.literal.select(node.data());
            let result = left_join(&relation, &check.body_columns, &existing, &check.head_positions)?;
            relation = result.unmatched();
        }

        Ok(relation)
    }

    fn empty_output(plan: &RulePlan) -> RuleOutput {
        RuleOutput {
            heads: plan
                .head()
                .literals()
                .iter()
                .map(|(predicate, sources)| (*predicate, Segment::empty(sources.len())))
                .collect(),
        }
    }

    fn construct_heads(&self, plan: &RulePlan, relation: Segment) -> Result<RuleOutput, Error> {
        let head = plan.head();

        if relation.is_empty() {
            return Ok(Self::empty_output(plan));
        }

        let relation = match head.restricted_check() {
            Some(check) => self.unsatisfied(check, relation)?,
            None => relation,
        };
        if relation.is_empty() {
            return Ok(Self::empty_output(plan));
        }
        let length = relation.len();

        let frontier = head
            .frontier_columns()
            .iter()
            .map(|&column| relation.column(column).clone())
            .collect::<Vec<_>>();

        let nulls = head
            .existentials()
            .iter()
            .map(|variable| {
                self.term_manager
                    .get_or_assign_ids(plan.rule(), variable.index(), &frontier, length)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut heads = Vec::with_capacity(head.literals().len());
        for (predicate, sources) in head.literals() {
            let columns = sources
                .iter()
                .map(|source| match *source {
                    HeadColumn::Body(column) => relation.column(column).clone(),
                    HeadColumn::Null(index) => nulls[index].clone(),
                    HeadColumn::Constant(constant) => Column::<Term>::constant(constant, length),
                })
                .collect::<Vec<_>>();

            let facts = if columns.is_empty() {
                Segment::nullary(length)
            } else {
                Segment::new(columns)?
            };

            heads.push((
                *predicate,
                facts
                    .with_provenance(relation.provenance().to_vec())?
                    .sorted_and_unique(),
            ));
        }

        Ok(RuleOutput { heads })
    }
}

#[cfg(test)]
mod test {
    use chasm_physical::{
        datatypes::Term, management::term_manager::TermManager, tabular::Segment,
    };
    use test_log::test;

    use crate::{
        edb::InMemoryEdb,
        execution::{
            execution_parameters::{ExecutionParameters, ProvenanceMode},
            planning::RulePlan,
        },
        graph::{DerivationGraph, NewNode},
        io::parse_program,
        model::Program,
    };

    use super::RuleExecutor;

    struct Setup {
        program: Program,
        edb: InMemoryEdb,
        plans: Vec<RulePlan>,
        term_manager: TermManager,
        graph: DerivationGraph,
    }

    fn setup(source: &str) -> Setup {
        let program = parse_program(source).unwrap();
        let edb = InMemoryEdb::from_program(&program).unwrap();
        let parameters = ExecutionParameters::default();

        let plans = (0..program.rules().len())
            .map(|rule| RulePlan::new(rule, &program, &edb, &parameters).unwrap())
            .collect();

        let mut term_manager = TermManager::new(parameters.chase_mode);
        for (index, rule) in program.rules().iter().enumerate() {
            for variable in rule.existentials() {
                term_manager
                    .register(index, variable.index(), rule.frontier().len())
                    .unwrap();
            }
        }

        Setup {
            program,
            edb,
            plans,
            term_manager,
            graph: DerivationGraph::new(),
        }
    }

    fn term(setup: &Setup, name: &str) -> Term {
        setup.program.dictionary().get(name).unwrap()
    }

    #[test]
    fn join_node_with_edb() {
        let setup = setup(
            "e(1, 2) . e(2, 3) . e(2, 4) .
             p(?X, ?Z) :- q(?X, ?Y), e(?Y, ?Z) .
             q(?X, ?Y) :- e(?X, ?Y) .",
        );
        let q = setup.program.predicate("q").unwrap();
        let node = setup.graph.add_node(NewNode::input(
            q,
            Segment::from_rows(2, [[term(&setup, "1"), term(&setup, "2")]]).unwrap(),
        ));

        for provenance in [ProvenanceMode::Tuple, ProvenanceMode::Node] {
            let executor =
                RuleExecutor::new(&setup.graph, &setup.edb, &setup.term_manager, provenance);
            let output = executor.execute_rule(&setup.plans[0], &[node]).unwrap();

            assert_eq!(output.len(), 2);
            let (predicate, facts) = &output.heads[0];
            assert_eq!(*predicate, setup.program.predicate("p").unwrap());
            assert_eq!(
                facts.row(0),
                vec![term(&setup, "1"), term(&setup, "3")]
            );
            assert_eq!(
                facts.row(1),
                vec![term(&setup, "1"), term(&setup, "4")]
            );

            match provenance {
                ProvenanceMode::Tuple => assert_eq!(facts.row_provenance(1), vec![node]),
                ProvenanceMode::Node => assert_eq!(facts.provenance_arity(), 0),
            }
        }
    }

    #[test]
    fn restricted_check_and_null_reuse() {
        let mut setup = setup(
            "person(alice) . person(bob) .
             parent(?X, !P) :- person(?X) .",
        );
        let bob = term(&setup, "bob");
        let carol = setup.program.dictionary_mut().add("carol");
        let parent = setup.program.predicate("parent").unwrap();

        let executor = RuleExecutor::new(
            &setup.graph,
            &setup.edb,
            &setup.term_manager,
            ProvenanceMode::Tuple,
        );
        let first = executor.execute_rule(&setup.plans[0], &[]).unwrap();
        assert_eq!(first.len(), 2);

        setup.graph.add_node(NewNode::input(
            parent,
            Segment::from_rows(2, [[bob, carol]]).unwrap(),
        ));
        let executor = RuleExecutor::new(
            &setup.graph,
            &setup.edb,
            &setup.term_manager,
            ProvenanceMode::Tuple,
        );
        let second = executor.execute_rule(&setup.plans[0], &[]).unwrap();

        let (_, facts) = &second.heads[0];
        assert_eq!(facts.len(), 1);
        assert_eq!(facts.value(0, 0), term(&setup, "alice"));
        assert!(facts.value(0, 1).is_null());
        assert_eq!(first.heads[0].1.value(0, 1), facts.value(0, 1));
        assert_eq!(setup.term_manager.null_count(), 2);
    }

    #[test]
    fn literals_without_variables() {
        let setup = setup(
            "start(1) . e(1) . e(2) . done(a) .
             flag() :- start(?X) .
             q(?X) :- e(?X) .
             over(?X) :- done(?X) .
             p(?X) :- flag(), q(?X), over(a) .",
        );
        let predicate = |name: &str| setup.program.predicate(name).unwrap();

        let flag = setup
            .graph
            .add_node(NewNode::input(predicate("flag"), Segment::nullary(1)));
        let q = setup.graph.add_node(NewNode::input(
            predicate("q"),
            Segment::from_rows(1, [[term(&setup, "1")], [term(&setup, "2")]]).unwrap(),
        ));
        let over_a = setup.graph.add_node(NewNode::input(
            predicate("over"),
            Segment::from_rows(1, [[term(&setup, "a")]]).unwrap(),
        ));
        let over_other = setup.graph.add_node(NewNode::input(
            predicate("over"),
            Segment::from_rows(1, [[term(&setup, "1")]]).unwrap(),
        ));

        let executor = RuleExecutor::new(
            &setup.graph,
            &setup.edb,
            &setup.term_manager,
            ProvenanceMode::Tuple,
        );

        let output = executor
            .execute_rule(&setup.plans[3], &[flag, q, over_a])
            .unwrap();
        let (_, facts) = &output.heads[0];
        assert_eq!(facts.len(), 2);
        assert_eq!(facts.row(1), vec![term(&setup, "2")]);
        assert_eq!(facts.row_provenance(0), vec![flag, q, over_a]);

        let output = executor
            .execute_rule(&setup.plans[3], &[flag, q, over_other])
            .unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn empty_body() {
        let setup = setup(
            "e(1, 2) .
             p(?X) :- e(?X, ?X) .",
        );
        let executor = RuleExecutor::new(
            &setup.graph,
            &setup.edb,
            &setup.term_manager,
            ProvenanceMode::Tuple,
        );
        let output = executor.execute_rule(&setup.plans[0], &[]).unwrap();

        assert!(output.is_empty());
        assert_eq!(output.heads[0].1.arity(), 1);
    }
}
