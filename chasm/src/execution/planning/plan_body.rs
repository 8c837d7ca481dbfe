//! This module defines [BodyPlan], which evaluates the body of a rule
//! as a sequence of joins from left to right.
//!
//! Literals without variables only filter the intermediate relation.
//! The first literal with variables seeds it.

use std::collections::BTreeSet;

use chasm_physical::tabular::operations::JoinOutput;

use crate::{
    edb::EdbLayer,
    error::Error,
    model::{Literal, PredicateId, Program, Rule, VariableId},
};

/// Where the facts of a body literal come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralSource {
    /// The EDB layer
    Edb,
    /// The node chosen for the given IDB literal, counted among the IDB literals of the body
    Idb {
        /// Position among the IDB literals
        atom: usize,
    },
}

/// Join of the intermediate relation with the facts of one literal.
#[derive(Debug, Clone)]
pub struct JoinStep {
    /// The literal to join with
    pub literal: Literal,
    /// Where its facts come from
    pub source: LiteralSource,
    /// Join column of the intermediate relation
    pub left_key: usize,
    /// Join column of the literal's bindings
    pub right_key: usize,
    /// Columns of the join result
    pub output: Vec<JoinOutput>,
    /// Pairs of join result columns that must hold equal values
    pub equalities: Vec<(usize, usize)>,
    /// Columns of the join result that are still needed afterwards
    pub projection: Vec<usize>,
}

/// How one body literal is processed.
#[derive(Debug, Clone)]
pub enum StepProcessor {
    /// First literal with variables, read from the EDB
    EdbSeed {
        /// The literal
        literal: Literal,
        /// Columns of its bindings that are still needed
        projection: Vec<usize>,
    },
    /// First literal with variables, read from a node
    IdbSeed {
        /// The literal
        literal: Literal,
        /// Position among the IDB literals
        atom: usize,
        /// Columns of its bindings that are still needed
        projection: Vec<usize>,
    },
    /// Sort both sides on the key and merge them
    MergeJoin(JoinStep),
    /// Compare every pair of rows
    NestedLoopJoin(JoinStep),
    /// Literal without variables; keeps the intermediate relation if it has a matching fact
    Filter {
        /// The literal
        literal: Literal,
        /// Where its facts come from
        source: LiteralSource,
    },
}

/// One processed body literal together with the variables bound afterwards.
#[derive(Debug, Clone)]
pub struct BodyStep {
    /// How the literal is processed
    pub processor: StepProcessor,
    /// Variables of the intermediate relation after this step, one per column
    pub variables: Vec<VariableId>,
}

/// Evaluation plan of a rule body.
#[derive(Debug, Clone)]
pub struct BodyPlan {
    steps: Vec<BodyStep>,
    idb_predicates: Vec<PredicateId>,
}

impl BodyPlan {
    /// Compile the body of a rule.
    ///
    /// Joins with EDB relations of at most `nested_loop_threshold` facts use a nested loop.
    pub fn new(
        rule_index: usize,
        rule: &Rule,
        program: &Program,
        edb: &dyn EdbLayer,
        nested_loop_threshold: usize,
    ) -> Result<Self, Error> {
        let needed = Self::needed_variables(rule);

        let mut steps = Vec::with_capacity(rule.body().len());
        let mut idb_predicates = Vec::new();
        let mut columns = Vec::<VariableId>::new();
        let mut seeded = false;

        for (index, literal) in rule.body().iter().enumerate() {
            let source = if program.is_idb(literal.predicate()) {
                idb_predicates.push(literal.predicate());
                LiteralSource::Idb {
                    atom: idb_predicates.len() - 1,
                }
            } else {
                LiteralSource::Edb
            };

            let bound = literal.distinct_variables();
            let live = &needed[index];

            if bound.is_empty() {
                steps.push(BodyStep {
                    processor: StepProcessor::Filter {
                        literal: literal.clone(),
                        source,
                    },
                    variables: columns.clone(),
                });
                continue;
            }

            if !seeded {
                seeded = true;
                let projection = positions_of(&bound, |variable| live.contains(&variable));
                columns = projection.iter().map(|&position| bound[position]).collect();

                let processor = match source {
                    LiteralSource::Edb => StepProcessor::EdbSeed {
                        literal: literal.clone(),
                        projection,
                    },
                    LiteralSource::Idb { atom } => StepProcessor::IdbSeed {
                        literal: literal.clone(),
                        atom,
                        projection,
                    },
                };

                steps.push(BodyStep {
                    processor,
                    variables: columns.clone(),
                });
                continue;
            }

            let shared = bound
                .iter()
                .copied()
                .filter(|variable| columns.contains(variable))
                .collect::<Vec<_>>();
            let Some((&key, further)) = shared.split_first() else {
                return Err(Error::NoJoinVariable {
                    rule: rule_index,
                    literal: index,
                });
            };

            let column_of = |variable: VariableId| columns.iter().position(|&c| c == variable);
            let bound_of = |variable: VariableId| bound.iter().position(|&b| b == variable);

            let mut output = (0..columns.len()).map(JoinOutput::Left).collect::<Vec<_>>();
            let mut output_variables = columns.clone();
            for (position, &variable) in bound.iter().enumerate() {
                if !columns.contains(&variable) {
                    output.push(JoinOutput::Right(position));
                    output_variables.push(variable);
                }
            }

            let mut equalities = Vec::with_capacity(further.len());
            for &variable in further {
                if let (Some(left), Some(right)) = (column_of(variable), bound_of(variable)) {
                    equalities.push((left, output.len()));
                    output.push(JoinOutput::Right(right));
                }
            }

            let projection = positions_of(&output_variables, |variable| live.contains(&variable));
            let (Some(left_key), Some(right_key)) = (column_of(key), bound_of(key)) else {
                return Err(Error::NoJoinVariable {
                    rule: rule_index,
                    literal: index,
                });
            };

            let join = JoinStep {
                literal: literal.clone(),
                source,
                left_key,
                right_key,
                output,
                equalities,
                projection,
            };

            columns = join
                .projection
                .iter()
                .map(|&position| output_variables[position])
                .collect();

            let nested = source == LiteralSource::Edb
                && edb.count(literal.predicate()) <= nested_loop_threshold;
            let processor = if nested {
                StepProcessor::NestedLoopJoin(join)
            } else {
                StepProcessor::MergeJoin(join)
            };

            steps.push(BodyStep {
                processor,
                variables: columns.clone(),
            });
        }

        Ok(Self {
            steps,
            idb_predicates,
        })
    }

    /// For every body literal, the variables still needed after processing it.
    ///
    /// These are the variables of later body literals and the frontier of the rule.
    fn needed_variables(rule: &Rule) -> Vec<BTreeSet<VariableId>> {
        let mut needed = rule.frontier().into_iter().collect::<BTreeSet<_>>();
        let mut result = vec![BTreeSet::new(); rule.body().len()];

        for (index, literal) in rule.body().iter().enumerate().rev() {
            result[index] = needed.clone();
            needed.extend(literal.variables());
        }

        result
    }

    /// Return the steps of the plan.
    pub fn steps(&self) -> &[BodyStep] {
        &self.steps
    }

    /// Return the predicates of the IDB literals, in body order.
    pub fn idb_predicates(&self) -> &[PredicateId] {
        &self.idb_predicates
    }

    /// Return the source of every body literal, in body order.
    pub fn literal_sources(&self) -> impl Iterator<Item = LiteralSource> + '_ {
        self.steps.iter().map(|step| match &step.processor {
            StepProcessor::EdbSeed { .. } => LiteralSource::Edb,
            StepProcessor::IdbSeed { atom, .. } => LiteralSource::Idb { atom: *atom },
            StepProcessor::MergeJoin(join) | StepProcessor::NestedLoopJoin(join) => join.source,
            StepProcessor::Filter { source, .. } => *source,
        })
    }

    /// Return the variables of the final intermediate relation, one per column.
    pub fn variables(&self) -> &[VariableId] {
        self.steps
            .last()
            .map_or(&[], |step| step.variables.as_slice())
    }
}

fn positions_of(variables: &[VariableId], keep: impl Fn(VariableId) -> bool) -> Vec<usize> {
    variables
        .iter()
        .enumerate()
        .filter(|(_, &variable)| keep(variable))
        .map(|(position, _)| position)
        .collect()
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use chasm_physical::{datatypes::Term, tabular::{operations::JoinOutput, Segment}};
    use test_log::test;

    use crate::{
        edb::InMemoryEdb,
        error::Error,
        model::{Literal, LogicalTerm, PredicateId, Program, Rule, VariableId},
    };

    use super::{BodyPlan, LiteralSource, StepProcessor};

    fn literal(predicate: PredicateId, variables: &[u32]) -> Literal {
        Literal::new(
            predicate,
            variables.iter().map(|&v| LogicalTerm::variable(v)).collect(),
        )
    }

    fn triangle() -> (Program, InMemoryEdb) {
        let mut program = Program::new();
        let e = program.register_predicate("e", 2).unwrap();
        let big = program.register_predicate("big", 2).unwrap();
        let p = program.register_predicate("p", 2).unwrap();

        // p(X, Z) :- p(X, Y), e(Y, Z), big(Z, X)
        program
            .add_rule(Rule::new(
                vec![literal(p, &[0, 2])],
                vec![literal(p, &[0, 1]), literal(e, &[1, 2]), literal(big, &[2, 0])],
                BTreeSet::new(),
            ))
            .unwrap();

        let mut edb = InMemoryEdb::new();
        let rows = (0..100u64).map(|value| [Term::constant(value), Term::constant(value + 1)]);
        edb.add_relation(big, Segment::from_rows(2, rows).unwrap())
            .unwrap();

        (program, edb)
    }

    #[test]
    fn join_steps() {
        let (program, edb) = triangle();
        let plan = BodyPlan::new(0, &program.rules()[0], &program, &edb, 64).unwrap();

        assert_eq!(plan.idb_predicates(), &[PredicateId(2)]);
        assert_eq!(plan.steps().len(), 3);

        assert!(matches!(
            plan.steps()[0].processor,
            StepProcessor::IdbSeed { atom: 0, .. }
        ));
        assert_eq!(plan.steps()[0].variables, vec![VariableId(0), VariableId(1)]);

        let StepProcessor::NestedLoopJoin(join) = &plan.steps()[1].processor else {
            panic!("small EDB relations use a nested loop join");
        };
        assert_eq!(join.source, LiteralSource::Edb);
        assert_eq!((join.left_key, join.right_key), (1, 0));
        assert_eq!(plan.steps()[1].variables, vec![VariableId(0), VariableId(2)]);

        let StepProcessor::MergeJoin(join) = &plan.steps()[2].processor else {
            panic!("large EDB relations use a merge join");
        };
        // Z is the key, X is checked afterwards
        assert_eq!((join.left_key, join.right_key), (1, 0));
        assert_eq!(join.equalities, vec![(0, 2)]);
        assert_eq!(
            join.output,
            vec![JoinOutput::Left(0), JoinOutput::Left(1), JoinOutput::Right(1)]
        );
        assert_eq!(plan.variables(), &[VariableId(0), VariableId(2)]);
    }

    #[test]
    fn literals_without_variables_filter() {
        let mut program = Program::new();
        let e = program.register_predicate("e", 1).unwrap();
        let flag = program.register_predicate("flag", 0).unwrap();
        let p = program.register_predicate("p", 1).unwrap();

        // p(X) :- flag(), e(X), flag()
        program
            .add_rule(Rule::new(
                vec![literal(p, &[0])],
                vec![literal(flag, &[]), literal(e, &[0]), literal(flag, &[])],
                BTreeSet::new(),
            ))
            .unwrap();

        let plan = BodyPlan::new(0, &program.rules()[0], &program, &InMemoryEdb::new(), 64).unwrap();

        assert_eq!(plan.steps().len(), 3);
        assert!(matches!(
            plan.steps()[0].processor,
            StepProcessor::Filter {
                source: LiteralSource::Edb,
                ..
            }
        ));
        assert!(plan.steps()[0].variables.is_empty());
        assert!(matches!(
            plan.steps()[1].processor,
            StepProcessor::EdbSeed { .. }
        ));
        assert!(matches!(
            plan.steps()[2].processor,
            StepProcessor::Filter { .. }
        ));
        assert_eq!(plan.variables(), &[VariableId(0)]);
    }

    #[test]
    fn missing_join_variable() {
        let mut program = Program::new();
        let e = program.register_predicate("e", 1).unwrap();
        let p = program.register_predicate("p", 2).unwrap();
        program
            .add_rule(Rule::new(
                vec![literal(p, &[0, 1])],
                vec![literal(e, &[0]), literal(e, &[1])],
                BTreeSet::new(),
            ))
            .unwrap();

        let result = BodyPlan::new(3, &program.rules()[0], &program, &InMemoryEdb::new(), 64);
        assert!(matches!(
            result,
            Err(Error::NoJoinVariable {
                rule: 3,
                literal: 1
            })
        ));
    }
}
