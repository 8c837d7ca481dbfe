//! This module implements the functionality for planning the execution of a rule.

pub mod plan_body;
pub mod plan_head;

pub use plan_body::{BodyPlan, BodyStep, JoinStep, LiteralSource, StepProcessor};
pub use plan_head::{HeadColumn, HeadPlan, RestrictedCheck};

use chasm_physical::management::term_manager::ChaseMode;

use crate::{
    edb::EdbLayer,
    error::Error,
    graph::containment::MAX_QUERY_LENGTH,
    model::{Program, Rule},
};

use super::execution_parameters::ExecutionParameters;

/// Compiled form of a rule, computed once before the chase starts.
#[derive(Debug, Clone)]
pub struct RulePlan {
    rule: usize,
    body: BodyPlan,
    head: HeadPlan,
    supports_queries: bool,
}

impl RulePlan {
    /// Compile the rule with the given index.
    pub fn new(
        rule: usize,
        program: &Program,
        edb: &dyn EdbLayer,
        parameters: &ExecutionParameters,
    ) -> Result<Self, Error> {
        let logical = &program.rules()[rule];

        let body = BodyPlan::new(rule, logical, program, edb, parameters.nested_loop_threshold)?;
        let restricted = parameters.chase_mode == ChaseMode::Restricted;
        let head = HeadPlan::new(logical, body.variables(), restricted);

        let plan = Self {
            rule,
            body,
            head,
            supports_queries: Self::rule_supports_queries(logical),
        };

        log::debug!("Plan for rule {rule} {}: {plan:?}", program.rule_to_string(rule));

        Ok(plan)
    }

    fn rule_supports_queries(rule: &Rule) -> bool {
        rule.is_datalog() && rule.head().len() == 1 && rule.body().len() <= MAX_QUERY_LENGTH
    }

    /// Return the index of the rule.
    pub fn rule(&self) -> usize {
        self.rule
    }

    /// Return the plan for the body.
    pub fn body(&self) -> &BodyPlan {
        &self.body
    }

    /// Return the plan for the head.
    pub fn head(&self) -> &HeadPlan {
        &self.head
    }

    /// Return `true` if the nodes produced by this rule can be described by a query.
    pub fn supports_queries(&self) -> bool {
        self.supports_queries
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use crate::{
        edb::InMemoryEdb,
        execution::execution_parameters::ExecutionParameters,
        graph::containment::MAX_QUERY_LENGTH,
        io::parse_program,
    };

    use super::RulePlan;

    #[test]
    fn query_support() {
        let long_body = (0..=MAX_QUERY_LENGTH)
            .map(|_| "e(?X, ?Y)")
            .collect::<Vec<_>>()
            .join(", ");
        let program = parse_program(&format!(
            "e(1, 2) .
             p(?X, ?Y) :- e(?X, ?Y) .
             q(?X, !N) :- e(?X, ?Y) .
             r(?X, ?Y), s(?X) :- e(?X, ?Y) .
             t(?X, ?Y) :- {long_body} ."
        ))
        .unwrap();
        let edb = InMemoryEdb::from_program(&program).unwrap();
        let parameters = ExecutionParameters::default();

        let supported = (0..program.rules().len())
            .map(|rule| {
                RulePlan::new(rule, &program, &edb, &parameters)
                    .unwrap()
                    .supports_queries()
            })
            .collect::<Vec<_>>();

        assert_eq!(supported, vec![true, false, false, false]);
    }
}
