//! This module defines [Program].

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chasm_physical::{datatypes::Term, dictionary::Dictionary};
use petgraph::{algo::tarjan_scc, graph::DiGraph};

use crate::error::Error;

use super::{
    literal::Literal,
    rule::Rule,
    term::{LogicalTerm, PredicateId},
};

/// Name and arity of a predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PredicateInfo {
    name: String,
    arity: usize,
}

/// A set of rules together with the facts given alongside them.
#[derive(Debug, Clone, Default)]
pub struct Program {
    predicates: Vec<PredicateInfo>,
    predicate_ids: HashMap<String, PredicateId>,
    rules: Vec<Rule>,
    facts: Vec<(PredicateId, Vec<Term>)>,
    dictionary: Dictionary,
}

impl Program {
    /// Create an empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id of a predicate, registering it if it is new.
    ///
    /// Returns an error if the predicate is already known with a different arity.
    pub fn register_predicate(&mut self, name: &str, arity: usize) -> Result<PredicateId, Error> {
        if let Some(&id) = self.predicate_ids.get(name) {
            let expected = self.predicates[id.index()].arity;
            if expected != arity {
                return Err(Error::PredicateArity {
                    predicate: name.to_string(),
                    expected,
                    found: arity,
                });
            }

            return Ok(id);
        }

        let id = PredicateId(self.predicates.len() as u32);
        self.predicates.push(PredicateInfo {
            name: name.to_string(),
            arity,
        });
        self.predicate_ids.insert(name.to_string(), id);

        Ok(id)
    }

    /// Return the id of a predicate by name.
    pub fn predicate(&self, name: &str) -> Option<PredicateId> {
        self.predicate_ids.get(name).copied()
    }

    /// Return the name of a predicate.
    pub fn predicate_name(&self, predicate: PredicateId) -> &str {
        &self.predicates[predicate.index()].name
    }

    /// Return the arity of a predicate.
    pub fn arity(&self, predicate: PredicateId) -> usize {
        self.predicates[predicate.index()].arity
    }

    /// Iterate over all predicates.
    pub fn predicates(&self) -> impl Iterator<Item = PredicateId> {
        (0..self.predicates.len() as u32).map(PredicateId)
    }

    /// Add a rule and return its index.
    ///
    /// The rule is validated and the arity of every literal is checked against the predicate table.
    pub fn add_rule(&mut self, rule: Rule) -> Result<usize, Error> {
        let index = self.rules.len();
        rule.validate(index)?;

        for literal in rule.head().iter().chain(rule.body()) {
            self.check_literal(literal)?;
        }

        self.rules.push(rule);
        Ok(index)
    }

    /// Add a fact.
    pub fn add_fact(&mut self, predicate: PredicateId, terms: Vec<Term>) -> Result<(), Error> {
        let info = self
            .predicates
            .get(predicate.index())
            .ok_or_else(|| Error::UnknownPredicate(predicate.to_string()))?;
        if info.arity != terms.len() {
            return Err(Error::PredicateArity {
                predicate: info.name.clone(),
                expected: info.arity,
                found: terms.len(),
            });
        }

        self.facts.push((predicate, terms));
        Ok(())
    }

    fn check_literal(&self, literal: &Literal) -> Result<(), Error> {
        let info = self
            .predicates
            .get(literal.predicate().index())
            .ok_or_else(|| Error::UnknownPredicate(literal.predicate().to_string()))?;

        if info.arity != literal.arity() {
            return Err(Error::PredicateArity {
                predicate: info.name.clone(),
                expected: info.arity,
                found: literal.arity(),
            });
        }

        Ok(())
    }

    /// Return the rules of the program.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Return the facts of the program.
    pub fn facts(&self) -> &[(PredicateId, Vec<Term>)] {
        &self.facts
    }

    /// Return the dictionary of constants.
    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Return a mutable reference to the dictionary of constants.
    pub fn dictionary_mut(&mut self) -> &mut Dictionary {
        &mut self.dictionary
    }

    /// Return the predicates that occur in the head of some rule.
    pub fn idb_predicates(&self) -> HashSet<PredicateId> {
        self.rules
            .iter()
            .flat_map(|rule| rule.head().iter().map(Literal::predicate))
            .collect()
    }

    /// Return `true` if the predicate occurs in the head of some rule.
    pub fn is_idb(&self, predicate: PredicateId) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.head().iter().any(|literal| literal.predicate() == predicate))
    }

    /// Return the predicates that occur in no rule head, in ascending order.
    pub fn edb_predicates(&self) -> Vec<PredicateId> {
        let idb = self.idb_predicates();
        self.predicates()
            .filter(|predicate| !idb.contains(predicate))
            .collect()
    }

    /// Assign strata according to the dependencies between predicates.
    ///
    /// Every strongly connected component of the predicate dependency graph
    /// is saturated before the components that depend on it.
    /// A rule belongs to the earliest component among its head predicates.
    /// Only components that own at least one rule receive a stratum, numbered from zero.
    pub fn stratify(&mut self) {
        let mut graph = DiGraph::<PredicateId, ()>::with_capacity(self.predicates.len(), 0);
        let nodes = self
            .predicates()
            .map(|predicate| graph.add_node(predicate))
            .collect::<Vec<_>>();

        for rule in &self.rules {
            for body in rule.body() {
                for head in rule.head() {
                    graph.update_edge(
                        nodes[body.predicate().index()],
                        nodes[head.predicate().index()],
                        (),
                    );
                }
            }
        }

        // tarjan_scc returns the components in reverse topological order
        let components = tarjan_scc(&graph);
        let mut component_of = vec![0; self.predicates.len()];
        for (position, component) in components.iter().rev().enumerate() {
            for node in component {
                component_of[graph[*node].index()] = position;
            }
        }

        let rule_components = self
            .rules
            .iter()
            .map(|rule| {
                rule.head()
                    .iter()
                    .map(|literal| component_of[literal.predicate().index()])
                    .min()
                    .unwrap_or(0)
            })
            .collect::<Vec<_>>();

        let used = rule_components.iter().copied().collect::<BTreeSet<_>>();
        let numbering = used
            .into_iter()
            .enumerate()
            .map(|(stratum, component)| (component, stratum))
            .collect::<HashMap<_, _>>();

        for (rule, component) in self.rules.iter_mut().zip(rule_components) {
            rule.set_stratum(numbering[&component]);
        }

        log::debug!(
            "Stratification: {} rules in {} strata",
            self.rules.len(),
            numbering.len()
        );
    }

    /// Return `true` if some rule has a stratum other than zero.
    pub fn has_strata(&self) -> bool {
        self.rules.iter().any(|rule| rule.stratum() != 0)
    }

    /// Group the rule indices by stratum, in ascending order of strata.
    pub fn strata(&self) -> Vec<Vec<usize>> {
        let mut strata = BTreeMap::<usize, Vec<usize>>::new();
        for (index, rule) in self.rules.iter().enumerate() {
            strata.entry(rule.stratum()).or_default().push(index);
        }

        strata.into_values().collect()
    }

    /// Render a literal, using the variable names of `rule` if given.
    pub fn literal_to_string(&self, literal: &Literal, rule: Option<&Rule>) -> String {
        let arguments = literal
            .terms()
            .iter()
            .map(|term| match (term, rule) {
                (LogicalTerm::Variable(variable), Some(rule)) => rule.variable_name(*variable),
                (LogicalTerm::Variable(variable), None) => format!("?V{}", variable.0),
                (LogicalTerm::Constant(constant), _) => self.dictionary.display(*constant),
            })
            .collect::<Vec<_>>();

        format!(
            "{}({})",
            self.predicate_name(literal.predicate()),
            arguments.join(", ")
        )
    }

    /// Render a fact of the given predicate.
    pub fn fact_to_string(&self, predicate: PredicateId, terms: &[Term]) -> String {
        let arguments = terms
            .iter()
            .map(|term| self.dictionary.display(*term))
            .collect::<Vec<_>>();

        format!("{}({})", self.predicate_name(predicate), arguments.join(", "))
    }

    /// Render the rule with the given index.
    pub fn rule_to_string(&self, index: usize) -> String {
        let rule = &self.rules[index];
        let render = |literals: &[Literal]| {
            literals
                .iter()
                .map(|literal| self.literal_to_string(literal, Some(rule)))
                .collect::<Vec<_>>()
                .join(", ")
        };

        format!("{} :- {} .", render(rule.head()), render(rule.body()))
    }
}
