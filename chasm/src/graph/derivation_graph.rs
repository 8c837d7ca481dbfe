//! This module defines [DerivationGraph].

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use chasm_physical::{
    columnar::Column,
    datatypes::{NodeId, Term},
    tabular::{operations::anti_join, Segment},
};

use crate::{error::Error, model::PredicateId};

use super::{
    containment::RewrittenQuery,
    node::{NewNode, Node},
};

/// How a fact came to be part of the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivation {
    /// The node that first contained the fact
    pub node: NodeId,
    /// The rule that derived the fact, `None` for input facts
    pub rule: Option<usize>,
    /// The step in which the fact was derived
    pub step: usize,
    /// For each IDB body literal of the rule, the node that provided the matching fact.
    /// Only the incoming edges of [Derivation::node] if tuple provenance was not recorded.
    pub premises: Vec<NodeId>,
}

#[derive(Debug, Default)]
struct GraphState {
    /// Every node ever added, indexed by its id
    nodes: Vec<Arc<Node>>,
    /// Nodes currently holding the facts of each predicate, in order of creation
    index: HashMap<PredicateId, Vec<NodeId>>,
}

impl GraphState {
    fn node(&self, id: NodeId) -> Result<&Arc<Node>, Error> {
        self.nodes.get(id as usize).ok_or(Error::UnknownNode(id))
    }

    fn indexed(&self, predicate: PredicateId) -> &[NodeId] {
        self.index.get(&predicate).map_or(&[], Vec::as_slice)
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.index.entry(node.predicate).or_default().push(id);
        self.nodes.push(Arc::new(node));
        id
    }
}

/// Append-only store of [Node]s with an index from predicates to their nodes.
///
/// All operations take `&self`; the arena and the index sit behind a single lock.
/// Node data is reference counted, so readers never hold the lock while working on it.
#[derive(Debug, Default)]
pub struct DerivationGraph {
    state: RwLock<GraphState>,
}

impl DerivationGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, GraphState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, GraphState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new node and return its id.
    ///
    /// The data of the node is made sorted and free of duplicates.
    pub fn add_node(&self, node: NewNode) -> NodeId {
        let data = node.data.sorted_and_unique();

        let mut state = self.write();
        let id = state.nodes.len() as NodeId;

        log::debug!(
            "Node {id}: {} facts of predicate {} from rule {:?} in step {}",
            data.len(),
            node.predicate,
            node.rule,
            node.step
        );

        state.push(Node {
            id,
            predicate: node.predicate,
            rule: node.rule,
            step: node.step,
            incoming_edges: node.incoming_edges,
            data: Arc::new(data),
            query: node.query,
            merged_from: Vec::new(),
        })
    }

    /// Return the id the next node will receive.
    pub fn next_node_id(&self) -> NodeId {
        self.read().nodes.len() as NodeId
    }

    /// Return the node with the given id.
    pub fn node(&self, id: NodeId) -> Result<Arc<Node>, Error> {
        self.read().node(id).cloned()
    }

    /// Return the data of the node with the given id.
    pub fn node_data(&self, id: NodeId) -> Result<Arc<Segment>, Error> {
        Ok(Arc::clone(&self.read().node(id)?.data))
    }

    /// Return the ids of the nodes currently holding the facts of a predicate.
    pub fn node_ids_with_predicate(&self, predicate: PredicateId) -> Vec<NodeId> {
        self.read().indexed(predicate).to_vec()
    }

    /// Return the nodes currently holding the facts of a predicate.
    pub fn nodes_with_predicate(&self, predicate: PredicateId) -> Vec<Arc<Node>> {
        let state = self.read();
        state
            .indexed(predicate)
            .iter()
            .map(|&id| Arc::clone(&state.nodes[id as usize]))
            .collect()
    }

    /// Return all predicates that have nodes, in ascending order.
    pub fn predicates(&self) -> Vec<PredicateId> {
        let mut result = self.read().index.keys().copied().collect::<Vec<_>>();
        result.sort();
        result
    }

    /// Return the number of nodes currently in the index.
    ///
    /// Nodes that were merged into another node are not counted.
    pub fn node_count(&self) -> usize {
        self.read().index.values().map(Vec::len).sum()
    }

    /// Return the number of nodes ever created, including those replaced by merging.
    pub fn total_node_count(&self) -> usize {
        self.read().nodes.len()
    }

    /// Return the number of facts of a predicate.
    pub fn count_facts(&self, predicate: PredicateId) -> usize {
        self.nodes_with_predicate(predicate)
            .iter()
            .map(|node| node.data.len())
            .sum()
    }

    /// Return all facts of a predicate, sorted and without provenance,
    /// or `None` if the predicate has no nodes.
    pub fn table(&self, predicate: PredicateId) -> Result<Option<Segment>, Error> {
        let nodes = self.nodes_with_predicate(predicate);
        let Some(first) = nodes.first() else {
            return Ok(None);
        };

        if nodes.len() == 1 {
            return Ok(Some(first.data.without_provenance()));
        }

        let parts = nodes
            .iter()
            .map(|node| node.data.without_provenance())
            .collect::<Vec<_>>();

        Ok(Some(
            Segment::concat(first.data.arity(), &parts)?.sorted_and_unique(),
        ))
    }

    /// Remove from `candidate` every fact that is already stored for `predicate`.
    ///
    /// The result is sorted and free of duplicates; provenance of surviving rows is kept.
    pub fn retain(&self, predicate: PredicateId, candidate: Segment) -> Result<Segment, Error> {
        self.retain_since(predicate, candidate, 0)
    }

    /// Like [DerivationGraph::retain], but only compares against nodes
    /// whose id is at least `first_node`.
    pub fn retain_since(
        &self,
        predicate: PredicateId,
        candidate: Segment,
        first_node: NodeId,
    ) -> Result<Segment, Error> {
        let existing = self
            .nodes_with_predicate(predicate)
            .into_iter()
            .filter(|node| node.id >= first_node)
            .map(|node| Arc::clone(&node.data))
            .collect::<Vec<_>>();

        let mut remaining = candidate.sorted_and_unique();
        for data in existing {
            if remaining.is_empty() {
                break;
            }

            remaining = anti_join(&remaining, &data)?;
        }

        Ok(remaining)
    }

    /// Replace all nodes of a predicate by a single node with the same facts.
    ///
    /// The new node records, for every fact, the node that originally derived it.
    /// Returns the number of facts of the predicate.
    pub fn merge_nodes_with_predicate_into_one(
        &self,
        predicate: PredicateId,
    ) -> Result<usize, Error> {
        let nodes = self.nodes_with_predicate(predicate);
        let Some(first) = nodes.first() else {
            return Ok(0);
        };
        if nodes.len() == 1 {
            return Ok(first.data.len());
        }

        let mut parts = Vec::with_capacity(nodes.len());
        for node in &nodes {
            let origin = if node.is_merged() {
                node.data.provenance()[0].clone()
            } else {
                Column::constant(node.id, node.data.len())
            };

            parts.push(node.data.without_provenance().with_provenance(vec![origin])?);
        }

        let data = Segment::concat(first.data.arity(), &parts)?.sorted_and_unique();
        let count = data.len();

        let mut state = self.write();
        let id = state.nodes.len() as NodeId;
        state.index.remove(&predicate);
        state.push(Node {
            id,
            predicate,
            rule: None,
            step: nodes.iter().map(|node| node.step).max().unwrap_or(0),
            incoming_edges: Vec::new(),
            data: Arc::new(data),
            query: None,
            merged_from: nodes.iter().map(|node| node.id).collect(),
        });

        log::debug!(
            "Merged {} nodes of predicate {predicate} into node {id} with {count} facts",
            nodes.len()
        );

        Ok(count)
    }

    /// Find a node of `predicate` whose query is equivalent to the given one.
    pub fn find_equivalent(&self, predicate: PredicateId, query: &RewrittenQuery) -> Option<NodeId> {
        self.read()
            .nodes
            .iter()
            .filter(|node| node.predicate == predicate)
            .find(|node| {
                node.query
                    .as_ref()
                    .is_some_and(|candidate| candidate.is_equivalent(query))
            })
            .map(|node| node.id)
    }

    /// Explain how a fact of `predicate` was derived.
    ///
    /// Returns `None` if the fact is not stored.
    pub fn explain(
        &self,
        predicate: PredicateId,
        tuple: &[Term],
    ) -> Result<Option<Derivation>, Error> {
        for node in self.nodes_with_predicate(predicate) {
            let Some(row) = node.data.find_row(tuple) else {
                continue;
            };

            let (origin, row) = if node.is_merged() {
                let origin = self.node(node.data.provenance()[0][row])?;
                let row = origin.data.find_row(tuple).ok_or(Error::UnknownNode(origin.id))?;
                (origin, row)
            } else {
                (node, row)
            };

            let premises = if origin.data.provenance_arity() > 0 {
                origin.data.row_provenance(row)
            } else {
                origin.incoming_edges.clone()
            };

            return Ok(Some(Derivation {
                node: origin.id,
                rule: origin.rule,
                step: origin.step,
                premises,
            }));
        }

        Ok(None)
    }
}
