//! This module defines [Node].

use std::sync::Arc;

use chasm_physical::{datatypes::NodeId, tabular::Segment};

use crate::model::PredicateId;

use super::containment::RewrittenQuery;

/// One batch of facts of a single predicate,
/// produced by one rule application or given as input.
///
/// Nodes are immutable once they are part of a [DerivationGraph][super::DerivationGraph].
#[derive(Debug)]
pub struct Node {
    pub(super) id: NodeId,
    pub(super) predicate: PredicateId,
    pub(super) rule: Option<usize>,
    pub(super) step: usize,
    pub(super) incoming_edges: Vec<NodeId>,
    pub(super) data: Arc<Segment>,
    pub(super) query: Option<RewrittenQuery>,
    pub(super) merged_from: Vec<NodeId>,
}

impl Node {
    /// Return the id of this node.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Return the predicate of the facts in this node.
    pub fn predicate(&self) -> PredicateId {
        self.predicate
    }

    /// Return the index of the rule that produced this node.
    ///
    /// Input facts and merged nodes have no rule.
    pub fn rule(&self) -> Option<usize> {
        self.rule
    }

    /// Return the step in which this node was created.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Return the nodes the producing rule was applied to.
    pub fn incoming_edges(&self) -> &[NodeId] {
        &self.incoming_edges
    }

    /// Return the facts of this node, sorted and free of duplicates.
    pub fn data(&self) -> &Arc<Segment> {
        &self.data
    }

    /// Return the query describing the facts of this node, if known.
    pub fn query(&self) -> Option<&RewrittenQuery> {
        self.query.as_ref()
    }

    /// Return the nodes that were merged into this one.
    pub fn merged_from(&self) -> &[NodeId] {
        &self.merged_from
    }

    /// Return `true` if this node replaces several earlier nodes.
    pub fn is_merged(&self) -> bool {
        !self.merged_from.is_empty()
    }
}

/// Description of a node that is about to be added to the graph.
#[derive(Debug, Clone)]
pub struct NewNode {
    /// Predicate of the facts
    pub predicate: PredicateId,
    /// Rule that derived the facts, if any
    pub rule: Option<usize>,
    /// Step of the chase in which the facts were derived
    pub step: usize,
    /// Nodes the rule was applied to
    pub incoming_edges: Vec<NodeId>,
    /// The facts
    pub data: Segment,
    /// Query describing the facts
    pub query: Option<RewrittenQuery>,
}

impl NewNode {
    /// Describe a node holding input facts.
    pub fn input(predicate: PredicateId, data: Segment) -> Self {
        Self {
            predicate,
            rule: None,
            step: 0,
            incoming_edges: Vec::new(),
            data,
            query: None,
        }
    }
}
