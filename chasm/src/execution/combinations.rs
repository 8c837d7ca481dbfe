//! This module defines [Combinations],
//! which enumerates the input nodes a rule has to be applied to in a step.

use std::cmp::Ordering;

use chasm_physical::datatypes::NodeId;

/// The nodes of one IDB body literal, split by whether the rule has already seen them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomNodes {
    /// Nodes created before the rule was last applied
    pub old: Vec<NodeId>,
    /// Nodes created since
    pub new: Vec<NodeId>,
}

impl AtomNodes {
    /// Split `(node, step)` pairs into old and new nodes.
    ///
    /// A node is new if it was created in or after `last_step`,
    /// or if the rule was never applied.
    pub fn split<Nodes>(nodes: Nodes, last_step: Option<usize>) -> Self
    where
        Nodes: IntoIterator<Item = (NodeId, usize)>,
    {
        let mut result = Self::default();
        for (node, step) in nodes {
            match last_step {
                Some(last) if step < last => result.old.push(node),
                _ => result.new.push(node),
            }
        }

        result
    }

    fn all_len(&self) -> usize {
        self.old.len() + self.new.len()
    }

    fn all(&self, index: usize) -> NodeId {
        if index < self.old.len() {
            self.old[index]
        } else {
            self.new[index - self.old.len()]
        }
    }
}

/// Iterator over all combinations of input nodes, one per IDB body literal,
/// that contain at least one new node.
///
/// For every pivot position, literals before the pivot take old nodes,
/// the pivot takes a new node and literals after it take any node.
/// The pivot of a combination is thus the position of its first new node,
/// so every combination is produced exactly once.
#[derive(Debug)]
pub struct Combinations<'a> {
    atoms: &'a [AtomNodes],
    pivot: usize,
    counters: Vec<usize>,
    started: bool,
}

impl<'a> Combinations<'a> {
    /// Enumerate the combinations of the given literals.
    pub fn new(atoms: &'a [AtomNodes]) -> Self {
        Self {
            atoms,
            pivot: 0,
            counters: vec![0; atoms.len()],
            started: false,
        }
    }

    fn choice_count(&self, position: usize) -> usize {
        let atom = &self.atoms[position];
        match position.cmp(&self.pivot) {
            Ordering::Less => atom.old.len(),
            Ordering::Equal => atom.new.len(),
            Ordering::Greater => atom.all_len(),
        }
    }

    fn current(&self) -> Vec<NodeId> {
        self.counters
            .iter()
            .enumerate()
            .map(|(position, &counter)| {
                let atom = &self.atoms[position];
                match position.cmp(&self.pivot) {
                    Ordering::Less => atom.old[counter],
                    Ordering::Equal => atom.new[counter],
                    Ordering::Greater => atom.all(counter),
                }
            })
            .collect()
    }
}

impl Iterator for Combinations<'_> {
    type Item = Vec<NodeId>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pivot < self.atoms.len() {
            if !self.started {
                if (0..self.atoms.len()).any(|position| self.choice_count(position) == 0) {
                    self.pivot += 1;
                    continue;
                }

                self.counters.fill(0);
                self.started = true;
                return Some(self.current());
            }

            for position in (0..self.atoms.len()).rev() {
                self.counters[position] += 1;
                if self.counters[position] < self.choice_count(position) {
                    return Some(self.current());
                }
                self.counters[position] = 0;
            }

            self.pivot += 1;
            self.started = false;
        }

        None
    }
}
