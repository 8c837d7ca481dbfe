//! This module defines [RowTable].

use std::{hash::BuildHasher, sync::Arc};

use bitvec::vec::BitVec;
use hashbrown::HashTable;

use crate::datatypes::Term;

/// Number of rows stored in one block of a [RowTable].
pub(crate) const BLOCK_ROWS: usize = 1024;

/// Append-only table of argument tuples.
///
/// Rows are stored in blocks of fixed capacity.
/// A block is allocated once and never moved or resized,
/// so growing the table leaves all previously written rows in place.
#[derive(Debug)]
pub(crate) struct RowTable {
    /// Number of values per row
    arity: usize,
    /// Storage of the rows; each block holds `BLOCK_ROWS * arity` values
    blocks: Vec<Box<[Term]>>,
    /// For each row, the term keys that occur among its arguments, directly or transitively
    ancestry: Vec<Option<Arc<BitVec>>>,
    /// Number of rows in the table
    length: usize,
    /// Hash index over the rows, holding the hash and index of each row
    index: HashTable<(u64, usize)>,
    /// Hasher used for the index
    hasher: std::collections::hash_map::RandomState,
}

impl RowTable {
    /// Create a new empty [RowTable].
    pub(crate) fn new(arity: usize) -> Self {
        Self {
            arity,
            blocks: Vec::new(),
            ancestry: Vec::new(),
            length: 0,
            index: HashTable::new(),
            hasher: Default::default(),
        }
    }

    /// Return the number of rows.
    pub(crate) fn len(&self) -> usize {
        self.length
    }

    /// Compute the hash of an argument tuple.
    pub(crate) fn hash(&self, arguments: &[Term]) -> u64 {
        self.hasher.hash_one(arguments)
    }

    /// Return the row at the given index.
    pub(crate) fn row(&self, index: usize) -> &[Term] {
        debug_assert!(index < self.length);

        if self.arity == 0 {
            return &[];
        }

        let block = &self.blocks[index / BLOCK_ROWS];
        let start = (index % BLOCK_ROWS) * self.arity;
        &block[start..start + self.arity]
    }

    /// Return the term keys that occur in the arguments of the given row.
    pub(crate) fn ancestry(&self, index: usize) -> Option<Arc<BitVec>> {
        self.ancestry.get(index).cloned().flatten()
    }

    /// Look up the index of an indexed row.
    pub(crate) fn find(&self, hash: u64, arguments: &[Term]) -> Option<usize> {
        self.index
            .find(hash, |&(row_hash, row)| {
                row_hash == hash && self.row(row) == arguments
            })
            .map(|&(_, row)| row)
    }

    /// Append a row and return its index.
    ///
    /// If `indexed` is set, the row can later be found via [RowTable::find].
    pub(crate) fn push(
        &mut self,
        hash: u64,
        arguments: &[Term],
        ancestry: Option<Arc<BitVec>>,
        indexed: bool,
    ) -> usize {
        debug_assert_eq!(arguments.len(), self.arity);

        let index = self.length;

        if self.arity > 0 {
            if index % BLOCK_ROWS == 0 {
                self.blocks
                    .push(vec![Term::default(); BLOCK_ROWS * self.arity].into_boxed_slice());
            }

            let start = (index % BLOCK_ROWS) * self.arity;
            let block = self
                .blocks
                .last_mut()
                .expect("a block with free space has been allocated");
            block[start..start + self.arity].copy_from_slice(arguments);
        }

        self.ancestry.push(ancestry);
        self.length += 1;

        if indexed {
            self.index
                .insert_unique(hash, (hash, index), |&(row_hash, _)| row_hash);
        }

        index
    }
}
