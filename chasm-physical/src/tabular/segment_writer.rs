//! This module defines [SegmentWriter].

use crate::{
    columnar::Column,
    datatypes::{NodeId, Term},
    error::Error,
};

use super::segment::Segment;

/// Row-wise builder for a [Segment].
#[derive(Debug)]
pub struct SegmentWriter {
    /// Data columns under construction
    columns: Vec<Vec<Term>>,
    /// Provenance columns under construction
    provenance: Vec<Vec<NodeId>>,
    /// Number of rows written so far
    length: usize,
}

impl SegmentWriter {
    /// Create a new [SegmentWriter] for rows of the given arity
    /// that carry `provenance_arity` provenance entries.
    pub fn new(arity: usize, provenance_arity: usize) -> Self {
        Self {
            columns: vec![Vec::new(); arity],
            provenance: vec![Vec::new(); provenance_arity],
            length: 0,
        }
    }

    /// Return the number of rows written so far.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Return `true` if no row has been written.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Append a row without provenance.
    pub fn add_row(&mut self, row: &[Term]) -> Result<(), Error> {
        self.add_row_with_provenance(row, &[])
    }

    /// Append a row together with its provenance entries.
    pub fn add_row_with_provenance(
        &mut self,
        row: &[Term],
        provenance: &[NodeId],
    ) -> Result<(), Error> {
        if row.len() != self.columns.len() {
            return Err(Error::ArityMismatch {
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        if provenance.len() != self.provenance.len() {
            return Err(Error::ArityMismatch {
                expected: self.provenance.len(),
                found: provenance.len(),
            });
        }

        for (column, &value) in self.columns.iter_mut().zip(row) {
            column.push(value);
        }
        for (column, &node) in self.provenance.iter_mut().zip(provenance) {
            column.push(node);
        }
        self.length += 1;

        Ok(())
    }

    /// Finish writing and return the resulting [Segment].
    pub fn finalize(self) -> Segment {
        let segment = if self.columns.is_empty() {
            Segment::nullary(self.length)
        } else {
            Segment::new(self.columns.into_iter().map(Column::new).collect())
                .expect("all columns receive one value per row")
        };

        segment
            .with_provenance(self.provenance.into_iter().map(Column::new).collect())
            .expect("all provenance columns receive one value per row")
    }
}
