//! This module defines [Segment].

use std::cmp::Ordering;

use bitvec::slice::BitSlice;
use itertools::Itertools;

use crate::{
    columnar::Column,
    datatypes::{NodeId, Term},
    error::Error,
};

use super::segment_reader::SegmentReader;

/// Immutable table of fixed arity stored column by column.
///
/// Besides its data columns a segment may carry provenance columns,
/// which record for each row the nodes of the derivation graph it was computed from.
/// Provenance columns follow their row through every operation
/// but are never used for comparing rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    /// Data columns
    columns: Vec<Column<Term>>,
    /// Provenance columns
    provenance: Vec<Column<NodeId>>,
    /// Number of rows; needed because zero-arity segments have no column to ask
    length: usize,
}

impl Segment {
    /// Create a new [Segment] from a list of columns of equal length.
    ///
    /// Use [Segment::nullary] to create segments without columns.
    pub fn new(columns: Vec<Column<Term>>) -> Result<Self, Error> {
        let length = columns.first().map_or(0, Column::len);
        Self::check_lengths(&columns, length)?;

        Ok(Self {
            columns,
            provenance: Vec::new(),
            length,
        })
    }

    /// Create a segment of arity zero containing `length` empty rows.
    pub fn nullary(length: usize) -> Self {
        Self {
            columns: Vec::new(),
            provenance: Vec::new(),
            length,
        }
    }

    /// Create an empty segment of the given arity.
    pub fn empty(arity: usize) -> Self {
        Self {
            columns: vec![Column::default(); arity],
            provenance: Vec::new(),
            length: 0,
        }
    }

    /// Create a segment from a list of rows.
    pub fn from_rows<Rows, Row>(arity: usize, rows: Rows) -> Result<Self, Error>
    where
        Rows: IntoIterator<Item = Row>,
        Row: AsRef<[Term]>,
    {
        let mut columns = vec![Vec::<Term>::new(); arity];
        let mut length = 0;

        for row in rows {
            let row = row.as_ref();
            if row.len() != arity {
                return Err(Error::ArityMismatch {
                    expected: arity,
                    found: row.len(),
                });
            }

            for (column, &value) in columns.iter_mut().zip(row) {
                column.push(value);
            }
            length += 1;
        }

        Ok(Self {
            columns: columns.into_iter().map(Column::new).collect(),
            provenance: Vec::new(),
            length,
        })
    }

    /// Attach provenance columns to this segment, replacing the current ones.
    pub fn with_provenance(mut self, provenance: Vec<Column<NodeId>>) -> Result<Self, Error> {
        if let Some(column) = provenance.iter().find(|column| column.len() != self.length) {
            return Err(Error::ColumnLengthMismatch(vec![self.length, column.len()]));
        }

        self.provenance = provenance;
        Ok(self)
    }

    /// Return a copy of this segment without provenance columns.
    pub fn without_provenance(&self) -> Self {
        Self {
            columns: self.columns.clone(),
            provenance: Vec::new(),
            length: self.length,
        }
    }

    fn check_lengths<T>(columns: &[Column<T>], length: usize) -> Result<(), Error> {
        if columns.iter().any(|column| column.len() != length) {
            return Err(Error::ColumnLengthMismatch(
                columns.iter().map(Column::len).collect(),
            ));
        }

        Ok(())
    }

    /// Return the number of data columns.
    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    /// Return the number of rows.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Return `true` if this segment contains no rows.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Return the data columns.
    pub fn columns(&self) -> &[Column<Term>] {
        &self.columns
    }

    /// Return the data column at the given position.
    ///
    /// # Panics
    /// Panics if `index` is not smaller than the arity.
    pub fn column(&self, index: usize) -> &Column<Term> {
        &self.columns[index]
    }

    /// Return the provenance columns.
    pub fn provenance(&self) -> &[Column<NodeId>] {
        &self.provenance
    }

    /// Return the number of provenance columns.
    pub fn provenance_arity(&self) -> usize {
        self.provenance.len()
    }

    /// Return the value at the given row and column.
    pub fn value(&self, row: usize, column: usize) -> Term {
        self.columns[column][row]
    }

    /// Return a copy of the row at the given index.
    pub fn row(&self, index: usize) -> Vec<Term> {
        self.columns.iter().map(|column| column[index]).collect()
    }

    /// Return the provenance entries of the row at the given index.
    pub fn row_provenance(&self, index: usize) -> Vec<NodeId> {
        self.provenance.iter().map(|column| column[index]).collect()
    }

    /// Return an iterator over copies of all rows.
    pub fn rows(&self) -> impl Iterator<Item = Vec<Term>> + '_ {
        (0..self.length).map(|index| self.row(index))
    }

    /// Return a streaming reader over the rows of this segment.
    pub fn reader(&self) -> SegmentReader<'_> {
        SegmentReader::new(self)
    }

    /// Compare two rows of this segment lexicographically.
    pub fn compare_rows(&self, first: usize, second: usize) -> Ordering {
        self.compare_with(first, self, second)
    }

    /// Lexicographically compare a row of this segment with a row of another segment of the same arity.
    pub fn compare_with(&self, row: usize, other: &Segment, other_row: usize) -> Ordering {
        debug_assert_eq!(self.arity(), other.arity());

        for (column, other_column) in self.columns.iter().zip(other.columns.iter()) {
            let ordering = column[row].cmp(&other_column[other_row]);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        Ordering::Equal
    }

    /// Lexicographically compare a row of this segment with an explicit tuple.
    pub fn compare_with_tuple(&self, row: usize, tuple: &[Term]) -> Ordering {
        debug_assert_eq!(self.arity(), tuple.len());

        for (column, value) in self.columns.iter().zip(tuple) {
            let ordering = column[row].cmp(value);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        Ordering::Equal
    }

    /// Create a segment whose columns are the columns of this segment at the given positions.
    ///
    /// Positions may repeat. Provenance columns are kept.
    pub fn project(&self, positions: &[usize]) -> Result<Self, Error> {
        let mut columns = Vec::with_capacity(positions.len());
        for &position in positions {
            let column = self
                .columns
                .get(position)
                .ok_or(Error::ColumnOutOfBounds {
                    column: position,
                    arity: self.arity(),
                })?;
            columns.push(column.clone());
        }

        Ok(Self {
            columns,
            provenance: self.provenance.clone(),
            length: self.length,
        })
    }

    /// Create a segment consisting of the rows at the given indices.
    pub fn gather(&self, rows: &[usize]) -> Self {
        Self {
            columns: self.columns.iter().map(|column| column.gather(rows)).collect(),
            provenance: self
                .provenance
                .iter()
                .map(|column| column.gather(rows))
                .collect(),
            length: rows.len(),
        }
    }

    /// Keep only those rows whose bit in `mask` equals `keep`.
    pub fn filter(&self, mask: &BitSlice, keep: bool) -> Self {
        debug_assert_eq!(mask.len(), self.length);

        let rows = (0..self.length)
            .filter(|&row| mask[row] == keep)
            .collect::<Vec<_>>();

        if rows.len() == self.length {
            return self.clone();
        }

        self.gather(&rows)
    }

    /// Return `true` if the rows are sorted in ascending order of the given column.
    pub fn is_sorted_by_field(&self, field: usize) -> bool {
        self.columns
            .get(field)
            .map_or(true, |column| column.is_sorted())
    }

    /// Return a segment sorted by the given column.
    ///
    /// Sorting is stable, so rows with equal values in `field` keep their relative order.
    /// Returns a cheap copy if the segment is already sorted by this field.
    pub fn sort_by_field(&self, field: usize) -> Result<Self, Error> {
        let column = self.columns.get(field).ok_or(Error::ColumnOutOfBounds {
            column: field,
            arity: self.arity(),
        })?;

        if column.is_sorted() {
            return Ok(self.clone());
        }

        let mut order = (0..self.length).collect::<Vec<_>>();
        order.sort_by_key(|&row| column[row]);

        Ok(self.gather(&order))
    }

    /// Return `true` if the rows are in strictly ascending lexicographic order.
    pub fn is_sorted_and_unique(&self) -> bool {
        if self.arity() == 0 {
            return self.length <= 1;
        }

        (0..self.length)
            .tuple_windows()
            .all(|(first, second)| self.compare_rows(first, second) == Ordering::Less)
    }

    /// Return a segment with the same set of rows that is lexicographically sorted
    /// and contains no duplicates.
    ///
    /// Among duplicate rows the first occurrence, including its provenance, is kept.
    pub fn sorted_and_unique(&self) -> Self {
        if self.is_sorted_and_unique() {
            return self.clone();
        }

        if self.arity() == 0 {
            return self.gather(&[0]);
        }

        let mut order = (0..self.length).collect::<Vec<_>>();
        order.sort_by(|&first, &second| self.compare_rows(first, second));
        order.dedup_by(|current, previous| self.compare_rows(*previous, *current) == Ordering::Equal);

        self.gather(&order)
    }

    /// Find the index of a row in a sorted segment without duplicates.
    pub fn find_row(&self, tuple: &[Term]) -> Option<usize> {
        debug_assert!(self.is_sorted_and_unique());

        if tuple.len() != self.arity() {
            return None;
        }

        let mut low = 0;
        let mut high = self.length;
        while low < high {
            let middle = low + (high - low) / 2;
            match self.compare_with_tuple(middle, tuple) {
                Ordering::Less => low = middle + 1,
                Ordering::Greater => high = middle,
                Ordering::Equal => return Some(middle),
            }
        }

        None
    }

    /// Concatenate the rows of several segments of equal shape.
    pub fn concat(arity: usize, segments: &[Segment]) -> Result<Self, Error> {
        let provenance_arity = segments.first().map_or(0, Segment::provenance_arity);

        for segment in segments {
            if segment.arity() != arity {
                return Err(Error::ArityMismatch {
                    expected: arity,
                    found: segment.arity(),
                });
            }
            if segment.provenance_arity() != provenance_arity {
                return Err(Error::ArityMismatch {
                    expected: provenance_arity,
                    found: segment.provenance_arity(),
                });
            }
        }

        let columns = (0..arity)
            .map(|index| {
                segments
                    .iter()
                    .flat_map(|segment| segment.columns[index].iter().copied())
                    .collect::<Column<Term>>()
            })
            .collect();
        let provenance = (0..provenance_arity)
            .map(|index| {
                segments
                    .iter()
                    .flat_map(|segment| segment.provenance[index].iter().copied())
                    .collect::<Column<NodeId>>()
            })
            .collect();

        Ok(Self {
            columns,
            provenance,
            length: segments.iter().map(Segment::len).sum(),
        })
    }
}
