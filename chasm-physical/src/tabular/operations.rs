//! This module collects operations that combine [Segment]s.

pub mod anti_join;
pub mod left_join;
pub mod merge_join;
pub mod nested_loop_join;

pub use anti_join::anti_join;
pub use left_join::{left_join, LeftJoinResult};
pub use merge_join::merge_join;
pub use nested_loop_join::nested_loop_join;

use crate::{columnar::Column, datatypes::Term, error::Error};

use super::segment::Segment;

/// Source of an output column of a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinOutput {
    /// Column of the left input
    Left(usize),
    /// Column of the right input
    Right(usize),
}

/// Check that all referenced columns exist.
fn check_join_columns(
    left: &Segment,
    left_keys: &[usize],
    right: &Segment,
    right_keys: &[usize],
    output: &[JoinOutput],
) -> Result<(), Error> {
    let out_of_bounds = |column: usize, arity: usize| Error::ColumnOutOfBounds { column, arity };

    if let Some(&column) = left_keys.iter().find(|&&column| column >= left.arity()) {
        return Err(out_of_bounds(column, left.arity()));
    }
    if let Some(&column) = right_keys.iter().find(|&&column| column >= right.arity()) {
        return Err(out_of_bounds(column, right.arity()));
    }

    for source in output {
        match *source {
            JoinOutput::Left(column) if column >= left.arity() => {
                return Err(out_of_bounds(column, left.arity()))
            }
            JoinOutput::Right(column) if column >= right.arity() => {
                return Err(out_of_bounds(column, right.arity()))
            }
            _ => {}
        }
    }

    Ok(())
}

/// Build the result of a join from the matching pairs of row indices.
///
/// Provenance columns of the left input come first, followed by those of the right input.
fn materialize_pairs(
    left: &Segment,
    right: &Segment,
    left_rows: &[usize],
    right_rows: &[usize],
    output: &[JoinOutput],
) -> Segment {
    debug_assert_eq!(left_rows.len(), right_rows.len());

    let columns: Vec<Column<Term>> = output
        .iter()
        .map(|source| match *source {
            JoinOutput::Left(column) => left.column(column).gather(left_rows),
            JoinOutput::Right(column) => right.column(column).gather(right_rows),
        })
        .collect();

    let segment = if columns.is_empty() {
        Segment::nullary(left_rows.len())
    } else {
        Segment::new(columns).expect("gathered columns have equal length")
    };

    let provenance = left
        .provenance()
        .iter()
        .map(|column| column.gather(left_rows))
        .chain(
            right
                .provenance()
                .iter()
                .map(|column| column.gather(right_rows)),
        )
        .collect();

    segment
        .with_provenance(provenance)
        .expect("gathered provenance has one entry per row")
}

#[cfg(test)]
pub(crate) mod test_util {
    use crate::{datatypes::Term, tabular::segment::Segment};

    /// Create a segment of constants from a list of rows.
    pub(crate) fn segment(arity: usize, rows: &[&[u64]]) -> Segment {
        Segment::from_rows(
            arity,
            rows.iter()
                .map(|row| row.iter().copied().map(Term::constant).collect::<Vec<_>>()),
        )
        .expect("test rows have the declared arity")
    }

    /// Return the rows of a segment as plain numbers.
    pub(crate) fn rows(segment: &Segment) -> Vec<Vec<u64>> {
        segment
            .rows()
            .map(|row| row.into_iter().map(Term::value).collect())
            .collect()
    }
}
