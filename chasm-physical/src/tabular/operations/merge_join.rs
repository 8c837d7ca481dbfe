//! This module implements the sort-merge join of two [Segment]s on a single key.

use crate::{datatypes::Term, error::Error, tabular::segment::Segment};

use super::{check_join_columns, materialize_pairs, JoinOutput};

/// Number of consecutive entries starting at `start` that are equal to `values[start]`.
fn run_length(values: &[Term], start: usize) -> usize {
    let key = values[start];
    values[start..]
        .iter()
        .take_while(|&&value| value == key)
        .count()
}

/// Join two segments that are sorted on their respective key column.
///
/// For every key occurring on both sides the run of left rows with that key
/// is counted once and combined with each right row of the matching run,
/// so the left side is never scanned twice for the same key.
/// The result is ordered by the key.
pub fn merge_join(
    left: &Segment,
    left_key: usize,
    right: &Segment,
    right_key: usize,
    output: &[JoinOutput],
) -> Result<Segment, Error> {
    check_join_columns(left, &[left_key], right, &[right_key], output)?;

    debug_assert!(left.is_sorted_by_field(left_key));
    debug_assert!(right.is_sorted_by_field(right_key));
    #[cfg(feature = "check_column_sorting")]
    assert!(
        left.is_sorted_by_field(left_key) && right.is_sorted_by_field(right_key),
        "merge join requires inputs sorted on the join key"
    );

    let left_values = left.column(left_key).as_slice();
    let right_values = right.column(right_key).as_slice();

    let mut left_rows = Vec::new();
    let mut right_rows = Vec::new();

    let mut left_index = 0;
    let mut right_index = 0;
    while left_index < left_values.len() && right_index < right_values.len() {
        let left_value = left_values[left_index];
        let right_value = right_values[right_index];

        if left_value < right_value {
            left_index += run_length(left_values, left_index);
        } else if left_value > right_value {
            right_index += run_length(right_values, right_index);
        } else {
            let left_run = run_length(left_values, left_index);
            let right_run = run_length(right_values, right_index);

            for right_row in right_index..right_index + right_run {
                left_rows.extend(left_index..left_index + left_run);
                right_rows.extend(std::iter::repeat(right_row).take(left_run));
            }

            left_index += left_run;
            right_index += right_run;
        }
    }

    log::trace!(
        "merge join: {} x {} rows -> {} rows",
        left.len(),
        right.len(),
        left_rows.len()
    );

    Ok(materialize_pairs(
        left,
        right,
        &left_rows,
        &right_rows,
        output,
    ))
}
