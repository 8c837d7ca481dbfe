//! This module implements the nested-loop join of two [Segment]s on a single key.

use crate::{error::Error, tabular::segment::Segment};

use super::{check_join_columns, materialize_pairs, JoinOutput};

/// Join two segments by comparing every left row with every right row.
///
/// Produces the same rows as [merge_join][super::merge_join]
/// but does not require sorted inputs.
/// Rows are emitted in the order of the left input.
pub fn nested_loop_join(
    left: &Segment,
    left_key: usize,
    right: &Segment,
    right_key: usize,
    output: &[JoinOutput],
) -> Result<Segment, Error> {
    check_join_columns(left, &[left_key], right, &[right_key], output)?;

    let left_values = left.column(left_key);
    let right_values = right.column(right_key);

    let mut left_rows = Vec::new();
    let mut right_rows = Vec::new();

    for (left_row, left_value) in left_values.iter().enumerate() {
        for (right_row, right_value) in right_values.iter().enumerate() {
            if left_value == right_value {
                left_rows.push(left_row);
                right_rows.push(right_row);
            }
        }
    }

    log::trace!(
        "nested loop join: {} x {} rows -> {} rows",
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

#[cfg(test)]
mod test {
    use quickcheck_macros::quickcheck;
    use test_log::test;

    use crate::{
        datatypes::Term,
        tabular::{
            operations::{
                merge_join,
                test_util::{rows, segment},
                JoinOutput,
            },
            segment::Segment,
        },
    };

    use super::nested_loop_join;

    #[test]
    fn join_unsorted() {
        let left = segment(2, &[&[4, 40], &[2, 20], &[1, 10]]);
        let right = segment(1, &[&[2], &[4], &[2]]);

        let result = nested_loop_join(
            &left,
            0,
            &right,
            0,
            &[JoinOutput::Left(1), JoinOutput::Right(0)],
        )
        .unwrap();

        assert_eq!(rows(&result), vec![vec![40, 4], vec![20, 2], vec![20, 2]]);
    }

    #[quickcheck]
    fn agrees_with_merge_join(left: Vec<(u8, u8)>, right: Vec<(u8, u8)>) -> bool {
        let build = |pairs: &[(u8, u8)]| {
            Segment::from_rows(
                2,
                pairs.iter().map(|&(key, value)| {
                    vec![
                        Term::constant(u64::from(key % 4)),
                        Term::constant(u64::from(value)),
                    ]
                }),
            )
            .unwrap()
        };
        let left = build(&left[..]);
        let right = build(&right[..]);
        let output = [JoinOutput::Left(0), JoinOutput::Left(1), JoinOutput::Right(1)];

        let nested = nested_loop_join(&left, 0, &right, 0, &output).unwrap();
        let merged = merge_join(
            &left.sort_by_field(0).unwrap(),
            0,
            &right.sort_by_field(0).unwrap(),
            0,
            &output,
        )
        .unwrap();

        let mut nested_rows = rows(&nested);
        let mut merged_rows = rows(&merged);
        nested_rows.sort();
        merged_rows.sort();

        nested_rows == merged_rows
    }
}
