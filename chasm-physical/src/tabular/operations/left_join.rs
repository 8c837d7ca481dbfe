//! This module implements the left join used to test whether bindings are already satisfied.

use bitvec::vec::BitVec;

use crate::{error::Error, tabular::segment::Segment};

use super::check_join_columns;

/// Result of a [left_join].
#[derive(Debug, Clone)]
pub struct LeftJoinResult {
    /// All rows of the left input in their original order
    pub segment: Segment,
    /// For each row, whether a partner was found on the right side
    pub matched: BitVec,
}

impl LeftJoinResult {
    /// Return the left rows that found no partner.
    pub fn unmatched(&self) -> Segment {
        self.segment.filter(&self.matched, false)
    }

    /// Return the left rows that found a partner.
    pub fn matched(&self) -> Segment {
        self.segment.filter(&self.matched, true)
    }
}

/// Compute for each left row whether some right row agrees with it on the given keys.
///
/// Unlike an inner join, left rows without a partner are kept;
/// each left row appears exactly once in the result.
/// The key may span several columns.
pub fn left_join(
    left: &Segment,
    left_keys: &[usize],
    right: &Segment,
    right_keys: &[usize],
) -> Result<LeftJoinResult, Error> {
    if left_keys.len() != right_keys.len() {
        return Err(Error::ArityMismatch {
            expected: left_keys.len(),
            found: right_keys.len(),
        });
    }
    check_join_columns(left, left_keys, right, right_keys, &[])?;

    let lookup = right.project(right_keys)?.without_provenance().sorted_and_unique();

    let mut matched = BitVec::with_capacity(left.len());
    let mut key = Vec::with_capacity(left_keys.len());
    for row in 0..left.len() {
        key.clear();
        key.extend(left_keys.iter().map(|&column| left.value(row, column)));

        matched.push(lookup.find_row(&key).is_some());
    }

    Ok(LeftJoinResult {
        segment: left.clone(),
        matched,
    })
}

#[cfg(test)]
mod test {
    use test_log::test;

    use crate::tabular::operations::test_util::{rows, segment};

    use super::left_join;

    #[test]
    fn keeps_unmatched_rows() {
        let left = segment(2, &[&[3, 1], &[1, 2], &[2, 2]]);
        let right = segment(3, &[&[9, 1, 2], &[8, 3, 3]]);

        let result = left_join(&left, &[0, 1], &right, &[1, 2]).unwrap();

        assert_eq!(result.segment.len(), 3);
        assert_eq!(rows(&result.unmatched()), vec![vec![3, 1], vec![2, 2]]);
        assert_eq!(rows(&result.matched()), vec![vec![1, 2]]);
    }

    #[test]
    fn empty_key_matches_everything_if_right_nonempty() {
        let left = segment(1, &[&[5], &[6]]);
        let right = segment(1, &[&[1]]);

        let result = left_join(&left, &[], &right, &[]).unwrap();
        assert!(result.unmatched().is_empty());

        let result = left_join(&left, &[], &segment(1, &[]), &[]).unwrap();
        assert_eq!(result.unmatched().len(), 2);
    }

    #[test]
    fn key_arity_must_agree() {
        let left = segment(1, &[&[5]]);
        assert!(left_join(&left, &[0], &left, &[]).is_err());
    }
}
